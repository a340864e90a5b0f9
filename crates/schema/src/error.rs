use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),
}
