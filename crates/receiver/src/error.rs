use thiserror::Error;

use brx_schema::SchemaError;

#[derive(Error, Debug)]
pub enum ReceiverError {
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),
    #[error("service {0} not in inventory cache")]
    MissingService(u32),
    #[error("service instance {0} not in inventory cache")]
    MissingInstance(u32),
    #[error("record {unique_id} reached dispatch without a page path id or time")]
    Unresolved { unique_id: String },
}

pub type Result<T> = std::result::Result<T, ReceiverError>;
