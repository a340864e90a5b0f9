use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::SchemaError;

/// Byte encoding shared by the ingest endpoints and the retry buffer
pub trait WireMessage: Serialize + DeserializeOwned {
    fn to_bytes(&self) -> Result<Bytes, SchemaError> {
        serde_json::to_vec(self)
            .map(Bytes::from)
            .map_err(SchemaError::Encode)
    }

    fn from_bytes(data: &[u8]) -> Result<Self, SchemaError> {
        serde_json::from_slice(data).map_err(SchemaError::Decode)
    }
}
