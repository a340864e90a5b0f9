use std::sync::Arc;

use brx_metadata::{BufferConfig, TransportConfig, TransportType};

use crate::buffer::RetryBuffer;
use crate::error::{BufferError, TransportError};
use crate::file::FileBuffer;
use crate::memory::InMemoryTransport;
use crate::nats::NatsTransport;
use crate::transport::Transport;

/// Error creating middleware
#[derive(Debug, thiserror::Error)]
pub enum FactoryError {
    #[error("transport: {0}")]
    Transport(#[from] TransportError),
    #[error("retry buffer: {0}")]
    Buffer(#[from] BufferError),
    #[error("configuration error: {0}")]
    ConfigError(String),
}

/// Builds middleware instances from receiver configuration
pub struct MiddlewareFactory;

impl MiddlewareFactory {
    pub async fn create_transport(
        config: &TransportConfig,
    ) -> Result<Arc<dyn Transport>, FactoryError> {
        match config.transport_type {
            TransportType::Memory => Ok(Arc::new(InMemoryTransport::new())),
            TransportType::Nats => {
                let url = config.url.as_deref().ok_or_else(|| {
                    FactoryError::ConfigError("nats transport requires url".to_string())
                })?;
                let transport = NatsTransport::connect(url).await?;
                tracing::info!(url = %url, "Connected to NATS");
                Ok(Arc::new(transport))
            }
        }
    }

    pub fn create_buffer(config: &BufferConfig) -> Result<Arc<dyn RetryBuffer>, FactoryError> {
        Ok(Arc::new(FileBuffer::open(config)?))
    }
}
