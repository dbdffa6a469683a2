use thiserror::Error;

use crate::protocol::ProtocolError;

/// Connection error types.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(ProtocolError),
}

impl From<ProtocolError> for ConnectionError {
    fn from(e: ProtocolError) -> Self {
        match e {
            ProtocolError::Io(e) => ConnectionError::Io(e),
            other => ConnectionError::Protocol(other),
        }
    }
}
