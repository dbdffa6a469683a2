use thiserror::Error;

/// Protocol faults.
///
/// Every variant is fatal to the connection; no error frame is sent back.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A blank line. Treated like the peer closing the stream.
    #[error("empty frame")]
    EmptyFrame,

    #[error("unterminated frame at end of stream")]
    UnterminatedFrame,

    #[error("frame exceeds {limit} bytes")]
    FrameTooLong { limit: usize },

    #[error("invalid UTF-8")]
    InvalidUtf8,

    #[error("request is not a JSON object")]
    NotAnObject,

    #[error("invalid request: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
