use thiserror::Error;

/// Typed failures crossing the engine boundary. Degraded estimates are not
/// errors; they are tagged on the result and logged.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("train not found: {0}")]
    NotFound(String),

    #[error("no data snapshot available: {0}")]
    Unavailable(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("data load failed: {0}")]
    Load(String),
}

impl EngineError {
    /// Stable machine-readable code, so callers can tell "train does not
    /// exist" apart from "system temporarily unavailable" without parsing
    /// the message.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::NotFound(_) => "NOT_FOUND",
            EngineError::Unavailable(_) => "UNAVAILABLE",
            EngineError::InvalidInput(_) => "INVALID_INPUT",
            EngineError::Load(_) => "LOAD_FAILED",
        }
    }
}
