use thiserror::Error;

#[derive(Debug, Error)]
pub enum SentinelError {
    #[error("invalid decision: {0}")]
    InvalidDecision(String),

    #[error("invalid signal: {0}")]
    InvalidSignal(String),

    #[error("invalid severity: {0}")]
    InvalidSeverity(String),

    #[error("invalid decision state: {0}")]
    InvalidState(String),

    #[error("invalid covenant direction '{0}': must be 'above' or 'below'")]
    InvalidDirection(String),

    #[error("invalid action kind: {0}")]
    InvalidActionKind(String),

    #[error("invalid transition from {from} to {to}: {reason}")]
    InvalidTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SentinelError>;
