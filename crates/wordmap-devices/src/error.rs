//! Error types for the device crate.

use wordmap_expr::ExprError;

pub use wordmap_core::error::Error as WordMapError;

/// Result type for device operations.
pub type DeviceResult<T> = Result<T, DeviceError>;

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// Evaluation failed for one status or command expression.
    #[error(transparent)]
    Expression(#[from] ExprError),

    /// An expression in the model does not parse.
    #[error("Invalid expression for {device}/{name}: {source}")]
    InvalidExpression {
        device: String,
        name: String,
        source: ExprError,
    },

    /// A command expression is not a word or bit assignment.
    #[error("Unsupported command form '{0}'")]
    UnsupportedCommandForm(String),

    #[error("Can not find device '{0}'")]
    UnknownDevice(String),

    #[error("Command '{command}' is not found for device '{device}'")]
    UnknownCommand { device: String, command: String },

    /// Inbound message lacks the fields needed to route it.
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DeviceError {
    /// Errors caused by inbound traffic that the bridge logs and drops.
    pub fn is_ignorable(&self) -> bool {
        matches!(
            self,
            DeviceError::UnknownDevice(_)
                | DeviceError::UnknownCommand { .. }
                | DeviceError::InvalidMessage(_)
        )
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        DeviceError::Transport(msg.into())
    }
}

impl From<DeviceError> for WordMapError {
    fn from(e: DeviceError) -> Self {
        match e {
            DeviceError::Expression(e) => e.into(),
            DeviceError::InvalidExpression { .. } | DeviceError::Model(_) => {
                WordMapError::Config(e.to_string())
            }
            DeviceError::UnknownDevice(_) | DeviceError::UnknownCommand { .. } => {
                WordMapError::NotFound(e.to_string())
            }
            DeviceError::Transport(msg) => WordMapError::Transport(msg),
            DeviceError::Io(e) => WordMapError::Transport(e.to_string()),
            DeviceError::Json(e) => WordMapError::Serialization(e.to_string()),
            other => WordMapError::Device(other.to_string()),
        }
    }
}
