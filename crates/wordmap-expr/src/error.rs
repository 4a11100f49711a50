//! Error types for the expression crate.

pub use wordmap_core::error::Error as WordMapError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExprError {
    /// Input contains a character that starts no token.
    #[error("Unexpected character at position {position}")]
    Lex { position: usize },

    #[error("Parse error at position {position}: {message}")]
    Parse { position: usize, message: String },

    /// The evaluation context has no value for an identifier.
    #[error("Unknown identifier '{0}'")]
    UnboundIdentifier(String),

    #[error("Not supported operation '{0}'")]
    UnsupportedOperator(String),
}

impl ExprError {
    pub(crate) fn parse(position: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            position,
            message: message.into(),
        }
    }
}

/// Result type for expression operations
pub type Result<T> = std::result::Result<T, ExprError>;

impl From<ExprError> for WordMapError {
    fn from(e: ExprError) -> Self {
        match e {
            ExprError::Lex { position } => WordMapError::Parse {
                location: format!("position {}", position),
                message: "unexpected character".to_string(),
            },
            ExprError::Parse { position, message } => WordMapError::Parse {
                location: format!("position {}", position),
                message,
            },
            other => WordMapError::Expression(other.to_string()),
        }
    }
}
