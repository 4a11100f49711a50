//! Unified error handling for WordMap.
//!
//! Crate-local errors (`ExprError`, `DeviceError`) convert into this type at
//! the boundary so callers outside the engine deal with a single enum.

/// Unified error type for WordMap.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Device / unit mapping errors.
    #[error("Device error: {0}")]
    Device(String),

    /// Expression compilation or evaluation errors.
    #[error("Expression error: {0}")]
    Expression(String),

    /// Word transport (serial link) errors.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Not found errors.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Serialization/deserialization errors.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Parse errors with location context.
    #[error("Parse error at {location}: {message}")]
    Parse { location: String, message: String },

    /// Generic internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for convenience.
pub type Result<T> = std::result::Result<T, Error>;

#[macro_export]
macro_rules! config_err {
    ($msg:expr) => {
        $crate::error::Error::Config($msg.into())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::Error::Config(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! device_err {
    ($msg:expr) => {
        $crate::error::Error::Device($msg.into())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::Error::Device(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! transport_err {
    ($msg:expr) => {
        $crate::error::Error::Transport($msg.into())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::Error::Transport(format!($fmt, $($arg)*))
    };
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn device(msg: impl Into<String>) -> Self {
        Self::Device(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_macros() {
        let err = config_err!("missing model");
        assert!(matches!(err, Error::Config(ref m) if m == "missing model"));

        let err = device_err!("unit {} has no status", "boiler");
        assert_eq!(err.to_string(), "Device error: unit boiler has no status");

        let err = transport_err!("serial closed");
        assert!(matches!(err, Error::Transport(_)));
    }

    #[test]
    fn test_from_serde_json() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: Error = parse.unwrap_err().into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
