//! Core types for WordMap.
//!
//! Foundational pieces shared by the expression and device crates: the
//! unified error type, configuration, logging setup, status events and the
//! broadcast event bus.

pub mod config;
pub mod error;
pub mod event;
pub mod eventbus;
pub mod logging;

pub use config::BridgeConfig;
pub use error::{Error, Result};
pub use event::{BridgeEvent, EventMetadata, StatusEvent, StatusKind};
pub use eventbus::{EventBus, EventBusReceiver, FilteredReceiver, SharedEventBus};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-exports commonly used types.
pub mod prelude {
    pub use crate::config::{defaults, env_vars, BridgeConfig};
    pub use crate::error::{Error, Result};
    pub use crate::event::{BridgeEvent, EventMetadata, StatusEvent, StatusKind};
    pub use crate::eventbus::{EventBus, SharedEventBus};
}
