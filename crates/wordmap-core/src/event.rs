//! Events published by the bridge.
//!
//! A computed device status leaves the engine either as an initial/full
//! `Status` publish or as an incremental `Trigger` publish.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which flavour of publish a status event is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    /// Initial or requested full-state publish.
    Status,
    /// Incremental change notification.
    Trigger,
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusKind::Status => write!(f, "status"),
            StatusKind::Trigger => write!(f, "trigger"),
        }
    }
}

/// One device status value, as sent to the message bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEvent {
    /// Device identifier of the unit.
    pub device: String,
    /// Status name within the unit.
    #[serde(rename = "type")]
    pub status_type: String,
    /// Scaled value.
    pub current: serde_json::Value,
    /// Unit of measurement, when the unit declares one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
}

impl StatusEvent {
    pub fn new(
        device: impl Into<String>,
        status_type: impl Into<String>,
        current: impl Into<serde_json::Value>,
    ) -> Self {
        Self {
            device: device.into(),
            status_type: status_type.into(),
            current: current.into(),
            units: None,
        }
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }
}

/// Event flowing through the [`EventBus`](crate::eventbus::EventBus).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body", rename_all = "lowercase")]
pub enum BridgeEvent {
    Status(StatusEvent),
    Trigger(StatusEvent),
}

impl BridgeEvent {
    /// Wrap a status event according to its publish kind.
    pub fn from_status(kind: StatusKind, event: StatusEvent) -> Self {
        match kind {
            StatusKind::Status => BridgeEvent::Status(event),
            StatusKind::Trigger => BridgeEvent::Trigger(event),
        }
    }

    pub fn kind(&self) -> StatusKind {
        match self {
            BridgeEvent::Status(_) => StatusKind::Status,
            BridgeEvent::Trigger(_) => StatusKind::Trigger,
        }
    }

    pub fn status(&self) -> &StatusEvent {
        match self {
            BridgeEvent::Status(event) | BridgeEvent::Trigger(event) => event,
        }
    }

    pub fn device(&self) -> &str {
        &self.status().device
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            BridgeEvent::Status(_) => "Status",
            BridgeEvent::Trigger(_) => "Trigger",
        }
    }
}

/// Metadata attached to every published event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Unique event ID
    pub event_id: String,
    /// Event source (bridge source name)
    pub source: String,
    /// Event timestamp
    pub timestamp: i64,
    /// Dispatch batch that produced the event, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<u64>,
}

impl EventMetadata {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            source: source.into(),
            timestamp: chrono::Utc::now().timestamp(),
            transaction_id: None,
        }
    }

    pub fn with_transaction_id(mut self, id: u64) -> Self {
        self.transaction_id = Some(id);
        self
    }
}
