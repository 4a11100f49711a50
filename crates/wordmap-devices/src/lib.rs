//! Word/status mapping for polled register devices.
//!
//! A device exposes a fixed array of numeric words. A unit model maps them to
//! named statuses through expressions, and maps inbound commands back to word
//! or bit writes:
//!
//! - [`words`]: snapshots and the diff engine
//! - [`model`]: the JSON unit model
//! - [`registry`]: compiled units and the word dependency index
//! - [`dispatcher`]: change dispatch with per-batch dedup
//! - [`resolver`]: command resolution in write mode
//! - [`bridge`]: the poll/publish/command actor

pub mod bridge;
pub mod dispatcher;
pub mod error;
pub mod message;
pub mod model;
pub mod processor;
pub mod raw;
pub mod registry;
pub mod resolver;
pub mod transport;
pub mod words;
pub mod write_buffer;

pub use bridge::{PollReport, WordBridge};
pub use dispatcher::{next_transaction_id, BatchState, DispatchOutcome, Dispatcher};
pub use error::{DeviceError, DeviceResult};
pub use message::{InboundMessage, MessageBody, Request};
pub use model::{CommandSpec, ModelConfig, StatusSpec, UnitConfig};
pub use processor::{ModelProcessor, WordProcessor};
pub use raw::{RawTarget, RawWordProcessor};
pub use registry::{DependencyIndex, Listener, Scaling, TreeId, Unit, UnitRegistry};
pub use resolver::{resolve, Resolution, WordMutation};
pub use transport::{MemoryTransport, StatusPublisher, WordTransport};
pub use words::{diff, ChangeEntry, Word, WordArray, WordSnapshot};
pub use write_buffer::{PendingWrites, WordRun};
