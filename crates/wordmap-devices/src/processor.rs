//! Word processors turn snapshots into status events and messages into
//! staged writes.

use tracing::{debug, info};
use wordmap_core::{StatusEvent, StatusKind};

use crate::dispatcher::{DispatchOutcome, Dispatcher};
use crate::error::{DeviceError, DeviceResult};
use crate::message::{InboundMessage, Request};
use crate::model::ModelConfig;
use crate::registry::UnitRegistry;
use crate::resolver::{resolve, Resolution};
use crate::words::WordSnapshot;
use crate::write_buffer::PendingWrites;

pub trait WordProcessor: Send {
    /// Events produced by one snapshot, in publish order.
    fn on_words(&mut self, snapshot: &WordSnapshot) -> Vec<(StatusKind, StatusEvent)>;

    /// Stage the writes requested by an inbound message.
    fn on_message(&mut self, message: &InboundMessage, pending: &mut PendingWrites) -> DeviceResult<()>;

    /// Publish every status of the matching devices on the next snapshot.
    fn request_full_state(&mut self, filter: Option<&str>);

    /// Transaction id of the last snapshot passed to [`on_words`](Self::on_words).
    fn last_transaction_id(&self) -> Option<u64> {
        None
    }
}

/// Processor driven by a unit model.
#[derive(Debug)]
pub struct ModelProcessor {
    registry: UnitRegistry,
    dispatcher: Dispatcher,
    /// One-shot full-state requests awaiting the next snapshot.
    requests: Vec<Option<String>>,
    last_transaction_id: Option<u64>,
}

impl ModelProcessor {
    pub fn new(registry: UnitRegistry) -> Self {
        Self {
            registry,
            dispatcher: Dispatcher::new(),
            requests: Vec::new(),
            last_transaction_id: None,
        }
    }

    pub fn from_model(model: &ModelConfig) -> DeviceResult<Self> {
        let registry = UnitRegistry::compile(model)?;
        info!(
            "Loaded {} units, {} status expressions",
            registry.units().len(),
            registry.tree_count()
        );
        Ok(Self::new(registry))
    }

    pub fn registry(&self) -> &UnitRegistry {
        &self.registry
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn has_pending_requests(&self) -> bool {
        !self.requests.is_empty()
    }

    /// Run change dispatch alone, without the pending full-state requests.
    pub fn dispatch(&mut self, snapshot: &WordSnapshot) -> DispatchOutcome {
        self.dispatcher.dispatch(&self.registry, snapshot)
    }

    /// Resolve a command for `device`.
    pub fn execute(
        &self,
        device: &str,
        command: &str,
        current: Option<&str>,
        pending: &mut PendingWrites,
    ) -> DeviceResult<Resolution> {
        let unit = self
            .registry
            .unit_by_device(device)
            .ok_or_else(|| DeviceError::UnknownDevice(device.to_string()))?;
        resolve(unit, command, current, pending)
    }
}

impl WordProcessor for ModelProcessor {
    fn on_words(&mut self, snapshot: &WordSnapshot) -> Vec<(StatusKind, StatusEvent)> {
        let outcome = self.dispatch(snapshot);
        self.last_transaction_id = Some(outcome.transaction_id);
        debug!(
            transaction_id = outcome.transaction_id,
            evaluations = outcome.evaluations,
            failures = outcome.failures,
            "Dispatched {} changes",
            snapshot.changes.len()
        );
        let mut events = outcome.events;

        for filter in std::mem::take(&mut self.requests) {
            let full = self
                .dispatcher
                .full_state(&self.registry, &snapshot.context, filter.as_deref());
            events.extend(full.into_iter().map(|event| (StatusKind::Status, event)));
        }
        events
    }

    fn on_message(&mut self, message: &InboundMessage, pending: &mut PendingWrites) -> DeviceResult<()> {
        match message.request()? {
            Request::Status { device } => {
                self.request_full_state(device.as_deref());
                Ok(())
            }
            Request::Command {
                device,
                command,
                current,
            } => {
                let resolution = self.execute(&device, &command, current.as_deref(), pending)?;
                debug!(
                    "Command {}/{} staged {} writes",
                    device,
                    command,
                    resolution.mutations.len()
                );
                Ok(())
            }
        }
    }

    fn request_full_state(&mut self, filter: Option<&str>) {
        info!("Status requested for {}", filter.unwrap_or("*"));
        self.requests.push(filter.map(str::to_string));
    }

    fn last_transaction_id(&self) -> Option<u64> {
        self.last_transaction_id
    }
}
