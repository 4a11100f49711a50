//! Change dispatch from word snapshots to status events.
//!
//! Each snapshot opens a batch with a fresh transaction id. Changed words are
//! routed through the dependency index; a status whose stamp already carries
//! the batch id is skipped, so a status reading several changed words is
//! evaluated once per batch.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};
use wordmap_core::{StatusEvent, StatusKind};
use wordmap_expr::{evaluate, Value};

use crate::registry::{Listener, TreeId, Unit, UnitRegistry};
use crate::words::{word_identifier, WordContext, WordSnapshot};

static NEXT_TRANSACTION_ID: AtomicU64 = AtomicU64::new(1);

/// Mint a process-wide, monotonically increasing transaction id.
pub fn next_transaction_id() -> u64 {
    NEXT_TRANSACTION_ID.fetch_add(1, Ordering::Relaxed)
}

/// Device filter matching every unit.
pub const ALL_DEVICES: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchState {
    #[default]
    Idle,
    BatchOpen { transaction_id: u64 },
    BatchClosed { transaction_id: u64 },
}

impl BatchState {
    pub fn transaction_id(&self) -> Option<u64> {
        match self {
            BatchState::Idle => None,
            BatchState::BatchOpen { transaction_id } | BatchState::BatchClosed { transaction_id } => {
                Some(*transaction_id)
            }
        }
    }
}

/// Result of dispatching one snapshot.
#[derive(Debug, Clone, Default)]
pub struct DispatchOutcome {
    pub transaction_id: u64,
    pub events: Vec<(StatusKind, StatusEvent)>,
    /// Status expressions evaluated in this batch.
    pub evaluations: usize,
    /// Status expressions that failed to evaluate.
    pub failures: usize,
}

/// Owns the per-status dedup cache and transaction stamps.
#[derive(Debug, Default)]
pub struct Dispatcher {
    state: BatchState,
    stamps: HashMap<TreeId, u64>,
    last_values: HashMap<TreeId, Value>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    /// Cached pre-scaling value of a status.
    pub fn last_value(&self, tree: TreeId) -> Option<&Value> {
        self.last_values.get(&tree)
    }

    /// Run every status affected by the snapshot's changes.
    pub fn dispatch(&mut self, registry: &UnitRegistry, snapshot: &WordSnapshot) -> DispatchOutcome {
        let transaction_id = next_transaction_id();
        self.state = BatchState::BatchOpen { transaction_id };

        let kind = if snapshot.initial {
            StatusKind::Status
        } else {
            StatusKind::Trigger
        };
        let mut outcome = DispatchOutcome {
            transaction_id,
            ..Default::default()
        };

        for change in &snapshot.changes {
            let identifier = word_identifier(change.index);
            debug!("Word {} changed to {:?}", identifier, change.value);
            for listener in registry.index().listeners(&identifier) {
                self.run_listener(registry, listener, &snapshot.context, transaction_id, kind, &mut outcome);
            }
        }

        self.state = BatchState::BatchClosed { transaction_id };
        outcome
    }

    fn run_listener(
        &mut self,
        registry: &UnitRegistry,
        listener: &Listener,
        context: &WordContext,
        transaction_id: u64,
        kind: StatusKind,
        outcome: &mut DispatchOutcome,
    ) {
        if self.stamps.get(&listener.tree) == Some(&transaction_id) {
            return;
        }
        self.stamps.insert(listener.tree, transaction_id);

        let Some(unit) = registry.unit(listener.unit) else {
            return;
        };
        let Some(status) = unit.statuses.get(listener.status) else {
            return;
        };

        outcome.evaluations += 1;
        let value = match evaluate(&status.expr.tree, context) {
            Ok(value) => value,
            Err(e) => {
                warn!(
                    "Status {}/{} failed: '{}': {}",
                    unit.device, status.name, status.expr.source, e
                );
                outcome.failures += 1;
                return;
            }
        };
        debug!("Exp {} => {}", status.expr.source, value);

        let previous = self.last_values.get(&status.tree_id);
        let value = unit.accumulate_overflow(value, previous);
        if previous == Some(&value) {
            return;
        }
        self.last_values.insert(status.tree_id, value.clone());

        outcome
            .events
            .push((kind, status_event(unit, &status.name, value)));
    }

    /// Evaluate every status of the matching units against `context`.
    ///
    /// No dedup and no stamping; the cache is read for overflow accumulation
    /// but left untouched. `None` or `"*"` selects every unit.
    pub fn full_state(
        &self,
        registry: &UnitRegistry,
        context: &WordContext,
        filter: Option<&str>,
    ) -> Vec<StatusEvent> {
        let filter = filter.filter(|device| *device != ALL_DEVICES);
        let mut events = Vec::new();
        for unit in registry.units() {
            if filter.is_some_and(|device| device != unit.device) {
                continue;
            }
            for status in &unit.statuses {
                match evaluate(&status.expr.tree, context) {
                    Ok(value) => {
                        let value =
                            unit.accumulate_overflow(value, self.last_values.get(&status.tree_id));
                        events.push(status_event(unit, &status.name, value));
                    }
                    Err(e) => warn!(
                        "Status {}/{} failed: '{}': {}",
                        unit.device, status.name, status.expr.source, e
                    ),
                }
            }
        }
        events
    }
}

fn status_event(unit: &Unit, status: &str, value: Value) -> StatusEvent {
    let event = StatusEvent::new(unit.device.clone(), status, unit.scale(value));
    match &unit.units {
        Some(units) => event.with_units(units.clone()),
        None => event,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelConfig;
    use crate::words::Word;
    use serde_json::json;

    fn registry(model: serde_json::Value) -> UnitRegistry {
        UnitRegistry::compile(&ModelConfig::from_value(model).unwrap()).unwrap()
    }

    fn words(values: &[i64]) -> Vec<Word> {
        values.iter().map(|v| Some(*v)).collect()
    }

    #[test]
    fn test_transaction_ids_increase() {
        let a = next_transaction_id();
        let b = next_transaction_id();
        assert!(b > a);
    }

    #[test]
    fn test_first_snapshot_publishes_status() {
        let registry = registry(json!({
            "units": [{ "device": "boiler", "status": { "temp": "W0", "pump": "W1 # 2 ? 1 : 0" } }]
        }));
        let mut dispatcher = Dispatcher::new();
        let outcome = dispatcher.dispatch(&registry, &WordSnapshot::new(None, words(&[21, 4])));

        assert_eq!(outcome.events.len(), 2);
        assert!(outcome.events.iter().all(|(kind, _)| *kind == StatusKind::Status));
        assert_eq!(outcome.events[0].1.current, json!(21));
        assert_eq!(outcome.events[1].1.status_type, "pump");
        assert_eq!(outcome.events[1].1.current, json!(1));
        assert_eq!(
            dispatcher.state(),
            BatchState::BatchClosed {
                transaction_id: outcome.transaction_id
            }
        );
    }

    #[test]
    fn test_multi_word_status_evaluated_once_per_batch() {
        let registry = registry(json!({
            "units": [{ "device": "sum", "status": "W0 + W1" }]
        }));
        let mut dispatcher = Dispatcher::new();
        let first = words(&[1, 2]);
        dispatcher.dispatch(&registry, &WordSnapshot::new(None, first.clone()));

        let outcome = dispatcher.dispatch(&registry, &WordSnapshot::new(Some(first.as_slice()), words(&[5, 6])));
        assert_eq!(outcome.evaluations, 1);
        assert_eq!(outcome.events.len(), 1);
        assert_eq!(outcome.events[0].0, StatusKind::Trigger);
        assert_eq!(outcome.events[0].1.current, json!(11));
    }

    #[test]
    fn test_dedup_suppresses_unchanged_value() {
        let registry = registry(json!({
            "units": [{ "device": "flag", "status": "W0 # 0" }]
        }));
        let mut dispatcher = Dispatcher::new();
        let a = words(&[1]);
        let b = words(&[3]);
        let c = words(&[2]);
        dispatcher.dispatch(&registry, &WordSnapshot::new(None, a.clone()));

        // Bit 0 stays set: evaluated but not published.
        let outcome = dispatcher.dispatch(&registry, &WordSnapshot::new(Some(a.as_slice()), b.clone()));
        assert_eq!(outcome.evaluations, 1);
        assert!(outcome.events.is_empty());

        let outcome = dispatcher.dispatch(&registry, &WordSnapshot::new(Some(b.as_slice()), c));
        assert_eq!(outcome.events.len(), 1);
        assert_eq!(outcome.events[0].1.current, json!(0));
    }

    #[test]
    fn test_cache_holds_pre_scaling_value() {
        let registry = registry(json!({
            "units": [{ "device": "valve", "status": "W0", "0%": 0, "100%": 200, "units": "%" }]
        }));
        let mut dispatcher = Dispatcher::new();
        let outcome = dispatcher.dispatch(&registry, &WordSnapshot::new(None, words(&[100])));

        let event = &outcome.events[0].1;
        assert_eq!(event.current, json!(50));
        assert_eq!(event.units.as_deref(), Some("%"));
        assert_eq!(dispatcher.last_value(0), Some(&Value::Number(100.0)));
    }

    #[test]
    fn test_overflow_linearizes_counter() {
        let registry = registry(json!({
            "units": [{ "device": "counter", "status": "W0", "overflow": 16 }]
        }));
        let mut dispatcher = Dispatcher::new();
        let a = words(&[10]);
        dispatcher.dispatch(&registry, &WordSnapshot::new(None, a.clone()));
        let outcome = dispatcher.dispatch(&registry, &WordSnapshot::new(Some(a.as_slice()), words(&[2])));
        assert_eq!(outcome.events[0].1.current, json!(18));
    }

    #[test]
    fn test_failed_status_does_not_abort_batch() {
        let registry = registry(json!({
            "units": [
                { "device": "bad", "status": "W0 % 2" },
                { "device": "good", "status": "W0" }
            ]
        }));
        let mut dispatcher = Dispatcher::new();
        let outcome = dispatcher.dispatch(&registry, &WordSnapshot::new(None, words(&[7])));
        assert_eq!(outcome.failures, 1);
        assert_eq!(outcome.events.len(), 1);
        assert_eq!(outcome.events[0].1.device, "good");
    }

    #[test]
    fn test_full_state_ignores_dedup_and_keeps_cache() {
        let registry = registry(json!({
            "units": [
                { "device": "a", "status": "W0" },
                { "device": "b", "status": { "x": "W1", "y": "W1 * 2" } }
            ]
        }));
        let mut dispatcher = Dispatcher::new();
        let snapshot = WordSnapshot::new(None, words(&[3, 4]));
        dispatcher.dispatch(&registry, &snapshot);

        let events = dispatcher.full_state(&registry, &snapshot.context, None);
        assert_eq!(events.len(), 3);

        let events = dispatcher.full_state(&registry, &snapshot.context, Some("b"));
        assert_eq!(
            events.iter().map(|e| e.status_type.as_str()).collect::<Vec<_>>(),
            vec!["x", "y"]
        );
        assert_eq!(dispatcher.full_state(&registry, &snapshot.context, Some("*")).len(), 3);

        let changed = WordSnapshot::new(None, words(&[9, 4]));
        dispatcher.full_state(&registry, &changed.context, None);
        assert_eq!(dispatcher.last_value(0), Some(&Value::Number(3.0)));
    }
}
