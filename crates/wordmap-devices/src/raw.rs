//! Passthrough processor used when no unit model is configured.
//!
//! Word `i` is published as device `W<i>`. Writes address `W<n>` for a full
//! word, or `WBIT<n>#<b>` for one bit: the bit is always set in the mask word
//! `n + 1`, and set in the value word `n` only when the value is on.

use tracing::debug;
use wordmap_core::{StatusEvent, StatusKind};
use wordmap_expr::Value;

use crate::dispatcher::next_transaction_id;
use crate::error::{DeviceError, DeviceResult};
use crate::message::InboundMessage;
use crate::model::DEFAULT_STATUS_NAME;
use crate::processor::WordProcessor;
use crate::words::{word_identifier, word_index, WordSnapshot};
use crate::write_buffer::PendingWrites;

/// Target of a raw write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawTarget {
    Word(usize),
    Bit { word: usize, bit: u32 },
}

impl RawTarget {
    pub fn parse(device: &str) -> Option<Self> {
        if let Some(rest) = device.strip_prefix("WBIT") {
            let (word, bit) = rest.split_once('#')?;
            let word = parse_digits(word)?;
            let bit = parse_digits(bit)?;
            // The mask lives in the following word.
            word.checked_add(1)?;
            return (bit < 32).then_some(RawTarget::Bit {
                word,
                bit: bit as u32,
            });
        }
        word_index(device).map(RawTarget::Word)
    }
}

fn parse_digits(s: &str) -> Option<usize> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Leading integer of `input` (`"12abc"` is 12).
fn leading_int(input: &str) -> Option<i64> {
    let s = input.trim_start();
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, s.strip_prefix('+').unwrap_or(s)),
    };
    let end = digits
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

fn is_on(input: Option<&str>) -> bool {
    match input {
        Some(value) => leading_int(value).is_some_and(|n| n > 0) || value == "true" || value == "on",
        None => false,
    }
}

#[derive(Debug, Default)]
pub struct RawWordProcessor {
    requests: Vec<Option<String>>,
    last_transaction_id: Option<u64>,
}

impl RawWordProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    fn word_event(index: usize, value: i64) -> StatusEvent {
        StatusEvent::new(word_identifier(index), DEFAULT_STATUS_NAME, Value::from(value))
    }
}

impl WordProcessor for RawWordProcessor {
    fn on_words(&mut self, snapshot: &WordSnapshot) -> Vec<(StatusKind, StatusEvent)> {
        self.last_transaction_id = Some(next_transaction_id());
        let kind = if snapshot.initial {
            StatusKind::Status
        } else {
            StatusKind::Trigger
        };
        let mut events: Vec<_> = snapshot
            .changes
            .iter()
            .filter_map(|change| change.value.map(|value| (kind, Self::word_event(change.index, value))))
            .collect();

        for filter in std::mem::take(&mut self.requests) {
            for (index, word) in snapshot.words.iter().enumerate() {
                let Some(value) = word else { continue };
                let identifier = word_identifier(index);
                if filter.as_deref().is_some_and(|device| device != "*" && device != identifier) {
                    continue;
                }
                events.push((StatusKind::Status, Self::word_event(index, *value)));
            }
        }
        events
    }

    fn on_message(&mut self, message: &InboundMessage, pending: &mut PendingWrites) -> DeviceResult<()> {
        if message.is_status_request() {
            self.request_full_state(message.body.device.as_deref());
            return Ok(());
        }
        let device = message
            .body
            .device
            .as_deref()
            .ok_or_else(|| DeviceError::InvalidMessage("missing device".to_string()))?;
        let target =
            RawTarget::parse(device).ok_or_else(|| DeviceError::UnknownDevice(device.to_string()))?;
        let value = message.value_text();

        match target {
            RawTarget::Word(index) => {
                let value = value.as_deref().and_then(leading_int).unwrap_or(0);
                debug!("Command receive device={} value={} => wordIndex={}", device, value, index);
                pending.stage(index, value);
            }
            RawTarget::Bit { word, bit } => {
                let mask = 1i64 << bit;
                let mask_word = word
                    .checked_add(1)
                    .ok_or_else(|| DeviceError::UnknownDevice(device.to_string()))?;
                pending.stage(mask_word, pending.staged(mask_word).unwrap_or(0) | mask);
                if is_on(value.as_deref()) {
                    pending.stage(word, pending.staged(word).unwrap_or(0) | mask);
                }
            }
        }
        Ok(())
    }

    fn request_full_state(&mut self, filter: Option<&str>) {
        self.requests.push(filter.map(str::to_string));
    }

    fn last_transaction_id(&self) -> Option<u64> {
        self.last_transaction_id
    }
}
