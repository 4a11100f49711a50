//! Word snapshots and the diff engine.
//!
//! Word `i` of a snapshot is exposed to expressions as identifier `W<i>`
//! (zero-based).

use std::collections::HashMap;

use wordmap_expr::Value;

/// One polled word; `None` means the slot is unset.
pub type Word = Option<i64>;

/// Ordered words as read from the device, index = address.
pub type WordArray = Vec<Word>;

/// Evaluation context built from a snapshot.
pub type WordContext = HashMap<String, Value>;

/// A word that differs from the previous snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEntry {
    pub index: usize,
    pub value: Word,
    /// `false` when there was no previous value to compare against.
    pub is_update: bool,
}

/// Compare two successive snapshots.
///
/// Without a previous snapshot every index is reported as an initial
/// observation. Otherwise only indices below the shorter length are compared.
pub fn diff(previous: Option<&[Word]>, current: &[Word]) -> Vec<ChangeEntry> {
    let Some(previous) = previous else {
        return current
            .iter()
            .enumerate()
            .map(|(index, value)| ChangeEntry {
                index,
                value: *value,
                is_update: false,
            })
            .collect();
    };

    previous
        .iter()
        .zip(current.iter())
        .enumerate()
        .filter(|(_, (before, after))| before != after)
        .map(|(index, (before, after))| ChangeEntry {
            index,
            value: *after,
            is_update: before.is_some(),
        })
        .collect()
}

/// Identifier of word `index`.
pub fn word_identifier(index: usize) -> String {
    format!("W{}", index)
}

/// Parse a `W<index>` identifier.
pub fn word_index(name: &str) -> Option<usize> {
    let digits = name.strip_prefix('W')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Context mapping every set word of the snapshot to its identifier.
pub fn word_context(words: &[Word]) -> WordContext {
    words
        .iter()
        .enumerate()
        .filter_map(|(index, word)| {
            word.map(|value| (word_identifier(index), Value::Number(value as f64)))
        })
        .collect()
}

/// A snapshot ready for dispatch.
#[derive(Debug, Clone)]
pub struct WordSnapshot {
    pub words: WordArray,
    pub changes: Vec<ChangeEntry>,
    /// First snapshot since start-up.
    pub initial: bool,
    pub context: WordContext,
}

impl WordSnapshot {
    /// Diff `words` against `previous` and build the context.
    pub fn new(previous: Option<&[Word]>, words: WordArray) -> Self {
        let changes = diff(previous, &words);
        let context = word_context(&words);
        Self {
            initial: previous.is_none(),
            words,
            changes,
            context,
        }
    }
}
