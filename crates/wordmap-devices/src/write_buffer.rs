//! Words staged by commands, waiting to be written to the device.

use std::collections::BTreeMap;

/// Contiguous words written in one transport call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordRun {
    pub offset: usize,
    pub values: Vec<i64>,
}

impl WordRun {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingWrites {
    words: BTreeMap<usize, i64>,
}

impl PendingWrites {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a full-word value, replacing any earlier one at `index`.
    pub fn stage(&mut self, index: usize, value: i64) {
        self.words.insert(index, value);
    }

    pub fn staged(&self, index: usize) -> Option<i64> {
        self.words.get(&index).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Remove and return the lowest run of consecutive staged indices.
    pub fn take_run(&mut self) -> Option<WordRun> {
        let (&offset, _) = self.words.first_key_value()?;
        let mut values = Vec::new();
        let mut next = Some(offset);
        while let Some(value) = next.and_then(|index| self.words.remove(&index)) {
            values.push(value);
            next = offset.checked_add(values.len());
        }
        Some(WordRun { offset, values })
    }

    /// Drain every run in index order.
    pub fn drain_runs(&mut self) -> Vec<WordRun> {
        std::iter::from_fn(|| self.take_run()).collect()
    }

    pub fn clear(&mut self) {
        self.words.clear();
    }
}
