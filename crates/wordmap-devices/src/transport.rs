//! Seams to the word device and to the message bus.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use wordmap_core::{BridgeEvent, EventBus, EventMetadata, StatusEvent, StatusKind};

use crate::error::{DeviceError, DeviceResult};
use crate::words::{Word, WordArray};

/// Word-addressed device link.
#[async_trait]
pub trait WordTransport: Send + Sync {
    /// Read `count` words starting at `offset`.
    async fn read_words(&self, offset: usize, count: usize) -> DeviceResult<WordArray>;

    async fn write_word(&self, value: i64, index: usize) -> DeviceResult<()>;

    /// Write consecutive words starting at `offset`.
    async fn write_words(&self, values: &[i64], offset: usize) -> DeviceResult<()>;
}

/// Outbound side of the message bus.
#[async_trait]
pub trait StatusPublisher: Send + Sync {
    async fn publish_status(&self, event: StatusEvent) -> DeviceResult<()>;

    async fn publish_trigger(&self, event: StatusEvent) -> DeviceResult<()>;

    /// Publish an event of one batch. `transaction_id` identifies the batch
    /// when the processor minted one.
    async fn publish_event(
        &self,
        kind: StatusKind,
        event: StatusEvent,
        _transaction_id: Option<u64>,
    ) -> DeviceResult<()> {
        match kind {
            StatusKind::Status => self.publish_status(event).await,
            StatusKind::Trigger => self.publish_trigger(event).await,
        }
    }
}

#[async_trait]
impl StatusPublisher for EventBus {
    async fn publish_status(&self, event: StatusEvent) -> DeviceResult<()> {
        if !self.publish(BridgeEvent::Status(event)).await {
            debug!("No subscriber for status event");
        }
        Ok(())
    }

    async fn publish_trigger(&self, event: StatusEvent) -> DeviceResult<()> {
        if !self.publish(BridgeEvent::Trigger(event)).await {
            debug!("No subscriber for trigger event");
        }
        Ok(())
    }

    async fn publish_event(
        &self,
        kind: StatusKind,
        event: StatusEvent,
        transaction_id: Option<u64>,
    ) -> DeviceResult<()> {
        let mut metadata = EventMetadata::new(self.source());
        if let Some(id) = transaction_id {
            metadata = metadata.with_transaction_id(id);
        }
        if !self
            .publish_with_metadata(BridgeEvent::from_status(kind, event), metadata)
            .await
        {
            debug!("No subscriber for {} event", kind);
        }
        Ok(())
    }
}

/// In-memory word device.
///
/// Clones share the same words, so a test can keep a handle while the bridge
/// owns another.
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    words: Arc<RwLock<Vec<i64>>>,
    writes: Arc<RwLock<Vec<(usize, Vec<i64>)>>>,
    fail_reads: Arc<AtomicBool>,
    /// Write calls left before writes start failing.
    write_budget: Arc<AtomicUsize>,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl MemoryTransport {
    pub fn new(words: Vec<i64>) -> Self {
        Self {
            words: Arc::new(RwLock::new(words)),
            writes: Arc::default(),
            fail_reads: Arc::default(),
            write_budget: Arc::new(AtomicUsize::new(usize::MAX)),
        }
    }

    pub fn with_len(len: usize) -> Self {
        Self::new(vec![0; len])
    }

    /// Change a word as the device itself would.
    pub async fn set_word(&self, index: usize, value: i64) {
        let mut words = self.words.write().await;
        if index >= words.len() {
            words.resize(index + 1, 0);
        }
        words[index] = value;
    }

    pub async fn words(&self) -> Vec<i64> {
        self.words.read().await.clone()
    }

    /// Every write call as `(offset, values)`, oldest first.
    pub async fn writes(&self) -> Vec<(usize, Vec<i64>)> {
        self.writes.read().await.clone()
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::Relaxed);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        let budget = if fail { 0 } else { usize::MAX };
        self.write_budget.store(budget, Ordering::Relaxed);
    }

    /// Let `count` more write calls succeed, then fail every later one.
    pub fn fail_writes_after(&self, count: usize) {
        self.write_budget.store(count, Ordering::Relaxed);
    }

    fn take_write_budget(&self) -> DeviceResult<()> {
        self.write_budget
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |budget| match budget {
                0 => None,
                usize::MAX => Some(usize::MAX),
                n => Some(n - 1),
            })
            .map(|_| ())
            .map_err(|_| DeviceError::transport("write failed"))
    }

    async fn store(&self, offset: usize, values: &[i64]) -> DeviceResult<()> {
        self.take_write_budget()?;
        {
            let mut words = self.words.write().await;
            let end = offset
                .checked_add(values.len())
                .filter(|end| *end <= words.len())
                .ok_or_else(|| {
                    DeviceError::transport(format!("address {} out of range", offset))
                })?;
            words[offset..end].copy_from_slice(values);
        }
        self.writes.write().await.push((offset, values.to_vec()));
        Ok(())
    }
}

#[async_trait]
impl WordTransport for MemoryTransport {
    async fn read_words(&self, offset: usize, count: usize) -> DeviceResult<WordArray> {
        if self.fail_reads.load(Ordering::Relaxed) {
            return Err(DeviceError::transport("read failed"));
        }
        let words = self.words.read().await;
        Ok((offset..offset + count)
            .map(|index| -> Word { words.get(index).copied() })
            .collect())
    }

    async fn write_word(&self, value: i64, index: usize) -> DeviceResult<()> {
        self.store(index, &[value]).await
    }

    async fn write_words(&self, values: &[i64], offset: usize) -> DeviceResult<()> {
        self.store(offset, values).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_transport_reads_past_end_as_unset() {
        let transport = MemoryTransport::new(vec![1, 2]);
        let words = transport.read_words(1, 3).await.unwrap();
        assert_eq!(words, vec![Some(2), None, None]);
    }

    #[tokio::test]
    async fn test_memory_transport_records_writes() {
        let transport = MemoryTransport::with_len(4);
        transport.write_words(&[5, 6], 1).await.unwrap();
        transport.write_word(9, 3).await.unwrap();

        assert_eq!(transport.words().await, vec![0, 5, 6, 9]);
        assert_eq!(transport.writes().await, vec![(1, vec![5, 6]), (3, vec![9])]);
    }

    #[tokio::test]
    async fn test_read_failure() {
        let transport = MemoryTransport::with_len(2);
        transport.set_fail_reads(true);
        assert!(matches!(
            transport.read_words(0, 2).await,
            Err(DeviceError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_write_failures() {
        let transport = MemoryTransport::with_len(4);
        transport.fail_writes_after(1);
        transport.write_word(1, 0).await.unwrap();
        assert!(transport.write_word(2, 1).await.is_err());

        transport.set_fail_writes(false);
        transport.write_word(3, 2).await.unwrap();
        assert!(transport.write_words(&[1, 2], 3).await.is_err());
        assert!(transport.write_word(1, usize::MAX).await.is_err());
        assert_eq!(transport.words().await, vec![1, 0, 3, 0]);
    }

    #[tokio::test]
    async fn test_event_bus_publisher() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.publish_trigger(StatusEvent::new("pump", "status", 1))
            .await
            .unwrap();

        let (event, _) = rx.recv().await.unwrap();
        assert_eq!(event.kind(), StatusKind::Trigger);
        assert_eq!(event.device(), "pump");
    }

    #[tokio::test]
    async fn test_event_bus_stamps_transaction_id() {
        let bus = EventBus::with_source("wordmap.garage");
        let mut rx = bus.subscribe();
        bus.publish_event(StatusKind::Status, StatusEvent::new("pump", "status", 0), Some(42))
            .await
            .unwrap();

        let (event, metadata) = rx.recv().await.unwrap();
        assert_eq!(event.kind(), StatusKind::Status);
        assert_eq!(metadata.source, "wordmap.garage");
        assert_eq!(metadata.transaction_id, Some(42));
    }
}
