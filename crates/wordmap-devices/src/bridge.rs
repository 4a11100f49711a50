//! The word bridge: polls the device, publishes statuses and applies
//! commands.
//!
//! All methods take `&mut self`, so one poll sequence (flush, read, dispatch,
//! publish) never overlaps another. Share the bridge between the poll timer
//! and the bus receiver behind a `tokio::sync::Mutex`.

use std::time::Duration;

use tracing::{debug, info, warn};
use wordmap_core::BridgeConfig;

use crate::error::DeviceResult;
use crate::message::InboundMessage;
use crate::model::ModelConfig;
use crate::processor::{ModelProcessor, WordProcessor};
use crate::raw::RawWordProcessor;
use crate::transport::{StatusPublisher, WordTransport};
use crate::words::{WordArray, WordSnapshot};
use crate::write_buffer::PendingWrites;

/// Counters for one poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    /// Words written before the read.
    pub written: usize,
    pub changes: usize,
    pub published: usize,
    /// Events the publisher rejected.
    pub publish_failures: usize,
}

pub struct WordBridge<T: WordTransport, P: StatusPublisher> {
    config: BridgeConfig,
    transport: T,
    publisher: P,
    processor: Box<dyn WordProcessor>,
    pending: PendingWrites,
    previous: Option<WordArray>,
}

impl<T: WordTransport, P: StatusPublisher> WordBridge<T, P> {
    pub fn new(
        config: BridgeConfig,
        transport: T,
        publisher: P,
        processor: Box<dyn WordProcessor>,
    ) -> Self {
        Self {
            config,
            transport,
            publisher,
            processor,
            pending: PendingWrites::new(),
            previous: None,
        }
    }

    /// Build the processor from the configured model, or pass raw words
    /// through when there is none.
    pub fn from_config(config: BridgeConfig, transport: T, publisher: P) -> DeviceResult<Self> {
        let processor: Box<dyn WordProcessor> = match &config.model {
            Some(path) => {
                info!("Loading model {}", path.display());
                let model = ModelConfig::from_path(path)?;
                Box::new(ModelProcessor::from_model(&model)?)
            }
            None => {
                info!("No model configured, publishing raw words");
                Box::new(RawWordProcessor::new())
            }
        };
        Ok(Self::new(config, transport, publisher, processor))
    }

    pub fn with_model(
        config: BridgeConfig,
        transport: T,
        publisher: P,
        model: &ModelConfig,
    ) -> DeviceResult<Self> {
        let processor = ModelProcessor::from_model(model)?;
        Ok(Self::new(config, transport, publisher, Box::new(processor)))
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Delay the caller's poll timer should wait between [`poll_once`](Self::poll_once) calls.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.config.poll_interval_ms)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn pending(&self) -> &PendingWrites {
        &self.pending
    }

    /// Last snapshot that was read successfully.
    pub fn previous(&self) -> Option<&[crate::words::Word]> {
        self.previous.as_deref()
    }

    /// Write every staged run, lowest index first.
    ///
    /// A failed run is staged again so the next poll retries it.
    pub async fn flush(&mut self) -> DeviceResult<usize> {
        let mut written = 0;
        while let Some(run) = self.pending.take_run() {
            let result = if run.len() == 1 {
                self.transport.write_word(run.values[0], run.offset).await
            } else {
                self.transport.write_words(&run.values, run.offset).await
            };
            if let Err(e) = result {
                warn!("Write of {} words at {} failed: {}", run.len(), run.offset, e);
                for (i, value) in run.values.iter().enumerate() {
                    self.pending.stage(run.offset + i, *value);
                }
                return Err(e);
            }
            debug!("Wrote {} words at {}", run.len(), run.offset);
            written += run.len();
        }
        Ok(written)
    }

    /// One poll: flush writes, read, dispatch and publish.
    ///
    /// A failed write or read is returned and the previous snapshot is kept.
    pub async fn poll_once(&mut self) -> DeviceResult<PollReport> {
        let written = self.flush().await?;
        let words = self.transport.read_words(0, self.config.word_count).await?;

        let snapshot = WordSnapshot::new(self.previous.as_deref(), words);
        let mut report = PollReport {
            written,
            changes: snapshot.changes.len(),
            ..Default::default()
        };

        let events = self.processor.on_words(&snapshot);
        let transaction_id = self.processor.last_transaction_id();
        for (kind, event) in events {
            match self.publisher.publish_event(kind, event, transaction_id).await {
                Ok(()) => report.published += 1,
                Err(e) => {
                    warn!("Failed to publish {}: {}", kind, e);
                    report.publish_failures += 1;
                }
            }
        }

        self.previous = Some(snapshot.words);
        Ok(report)
    }

    /// Route an inbound message. Unknown devices or commands are logged and
    /// dropped.
    pub fn handle_message(&mut self, message: &InboundMessage) -> DeviceResult<()> {
        match self.processor.on_message(message, &mut self.pending) {
            Err(e) if e.is_ignorable() => {
                warn!("Ignoring message {}: {}", message.body_name, e);
                Ok(())
            }
            other => other,
        }
    }

    pub fn handle_json(&mut self, json: &str) -> DeviceResult<()> {
        let message = InboundMessage::from_json(json)?;
        self.handle_message(&message)
    }

    /// Publish every status on the next poll.
    pub fn request_full_state(&mut self, filter: Option<&str>) {
        self.processor.request_full_state(filter);
    }
}
