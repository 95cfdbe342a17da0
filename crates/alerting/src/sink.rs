//! Alert sinks

use crate::{AlertError, AlertRecord};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Destination for alert records (a REST endpoint, a UI channel, a log)
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn deliver(&self, record: &AlertRecord) -> Result<(), AlertError>;
}

/// Writes alerts to the tracing log as JSON
#[derive(Debug, Default, Clone)]
pub struct LogSink;

#[async_trait]
impl AlertSink for LogSink {
    async fn deliver(&self, record: &AlertRecord) -> Result<(), AlertError> {
        let payload = serde_json::to_string(record)?;
        if record.alert_type.is_alarm() {
            warn!(alert = %record.alert_type, "{}", payload);
        } else {
            info!(alert = %record.alert_type, "{}", payload);
        }
        Ok(())
    }
}

/// Keeps every delivered alert in memory
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<AlertRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything delivered so far
    pub fn records(&self) -> Vec<AlertRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AlertSink for MemorySink {
    async fn deliver(&self, record: &AlertRecord) -> Result<(), AlertError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(())
    }
}

/// Forwards alerts to a channel, e.g. a UI task
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<AlertRecord>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<AlertRecord>) -> Self {
        Self { tx }
    }

    /// Sink plus the receiving end
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<AlertRecord>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl AlertSink for ChannelSink {
    async fn deliver(&self, record: &AlertRecord) -> Result<(), AlertError> {
        self.tx
            .send(record.clone())
            .await
            .map_err(|_| AlertError::Closed)
    }
}
