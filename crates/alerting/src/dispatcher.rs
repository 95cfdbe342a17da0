//! Fire-and-forget alert delivery

use crate::{AlertRecord, AlertSink};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Dispatcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Alerts buffered ahead of the sink before new ones are dropped
    pub queue_capacity: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self { queue_capacity: 64 }
    }
}

#[derive(Debug, Default)]
struct DeliveryStats {
    delivered: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

/// Queues alerts for a background worker that hands them to the sink.
///
/// `dispatch` never waits: a full queue drops the alert and a sink
/// error is logged. Neither affects the caller.
pub struct AlertDispatcher {
    tx: mpsc::Sender<AlertRecord>,
    worker: JoinHandle<()>,
    stats: Arc<DeliveryStats>,
}

impl AlertDispatcher {
    /// Start the delivery worker. Must be called inside a tokio runtime.
    pub fn spawn(sink: Arc<dyn AlertSink>, config: DispatcherConfig) -> Self {
        let (tx, mut rx) = mpsc::channel::<AlertRecord>(config.queue_capacity.max(1));
        let stats = Arc::new(DeliveryStats::default());
        let worker_stats = Arc::clone(&stats);

        let worker = tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                match sink.deliver(&record).await {
                    Ok(()) => {
                        worker_stats.delivered.fetch_add(1, Ordering::Relaxed);
                        debug!("Delivered {} alert for {}", record.alert_type, record.driver_id);
                    }
                    Err(e) => {
                        worker_stats.failed.fetch_add(1, Ordering::Relaxed);
                        warn!("Alert delivery failed ({}): {}", record.alert_type, e);
                    }
                }
            }
            debug!("Alert dispatcher drained");
        });

        info!("Alert dispatcher started (queue {})", config.queue_capacity);
        Self { tx, worker, stats }
    }

    /// Queue an alert. Returns false if it had to be dropped.
    pub fn dispatch(&self, record: AlertRecord) -> bool {
        match self.tx.try_send(record) {
            Ok(()) => true,
            Err(e) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("Alert dropped before delivery: {}", e);
                false
            }
        }
    }

    /// Alerts the sink accepted
    pub fn delivered(&self) -> u64 {
        self.stats.delivered.load(Ordering::Relaxed)
    }

    /// Alerts the sink rejected
    pub fn failed(&self) -> u64 {
        self.stats.failed.load(Ordering::Relaxed)
    }

    /// Alerts that never reached the sink
    pub fn dropped(&self) -> u64 {
        self.stats.dropped.load(Ordering::Relaxed)
    }

    /// Stop accepting alerts and wait for the queue to drain
    pub async fn close(self) {
        let Self { tx, worker, .. } = self;
        drop(tx);
        if let Err(e) = worker.await {
            warn!("Alert dispatcher worker ended abnormally: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AlertError, AlertKind, MemorySink};
    use async_trait::async_trait;
    use dms::DriverState;
    use std::time::Duration;

    struct FailingSink;

    #[async_trait]
    impl AlertSink for FailingSink {
        async fn deliver(&self, _record: &AlertRecord) -> Result<(), AlertError> {
            Err(AlertError::Delivery("503 from alert endpoint".into()))
        }
    }

    fn record(kind: AlertKind) -> AlertRecord {
        AlertRecord::new("d1", kind, DriverState::Active, Duration::from_secs(3), 1)
    }

    #[tokio::test]
    async fn test_delivers_in_order() {
        let sink = MemorySink::new();
        let dispatcher = AlertDispatcher::spawn(Arc::new(sink.clone()), DispatcherConfig::default());
        assert!(dispatcher.dispatch(record(AlertKind::Warning)));
        assert!(dispatcher.dispatch(record(AlertKind::Alarm)));
        dispatcher.close().await;

        let kinds: Vec<_> = sink.records().iter().map(|r| r.alert_type).collect();
        assert_eq!(kinds, vec![AlertKind::Warning, AlertKind::Alarm]);
    }

    #[tokio::test]
    async fn test_sink_failures_are_absorbed() {
        let dispatcher = AlertDispatcher::spawn(Arc::new(FailingSink), DispatcherConfig::default());
        assert!(dispatcher.dispatch(record(AlertKind::Warning)));
        assert!(dispatcher.dispatch(record(AlertKind::Tension)));
        tokio::task::yield_now().await;
        let stats = Arc::clone(&dispatcher.stats);
        dispatcher.close().await;
        assert_eq!(stats.failed.load(Ordering::Relaxed), 2);
        assert_eq!(stats.delivered.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_full_queue_drops() {
        // Current-thread runtime: the worker cannot run until we yield
        let sink = MemorySink::new();
        let dispatcher = AlertDispatcher::spawn(
            Arc::new(sink.clone()),
            DispatcherConfig { queue_capacity: 1 },
        );
        assert!(dispatcher.dispatch(record(AlertKind::Tension)));
        assert!(!dispatcher.dispatch(record(AlertKind::Tension)));
        assert_eq!(dispatcher.dropped(), 1);
        dispatcher.close().await;
        assert_eq!(sink.len(), 1);
    }
}
