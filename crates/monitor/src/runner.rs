//! Scheduling loop and the handle used to stop it

use crate::controller::{DrowsinessMonitor, TickOutcome};
use crate::snapshot::MonitorSnapshot;
use crate::MonitorError;
use alarm::AlarmSynth;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

impl DrowsinessMonitor {
    /// Start the session and tick every `frame_period` until `shutdown`
    /// turns true (or its sender goes away), then stop.
    ///
    /// Iterations never overlap: a tick that overruns the period delays
    /// the next one instead of queueing a burst.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), MonitorError> {
        self.start().await?;

        let mut ticker = tokio::time::interval(self.options().frame_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut ticks: u64 = 0;

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        debug!("Shutdown sender dropped");
                        break;
                    }
                }
                instant = ticker.tick() => {
                    ticks += 1;
                    if let TickOutcome::Analyzed(report) = self.tick(instant).await {
                        if !report.alerts.is_empty() {
                            debug!("Tick {} raised {} alert(s)", ticks, report.alerts.len());
                        }
                    }
                }
            }
        }

        info!("Monitor loop exiting after {} ticks", ticks);
        self.stop();
        Ok(())
    }

    /// Move the monitor onto its own task
    pub fn spawn(mut self) -> MonitorHandle {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let snapshots = self.subscribe();
        let alarm = Arc::clone(self.alarm());

        let task = tokio::spawn(async move {
            let result = self.run(shutdown_rx).await;
            (self, result)
        });

        MonitorHandle {
            shutdown,
            snapshots,
            alarm,
            task,
        }
    }
}

/// Controls a spawned monitor
pub struct MonitorHandle {
    shutdown: watch::Sender<bool>,
    snapshots: watch::Receiver<MonitorSnapshot>,
    alarm: Arc<AlarmSynth>,
    task: JoinHandle<(DrowsinessMonitor, Result<(), MonitorError>)>,
}

impl MonitorHandle {
    /// Ask the loop to stop. Idempotent.
    pub fn stop(&self) {
        self.shutdown.send_replace(true);
    }

    /// Snapshot stream for the UI
    pub fn snapshots(&self) -> watch::Receiver<MonitorSnapshot> {
        self.snapshots.clone()
    }

    /// Latest snapshot
    pub fn snapshot(&self) -> MonitorSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Cut the alarm without stopping monitoring
    pub fn silence_alarm(&self) {
        self.alarm.stop();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the loop to exit and take the monitor back
    pub async fn join(self) -> Result<DrowsinessMonitor, MonitorError> {
        let (monitor, result) = self
            .task
            .await
            .map_err(|e| MonitorError::Task(e.to_string()))?;
        result.map(|()| monitor)
    }
}
