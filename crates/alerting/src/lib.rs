//! Alerting System
//!
//! Turns episode crossings and tension frames into alert records and
//! delivers them to an external sink without ever blocking the
//! detection loop.

mod dispatcher;
mod record;
mod sink;

pub use dispatcher::{AlertDispatcher, DispatcherConfig};
pub use record::{AlertKind, AlertRecord};
pub use sink::{AlertSink, ChannelSink, LogSink, MemorySink};

use thiserror::Error;

/// Alert delivery errors
#[derive(Error, Debug)]
pub enum AlertError {
    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Alert sink closed")]
    Closed,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
