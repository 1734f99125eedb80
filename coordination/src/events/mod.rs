//! Event model: the append-only record streams both subsystems emit and
//! the sinks that persist them.

pub mod sink;
pub mod types;

pub use sink::{CsvLogSink, EventSink, MemorySink, SinkError, SinkResult};
pub use types::{
    new_alert_id, AlertAction, AlertId, AlertRecord, AlertType, ClusterEventKind, ClusterRecord,
};
