//! V2V coordination core.
//!
//! Two independent subsystems share one telemetry feed and one event sink:
//!
//! - **Cluster coordinator**: forms proximity clusters around registered
//!   emergency vehicles and continuously re-elects a leader per cluster.
//! - **Alert engine**: detects sharp decelerations (or takes injected
//!   hazards) and floods alerts through the ad-hoc proximity graph with a
//!   hop budget and per-vehicle deduplication.
//!
//! The motion source and the durable log are external collaborators behind
//! the [`telemetry::TelemetrySource`] and [`events::EventSink`] traits. An
//! external fixed-tick loop drives [`system::CoordinationSystem::tick`]
//! once per simulated time step; nothing here blocks, suspends, or runs
//! concurrently.

pub mod alerts;
pub mod cluster;
pub mod config;
pub mod events;
pub mod system;
pub mod telemetry;

pub use alerts::{AlertEngine, AlertError};
pub use cluster::{leadership_score, Cluster, ClusterCoordinator, ClusterError};
pub use config::CoordinationConfig;
pub use events::{
    AlertAction, AlertRecord, AlertType, ClusterEventKind, ClusterRecord, CsvLogSink, EventSink,
    MemorySink,
};
pub use system::{CoordinationSystem, SystemError, TickReport};
pub use telemetry::{Position, TelemetryError, TelemetrySnapshot, TelemetrySource, VehicleId};
