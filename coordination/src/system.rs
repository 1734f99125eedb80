//! Per-tick composition of the two subsystems.
//!
//! One [`CoordinationSystem::tick`] call performs a complete update:
//! capture and validate the telemetry snapshot, run the cluster
//! coordinator, run the alert engine, flush the sink. The two subsystems
//! never interact; they only share the snapshot and the sink.

use tracing::debug;

use crate::alerts::{AlertEngine, AlertError};
use crate::cluster::{ClusterCoordinator, ClusterError};
use crate::config::CoordinationConfig;
use crate::events::{AlertRecord, AlertType, ClusterRecord, EventSink, SinkError};
use crate::telemetry::{TelemetryError, TelemetrySnapshot, TelemetrySource, VehicleId};

/// Error type for a tick of the full system.
#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    #[error(transparent)]
    Cluster(#[from] ClusterError),

    #[error(transparent)]
    Alert(#[from] AlertError),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Result type for system operations.
pub type SystemResult<T> = Result<T, SystemError>;

/// What one tick produced.
#[derive(Debug, Default)]
pub struct TickReport {
    /// Simulation time of the tick.
    pub time: f64,
    /// Vehicles reported live by telemetry this tick.
    pub vehicles_seen: usize,
    /// Cluster records emitted, in emission order.
    pub cluster_records: Vec<ClusterRecord>,
    /// Alert records emitted, in emission order.
    pub alert_records: Vec<AlertRecord>,
}

/// Both subsystems plus the tick clock, driven by an external loop.
pub struct CoordinationSystem {
    config: CoordinationConfig,
    coordinator: ClusterCoordinator,
    alerts: AlertEngine,
    tick_index: u64,
}

impl CoordinationSystem {
    pub fn new(config: CoordinationConfig) -> Self {
        Self {
            coordinator: ClusterCoordinator::new(config.clone()),
            alerts: AlertEngine::new(config.clone()),
            config,
            tick_index: 0,
        }
    }

    /// Simulation time of the next tick (and of anything injected between
    /// ticks).
    pub fn time(&self) -> f64 {
        self.tick_index as f64 * self.config.tick_seconds
    }

    /// Ticks completed so far.
    pub fn ticks_completed(&self) -> u64 {
        self.tick_index
    }

    pub fn coordinator(&self) -> &ClusterCoordinator {
        &self.coordinator
    }

    pub fn alerts(&self) -> &AlertEngine {
        &self.alerts
    }

    /// Register an emergency vehicle with the cluster coordinator.
    pub fn register_emergency(
        &mut self,
        id: &VehicleId,
        priority_level: u8,
        sink: &mut dyn EventSink,
    ) -> SystemResult<()> {
        self.coordinator
            .register_emergency(id, priority_level, self.time(), sink)?;
        Ok(())
    }

    /// Manually originate an alert, exactly as automatic detection would.
    pub fn inject_alert(
        &mut self,
        vehicle: &VehicleId,
        alert_type: AlertType,
        sink: &mut dyn EventSink,
    ) -> SystemResult<Vec<AlertRecord>> {
        let records = self.alerts.inject(vehicle, alert_type, self.time(), sink)?;
        Ok(records)
    }

    /// Run one full update of both subsystems.
    ///
    /// The snapshot is captured (and validated) before either subsystem
    /// mutates anything, so a telemetry contract violation leaves the whole
    /// system untouched.
    pub fn tick(
        &mut self,
        source: &dyn TelemetrySource,
        sink: &mut dyn EventSink,
    ) -> SystemResult<TickReport> {
        let time = self.time();
        let snapshot = TelemetrySnapshot::capture(source)?;

        let cluster_records = self.coordinator.tick(&snapshot, time, sink)?;
        let alert_records = self.alerts.tick(&snapshot, time, sink)?;
        sink.flush()?;

        debug!(
            time,
            vehicles = snapshot.len(),
            cluster_events = cluster_records.len(),
            alert_events = alert_records.len(),
            "tick complete"
        );

        self.tick_index += 1;
        Ok(TickReport {
            time,
            vehicles_seen: snapshot.len(),
            cluster_records,
            alert_records,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MemorySink;
    use crate::telemetry::Position;

    struct FakeSource {
        fixes: Vec<(VehicleId, Position, f64)>,
    }

    impl TelemetrySource for FakeSource {
        fn active_vehicles(&self) -> Vec<VehicleId> {
            self.fixes.iter().map(|(id, _, _)| id.clone()).collect()
        }

        fn position_of(&self, id: &VehicleId) -> Option<Position> {
            self.fixes
                .iter()
                .find(|(v, _, _)| v == id)
                .map(|(_, p, _)| *p)
        }

        fn speed_of(&self, id: &VehicleId) -> Option<f64> {
            self.fixes
                .iter()
                .find(|(v, _, _)| v == id)
                .map(|(_, _, s)| *s)
        }
    }

    #[test]
    fn tick_advances_time() {
        let mut system = CoordinationSystem::new(CoordinationConfig::default());
        let mut sink = MemorySink::new();
        let source = FakeSource { fixes: vec![] };

        assert_eq!(system.time(), 0.0);
        let report = system.tick(&source, &mut sink).unwrap();
        assert_eq!(report.time, 0.0);
        assert_eq!(system.time(), 1.0);
        assert_eq!(system.ticks_completed(), 1);
    }

    #[test]
    fn bad_telemetry_aborts_tick_without_mutation() {
        let mut system = CoordinationSystem::new(CoordinationConfig::default());
        let mut sink = MemorySink::new();

        let good = FakeSource {
            fixes: vec![("car_a".into(), Position::new(0.0, 0.0), 15.0)],
        };
        system.tick(&good, &mut sink).unwrap();
        assert_eq!(system.alerts().tracked_vehicles(), 1);

        let bad = FakeSource {
            fixes: vec![("car_a".into(), Position::new(f64::NAN, 0.0), 15.0)],
        };
        let err = system.tick(&bad, &mut sink).unwrap_err();
        assert!(matches!(err, SystemError::Telemetry(_)));
        // Nothing changed: car_a is still tracked and the clock did not move.
        assert_eq!(system.alerts().tracked_vehicles(), 1);
        assert_eq!(system.ticks_completed(), 1);
    }

    #[test]
    fn subsystems_share_one_snapshot() {
        let mut system = CoordinationSystem::new(CoordinationConfig::default());
        let mut sink = MemorySink::new();
        system
            .register_emergency(&"amb_1".to_string(), 1, &mut sink)
            .unwrap();

        let source = FakeSource {
            fixes: vec![
                ("amb_1".into(), Position::new(0.0, 0.0), 20.0),
                ("car_a".into(), Position::new(50.0, 0.0), 15.0),
            ],
        };
        let report = system.tick(&source, &mut sink).unwrap();
        assert_eq!(report.vehicles_seen, 2);
        assert_eq!(report.cluster_records.len(), 1);
        assert!(report.alert_records.is_empty());
    }
}
