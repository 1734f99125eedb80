//! Event records emitted by the two coordination subsystems.
//!
//! Records are immutable facts: once appended to a sink they are never
//! rewritten. Downstream tooling reconstructs causal chains (leadership
//! episodes, flood waves) purely from append order plus timestamps, so
//! every field here is flat and directly serializable.

use serde::{Deserialize, Serialize};

use crate::telemetry::VehicleId;

/// Unique identifier for an originated alert.
pub type AlertId = String;

/// Mint a fresh alert identifier.
pub fn new_alert_id() -> AlertId {
    uuid::Uuid::new_v4().to_string()
}

/// Kind of cluster state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterEventKind {
    /// An emergency vehicle was registered with the coordinator.
    EmergencySpawn,
    /// A member won (or regained, after a gap) the leader role.
    LeaderElected,
    /// The previous leader was displaced by a better-scoring member.
    LeaderChanged,
    /// The leader drifted outside the cluster radius and was evicted.
    LeaderLost,
}

impl std::fmt::Display for ClusterEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClusterEventKind::EmergencySpawn => write!(f, "emergency_spawn"),
            ClusterEventKind::LeaderElected => write!(f, "leader_elected"),
            ClusterEventKind::LeaderChanged => write!(f, "leader_changed"),
            ClusterEventKind::LeaderLost => write!(f, "leader_lost"),
        }
    }
}

/// One row of the cluster event stream.
///
/// CSV schema: `time,event_type,vehicle_id,cluster_id,distance`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterRecord {
    /// Simulation time at which the transition happened.
    pub time: f64,
    pub kind: ClusterEventKind,
    /// Subject of the transition (the vehicle gaining or losing the role).
    pub vehicle_id: VehicleId,
    /// Cluster context; empty for `emergency_spawn`.
    pub cluster_id: String,
    /// Subject's distance to the emergency vehicle when the transition
    /// happened; zero when not meaningful.
    pub distance: f64,
}

impl ClusterRecord {
    pub const CSV_HEADER: &'static str = "time,event_type,vehicle_id,cluster_id,distance";

    /// Render as one CSV row (no trailing newline).
    pub fn to_csv_row(&self) -> String {
        format!(
            "{},{},{},{},{}",
            self.time, self.kind, self.vehicle_id, self.cluster_id, self.distance
        )
    }
}

/// Category of an alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    /// Automatic origination: speed dropped sharply between ticks.
    BrakeCheck,
    /// Injected hazard on the roadway.
    RoadHazard,
    /// Injected collision event.
    Accident,
    /// Operator-defined type injected through the harness.
    Custom(String),
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertType::BrakeCheck => write!(f, "brake_check"),
            AlertType::RoadHazard => write!(f, "road_hazard"),
            AlertType::Accident => write!(f, "accident"),
            AlertType::Custom(name) => write!(f, "{}", name),
        }
    }
}

/// What happened to an alert at one vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertAction {
    /// The alert was originated at this vehicle.
    Started,
    /// The alert was delivered from `source_id` to `receiver_id`.
    Received,
    /// The receiving vehicle re-broadcast the alert.
    Forwarded,
    /// The hop budget was exhausted; propagation stops at this vehicle.
    StoppedMaxHops,
}

impl std::fmt::Display for AlertAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertAction::Started => write!(f, "started"),
            AlertAction::Received => write!(f, "received"),
            AlertAction::Forwarded => write!(f, "forwarded"),
            AlertAction::StoppedMaxHops => write!(f, "stopped_max_hops"),
        }
    }
}

/// One row of the alert event stream.
///
/// CSV schema: `time,source_id,receiver_id,alert_type,distance,action`.
/// `receiver_id` is empty and `distance` zero for every action except
/// `received`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub time: f64,
    /// Acting vehicle: originator for `started`, sender for `received`,
    /// relay for `forwarded` / `stopped_max_hops`.
    pub source_id: VehicleId,
    pub receiver_id: Option<VehicleId>,
    pub alert_type: AlertType,
    pub distance: f64,
    pub action: AlertAction,
}

impl AlertRecord {
    pub const CSV_HEADER: &'static str = "time,source_id,receiver_id,alert_type,distance,action";

    /// Render as one CSV row (no trailing newline).
    pub fn to_csv_row(&self) -> String {
        format!(
            "{},{},{},{},{},{}",
            self.time,
            self.source_id,
            self.receiver_id.as_deref().unwrap_or(""),
            self.alert_type,
            self.distance,
            self.action
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cluster_record_csv_row() {
        let record = ClusterRecord {
            time: 12.0,
            kind: ClusterEventKind::LeaderElected,
            vehicle_id: "car_3".into(),
            cluster_id: "cluster_amb_1".into(),
            distance: 42.5,
        };
        assert_eq!(
            record.to_csv_row(),
            "12,leader_elected,car_3,cluster_amb_1,42.5"
        );
    }

    #[test]
    fn alert_record_csv_row_received() {
        let record = AlertRecord {
            time: 3.0,
            source_id: "car_1".into(),
            receiver_id: Some("car_2".into()),
            alert_type: AlertType::BrakeCheck,
            distance: 30.0,
            action: AlertAction::Received,
        };
        assert_eq!(record.to_csv_row(), "3,car_1,car_2,brake_check,30,received");
    }

    #[test]
    fn alert_record_csv_row_non_received() {
        let record = AlertRecord {
            time: 3.0,
            source_id: "car_2".into(),
            receiver_id: None,
            alert_type: AlertType::RoadHazard,
            distance: 0.0,
            action: AlertAction::Forwarded,
        };
        assert_eq!(record.to_csv_row(), "3,car_2,,road_hazard,0,forwarded");
    }

    #[test]
    fn record_serialization_round_trips() {
        let record = AlertRecord {
            time: 1.0,
            source_id: "car_9".into(),
            receiver_id: None,
            alert_type: AlertType::Custom("ice".into()),
            distance: 0.0,
            action: AlertAction::Started,
        };
        let json = serde_json::to_string(&record).unwrap();
        let parsed: AlertRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn alert_ids_are_unique() {
        let a = new_alert_id();
        let b = new_alert_id();
        assert_ne!(a, b);
    }
}
