//! Cluster coordinator: proximity clustering around emergency vehicles
//! with continuous leader re-election.
//!
//! Per tick the coordinator re-evaluates every ordinary vehicle against
//! every registered emergency vehicle: membership is a pure inclusive-radius
//! predicate over the latest telemetry, eviction clears stale assignments,
//! and each non-empty cluster elects the member with the highest leadership
//! score. All state transitions are appended to the event sink in the order
//! they happen.
//!
//! Determinism: every registry is a `BTreeMap`, so iteration (and therefore
//! score tie-breaking and multi-cluster contention) always resolves toward
//! the lexically smallest vehicle id.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::CoordinationConfig;
use crate::events::{ClusterEventKind, ClusterRecord, EventSink, SinkError};
use crate::telemetry::{Position, TelemetrySnapshot, VehicleId};

/// Error type for cluster coordination.
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Result type for cluster operations.
pub type ClusterResult<T> = Result<T, ClusterError>;

/// A registered emergency vehicle and its last known motion state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyVehicle {
    pub id: VehicleId,
    /// Integer priority, >= 1. Only level 1 is produced today.
    pub priority_level: u8,
    pub position: Position,
    pub speed: f64,
    /// Membership radius for the cluster formed around this vehicle.
    pub cluster_radius: f64,
}

/// An ordinary vehicle tracked for clustering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterVehicle {
    pub id: VehicleId,
    pub position: Position,
    pub speed: f64,
    pub is_leader: bool,
    /// Cluster this vehicle currently belongs to, at most one.
    pub cluster_id: Option<String>,
    pub distance_to_emergency: f64,
    pub leadership_score: f64,
}

impl ClusterVehicle {
    fn new(id: VehicleId, position: Position, speed: f64) -> Self {
        Self {
            id,
            position,
            speed,
            is_leader: false,
            cluster_id: None,
            distance_to_emergency: f64::INFINITY,
            leadership_score: 0.0,
        }
    }
}

/// Snapshot of one cluster after a tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    pub emergency_id: VehicleId,
    pub leader: VehicleId,
    /// Member ids in lexical order.
    pub members: Vec<VehicleId>,
    pub size: usize,
}

/// Leadership score: proximity to the emergency vehicle plus closeness of
/// the member's speed to the reference cruising speed. Higher is better.
pub fn leadership_score(distance: f64, speed: f64, reference_speed: f64) -> f64 {
    let distance_score = (100.0 - distance).max(0.0);
    let speed_stability = (30.0 - (speed - reference_speed).abs()).max(0.0);
    distance_score + speed_stability
}

/// Cluster id for a given emergency vehicle.
pub fn cluster_id_for(emergency_id: &VehicleId) -> String {
    format!("cluster_{}", emergency_id)
}

/// Owner of all clustering state: emergency registry, ordinary-vehicle
/// registry, and the cluster table.
pub struct ClusterCoordinator {
    config: CoordinationConfig,
    emergencies: BTreeMap<VehicleId, EmergencyVehicle>,
    vehicles: BTreeMap<VehicleId, ClusterVehicle>,
    clusters: BTreeMap<String, Cluster>,
}

impl ClusterCoordinator {
    pub fn new(config: CoordinationConfig) -> Self {
        Self {
            config,
            emergencies: BTreeMap::new(),
            vehicles: BTreeMap::new(),
            clusters: BTreeMap::new(),
        }
    }

    /// Register an emergency vehicle and emit `emergency_spawn`.
    ///
    /// Registering an already-known id is a no-op.
    pub fn register_emergency(
        &mut self,
        id: &VehicleId,
        priority_level: u8,
        time: f64,
        sink: &mut dyn EventSink,
    ) -> ClusterResult<Option<ClusterRecord>> {
        if self.emergencies.contains_key(id) {
            return Ok(None);
        }
        self.emergencies.insert(
            id.clone(),
            EmergencyVehicle {
                id: id.clone(),
                priority_level,
                position: Position::new(0.0, 0.0),
                speed: 0.0,
                cluster_radius: self.config.cluster_radius,
            },
        );
        // Ordinary-vehicle state for this id, if any, is stale now.
        self.vehicles.remove(id);

        info!(vehicle = %id, priority_level, "emergency vehicle registered");
        let record = ClusterRecord {
            time,
            kind: ClusterEventKind::EmergencySpawn,
            vehicle_id: id.clone(),
            cluster_id: String::new(),
            distance: 0.0,
        };
        sink.cluster_event(&record)?;
        Ok(Some(record))
    }

    /// Current cluster table.
    pub fn clusters(&self) -> &BTreeMap<String, Cluster> {
        &self.clusters
    }

    /// Registered emergency vehicles.
    pub fn emergencies(&self) -> &BTreeMap<VehicleId, EmergencyVehicle> {
        &self.emergencies
    }

    /// Tracked ordinary vehicles.
    pub fn vehicles(&self) -> &BTreeMap<VehicleId, ClusterVehicle> {
        &self.vehicles
    }

    /// Run one full clustering pass against the tick's snapshot.
    ///
    /// Returns the records emitted this tick, in emission order. Records are
    /// also appended to the sink at the instant each transition happens.
    pub fn tick(
        &mut self,
        snapshot: &TelemetrySnapshot,
        time: f64,
        sink: &mut dyn EventSink,
    ) -> ClusterResult<Vec<ClusterRecord>> {
        let mut records = Vec::new();

        self.remove_departed_emergencies(snapshot);
        self.sync_vehicle_registry(snapshot);

        let emergency_ids: Vec<VehicleId> = self.emergencies.keys().cloned().collect();
        for emergency_id in emergency_ids {
            self.update_cluster(&emergency_id, time, sink, &mut records)?;
        }

        Ok(records)
    }

    /// Drop emergencies the telemetry no longer reports. Their clusters are
    /// deleted immediately and member state is cleared without events
    /// (topology drift, not an error).
    fn remove_departed_emergencies(&mut self, snapshot: &TelemetrySnapshot) {
        let departed: Vec<VehicleId> = self
            .emergencies
            .keys()
            .filter(|id| !snapshot.contains(id))
            .cloned()
            .collect();

        for id in departed {
            let cluster_id = cluster_id_for(&id);
            self.emergencies.remove(&id);
            self.clusters.remove(&cluster_id);
            for vehicle in self.vehicles.values_mut() {
                if vehicle.cluster_id.as_deref() == Some(cluster_id.as_str()) {
                    vehicle.cluster_id = None;
                    vehicle.is_leader = false;
                }
            }
            debug!(vehicle = %id, "emergency vehicle departed, cluster dissolved");
        }
    }

    /// Update registries from the snapshot: departures are dropped with all
    /// membership state, survivors get fresh fixes, newcomers are tracked.
    fn sync_vehicle_registry(&mut self, snapshot: &TelemetrySnapshot) {
        self.vehicles.retain(|id, _| snapshot.contains(id));

        for (id, fix) in snapshot.iter() {
            if let Some(emergency) = self.emergencies.get_mut(id) {
                emergency.position = fix.position;
                emergency.speed = fix.speed;
                continue;
            }
            match self.vehicles.get_mut(id) {
                Some(vehicle) => {
                    vehicle.position = fix.position;
                    vehicle.speed = fix.speed;
                }
                None => {
                    self.vehicles.insert(
                        id.clone(),
                        ClusterVehicle::new(id.clone(), fix.position, fix.speed),
                    );
                }
            }
        }
    }

    /// Re-evaluate membership and leadership for one emergency vehicle.
    fn update_cluster(
        &mut self,
        emergency_id: &VehicleId,
        time: f64,
        sink: &mut dyn EventSink,
        records: &mut Vec<ClusterRecord>,
    ) -> ClusterResult<()> {
        let cluster_id = cluster_id_for(emergency_id);
        let (emergency_pos, radius) = match self.emergencies.get(emergency_id) {
            Some(e) => (e.position, e.cluster_radius),
            None => return Ok(()),
        };

        // Membership pass. `members` collects (id, score, distance) in
        // lexical order; eviction events fire inline.
        let mut members: Vec<(VehicleId, f64, f64)> = Vec::new();
        let reference_speed = self.config.reference_speed;
        for vehicle in self.vehicles.values_mut() {
            let distance = vehicle.position.distance_to(&emergency_pos);

            if distance <= radius {
                // A vehicle that this tick already joined a lexically
                // smaller cluster stays there.
                if let Some(current) = vehicle.cluster_id.as_deref() {
                    if current != cluster_id && current < cluster_id.as_str() {
                        continue;
                    }
                    if current != cluster_id {
                        // Stale assignment to a not-yet-processed cluster;
                        // any leadership there is void now.
                        vehicle.is_leader = false;
                    }
                }
                vehicle.cluster_id = Some(cluster_id.clone());
                vehicle.distance_to_emergency = distance;
                vehicle.leadership_score = leadership_score(distance, vehicle.speed, reference_speed);
                members.push((vehicle.id.clone(), vehicle.leadership_score, distance));
            } else if vehicle.cluster_id.as_deref() == Some(cluster_id.as_str()) {
                if vehicle.is_leader {
                    let record = ClusterRecord {
                        time,
                        kind: ClusterEventKind::LeaderLost,
                        vehicle_id: vehicle.id.clone(),
                        cluster_id: cluster_id.clone(),
                        distance,
                    };
                    info!(vehicle = %vehicle.id, cluster = %cluster_id, distance, "leader left cluster");
                    sink.cluster_event(&record)?;
                    records.push(record);
                }
                vehicle.cluster_id = None;
                vehicle.is_leader = false;
            }
        }

        debug!(
            cluster = %cluster_id,
            members = members.len(),
            "membership recomputed"
        );

        if members.is_empty() {
            self.clusters.remove(&cluster_id);
            return Ok(());
        }

        // Election: highest score wins; strictly-greater comparison over the
        // lexically ordered member list makes the smallest id win ties.
        let mut best = 0;
        for i in 1..members.len() {
            if members[i].1 > members[best].1 {
                best = i;
            }
        }
        let (candidate_id, _, candidate_distance) = members[best].clone();

        let current_leader: Option<VehicleId> = members
            .iter()
            .map(|(id, _, _)| id)
            .find(|id| self.vehicles.get(*id).is_some_and(|v| v.is_leader))
            .cloned();

        if current_leader.as_ref() != Some(&candidate_id) {
            if let Some(old_id) = current_leader {
                let old_distance = self
                    .vehicles
                    .get(&old_id)
                    .map(|v| v.distance_to_emergency)
                    .unwrap_or(0.0);
                if let Some(old) = self.vehicles.get_mut(&old_id) {
                    old.is_leader = false;
                }
                let record = ClusterRecord {
                    time,
                    kind: ClusterEventKind::LeaderChanged,
                    vehicle_id: old_id.clone(),
                    cluster_id: cluster_id.clone(),
                    distance: old_distance,
                };
                info!(old_leader = %old_id, cluster = %cluster_id, "leader displaced");
                sink.cluster_event(&record)?;
                records.push(record);
            }

            if let Some(new) = self.vehicles.get_mut(&candidate_id) {
                new.is_leader = true;
            }
            let record = ClusterRecord {
                time,
                kind: ClusterEventKind::LeaderElected,
                vehicle_id: candidate_id.clone(),
                cluster_id: cluster_id.clone(),
                distance: candidate_distance,
            };
            info!(leader = %candidate_id, cluster = %cluster_id, distance = candidate_distance, "leader elected");
            sink.cluster_event(&record)?;
            records.push(record);
        }

        let member_ids: Vec<VehicleId> = members.into_iter().map(|(id, _, _)| id).collect();
        self.clusters.insert(
            cluster_id,
            Cluster {
                emergency_id: emergency_id.clone(),
                leader: candidate_id,
                size: member_ids.len(),
                members: member_ids,
            },
        );

        Ok(())
    }
}
