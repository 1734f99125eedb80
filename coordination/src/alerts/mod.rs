//! Alert propagation engine: anomaly detection and hop-limited,
//! deduplicated flood broadcast over the ad-hoc proximity graph.
//!
//! An alert originates either automatically (a sharp speed drop between
//! consecutive ticks) or through manual injection, and then floods to every
//! vehicle within broadcast range, each receiver re-broadcasting in turn.
//! Two mechanisms bound the flood: a per-vehicle dedup set (a vehicle
//! processes a given alert id at most once in its lifetime) and a hop
//! budget that limits relay depth but not breadth.
//!
//! The flood runs over the tick's immutable position snapshot with an
//! explicit worklist rather than mutual recursion, so termination is
//! structural: every pop either delivers to a never-reached vehicle or
//! discards, and deliveries are capped by the vehicle count.

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, info};

use crate::config::CoordinationConfig;
use crate::events::{
    new_alert_id, AlertAction, AlertId, AlertRecord, AlertType, EventSink, SinkError,
};
use crate::telemetry::{Position, TelemetrySnapshot, VehicleId};

/// Error type for alert propagation.
#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    /// The id generator produced a duplicate. Must never happen; treated as
    /// a fatal invariant violation rather than recovered from.
    #[error("alert id collision: {id} was already issued")]
    IdCollision { id: AlertId },

    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Result type for alert operations.
pub type AlertResult<T> = Result<T, AlertError>;

/// Per-vehicle communication state.
#[derive(Debug, Clone)]
struct VehicleCommState {
    position: Position,
    speed: f64,
    /// Alert ids this vehicle has already processed. Grows monotonically
    /// for the vehicle's lifetime; discarded on departure.
    processed: HashSet<AlertId>,
}

/// Owner of all V2V communication state.
pub struct AlertEngine {
    config: CoordinationConfig,
    vehicles: BTreeMap<VehicleId, VehicleCommState>,
    /// Every alert id ever issued, for collision detection.
    issued: HashSet<AlertId>,
}

impl AlertEngine {
    pub fn new(config: CoordinationConfig) -> Self {
        Self {
            config,
            vehicles: BTreeMap::new(),
            issued: HashSet::new(),
        }
    }

    /// Whether a vehicle has processed the given alert id.
    pub fn has_processed(&self, vehicle: &VehicleId, alert: &AlertId) -> bool {
        self.vehicles
            .get(vehicle)
            .is_some_and(|v| v.processed.contains(alert))
    }

    /// Number of vehicles currently tracked.
    pub fn tracked_vehicles(&self) -> usize {
        self.vehicles.len()
    }

    /// Sync states with the snapshot and run deceleration detection.
    ///
    /// Departed vehicles lose their dedup state; newcomers start clean and
    /// cannot trigger detection until their second tick.
    pub fn tick(
        &mut self,
        snapshot: &TelemetrySnapshot,
        time: f64,
        sink: &mut dyn EventSink,
    ) -> AlertResult<Vec<AlertRecord>> {
        self.vehicles.retain(|id, _| snapshot.contains(id));

        // Apply fresh fixes first so every flood this tick sees the same
        // immutable position set, then detect on the speed deltas.
        let mut decelerated: Vec<VehicleId> = Vec::new();
        for (id, fix) in snapshot.iter() {
            match self.vehicles.get_mut(id) {
                Some(state) => {
                    if state.speed - fix.speed > self.config.decel_threshold {
                        decelerated.push(id.clone());
                    }
                    state.position = fix.position;
                    state.speed = fix.speed;
                }
                None => {
                    self.vehicles.insert(
                        id.clone(),
                        VehicleCommState {
                            position: fix.position,
                            speed: fix.speed,
                            processed: HashSet::new(),
                        },
                    );
                }
            }
        }

        let mut records = Vec::new();
        for id in decelerated {
            info!(vehicle = %id, "sharp deceleration detected");
            self.originate(&id, AlertType::BrakeCheck, time, sink, &mut records)?;
        }
        Ok(records)
    }

    /// Manually originate an alert at an existing vehicle.
    ///
    /// Follows the exact origination path of automatic detection. Unknown
    /// or departed vehicles are a no-op.
    pub fn inject(
        &mut self,
        vehicle: &VehicleId,
        alert_type: AlertType,
        time: f64,
        sink: &mut dyn EventSink,
    ) -> AlertResult<Vec<AlertRecord>> {
        if !self.vehicles.contains_key(vehicle) {
            debug!(vehicle = %vehicle, "inject ignored: vehicle not tracked");
            return Ok(Vec::new());
        }
        let mut records = Vec::new();
        self.originate(vehicle, alert_type, time, sink, &mut records)?;
        Ok(records)
    }

    /// Mint an id, emit `started`, mark the originator, and flood.
    fn originate(
        &mut self,
        origin: &VehicleId,
        alert_type: AlertType,
        time: f64,
        sink: &mut dyn EventSink,
        records: &mut Vec<AlertRecord>,
    ) -> AlertResult<()> {
        let alert_id = new_alert_id();
        if !self.issued.insert(alert_id.clone()) {
            return Err(AlertError::IdCollision { id: alert_id });
        }

        info!(vehicle = %origin, alert = %alert_type, id = %alert_id, "alert originated");
        let record = AlertRecord {
            time,
            source_id: origin.clone(),
            receiver_id: None,
            alert_type: alert_type.clone(),
            distance: 0.0,
            action: AlertAction::Started,
        };
        sink.alert_event(&record)?;
        records.push(record);

        if let Some(state) = self.vehicles.get_mut(origin) {
            state.processed.insert(alert_id.clone());
        }
        self.flood(origin, &alert_type, &alert_id, time, sink, records)
    }

    /// Worklist flood: deliver to every unreached vehicle in broadcast
    /// range, then relay from each receiver while the hop budget lasts.
    fn flood(
        &mut self,
        origin: &VehicleId,
        alert_type: &AlertType,
        alert_id: &AlertId,
        time: f64,
        sink: &mut dyn EventSink,
        records: &mut Vec<AlertRecord>,
    ) -> AlertResult<()> {
        let mut work: Vec<(VehicleId, u32)> = vec![(origin.clone(), 0)];

        while let Some((source, hops)) = work.pop() {
            let source_pos = match self.vehicles.get(&source) {
                Some(state) => state.position,
                // Flooding from a departed vehicle delivers to nobody.
                None => continue,
            };

            // Receivers in lexical order: unprocessed vehicles in range.
            let receivers: Vec<(VehicleId, f64)> = self
                .vehicles
                .iter()
                .filter(|(id, state)| {
                    **id != source
                        && !state.processed.contains(alert_id)
                        && state.position.distance_to(&source_pos) <= self.config.broadcast_radius
                })
                .map(|(id, state)| (id.clone(), state.position.distance_to(&source_pos)))
                .collect();

            for (receiver, distance) in receivers {
                if let Some(state) = self.vehicles.get_mut(&receiver) {
                    state.processed.insert(alert_id.clone());
                }
                debug!(
                    alert = %alert_id,
                    source = %source,
                    receiver = %receiver,
                    distance,
                    hops,
                    "alert delivered"
                );
                let record = AlertRecord {
                    time,
                    source_id: source.clone(),
                    receiver_id: Some(receiver.clone()),
                    alert_type: alert_type.clone(),
                    distance,
                    action: AlertAction::Received,
                };
                sink.alert_event(&record)?;
                records.push(record);

                if hops + 1 > self.config.max_hops {
                    let record = AlertRecord {
                        time,
                        source_id: receiver.clone(),
                        receiver_id: None,
                        alert_type: alert_type.clone(),
                        distance: 0.0,
                        action: AlertAction::StoppedMaxHops,
                    };
                    sink.alert_event(&record)?;
                    records.push(record);
                } else {
                    let record = AlertRecord {
                        time,
                        source_id: receiver.clone(),
                        receiver_id: None,
                        alert_type: alert_type.clone(),
                        distance: 0.0,
                        action: AlertAction::Forwarded,
                    };
                    sink.alert_event(&record)?;
                    records.push(record);
                    work.push((receiver, hops + 1));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MemorySink;
    use crate::telemetry::VehicleFix;

    fn snapshot(fixes: &[(&str, f64, f64, f64)]) -> TelemetrySnapshot {
        let map: BTreeMap<VehicleId, VehicleFix> = fixes
            .iter()
            .map(|(id, x, y, speed)| {
                (
                    id.to_string(),
                    VehicleFix {
                        position: Position::new(*x, *y),
                        speed: *speed,
                    },
                )
            })
            .collect();
        TelemetrySnapshot::from_fixes(map)
    }

    #[test]
    fn deceleration_threshold_is_strict() {
        let mut sink = MemorySink::new();
        let mut engine = AlertEngine::new(CoordinationConfig::default());

        engine
            .tick(&snapshot(&[("car_x", 0.0, 0.0, 20.0)]), 0.0, &mut sink)
            .unwrap();
        // Drop of exactly 5: no alert.
        let records = engine
            .tick(&snapshot(&[("car_x", 0.0, 0.0, 15.0)]), 1.0, &mut sink)
            .unwrap();
        assert!(records.is_empty());
        // Drop of 6: alert.
        let records = engine
            .tick(&snapshot(&[("car_x", 0.0, 0.0, 9.0)]), 2.0, &mut sink)
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].action, AlertAction::Started);
        assert_eq!(records[0].alert_type, AlertType::BrakeCheck);
    }

    #[test]
    fn newcomer_does_not_trigger_detection() {
        let mut sink = MemorySink::new();
        let mut engine = AlertEngine::new(CoordinationConfig::default());
        let records = engine
            .tick(&snapshot(&[("car_x", 0.0, 0.0, 0.0)]), 0.0, &mut sink)
            .unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn scenario_b_started_received_forwarded() {
        // X decelerates from 20 to 10 with Y 30 units away.
        let mut sink = MemorySink::new();
        let mut engine = AlertEngine::new(CoordinationConfig::default());

        engine
            .tick(
                &snapshot(&[("car_x", 0.0, 0.0, 20.0), ("car_y", 30.0, 0.0, 15.0)]),
                0.0,
                &mut sink,
            )
            .unwrap();
        let records = engine
            .tick(
                &snapshot(&[("car_x", 0.0, 0.0, 10.0), ("car_y", 30.0, 0.0, 15.0)]),
                1.0,
                &mut sink,
            )
            .unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].action, AlertAction::Started);
        assert_eq!(records[0].source_id, "car_x");
        assert_eq!(records[1].action, AlertAction::Received);
        assert_eq!(records[1].source_id, "car_x");
        assert_eq!(records[1].receiver_id.as_deref(), Some("car_y"));
        assert_eq!(records[1].distance, 30.0);
        assert_eq!(records[2].action, AlertAction::Forwarded);
        assert_eq!(records[2].source_id, "car_y");
    }

    #[test]
    fn inject_unknown_vehicle_is_noop() {
        let mut sink = MemorySink::new();
        let mut engine = AlertEngine::new(CoordinationConfig::default());
        let records = engine
            .inject(&"ghost".to_string(), AlertType::Accident, 0.0, &mut sink)
            .unwrap();
        assert!(records.is_empty());
        assert!(sink.alert_records.is_empty());
    }

    #[test]
    fn dedup_prevents_reprocessing() {
        let mut sink = MemorySink::new();
        let mut engine = AlertEngine::new(CoordinationConfig::default());

        engine
            .tick(
                &snapshot(&[("car_a", 0.0, 0.0, 15.0), ("car_b", 30.0, 0.0, 15.0)]),
                0.0,
                &mut sink,
            )
            .unwrap();

        // Two vehicles in mutual range: the flood reaches car_b once and
        // car_b's relay finds nobody unprocessed, so exactly one received
        // record exists.
        let records = engine
            .inject(&"car_a".to_string(), AlertType::RoadHazard, 1.0, &mut sink)
            .unwrap();
        let received = records
            .iter()
            .filter(|r| r.action == AlertAction::Received)
            .count();
        assert_eq!(received, 1);

        // A second, distinct alert still propagates (dedup is per id).
        let records = engine
            .inject(&"car_a".to_string(), AlertType::Accident, 2.0, &mut sink)
            .unwrap();
        let received = records
            .iter()
            .filter(|r| r.action == AlertAction::Received)
            .count();
        assert_eq!(received, 1);
    }

    #[test]
    fn broadcast_radius_is_inclusive() {
        let mut sink = MemorySink::new();
        let mut engine = AlertEngine::new(CoordinationConfig::default());

        engine
            .tick(
                &snapshot(&[
                    ("car_a", 0.0, 0.0, 15.0),
                    ("car_edge", 50.0, 0.0, 15.0),
                    ("car_out", 50.5, 0.0, 15.0),
                ]),
                0.0,
                &mut sink,
            )
            .unwrap();

        let records = engine
            .inject(&"car_a".to_string(), AlertType::RoadHazard, 1.0, &mut sink)
            .unwrap();
        let receivers: Vec<_> = records
            .iter()
            .filter(|r| r.action == AlertAction::Received)
            .filter_map(|r| r.receiver_id.clone())
            .collect();
        assert_eq!(receivers, vec!["car_edge".to_string()]);
    }

    #[test]
    fn departure_discards_dedup_state() {
        let mut sink = MemorySink::new();
        let mut engine = AlertEngine::new(CoordinationConfig::default());

        engine
            .tick(&snapshot(&[("car_a", 0.0, 0.0, 15.0)]), 0.0, &mut sink)
            .unwrap();
        engine
            .inject(&"car_a".to_string(), AlertType::RoadHazard, 0.0, &mut sink)
            .unwrap();
        assert_eq!(engine.tracked_vehicles(), 1);

        engine.tick(&snapshot(&[]), 1.0, &mut sink).unwrap();
        assert_eq!(engine.tracked_vehicles(), 0);
    }
}
