//! Scripted motion source.
//!
//! Plays back a [`Scenario`] as a `TelemetrySource`: each vehicle moves
//! linearly along its velocity vector, appears at its depart tick, and
//! drops out at its removal tick. This stands in for the external traffic
//! simulator the production deployment reads from.

use vanet_coordination::telemetry::{Position, TelemetrySource, VehicleId};

use crate::scenario::{Scenario, VehicleScript};

/// Scenario playback positioned at one tick.
pub struct ScriptedSource {
    scenario: Scenario,
    tick: u64,
}

impl ScriptedSource {
    pub fn new(scenario: Scenario) -> Self {
        Self { scenario, tick: 0 }
    }

    /// Advance playback to the next tick.
    pub fn advance(&mut self) {
        self.tick += 1;
    }

    /// Scripts flagged as emergency vehicles that are live right now.
    pub fn live_emergencies(&self) -> Vec<&VehicleScript> {
        self.scenario
            .vehicles
            .iter()
            .filter(|v| v.emergency && v.alive_at(self.tick))
            .collect()
    }

    /// Whether any script is still (or yet to become) live.
    pub fn has_pending_vehicles(&self) -> bool {
        self.scenario
            .vehicles
            .iter()
            .any(|v| v.alive_at(self.tick) || v.depart > self.tick)
    }

    fn script(&self, id: &VehicleId) -> Option<&VehicleScript> {
        self.scenario
            .vehicles
            .iter()
            .find(|v| v.id == *id && v.alive_at(self.tick))
    }
}

impl TelemetrySource for ScriptedSource {
    fn active_vehicles(&self) -> Vec<VehicleId> {
        self.scenario
            .vehicles
            .iter()
            .filter(|v| v.alive_at(self.tick))
            .map(|v| v.id.clone())
            .collect()
    }

    fn position_of(&self, id: &VehicleId) -> Option<Position> {
        self.script(id).map(|v| {
            let (x, y) = v.position_at(self.tick);
            Position::new(x, y)
        })
    }

    fn speed_of(&self, id: &VehicleId) -> Option<f64> {
        self.script(id).map(|v| v.speed_at(self.tick))
    }
}
