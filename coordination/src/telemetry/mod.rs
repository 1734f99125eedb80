//! Telemetry adapter seam.
//!
//! The core never computes motion itself; an external source reports which
//! vehicles exist and where they are, once per tick. [`TelemetrySnapshot`]
//! is the validated, immutable per-tick view both subsystems consume —
//! capturing it up front means a contract violation aborts the tick before
//! any registry has been touched.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Vehicle identifier as reported by the motion source.
pub type VehicleId = String;

/// Error type for telemetry contract violations.
///
/// These are fatal preconditions: the motion source promised finite
/// coordinates and speeds, and the core does not recover from a broken
/// promise.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("non-finite position ({x}, {y}) reported for vehicle {vehicle}")]
    NonFinitePosition { vehicle: VehicleId, x: f64, y: f64 },

    #[error("non-finite speed {speed} reported for vehicle {vehicle}")]
    NonFiniteSpeed { vehicle: VehicleId, speed: f64 },

    #[error("vehicle {vehicle} listed as active but has no position fix")]
    MissingFix { vehicle: VehicleId },
}

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// A 2-D position in the motion source's coordinate frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another position.
    pub fn distance_to(&self, other: &Position) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Position and speed of one vehicle at one tick.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VehicleFix {
    pub position: Position,
    pub speed: f64,
}

/// Contract the external motion source must fulfil.
///
/// Queried exactly once per tick, before any core computation. A vehicle
/// absent from `active_vehicles` has departed; that is a removal trigger,
/// never an error.
pub trait TelemetrySource {
    /// Identifiers of all vehicles currently live in the motion source.
    fn active_vehicles(&self) -> Vec<VehicleId>;

    /// Current position of a vehicle, if it is live.
    fn position_of(&self, id: &VehicleId) -> Option<Position>;

    /// Current scalar speed of a vehicle, if it is live.
    fn speed_of(&self, id: &VehicleId) -> Option<f64>;
}

/// Immutable per-tick view of every live vehicle.
///
/// Backed by a `BTreeMap`, so iteration is always in lexical id order —
/// that ordering is the deterministic tie-break used by the cluster
/// election and the flood receiver scan.
#[derive(Debug, Clone, Default)]
pub struct TelemetrySnapshot {
    fixes: BTreeMap<VehicleId, VehicleFix>,
}

impl TelemetrySnapshot {
    /// Query the source once and validate every reported value.
    ///
    /// Fails on the first non-finite position component or speed without
    /// returning a partial snapshot.
    pub fn capture(source: &dyn TelemetrySource) -> TelemetryResult<Self> {
        let mut fixes = BTreeMap::new();
        for id in source.active_vehicles() {
            let position = source
                .position_of(&id)
                .ok_or_else(|| TelemetryError::MissingFix {
                    vehicle: id.clone(),
                })?;
            let speed = source
                .speed_of(&id)
                .ok_or_else(|| TelemetryError::MissingFix {
                    vehicle: id.clone(),
                })?;

            if !position.x.is_finite() || !position.y.is_finite() {
                return Err(TelemetryError::NonFinitePosition {
                    vehicle: id,
                    x: position.x,
                    y: position.y,
                });
            }
            if !speed.is_finite() {
                return Err(TelemetryError::NonFiniteSpeed { vehicle: id, speed });
            }

            fixes.insert(id, VehicleFix { position, speed });
        }
        Ok(Self { fixes })
    }

    /// Build a snapshot directly from fixes. Intended for tests and for
    /// sources that already hold validated state.
    pub fn from_fixes(fixes: BTreeMap<VehicleId, VehicleFix>) -> Self {
        Self { fixes }
    }

    pub fn contains(&self, id: &VehicleId) -> bool {
        self.fixes.contains_key(id)
    }

    pub fn fix(&self, id: &VehicleId) -> Option<&VehicleFix> {
        self.fixes.get(id)
    }

    /// Fixes in lexical id order.
    pub fn iter(&self) -> impl Iterator<Item = (&VehicleId, &VehicleFix)> {
        self.fixes.iter()
    }

    pub fn len(&self) -> usize {
        self.fixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixes.is_empty()
    }
}
