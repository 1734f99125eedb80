//! Scripted scenario definitions.
//!
//! A scenario describes every vehicle the motion source will report:
//! starting position, a per-tick velocity vector, an initial speed, timed
//! speed overrides (to script decelerations), and an optional lifetime
//! window. Scenarios are loaded from TOML or taken from a compiled-in
//! default.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// A timed speed change, applied from the given tick onward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeedOverride {
    pub tick: u64,
    pub speed: f64,
}

/// One scripted vehicle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleScript {
    pub id: String,
    /// Registered as an emergency vehicle on first sighting.
    #[serde(default)]
    pub emergency: bool,
    /// Priority level for emergency vehicles.
    #[serde(default = "default_priority")]
    pub priority: u8,
    pub x: f64,
    pub y: f64,
    /// Displacement applied per tick.
    #[serde(default)]
    pub vx: f64,
    #[serde(default)]
    pub vy: f64,
    /// Reported scalar speed at tick 0.
    pub speed: f64,
    /// First tick at which the vehicle appears.
    #[serde(default)]
    pub depart: u64,
    /// Tick at which the vehicle leaves the simulation, if any.
    #[serde(default)]
    pub remove_at: Option<u64>,
    #[serde(default)]
    pub speed_overrides: Vec<SpeedOverride>,
}

fn default_priority() -> u8 {
    1
}

impl VehicleScript {
    /// Whether the vehicle is live at the given tick.
    pub fn alive_at(&self, tick: u64) -> bool {
        tick >= self.depart && self.remove_at.map_or(true, |end| tick < end)
    }

    /// Reported speed at the given tick: the latest override at or before
    /// it, else the initial speed.
    pub fn speed_at(&self, tick: u64) -> f64 {
        self.speed_overrides
            .iter()
            .filter(|o| o.tick <= tick)
            .max_by_key(|o| o.tick)
            .map(|o| o.speed)
            .unwrap_or(self.speed)
    }

    /// Position at the given tick, advanced linearly from departure.
    pub fn position_at(&self, tick: u64) -> (f64, f64) {
        let elapsed = tick.saturating_sub(self.depart) as f64;
        (self.x + self.vx * elapsed, self.y + self.vy * elapsed)
    }
}

/// A full scripted run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default, rename = "vehicle")]
    pub vehicles: Vec<VehicleScript>,
}

impl Scenario {
    /// Load a scenario from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        let scenario: Scenario = toml::from_str(&text)
            .with_context(|| format!("parsing scenario {}", path.display()))?;
        Ok(scenario)
    }

    /// Built-in demo: one ambulance crossing a small platoon, with one car
    /// scripted to brake-check at tick 12.
    pub fn built_in() -> Self {
        let car = |id: &str, x: f64, y: f64| VehicleScript {
            id: id.into(),
            emergency: false,
            priority: 1,
            x,
            y,
            vx: 14.0,
            vy: 0.0,
            speed: 15.0,
            depart: 0,
            remove_at: None,
            speed_overrides: Vec::new(),
        };

        let mut braker = car("car_04", 120.0, 10.0);
        braker.speed_overrides = vec![
            SpeedOverride {
                tick: 12,
                speed: 4.0,
            },
            SpeedOverride {
                tick: 16,
                speed: 15.0,
            },
        ];

        Scenario {
            vehicles: vec![
                VehicleScript {
                    id: "ambulance_1".into(),
                    emergency: true,
                    priority: 1,
                    x: 0.0,
                    y: 0.0,
                    vx: 20.0,
                    vy: 0.0,
                    speed: 20.0,
                    depart: 0,
                    remove_at: None,
                    speed_overrides: Vec::new(),
                },
                car("car_01", 40.0, 5.0),
                car("car_02", 70.0, -5.0),
                car("car_03", 100.0, 5.0),
                braker,
                car("car_05", 160.0, -10.0),
                car("car_06", 220.0, 0.0),
            ],
        }
    }
}
