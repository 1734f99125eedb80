//! Tunable parameters for both coordination subsystems.
//!
//! Defaults match the deployed protocol constants; each field can be
//! overridden through a `VANET_*` environment variable for experiments.

use serde::{Deserialize, Serialize};

/// Protocol constants shared by the cluster coordinator and alert engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinationConfig {
    /// Proximity threshold (inclusive) for cluster membership around an
    /// emergency vehicle, in distance units.
    pub cluster_radius: f64,
    /// Direct delivery range for alert broadcasts between two vehicles.
    pub broadcast_radius: f64,
    /// Maximum number of forwarding relays an alert may traverse.
    pub max_hops: u32,
    /// Speed drop between consecutive ticks that triggers a brake-check alert.
    pub decel_threshold: f64,
    /// Reference cruising speed used in the leadership score.
    pub reference_speed: f64,
    /// Simulated seconds advanced per tick; record timestamps are multiples
    /// of this.
    pub tick_seconds: f64,
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            cluster_radius: 75.0,
            broadcast_radius: 50.0,
            max_hops: 5,
            decel_threshold: 5.0,
            reference_speed: 15.0,
            tick_seconds: 1.0,
        }
    }
}

impl CoordinationConfig {
    /// Build a config from defaults, applying any `VANET_*` overrides.
    ///
    /// Unparseable values fall back to the default rather than erroring;
    /// these knobs are experiment-only and must not brick a run.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(v) = env_f64("VANET_CLUSTER_RADIUS") {
            cfg.cluster_radius = v;
        }
        if let Some(v) = env_f64("VANET_BROADCAST_RADIUS") {
            cfg.broadcast_radius = v;
        }
        if let Some(v) = env_u32("VANET_MAX_HOPS") {
            cfg.max_hops = v;
        }
        if let Some(v) = env_f64("VANET_DECEL_THRESHOLD") {
            cfg.decel_threshold = v;
        }
        if let Some(v) = env_f64("VANET_REFERENCE_SPEED") {
            cfg.reference_speed = v;
        }
        if let Some(v) = env_f64("VANET_TICK_SECONDS") {
            cfg.tick_seconds = v;
        }
        cfg
    }
}

fn env_f64(key: &str) -> Option<f64> {
    std::env::var(key).ok()?.parse().ok()
}

fn env_u32(key: &str) -> Option<u32> {
    std::env::var(key).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_protocol_constants() {
        let cfg = CoordinationConfig::default();
        assert_eq!(cfg.cluster_radius, 75.0);
        assert_eq!(cfg.broadcast_radius, 50.0);
        assert_eq!(cfg.max_hops, 5);
        assert_eq!(cfg.decel_threshold, 5.0);
        assert_eq!(cfg.reference_speed, 15.0);
    }
}
