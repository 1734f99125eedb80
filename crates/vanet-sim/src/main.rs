//! Scripted-telemetry harness for the V2V coordination core.
//!
//! Plays back a scenario (TOML file or the built-in demo) through the
//! fixed-tick loop: capture telemetry, update both subsystems, append the
//! two CSV event streams. Random road hazards can be injected with a
//! seeded RNG for reproducible runs.
//!
//! ```bash
//! vanet-sim --ticks 60
//! vanet-sim --scenario convoy.toml --hazard-rate 0.01 --seed 7
//! ```

mod scenario;
mod source;

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use vanet_coordination::{
    AlertType, CoordinationConfig, CoordinationSystem, CsvLogSink, EventSink,
};

use crate::scenario::Scenario;
use crate::source::ScriptedSource;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Scenario TOML file; the built-in demo runs when omitted
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Maximum number of ticks to simulate
    #[arg(long, default_value_t = 120)]
    ticks: u64,

    /// Directory for the CSV event logs
    #[arg(long, default_value = ".")]
    log_dir: PathBuf,

    /// Per-tick probability of injecting a random hazard alert
    #[arg(long, default_value_t = 0.0)]
    hazard_rate: f64,

    /// RNG seed for hazard injection
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Log a cluster status summary every N ticks (0 disables)
    #[arg(long, default_value_t = 10)]
    status_every: u64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    let scenario = match &args.scenario {
        Some(path) => Scenario::load(path)?,
        None => Scenario::built_in(),
    };

    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let cluster_path = args.log_dir.join(format!("cluster_log_{}.csv", stamp));
    let alert_path = args.log_dir.join(format!("v2v_log_{}.csv", stamp));
    let mut sink = CsvLogSink::create(&cluster_path, &alert_path)
        .with_context(|| format!("creating logs under {}", args.log_dir.display()))?;

    info!(
        vehicles = scenario.vehicles.len(),
        cluster_log = %cluster_path.display(),
        alert_log = %alert_path.display(),
        "simulation starting"
    );

    let mut system = CoordinationSystem::new(CoordinationConfig::from_env());
    let mut source = ScriptedSource::new(scenario);
    let mut rng = StdRng::seed_from_u64(args.seed);
    let mut registered: HashSet<String> = HashSet::new();

    for tick in 0..args.ticks {
        if !source.has_pending_vehicles() {
            info!(tick, "all scripted vehicles gone, stopping early");
            break;
        }

        // Emergency vehicles join the coordinator the first tick they show up.
        for script in source.live_emergencies() {
            if registered.insert(script.id.clone()) {
                system.register_emergency(&script.id, script.priority, &mut sink)?;
            }
        }

        let report = system.tick(&source, &mut sink)?;

        maybe_inject_hazard(&mut system, &source, &mut sink, &mut rng, args.hazard_rate)?;

        if args.status_every > 0 && tick > 0 && tick % args.status_every == 0 {
            log_cluster_status(&system, report.time);
        }

        source.advance();
    }

    sink.flush()?;
    info!(
        ticks = system.ticks_completed(),
        cluster_log = %cluster_path.display(),
        alert_log = %alert_path.display(),
        "simulation complete"
    );
    Ok(())
}

/// With probability `rate`, pick a random live vehicle and inject a random
/// hazard alert at it.
fn maybe_inject_hazard(
    system: &mut CoordinationSystem,
    source: &ScriptedSource,
    sink: &mut dyn EventSink,
    rng: &mut StdRng,
    rate: f64,
) -> Result<()> {
    use vanet_coordination::telemetry::TelemetrySource;

    if rate <= 0.0 || rng.gen::<f64>() >= rate {
        return Ok(());
    }
    let vehicles = source.active_vehicles();
    if vehicles.is_empty() {
        return Ok(());
    }
    let vehicle = &vehicles[rng.gen_range(0..vehicles.len())];
    let alert_type = if rng.gen_bool(0.5) {
        AlertType::RoadHazard
    } else {
        AlertType::Accident
    };
    info!(vehicle = %vehicle, alert = %alert_type, "injecting hazard");
    system.inject_alert(vehicle, alert_type, sink)?;
    Ok(())
}

/// Periodic cluster summary, mirroring the operator console output.
fn log_cluster_status(system: &CoordinationSystem, time: f64) {
    let coordinator = system.coordinator();
    info!(
        time,
        emergencies = coordinator.emergencies().len(),
        vehicles = coordinator.vehicles().len(),
        clusters = coordinator.clusters().len(),
        "cluster status"
    );
    for (cluster_id, cluster) in coordinator.clusters() {
        info!(
            cluster = %cluster_id,
            emergency = %cluster.emergency_id,
            leader = %cluster.leader,
            members = cluster.size,
            "  cluster"
        );
    }
}
