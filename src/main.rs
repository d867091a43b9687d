use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use lvdc_sim::io::{self, FlightSummary};
use lvdc_sim::sequencer::CommandTable;
use lvdc_sim::sim::{self, FaultPlan, RunConfig, SimVehicle};
use lvdc_sim::sink::TracingSink;
use lvdc_sim::state;
use lvdc_sim::timebase::{GuidanceComputer, Timebase};
use lvdc_sim::vehicle::{Mission, VehicleConfig, VehicleKind};

#[derive(Parser, Debug)]
#[command(name = "lvdc-sim")]
#[command(about = "Launch-vehicle guidance computer simulation")]
#[command(version)]
struct Args {
    /// Vehicle preset
    #[arg(short, long, default_value = "saturn-ib")]
    vehicle: VehicleKind,

    /// Vehicle configuration JSON (overrides the preset)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Switch-selector command table (defaults to the configured one)
    #[arg(short, long)]
    table: Option<PathBuf>,

    // ── Run ──────────────────────────────────────────────────
    /// Host tick, s
    #[arg(long, default_value_t = 0.1)]
    dt: f64,

    /// Maximum host time, s
    #[arg(long, default_value_t = 12_000.0)]
    duration: f64,

    /// Host time of guidance reference release, s
    #[arg(long, default_value_t = 10.0)]
    grr: f64,

    /// Trajectory sample interval, s
    #[arg(long, default_value_t = 1.0)]
    record_interval: f64,

    /// Stop when this timebase is entered (e.g. TB4)
    #[arg(long)]
    stop_at: Option<Timebase>,

    // ── Faults ───────────────────────────────────────────────
    /// Host time of a single engine failure on the flying stage
    #[arg(long)]
    engine_out_at: Option<f64>,

    /// Host time the attitude reference is lost
    #[arg(long)]
    reference_loss_at: Option<f64>,

    // ── State and output ─────────────────────────────────────
    /// Resume guidance from a saved state file
    #[arg(long)]
    resume: Option<PathBuf>,

    /// Save guidance state at the end of the run
    #[arg(long)]
    save_state: Option<PathBuf>,

    /// Trajectory CSV output
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Mission summary JSON output
    #[arg(long)]
    json: Option<PathBuf>,

    /// Print the vehicle configuration as JSON and exit
    #[arg(long)]
    dump_config: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => VehicleConfig::load_json(path)
            .with_context(|| format!("loading vehicle configuration {}", path.display()))?,
        None => VehicleConfig::preset(args.vehicle),
    };
    if args.dump_config {
        println!("{}", config.to_json().context("serializing configuration")?);
        return Ok(());
    }

    let table = match &args.table {
        Some(path) => CommandTable::load(path),
        None => CommandTable::named(&config.command_table),
    }
    .context("loading command table")?;
    tracing::info!(vehicle = %config.name, commands = table.len(), "configuration loaded");

    let run = RunConfig {
        dt: args.dt,
        max_time: args.duration,
        record_interval: args.record_interval,
        grr_time: args.grr,
        faults: FaultPlan {
            engine_out_at: args.engine_out_at,
            reference_loss_at: args.reference_loss_at,
        },
        stop_at: args.stop_at,
    };

    let frame = config.launch;
    let name = config.name.clone();
    let (computer, mut vehicle) = match &args.resume {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading guidance state {}", path.display()))?;
            let restored = state::deserialize_onto(&text, state::GuidanceState::new(&config));
            tracing::info!(phase = %restored.phase, mission_time = restored.mission_time, "resuming");
            let mut vehicle = SimVehicle::resume(Mission::preset(config.kind), &frame, &restored, run.grr_time);
            vehicle.faults = run.faults;
            (GuidanceComputer::restore(config, table, restored)?, vehicle)
        }
        None => {
            let vehicle = sim::launch_vehicle(&config, &run);
            (GuidanceComputer::new(config, table)?, vehicle)
        }
    };
    let mut computer = computer.with_sink(TracingSink);

    let record = sim::fly(&mut computer, &mut vehicle, &run);
    let summary = FlightSummary::from_record(&name, &record, &frame);

    if let Some(path) = &args.save_state {
        std::fs::write(path, computer.save())
            .with_context(|| format!("writing guidance state {}", path.display()))?;
    }
    if let Some(path) = &args.csv {
        io::write_trajectory_file(path, &record.samples)
            .with_context(|| format!("writing trajectory {}", path.display()))?;
    }
    if let Some(path) = &args.json {
        io::write_summary_file(path, &summary)
            .with_context(|| format!("writing summary {}", path.display()))?;
    }

    print_summary(&summary);
    Ok(())
}

fn print_summary(s: &FlightSummary) {
    println!();
    println!("====================================================================");
    println!("  GUIDANCE SIMULATION - {}", s.vehicle);
    println!("====================================================================");
    println!();
    println!("  Events");
    println!("  ──────────────────────────────────────────────────────────────────");
    for e in &s.events {
        println!("  t={:>8.1}s   {}", e.time, e.event);
    }
    println!();
    println!("  Result");
    println!("  ──────────────────────────────────────────────────────────────────");
    println!("  Final phase:   {:>8}     Flight time:  {:>8.1} s", s.final_phase, s.flight_time_s);
    println!(
        "  Max altitude:  {:>8.1} km  Max speed:    {:>8.1} m/s",
        s.max_altitude_m / 1000.0,
        s.max_speed_ms
    );
    println!("  Max nav error: {:>8.1} m", s.max_nav_error_m);
    if s.reference_failure {
        println!("  Guidance reference failure latched");
    }
    if s.impact {
        println!("  Vehicle impacted");
    }
    if let Some(orbit) = &s.orbit {
        println!();
        println!("  Orbit");
        println!("  ──────────────────────────────────────────────────────────────────");
        let apogee = orbit.apogee_km.map_or("open".to_string(), |a| format!("{a:.1} km"));
        println!("  Perigee:       {:>8.1} km  Apogee:       {:>11}", orbit.perigee_km, apogee);
        println!(
            "  Eccentricity:  {:>8.5}     Inclination:  {:>8.3} deg",
            orbit.eccentricity, orbit.inclination_deg
        );
        if let Some(period) = orbit.period_min {
            println!("  Period:        {:>8.1} min", period);
        }
        println!("  C3:            {:>8.2} km^2/s^2", orbit.c3_km2s2);
    }
    println!("====================================================================");
    println!();
}
