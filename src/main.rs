//! ship-nav demo: runs a preset scenario in the simulator and prints a report.
//!
//! Usage: ship-nav [dock|cruise|transit] [--config FILE] [--preset ship|rogue|navigator]
//!                 [--csv FILE] [--json FILE] [--checkpoint FILE]

use std::path::Path;

use tracing::{info, warn};
use tracing_subscriber::filter::ParseError;

use ship_nav::io::{write_summary_file, write_trajectory_file, RunSummary};
use ship_nav::sim::{presets, run, EventKind, RunConfig};
use ship_nav::{NavConfig, NavError, Result};

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn main() -> Result<()> {
    // Initialize logging
    let directive = "ship_nav=info"
        .parse()
        .map_err(|e: ParseError| NavError::Config(e.to_string()))?;
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(directive))
        .init();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();
    let scenario_name = match args.get(1) {
        Some(a) if !a.starts_with("--") => a.as_str(),
        _ => "cruise",
    };

    let config = if let Some(path) = arg_value(&args, "--config") {
        info!("Loading configuration from {:?}", path);
        NavConfig::load(Path::new(path))?
    } else if let Some(name) = arg_value(&args, "--preset") {
        info!("Using preset {:?}", name);
        NavConfig::preset(name).ok_or_else(|| NavError::Config(format!("unknown preset {:?}", name)))?
    } else if Path::new("ship-nav.toml").exists() {
        info!("Loading configuration from ship-nav.toml");
        NavConfig::load(Path::new("ship-nav.toml"))?
    } else {
        info!("Using default configuration");
        NavConfig::default()
    };

    let Some(mut scenario) = presets::by_name(scenario_name, config) else {
        return Err(NavError::Config(format!(
            "unknown scenario {:?} (expected one of {})",
            scenario_name,
            presets::NAMES.join(", ")
        )));
    };

    // -----------------------------------------------------------------------
    // Run
    // -----------------------------------------------------------------------
    let run_config = RunConfig::default();
    let result = run(&mut scenario.ship, &mut scenario.autopilot, &run_config);
    let summary = RunSummary::from_run(&scenario.name, &result);

    // -----------------------------------------------------------------------
    // Report
    // -----------------------------------------------------------------------
    println!();
    println!("====================================================================");
    println!("  SHIP-NAV SIMULATION: {}", scenario.name);
    println!("====================================================================");
    println!();
    println!("  Outcome");
    println!("  ------------------------------------------------------------------");
    println!(
        "  Finished:      {:>8}       Duration:     {:>8.1} s",
        if summary.finished { "yes" } else { "NO" },
        summary.duration
    );
    println!(
        "  Distance:      {:>8.0} m     Max speed:    {:>8.1} m/s",
        summary.distance_travelled, summary.max_speed
    );
    println!(
        "  Final speed:   {:>8.3} m/s   Connections:  {:>8}",
        summary.final_speed, summary.connections
    );
    println!();

    println!("  Events");
    println!("  ------------------------------------------------------------------");
    for e in &result.events {
        let text = match &e.kind {
            EventKind::Activity { to, .. } if to.is_empty() => "idle".to_string(),
            EventKind::Activity { to, .. } => to.clone(),
            EventKind::Connected => "connector locked".to_string(),
            EventKind::Released => "connector released".to_string(),
            EventKind::Dispatched(cmd) => format!("dispatched {:?}", cmd),
        };
        println!("  t={:>7.1}s   {}", e.time, text);
    }
    println!();

    println!("  Trajectory");
    println!("  ------------------------------------------------------------------");
    println!(
        "  {:>7}  {:>9}  {:>9}  {:>9}  {:>8}  {}",
        "t (s)", "x (m)", "y (m)", "z (m)", "v (m/s)", "activity"
    );
    println!("  {}", "-".repeat(66));
    let sample_interval = (result.samples.len() / 30).max(1);
    for (i, s) in result.samples.iter().enumerate() {
        if i % sample_interval != 0 && i + 1 != result.samples.len() {
            continue;
        }
        println!(
            "  {:>7.1}  {:>9.1}  {:>9.1}  {:>9.1}  {:>8.2}  {}",
            s.time, s.pos.x, s.pos.y, s.pos.z, s.speed(), s.activity
        );
    }
    println!();
    println!("  Simulation: {} samples, dt={:.4} s", result.samples.len(), run_config.dt);
    println!("====================================================================");
    println!();

    if !summary.finished {
        warn!("scenario did not finish within {:.0} s", run_config.max_time);
    }

    // -----------------------------------------------------------------------
    // Exports
    // -----------------------------------------------------------------------
    if let Some(path) = arg_value(&args, "--csv") {
        write_trajectory_file(path, &result.samples)?;
        info!("Trajectory written to {}", path);
    }
    if let Some(path) = arg_value(&args, "--json") {
        write_summary_file(path, &summary)?;
        info!("Summary written to {}", path);
    }
    if let Some(path) = arg_value(&args, "--checkpoint") {
        std::fs::write(path, &result.checkpoint)?;
        info!("Checkpoint written to {}", path);
    }

    Ok(())
}
