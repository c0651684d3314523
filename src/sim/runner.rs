use nalgebra::Vector3;
use tracing::info;

use crate::nav::Autopilot;
use super::event::{default_detectors, EventKind, SimEvent};
use super::ship::SimShip;

// ---------------------------------------------------------------------------
// Run configuration and samples
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub dt: f64,                // s, one control tick per step
    pub max_time: f64,          // s
    pub sample_interval: usize, // steps between recorded samples
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            dt: 1.0 / 60.0,    // 60 Hz control loop
            max_time: 900.0,   // 15 min
            sample_interval: 6,
        }
    }
}

/// Ship telemetry at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub time: f64,
    pub pos: Vector3<f64>,
    pub vel: Vector3<f64>,
    pub forward: Vector3<f64>,
    pub thrust: Vector3<f64>, // N, commanded, world
    pub activity: String,     // active controllers and phases
    pub connected: bool,
    pub cargo: f64,
}

impl Sample {
    pub fn capture(ship: &SimShip, autopilot: &Autopilot) -> Self {
        Self {
            time: ship.state.time,
            pos: ship.state.pos,
            vel: ship.state.vel,
            forward: ship.state.forward(),
            thrust: ship.actuators.net_force(),
            activity: activity(autopilot),
            connected: ship.connector.connected,
            cargo: ship.cargo,
        }
    }

    pub fn speed(&self) -> f64 {
        self.vel.norm()
    }
}

/// "Cruise Accelerating, Arrival" style summary of what is running.
pub fn activity(autopilot: &Autopilot) -> String {
    autopilot
        .active()
        .into_iter()
        .map(|name| {
            let phase = match name {
                "Cruise" => autopilot.cruiser().phase().map(|p| format!("{:?}", p)),
                "Transit" => autopilot.shuttle().phase().map(|p| format!("{:?}", p)),
                _ => None,
            };
            match phase {
                Some(p) => format!("{} {}", name, p),
                None => name.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone)]
pub struct RunResult {
    pub samples: Vec<Sample>,
    pub events: Vec<SimEvent>,
    /// Commands dispatched during the run, in order.
    pub dispatched: Vec<String>,
    /// True when the autopilot went idle before the time limit.
    pub finished: bool,
    /// Autopilot checkpoint at the end of the run.
    pub checkpoint: String,
}

impl RunResult {
    pub fn duration(&self) -> f64 {
        self.samples.last().map(|s| s.time).unwrap_or(0.0)
            - self.samples.first().map(|s| s.time).unwrap_or(0.0)
    }
}

// ---------------------------------------------------------------------------
// Closed-loop run
// ---------------------------------------------------------------------------

/// Tick `autopilot` against `ship` until it goes idle or `max_time` passes.
pub fn run(ship: &mut SimShip, autopilot: &mut Autopilot, config: &RunConfig) -> RunResult {
    let mut detectors = default_detectors();
    let interval = config.sample_interval.max(1);
    let log_start = ship.log.len();

    let mut prev = Sample::capture(ship, autopilot);
    let mut samples = vec![prev.clone()];
    let mut events = Vec::new();
    let mut steps = 0_usize;

    info!("run: starting with {}", prev.activity);

    while ship.state.time < config.max_time && !autopilot.is_idle() {
        let before = ship.log.len();
        autopilot.tick(&mut ship.vessel());
        for command in &ship.log[before..] {
            events.push(SimEvent { time: ship.state.time, kind: EventKind::Dispatched(command.clone()) });
        }

        ship.step(config.dt);
        steps += 1;

        let current = Sample::capture(ship, autopilot);
        for d in detectors.iter_mut() {
            if let Some(kind) = d.check(&prev, &current) {
                events.push(SimEvent { time: current.time, kind });
            }
        }
        if steps % interval == 0 || autopilot.is_idle() {
            samples.push(current.clone());
        }
        prev = current;
    }

    let finished = autopilot.is_idle();
    info!(
        "run: {} after {:.1} s ({} steps)",
        if finished { "finished" } else { "timed out" },
        ship.state.time,
        steps
    );

    RunResult {
        samples,
        events,
        dispatched: ship.log[log_start..].to_vec(),
        finished,
        checkpoint: autopilot.save(),
    }
}
