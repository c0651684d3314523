use nalgebra::Vector3;
use tracing::{debug, info, warn};

use crate::checkpoint::{Checkpoint, FieldWriter, Fields};
use crate::config::{AlignConfig, DockingConfig, TransitConfig};
use crate::error::{NavError, Result};
use crate::hw::{Actuators, Pose, Vessel};
use super::align::{steer, AlignTarget};
use super::approach::{ApproachState, WaypointFollower};
use super::completion_token;
use super::controller::Controller;
use super::kinematics::{direction_to, format_distance, level_up};

// ---------------------------------------------------------------------------
// Route description
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitPhase {
    Undocking = 0,
    Separating = 1,
    Accelerating = 2,
    Decelerating = 3,
    Docking = 4,
    Exchanging = 5,
}

impl TransitPhase {
    pub fn from_index(i: u32) -> Self {
        match i {
            1 => TransitPhase::Separating,
            2 => TransitPhase::Accelerating,
            3 => TransitPhase::Decelerating,
            4 => TransitPhase::Docking,
            5 => TransitPhase::Exchanging,
            _ => TransitPhase::Undocking,
        }
    }
}

/// What to do with the cargo once docked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeTask {
    None = 0,
    Load = 1,
    Unload = 2,
}

impl ExchangeTask {
    pub fn from_index(i: u32) -> Self {
        match i {
            1 => ExchangeTask::Load,
            2 => ExchangeTask::Unload,
            _ => ExchangeTask::None,
        }
    }
}

/// The connector at the far end: its approach path and docking frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangePoint {
    pub waypoints: Vec<Vector3<f64>>,
    pub forward: Vector3<f64>,
    pub up: Vector3<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransitState {
    pub phase: TransitPhase,
    pub landing: bool,
    pub task: ExchangeTask,
    pub route: Vec<Vector3<f64>>,
    pub index: usize,
    pub exchange: ExchangePoint,
    pub separation_start: Option<f64>, // wall clock, s
    pub docking: Option<ApproachState>,
    pub next_transit: Option<String>,
    pub poll_ticks: u32,
}

impl TransitState {
    fn transition(&mut self, next: TransitPhase) {
        if self.phase != next {
            info!("transit: {:?} -> {:?}", self.phase, next);
            self.phase = next;
        }
    }

    /// Push `force` (N, world) while holding the agent's weight in any
    /// gravity field.
    fn thrust(&self, force: &Vector3<f64>, pose: &Pose, actuators: &mut Actuators) {
        actuators.apply_thrust_compensated(force, &pose.gravity, pose.mass);
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Connector-to-connector shuttle: undock, back off, fly the route, brake,
/// dock through an embedded waypoint follower and exchange cargo. Completion
/// dispatches the command that starts the next transit.
#[derive(Debug, Clone)]
pub struct AtmosphericTransitController {
    config: TransitConfig,
    align: AlignConfig,
    follower: WaypointFollower,
    state: Option<TransitState>,
    detail: Option<String>,
}

impl AtmosphericTransitController {
    pub fn new(config: TransitConfig, docking: DockingConfig, align: &AlignConfig) -> Self {
        Self {
            config,
            align: align.clone(),
            follower: WaypointFollower::new(docking, align),
            state: None,
            detail: None,
        }
    }

    /// Start a transit from the current connector. `landing` holds the
    /// ship's up against gravity while flying the route.
    pub fn initialize(
        &mut self,
        route: Vec<Vector3<f64>>,
        exchange: ExchangePoint,
        task: ExchangeTask,
        landing: bool,
        next_transit: Option<&str>,
    ) {
        match self.validate(&route, &exchange) {
            Ok(()) => {
                info!(
                    "transit: {} route waypoints, {} approach waypoints, {:?}{}",
                    route.len(),
                    exchange.waypoints.len(),
                    task,
                    if landing { ", landing" } else { "" }
                );
                self.state = Some(TransitState {
                    phase: TransitPhase::Undocking,
                    landing,
                    task,
                    route,
                    index: 0,
                    exchange,
                    separation_start: None,
                    docking: None,
                    next_transit: completion_token(next_transit),
                    poll_ticks: 0,
                });
            }
            Err(e) => {
                warn!("transit: ignoring task: {}", e);
                self.state = None;
            }
        }
        self.follower.take();
        self.detail = None;
    }

    fn validate(&self, route: &[Vector3<f64>], exchange: &ExchangePoint) -> Result<()> {
        if exchange.waypoints.is_empty() {
            return Err(NavError::Geometry("exchange point has no approach waypoints".into()));
        }
        if route
            .iter()
            .chain(&exchange.waypoints)
            .any(|w| w.iter().any(|c| !c.is_finite()))
        {
            return Err(NavError::Geometry("non-finite transit waypoint".into()));
        }
        AlignTarget::new(exchange.forward, exchange.up, self.align.tolerance).map(|_| ())
    }

    pub fn state(&self) -> Option<&TransitState> {
        self.state.as_ref()
    }

    pub fn restore(&mut self, state: Option<TransitState>) {
        self.state = state;
        self.follower.take();
        self.detail = None;
    }

    pub fn phase(&self) -> Option<TransitPhase> {
        self.state.as_ref().map(|s| s.phase)
    }

    fn docking_target(&self, exchange: &ExchangePoint) -> AlignTarget {
        AlignTarget::new(exchange.forward, exchange.up, self.align.tolerance).unwrap_or(AlignTarget {
            forward: -Vector3::z(),
            up: Vector3::y(),
            tolerance: self.align.tolerance,
        })
    }
}

impl Controller for AtmosphericTransitController {
    fn tick(&mut self, vessel: &mut Vessel<'_>) {
        let Some(mut state) = self.state.take() else {
            return;
        };
        let cfg = &self.config;
        let pose = vessel.pose.clone();
        vessel.actuators.set_dampeners(true);

        match state.phase {
            TransitPhase::Undocking => {
                if !vessel.connector.is_connected() {
                    state.separation_start = Some(vessel.now);
                    state.transition(TransitPhase::Separating);
                }
                self.detail = None;
            }

            TransitPhase::Separating => {
                let start = *state.separation_start.get_or_insert(vessel.now);
                let force = (-pose.forward * cfg.separation_speed - pose.velocity) * pose.mass * cfg.gain;
                state.thrust(&force, &pose, vessel.actuators);
                if vessel.now - start >= cfg.separation_duration {
                    state.separation_start = None;
                    state.transition(TransitPhase::Accelerating);
                }
            }

            TransitPhase::Accelerating => match state.route.get(state.index).copied() {
                None => state.transition(TransitPhase::Decelerating),
                Some(waypoint) => {
                    let distance = pose.distance_to(&waypoint);
                    self.detail = Some(format!("{} to waypoint {}", format_distance(distance), state.index + 1));
                    if distance < cfg.braking_distance {
                        state.index += 1;
                        if state.index >= state.route.len() {
                            state.transition(TransitPhase::Decelerating);
                        } else {
                            debug!("transit: waypoint {}/{} passed", state.index, state.route.len());
                        }
                    } else {
                        let direction = direction_to(&pose.position, &waypoint);
                        let up_hint = if state.landing { -pose.gravity } else { pose.up };
                        let target = AlignTarget {
                            forward: direction,
                            up: level_up(&direction, &up_hint),
                            tolerance: cfg.course_tolerance,
                        };
                        steer(&target, &pose, vessel.actuators, self.align.angular_rate);
                        let force = (direction * cfg.max_speed - pose.velocity) * pose.mass * cfg.gain;
                        state.thrust(&force, &pose, vessel.actuators);
                    }
                }
            },

            TransitPhase::Decelerating => {
                vessel.actuators.reset_gyros();
                let force = -pose.velocity * pose.mass * cfg.gain;
                state.thrust(&force, &pose, vessel.actuators);
                if pose.speed() <= cfg.stop_speed {
                    let target = self.docking_target(&state.exchange);
                    self.follower
                        .initialize(state.exchange.waypoints.clone(), target, None, None);
                    state.docking = self.follower.take();
                    state.transition(TransitPhase::Docking);
                }
            }

            TransitPhase::Docking => {
                if vessel.connector.is_connected() {
                    vessel.actuators.reset();
                    state.docking = None;
                    state.poll_ticks = 0;
                    state.transition(TransitPhase::Exchanging);
                } else if state.docking.is_some() {
                    self.follower.restore(state.docking.take());
                    self.follower.tick(vessel);
                    self.detail = self.follower.status();
                    state.docking = self.follower.take();
                } else {
                    // approach exhausted without a lock
                    vessel.actuators.reset_gyros();
                    let force = -pose.velocity * pose.mass * cfg.gain;
                    vessel
                        .actuators
                        .apply_thrust_compensated(&force, &pose.gravity, pose.mass);
                    self.detail = Some("Waiting for connector".to_string());
                }
            }

            TransitPhase::Exchanging => {
                let due = state.poll_ticks % cfg.exchange_interval.max(1) == 0;
                state.poll_ticks = state.poll_ticks.wrapping_add(1);
                if due {
                    let fraction = vessel.cargo.capacity_fraction();
                    self.detail = Some(format!("cargo {:.0}%", fraction * 100.0));
                    let done = match state.task {
                        ExchangeTask::Load => fraction >= cfg.max_load,
                        ExchangeTask::Unload => fraction <= cfg.min_load,
                        ExchangeTask::None => true,
                    };
                    if done {
                        info!("transit: exchange finished at {:.0}% cargo", fraction * 100.0);
                        self.detail = None;
                        vessel.complete(state.next_transit.take());
                        return;
                    }
                }
            }
        }
        self.state = Some(state);
    }

    fn clear(&mut self, actuators: &mut Actuators) {
        if self.state.take().is_some() {
            actuators.reset();
        }
        self.follower.take();
        self.detail = None;
    }

    fn has_target(&self) -> bool {
        self.state.is_some()
    }

    fn status(&self) -> Option<String> {
        let state = self.state.as_ref()?;
        Some(match &self.detail {
            Some(d) => format!("Transit {:?}: {}", state.phase, d),
            None => format!("Transit {:?}", state.phase),
        })
    }

    fn name(&self) -> &str {
        "Transit"
    }
}

// ---------------------------------------------------------------------------
// Checkpoint
// ---------------------------------------------------------------------------

impl Checkpoint for Option<TransitState> {
    fn save(&self) -> String {
        let Some(s) = self else {
            return String::new();
        };
        let docking = s.docking.as_ref().map(|d| Some(d.clone()).save());
        FieldWriter::new()
            .num("phase", s.phase as u32)
            .flag("landing", s.landing)
            .num("task", s.task as u32)
            .vectors("route", &s.route)
            .num("index", s.index)
            .vectors("approach", &s.exchange.waypoints)
            .vector("forward", &s.exchange.forward)
            .vector("up", &s.exchange.up)
            .opt_num("separation", s.separation_start)
            .num("poll_ticks", s.poll_ticks)
            .text("docking", docking.as_deref())
            .text("next", s.next_transit.as_deref())
            .finish()
    }

    fn load(value: &str) -> Self {
        let f = Fields::parse(value);
        if !f.has("phase") {
            return None;
        }
        let route = f.vectors("route");
        Some(TransitState {
            phase: TransitPhase::from_index(f.u32("phase")),
            landing: f.flag("landing"),
            task: ExchangeTask::from_index(f.u32("task")),
            index: f.usize("index").min(route.len()),
            route,
            exchange: ExchangePoint {
                waypoints: f.vectors("approach"),
                forward: f.vector("forward"),
                up: f.vector("up"),
            },
            separation_start: f.opt_f64("separation"),
            docking: f.text("docking").and_then(|d| Option::<ApproachState>::load(&d)),
            next_transit: f.text("next"),
            poll_ticks: f.u32("poll_ticks"),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
