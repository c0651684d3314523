use nalgebra::Vector3;
use tracing::{debug, info, warn};

use crate::checkpoint::{Checkpoint, FieldWriter, Fields};
use crate::config::{AlignConfig, CruiseConfig};
use crate::error::{NavError, Result};
use crate::hw::{Actuators, Pose, Vessel};
use super::align::{steer, AlignTarget, Alignment};
use super::completion_token;
use super::controller::Controller;
use super::kinematics::{
    angle_between, direction_to, eta_seconds, format_distance, format_eta, level_up, path_length,
    unit_or,
};

// ---------------------------------------------------------------------------
// Phases and snapshots
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CruisePhase {
    Locating = 0,
    Accelerating = 1,
    Cruising = 2,
    Decelerating = 3,
    Avoiding = 4,
}

impl CruisePhase {
    pub fn from_index(i: u32) -> Self {
        match i {
            1 => CruisePhase::Accelerating,
            2 => CruisePhase::Cruising,
            3 => CruisePhase::Decelerating,
            4 => CruisePhase::Avoiding,
            _ => CruisePhase::Locating,
        }
    }
}

/// What the sensor saw when evasion started.
#[derive(Debug, Clone, PartialEq)]
pub struct ObstacleSnapshot {
    pub position: Vector3<f64>,
    pub bounding_radius: f64,
    pub distance: f64,
    pub sensor_up: Vector3<f64>,
    pub sensor_forward: Vector3<f64>,
}

/// The two bypass points around an obstacle: over its top, then past it.
pub fn compute_evasion_waypoints(obstacle: &ObstacleSnapshot, safety_margin: f64) -> [Vector3<f64>; 2] {
    let up = unit_or(&obstacle.sensor_up, Vector3::y());
    let forward = unit_or(&obstacle.sensor_forward, -Vector3::z());
    [
        obstacle.position + up * obstacle.bounding_radius,
        obstacle.position + forward * (obstacle.bounding_radius + safety_margin),
    ]
}

/// A timed course-correction burn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Burn {
    pub start: f64,    // wall clock, s
    pub duration: f64, // s
}

impl Burn {
    pub fn active(&self, now: f64) -> bool {
        now - self.start < self.duration
    }
}

/// Derived trip figures. Recomputed from the route on every call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CruiseProgress {
    pub total: f64,
    pub remaining: f64,
    pub eta: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CruiseState {
    pub phase: CruisePhase,
    pub origin: Vector3<f64>,
    pub waypoints: Vec<Vector3<f64>>,
    pub index: usize,
    pub evasion: Vec<Vector3<f64>>,
    pub burn: Option<Burn>,
    pub obstacle: Option<ObstacleSnapshot>,
    pub token: Option<String>,
    pub scan_ticks: u32,
}

impl CruiseState {
    fn waypoint(&self) -> Vector3<f64> {
        let i = self.index.min(self.waypoints.len().saturating_sub(1));
        self.waypoints.get(i).copied().unwrap_or(self.origin)
    }

    fn is_last_leg(&self) -> bool {
        self.index + 1 >= self.waypoints.len()
    }

    fn transition(&mut self, next: CruisePhase) {
        if self.phase == next {
            return;
        }
        info!("cruise: {:?} -> {:?}", self.phase, next);
        if self.phase == CruisePhase::Avoiding {
            self.obstacle = None;
            self.evasion.clear();
        }
        self.burn = None;
        self.scan_ticks = 0;
        self.phase = next;
    }

    fn enter_avoiding(&mut self, obstacle: Option<ObstacleSnapshot>, safety_margin: f64) {
        match obstacle {
            Some(o) => {
                info!(
                    "cruise: obstacle r={} at {}, evading",
                    format_distance(o.bounding_radius),
                    format_distance(o.distance)
                );
                self.evasion = compute_evasion_waypoints(&o, safety_margin).to_vec();
                self.obstacle = Some(o);
                self.transition(CruisePhase::Avoiding);
            }
            None => {
                warn!("cruise: evasion requested without an obstacle snapshot");
                self.transition(CruisePhase::Decelerating);
            }
        }
    }

    pub fn progress(&self, pose: &Pose) -> CruiseProgress {
        let total = path_length(&self.origin, &self.waypoints);
        let rest = &self.waypoints[self.index.min(self.waypoints.len())..];
        let remaining = path_length(&pose.position, rest);
        CruiseProgress { total, remaining, eta: eta_seconds(remaining, pose.speed()) }
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Long-range cruise: face the target, accelerate, coast with periodic
/// course corrections, brake. Obstacles seen on the way are bypassed via two
/// evasion waypoints.
#[derive(Debug, Clone)]
pub struct CruiseController {
    config: CruiseConfig,
    angular_rate: f64,
    state: Option<CruiseState>,
    last_progress: Option<CruiseProgress>,
}

/// Per-tick inputs shared by the phase handlers.
struct TickCtx<'c> {
    cfg: &'c CruiseConfig,
    angular_rate: f64,
    now: f64,
    pose: Pose,
}

impl CruiseController {
    pub fn new(config: CruiseConfig, align: &AlignConfig) -> Self {
        Self { config, angular_rate: align.angular_rate, state: None, last_progress: None }
    }

    /// Start a cruise from `origin` through `waypoints`.
    /// Malformed geometry leaves the controller idle.
    pub fn initialize(&mut self, origin: Vector3<f64>, waypoints: Vec<Vector3<f64>>, token: Option<&str>) {
        match Self::validate(&origin, &waypoints) {
            Ok(()) => {
                info!(
                    "cruise: {} waypoints, {}",
                    waypoints.len(),
                    format_distance(path_length(&origin, &waypoints))
                );
                self.state = Some(CruiseState {
                    phase: CruisePhase::Locating,
                    origin,
                    waypoints,
                    index: 0,
                    evasion: Vec::new(),
                    burn: None,
                    obstacle: None,
                    token: completion_token(token),
                    scan_ticks: 0,
                });
            }
            Err(e) => {
                warn!("cruise: ignoring task: {}", e);
                self.state = None;
            }
        }
        self.last_progress = None;
    }

    fn validate(origin: &Vector3<f64>, waypoints: &[Vector3<f64>]) -> Result<()> {
        if waypoints.is_empty() {
            return Err(NavError::Geometry("cruise needs at least one waypoint".into()));
        }
        if std::iter::once(origin).chain(waypoints).any(|w| w.iter().any(|c| !c.is_finite())) {
            return Err(NavError::Geometry("non-finite cruise waypoint".into()));
        }
        Ok(())
    }

    pub fn state(&self) -> Option<&CruiseState> {
        self.state.as_ref()
    }

    pub fn restore(&mut self, state: Option<CruiseState>) {
        self.state = state;
        self.last_progress = None;
    }

    pub fn phase(&self) -> Option<CruisePhase> {
        self.state.as_ref().map(|s| s.phase)
    }

    pub fn progress(&self, pose: &Pose) -> Option<CruiseProgress> {
        self.state.as_ref().map(|s| s.progress(pose))
    }
}

/// Face along `direction`, keeping the current up as far as possible.
fn face(t: &TickCtx<'_>, direction: &Vector3<f64>, actuators: &mut Actuators) -> Alignment {
    let target = AlignTarget {
        forward: *direction,
        up: level_up(direction, &t.pose.up),
        tolerance: t.cfg.course_tolerance,
    };
    steer(&target, &t.pose, actuators, t.angular_rate)
}

/// Steer at `point` and velocity-match towards it at `speed`.
fn drive(t: &TickCtx<'_>, point: &Vector3<f64>, speed: f64, actuators: &mut Actuators) {
    let direction = direction_to(&t.pose.position, point);
    face(t, &direction, actuators);
    let force = (direction * speed - t.pose.velocity) * t.pose.mass * t.cfg.gain;
    actuators.apply_thrust_compensated(&force, &t.pose.gravity, t.pose.mass);
}

/// Throttled raycast along the direction of travel. Planet surfaces and
/// anything beyond the current waypoint are ignored.
fn scan(t: &TickCtx<'_>, state: &mut CruiseState, vessel: &mut Vessel<'_>) -> Option<ObstacleSnapshot> {
    let due = state.scan_ticks % t.cfg.scan_interval.max(1) == 0;
    state.scan_ticks = state.scan_ticks.wrapping_add(1);
    if !due {
        return None;
    }
    let direction = if t.pose.speed() > 1.0 {
        t.pose.velocity.normalize()
    } else {
        t.pose.forward
    };
    let hit = vessel.sensor.try_raycast(t.cfg.detection_range, &direction)?;
    if hit.is_planet || hit.distance > t.pose.distance_to(&state.waypoint()) {
        return None;
    }
    Some(ObstacleSnapshot {
        position: hit.position,
        bounding_radius: hit.bounding_radius,
        distance: hit.distance,
        sensor_up: t.pose.up,
        sensor_forward: t.pose.forward,
    })
}

/// Braking and waypoint hand-over shared by Accelerating and Cruising.
/// Returns true when the phase changed.
fn check_waypoint(t: &TickCtx<'_>, state: &mut CruiseState) -> bool {
    let distance = t.pose.distance_to(&state.waypoint());
    if distance >= t.cfg.braking_distance {
        return false;
    }
    if state.is_last_leg() {
        state.transition(CruisePhase::Decelerating);
    } else {
        state.index += 1;
        debug!("cruise: waypoint {}/{} passed", state.index, state.waypoints.len());
        state.transition(CruisePhase::Locating);
    }
    true
}

fn locate(t: &TickCtx<'_>, state: &mut CruiseState, vessel: &mut Vessel<'_>) {
    let direction = direction_to(&t.pose.position, &state.waypoint());
    vessel.actuators.set_dampeners(true);
    vessel
        .actuators
        .apply_thrust_compensated(&Vector3::zeros(), &t.pose.gravity, t.pose.mass);
    if face(t, &direction, vessel.actuators).is_aligned() {
        state.transition(CruisePhase::Accelerating);
    }
}

fn accelerate(t: &TickCtx<'_>, state: &mut CruiseState, vessel: &mut Vessel<'_>) {
    if let Some(obstacle) = scan(t, state, vessel) {
        state.enter_avoiding(Some(obstacle), t.cfg.safety_margin);
        return;
    }
    if check_waypoint(t, state) {
        return;
    }
    let waypoint = state.waypoint();
    let near_base = t.pose.distance_to(&waypoint) < t.cfg.near_base_distance;
    let in_gravity = t.pose.in_gravity(t.cfg.gravity_threshold);
    if !near_base && !in_gravity && t.pose.speed() >= t.cfg.max_speed * t.cfg.speed_threshold {
        vessel.actuators.reset();
        vessel.actuators.set_dampeners(false);
        state.transition(CruisePhase::Cruising);
        return;
    }

    let speed = if near_base { t.cfg.near_base_speed } else { t.cfg.max_speed };
    vessel.actuators.set_dampeners(true);
    drive(t, &waypoint, speed, vessel.actuators);
}

fn cruise(t: &TickCtx<'_>, state: &mut CruiseState, vessel: &mut Vessel<'_>) {
    if let Some(obstacle) = scan(t, state, vessel) {
        state.enter_avoiding(Some(obstacle), t.cfg.safety_margin);
        return;
    }
    if check_waypoint(t, state) {
        return;
    }
    let waypoint = state.waypoint();
    if t.pose.distance_to(&waypoint) < t.cfg.near_base_distance {
        // Accelerating owns the slow approach speed
        state.transition(CruisePhase::Accelerating);
        return;
    }

    if t.pose.in_gravity(t.cfg.gravity_threshold) {
        vessel.actuators.set_dampeners(true);
        drive(t, &waypoint, t.cfg.max_speed, vessel.actuators);
        return;
    }

    vessel.actuators.set_dampeners(false);
    match state.burn {
        Some(burn) if burn.active(t.now) => drive(t, &waypoint, t.cfg.max_speed, vessel.actuators),
        Some(_) => {
            debug!("cruise: correction burn finished");
            state.burn = None;
            vessel.actuators.reset();
        }
        None => {
            let direction = direction_to(&t.pose.position, &waypoint);
            let off_course = angle_between(&t.pose.velocity, &direction) > t.cfg.course_tolerance;
            let slow = t.pose.speed() < t.cfg.max_speed * t.cfg.speed_threshold;
            if off_course || slow {
                debug!("cruise: correction burn (off course: {}, slow: {})", off_course, slow);
                state.burn = Some(Burn { start: t.now, duration: t.cfg.rethrust_duration });
                drive(t, &waypoint, t.cfg.max_speed, vessel.actuators);
            }
        }
    }
}

/// Returns true once stopped.
fn decelerate(t: &TickCtx<'_>, vessel: &mut Vessel<'_>) -> bool {
    vessel.actuators.reset();
    vessel.actuators.set_dampeners(true);
    t.pose.speed() <= t.cfg.stop_speed
}

fn avoid(t: &TickCtx<'_>, state: &mut CruiseState, vessel: &mut Vessel<'_>) {
    if state.obstacle.is_none() {
        state.enter_avoiding(None, t.cfg.safety_margin);
        return;
    }
    let Some(point) = state.evasion.first().copied() else {
        state.transition(CruisePhase::Locating);
        return;
    };
    if t.pose.distance_to(&point) < t.cfg.evasion_radius {
        state.evasion.remove(0);
        debug!("cruise: evasion point reached, {} left", state.evasion.len());
        if state.evasion.is_empty() {
            state.transition(CruisePhase::Locating);
        }
        return;
    }
    vessel.actuators.set_dampeners(true);
    drive(t, &point, t.cfg.evasion_speed, vessel.actuators);
}

impl Controller for CruiseController {
    fn tick(&mut self, vessel: &mut Vessel<'_>) {
        let Some(state) = &mut self.state else {
            return;
        };
        let t = TickCtx {
            cfg: &self.config,
            angular_rate: self.angular_rate,
            now: vessel.now,
            pose: vessel.pose.clone(),
        };

        match state.phase {
            CruisePhase::Locating => locate(&t, state, vessel),
            CruisePhase::Accelerating => accelerate(&t, state, vessel),
            CruisePhase::Cruising => cruise(&t, state, vessel),
            CruisePhase::Avoiding => avoid(&t, state, vessel),
            CruisePhase::Decelerating => {
                if decelerate(&t, vessel) {
                    info!("cruise: stopped, {} from destination", format_distance(t.pose.distance_to(&state.waypoint())));
                    let token = self.state.take().and_then(|s| s.token);
                    self.last_progress = None;
                    vessel.complete(token);
                    return;
                }
            }
        }
        self.last_progress = Some(state.progress(&t.pose));
    }

    fn clear(&mut self, actuators: &mut Actuators) {
        if self.state.take().is_some() {
            actuators.reset();
            actuators.set_dampeners(true);
        }
        self.last_progress = None;
    }

    fn has_target(&self) -> bool {
        self.state.is_some()
    }

    fn status(&self) -> Option<String> {
        let state = self.state.as_ref()?;
        let phase = match state.phase {
            CruisePhase::Decelerating => "Decelerating",
            CruisePhase::Avoiding => "Avoiding obstacle",
            CruisePhase::Locating => "Locating",
            CruisePhase::Accelerating => "Accelerating",
            CruisePhase::Cruising => "Cruising",
        };
        Some(match self.last_progress {
            Some(p) => format!(
                "{}: {} of {} left, ETA {}",
                phase,
                format_distance(p.remaining),
                format_distance(p.total),
                format_eta(p.eta)
            ),
            None => phase.to_string(),
        })
    }

    fn name(&self) -> &str {
        "Cruise"
    }
}

// ---------------------------------------------------------------------------
// Checkpoint
// ---------------------------------------------------------------------------

impl Checkpoint for Option<CruiseState> {
    fn save(&self) -> String {
        let Some(s) = self else {
            return String::new();
        };
        let mut w = FieldWriter::new();
        w.num("phase", s.phase as u32)
            .vector("origin", &s.origin)
            .vectors("waypoints", &s.waypoints)
            .num("index", s.index)
            .vectors("evasion", &s.evasion)
            .opt_num("burn_start", s.burn.map(|b| b.start))
            .opt_num("burn_duration", s.burn.map(|b| b.duration))
            .num("scan_ticks", s.scan_ticks)
            .text("token", s.token.as_deref());
        if let Some(o) = &s.obstacle {
            w.vector("obstacle", &o.position)
                .num("obstacle_radius", o.bounding_radius)
                .num("obstacle_distance", o.distance)
                .vector("sensor_up", &o.sensor_up)
                .vector("sensor_forward", &o.sensor_forward);
        }
        w.finish()
    }

    fn load(value: &str) -> Self {
        let f = Fields::parse(value);
        if !f.has("phase") {
            return None;
        }
        let burn = match (f.opt_f64("burn_start"), f.opt_f64("burn_duration")) {
            (Some(start), Some(duration)) => Some(Burn { start, duration }),
            _ => None,
        };
        let obstacle = f.has("obstacle").then(|| ObstacleSnapshot {
            position: f.vector("obstacle"),
            bounding_radius: f.f64("obstacle_radius"),
            distance: f.f64("obstacle_distance"),
            sensor_up: f.vector("sensor_up"),
            sensor_forward: f.vector("sensor_forward"),
        });
        let waypoints = f.vectors("waypoints");
        Some(CruiseState {
            phase: CruisePhase::from_index(f.u32("phase")),
            origin: f.vector("origin"),
            index: f.usize("index").min(waypoints.len()),
            waypoints,
            evasion: f.vectors("evasion"),
            burn,
            obstacle,
            token: f.text("token"),
            scan_ticks: f.u32("scan_ticks"),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
