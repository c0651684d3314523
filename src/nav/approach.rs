use nalgebra::Vector3;
use tracing::{debug, info, warn};

use crate::checkpoint::{Checkpoint, FieldWriter, Fields};
use crate::config::{AlignConfig, DockingConfig};
use crate::error::{NavError, Result};
use crate::hw::{Actuators, Vessel};
use super::align::{steer, AlignTarget};
use super::completion_token;
use super::controller::Controller;
use super::kinematics::{direction_to, format_distance, format_speed};

// ---------------------------------------------------------------------------
// Speed profile
// ---------------------------------------------------------------------------

/// Three-tier approach speeds.
///
/// The first and last legs slow down linearly inside `slowdown_distance`;
/// interior legs always run at full speed. The floor keeps the agent from
/// stalling short of a waypoint.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeedProfile {
    pub first_leg: f64,         // m/s
    pub interior: f64,          // m/s
    pub last_leg: f64,          // m/s
    pub slowdown_distance: f64, // m
    pub min_speed: f64,         // m/s
}

impl SpeedProfile {
    pub fn from_config(cfg: &DockingConfig) -> Self {
        Self {
            first_leg: cfg.first_leg_speed,
            interior: cfg.interior_speed,
            last_leg: cfg.last_leg_speed,
            slowdown_distance: cfg.slowdown_distance,
            min_speed: cfg.min_speed,
        }
    }

    /// Desired speed for leg `index` of `len` with `distance` remaining.
    ///
    /// A single-waypoint route is both first and last; the first-leg speed
    /// wins.
    pub fn desired_speed(&self, index: usize, len: usize, distance: f64) -> f64 {
        let first = index == 0;
        let last = index + 1 == len;
        let base = if first {
            self.first_leg
        } else if last {
            self.last_leg
        } else {
            self.interior
        };
        if (first || last) && distance < self.slowdown_distance {
            (distance / self.slowdown_distance * base).max(self.min_speed)
        } else {
            base
        }
    }

    fn validate(&self) -> Result<()> {
        let speeds = [self.first_leg, self.interior, self.last_leg, self.min_speed];
        if speeds.iter().any(|s| !s.is_finite() || *s < 0.0)
            || !(self.slowdown_distance.is_finite() && self.slowdown_distance > 0.0)
        {
            return Err(NavError::Geometry(format!("invalid speed profile {:?}", self)));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Waypoint follower (docking approach)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ApproachState {
    pub waypoints: Vec<Vector3<f64>>,
    pub index: usize,
    pub align: AlignTarget,
    pub profile: SpeedProfile,
    pub token: Option<String>,
}

impl ApproachState {
    pub fn is_complete(&self) -> bool {
        self.index >= self.waypoints.len()
    }
}

/// Flies an ordered waypoint list with velocity-matching thrust while
/// holding a fixed orientation. Movement waits until the agent is aligned.
#[derive(Debug, Clone)]
pub struct WaypointFollower {
    docking: DockingConfig,
    angular_rate: f64,
    state: Option<ApproachState>,
    last_distance: Option<f64>,
    last_speed: f64,
}

impl WaypointFollower {
    pub fn new(docking: DockingConfig, align: &AlignConfig) -> Self {
        Self {
            docking,
            angular_rate: align.angular_rate,
            state: None,
            last_distance: None,
            last_speed: 0.0,
        }
    }

    /// Start an approach. `profile` overrides the configured speeds.
    /// Malformed geometry leaves the follower idle.
    pub fn initialize(
        &mut self,
        waypoints: Vec<Vector3<f64>>,
        align: AlignTarget,
        profile: Option<SpeedProfile>,
        token: Option<&str>,
    ) {
        let profile = profile.unwrap_or_else(|| SpeedProfile::from_config(&self.docking));
        match Self::validate(&waypoints, &profile) {
            Ok(()) => {
                info!("approach: {} waypoints", waypoints.len());
                self.state = Some(ApproachState {
                    waypoints,
                    index: 0,
                    align,
                    profile,
                    token: completion_token(token),
                });
            }
            Err(e) => {
                warn!("approach: ignoring task: {}", e);
                self.state = None;
            }
        }
        self.last_distance = None;
    }

    fn validate(waypoints: &[Vector3<f64>], profile: &SpeedProfile) -> Result<()> {
        if waypoints.is_empty() {
            return Err(NavError::Geometry("empty waypoint list".into()));
        }
        if waypoints.iter().any(|w| w.iter().any(|c| !c.is_finite())) {
            return Err(NavError::Geometry("non-finite waypoint".into()));
        }
        profile.validate()
    }

    pub fn state(&self) -> Option<&ApproachState> {
        self.state.as_ref()
    }

    pub fn restore(&mut self, state: Option<ApproachState>) {
        self.state = state;
        self.last_distance = None;
    }

    /// Hand the task over to an owner that persists it elsewhere.
    pub fn take(&mut self) -> Option<ApproachState> {
        self.last_distance = None;
        self.state.take()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.state.as_ref().map(|s| s.index)
    }
}

impl Controller for WaypointFollower {
    fn tick(&mut self, vessel: &mut Vessel<'_>) {
        let Some(state) = &mut self.state else {
            return;
        };
        let pose = &vessel.pose;

        if state.is_complete() {
            info!("approach: all {} waypoints reached", state.waypoints.len());
            let token = self.state.take().and_then(|s| s.token);
            vessel.actuators.reset();
            vessel.complete(token);
            return;
        }

        // Alignment gates movement
        if !steer(&state.align, pose, vessel.actuators, self.angular_rate).is_aligned() {
            vessel.actuators.apply_thrust_compensated(&Vector3::zeros(), &pose.gravity, pose.mass);
            return;
        }

        let waypoint = state.waypoints[state.index];
        let distance = pose.distance_to(&waypoint);
        self.last_distance = Some(distance);
        self.last_speed = pose.speed();

        if distance < self.docking.arrival_threshold {
            state.index += 1;
            debug!("approach: waypoint {}/{} reached", state.index, state.waypoints.len());
            vessel.actuators.apply_thrust_compensated(&Vector3::zeros(), &pose.gravity, pose.mass);
            return;
        }

        let desired = state.profile.desired_speed(state.index, state.waypoints.len(), distance);
        let direction = direction_to(&pose.position, &waypoint);
        let force = (direction * desired - pose.velocity) * pose.mass * self.docking.gain;
        vessel.actuators.apply_thrust_compensated(&force, &pose.gravity, pose.mass);
    }

    fn clear(&mut self, actuators: &mut Actuators) {
        if self.state.take().is_some() {
            actuators.reset();
        }
        self.last_distance = None;
    }

    fn has_target(&self) -> bool {
        self.state.is_some()
    }

    fn status(&self) -> Option<String> {
        let state = self.state.as_ref()?;
        let leg = (state.index + 1).min(state.waypoints.len());
        Some(match self.last_distance {
            Some(d) => format!(
                "Approach {}/{}: {} at {}",
                leg,
                state.waypoints.len(),
                format_distance(d),
                format_speed(self.last_speed)
            ),
            None => format!("Approach {}/{}: aligning", leg, state.waypoints.len()),
        })
    }

    fn name(&self) -> &str {
        "Approach"
    }
}

impl Checkpoint for Option<ApproachState> {
    fn save(&self) -> String {
        let Some(s) = self else {
            return String::new();
        };
        FieldWriter::new()
            .vectors("waypoints", &s.waypoints)
            .num("index", s.index)
            .vector("forward", &s.align.forward)
            .vector("up", &s.align.up)
            .num("tolerance", s.align.tolerance)
            .num("first", s.profile.first_leg)
            .num("interior", s.profile.interior)
            .num("last", s.profile.last_leg)
            .num("slowdown", s.profile.slowdown_distance)
            .num("min_speed", s.profile.min_speed)
            .text("token", s.token.as_deref())
            .finish()
    }

    fn load(value: &str) -> Self {
        let f = Fields::parse(value);
        if !f.has("waypoints") {
            return None;
        }
        let waypoints = f.vectors("waypoints");
        Some(ApproachState {
            index: f.usize("index").min(waypoints.len()),
            waypoints,
            align: AlignTarget {
                forward: f.vector("forward"),
                up: f.vector("up"),
                tolerance: f.f64("tolerance"),
            },
            profile: SpeedProfile {
                first_leg: f.f64("first"),
                interior: f.f64("interior"),
                last_leg: f.f64("last"),
                slowdown_distance: f.f64("slowdown"),
                min_speed: f.f64("min_speed"),
            },
            token: f.text("token"),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
