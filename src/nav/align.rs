use nalgebra::Vector3;
use tracing::{info, warn};

use crate::checkpoint::{Checkpoint, FieldWriter, Fields};
use crate::config::AlignConfig;
use crate::error::{NavError, Result};
use crate::hw::{Actuators, Pose, Vessel};
use super::controller::Controller;
use super::kinematics::{angle_between, rotation_axis};
use super::completion_token;

// ---------------------------------------------------------------------------
// Alignment target and steering
// ---------------------------------------------------------------------------

/// Orientation goal: forward and up unit vectors plus an angular tolerance.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignTarget {
    pub forward: Vector3<f64>,
    pub up: Vector3<f64>,
    pub tolerance: f64, // rad
}

impl AlignTarget {
    /// Validate and normalize. Rejects non-finite, zero-length or parallel
    /// frames and non-positive tolerances.
    pub fn new(forward: Vector3<f64>, up: Vector3<f64>, tolerance: f64) -> Result<Self> {
        let (nf, nu) = (forward.norm(), up.norm());
        if !(nf.is_finite() && nu.is_finite()) || nf < f64::EPSILON || nu < f64::EPSILON {
            return Err(NavError::Geometry(format!(
                "alignment frame must be finite and non-zero (forward {:?}, up {:?})",
                forward, up
            )));
        }
        if forward.cross(&up).norm() / (nf * nu) < 1e-6 {
            return Err(NavError::Geometry("alignment forward and up are parallel".into()));
        }
        if !(tolerance.is_finite() && tolerance > 0.0) {
            return Err(NavError::Geometry(format!("alignment tolerance must be positive, got {}", tolerance)));
        }
        Ok(Self { forward: forward / nf, up: up / nu, tolerance })
    }
}

/// Outcome of one steering step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Alignment {
    Aligned,
    Turning { forward_error: f64, up_error: f64 },
}

impl Alignment {
    pub fn is_aligned(&self) -> bool {
        matches!(self, Alignment::Aligned)
    }
}

/// One gyro command towards `target`.
///
/// Forward and up errors are measured independently. Each axis outside the
/// tolerance contributes its own rotation axis and the sum is commanded in
/// one go, so both corrections happen simultaneously. Inside tolerance on
/// both axes the gyros are released.
pub fn steer(target: &AlignTarget, pose: &Pose, actuators: &mut Actuators, angular_rate: f64) -> Alignment {
    let forward_error = angle_between(&pose.forward, &target.forward);
    let up_error = angle_between(&pose.up, &target.up);

    if forward_error <= target.tolerance && up_error <= target.tolerance {
        actuators.reset_gyros();
        return Alignment::Aligned;
    }

    let mut axis = Vector3::zeros();
    if forward_error > target.tolerance {
        axis += rotation_axis(&target.forward, &pose.forward);
    }
    if up_error > target.tolerance {
        axis += rotation_axis(&target.up, &pose.up);
    }
    actuators.apply_gyro(&axis, angular_rate);
    Alignment::Turning { forward_error, up_error }
}

// ---------------------------------------------------------------------------
// Standalone alignment task
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct AlignState {
    pub target: AlignTarget,
    pub token: Option<String>,
}

/// Rotates the agent onto a target frame, then fires its token.
#[derive(Debug, Clone)]
pub struct AlignmentController {
    config: AlignConfig,
    state: Option<AlignState>,
    last: Option<Alignment>,
}

impl AlignmentController {
    pub fn new(config: AlignConfig) -> Self {
        Self { config, state: None, last: None }
    }

    /// Start aligning to `forward`/`up`. `tolerance` defaults to the
    /// configured one. Malformed geometry leaves the controller idle.
    pub fn initialize(
        &mut self,
        forward: Vector3<f64>,
        up: Vector3<f64>,
        tolerance: Option<f64>,
        token: Option<&str>,
    ) {
        match AlignTarget::new(forward, up, tolerance.unwrap_or(self.config.tolerance)) {
            Ok(target) => {
                info!("align: target forward {:?} up {:?}", target.forward, target.up);
                self.state = Some(AlignState { target, token: completion_token(token) });
                self.last = None;
            }
            Err(e) => {
                warn!("align: ignoring task: {}", e);
                self.state = None;
            }
        }
    }

    pub fn state(&self) -> Option<&AlignState> {
        self.state.as_ref()
    }

    /// Restore a task, e.g. after loading a checkpoint.
    pub fn restore(&mut self, state: Option<AlignState>) {
        self.state = state;
        self.last = None;
    }
}

impl Controller for AlignmentController {
    fn tick(&mut self, vessel: &mut Vessel<'_>) {
        let Some(state) = &self.state else {
            return;
        };
        let result = steer(&state.target, &vessel.pose, vessel.actuators, self.config.angular_rate);
        self.last = Some(result);
        if result.is_aligned() {
            info!("align: aligned");
            let token = self.state.take().and_then(|s| s.token);
            vessel.complete(token);
        }
    }

    fn clear(&mut self, actuators: &mut Actuators) {
        if self.state.take().is_some() {
            actuators.reset_gyros();
        }
        self.last = None;
    }

    fn has_target(&self) -> bool {
        self.state.is_some()
    }

    fn status(&self) -> Option<String> {
        match (&self.state, self.last) {
            (Some(_), Some(Alignment::Turning { forward_error, up_error })) => Some(format!(
                "Aligning: fwd {:.1}° up {:.1}°",
                forward_error.to_degrees(),
                up_error.to_degrees()
            )),
            (Some(_), _) => Some("Aligning".to_string()),
            (None, _) => None,
        }
    }

    fn name(&self) -> &str {
        "Align"
    }
}

impl Checkpoint for Option<AlignState> {
    fn save(&self) -> String {
        match self {
            None => String::new(),
            Some(s) => FieldWriter::new()
                .vector("forward", &s.target.forward)
                .vector("up", &s.target.up)
                .num("tolerance", s.target.tolerance)
                .text("token", s.token.as_deref())
                .finish(),
        }
    }

    fn load(value: &str) -> Self {
        let f = Fields::parse(value);
        if !f.has("forward") {
            return None;
        }
        Some(AlignState {
            target: AlignTarget {
                forward: f.vector("forward"),
                up: f.vector("up"),
                tolerance: f.f64("tolerance"),
            },
            token: f.text("token"),
        })
    }
}

impl Checkpoint for AlignmentController {
    fn save(&self) -> String {
        self.state.save()
    }

    fn load(value: &str) -> Self {
        let mut c = Self::new(AlignConfig::default());
        c.restore(Option::<AlignState>::load(value));
        c
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw::{Blind, Gyro};
    use nalgebra::UnitQuaternion;

    fn rig() -> Actuators {
        Actuators::new(vec![], vec![Gyro::new(UnitQuaternion::identity())])
    }

    /// Rotate the pose by the commanded gyro rate for `dt` seconds.
    fn integrate(pose: &mut Pose, actuators: &Actuators, dt: f64) {
        let rot = UnitQuaternion::from_scaled_axis(actuators.commanded_rotation() * dt);
        pose.forward = rot * pose.forward;
        pose.up = rot * pose.up;
    }

    #[test]
    fn rejects_degenerate_frames() {
        assert!(AlignTarget::new(Vector3::zeros(), Vector3::y(), 0.1).is_err());
        assert!(AlignTarget::new(Vector3::y(), Vector3::y() * 2.0, 0.1).is_err());
        assert!(AlignTarget::new(-Vector3::z(), Vector3::y(), 0.0).is_err());
        assert!(AlignTarget::new(Vector3::new(f64::NAN, 0.0, 1.0), Vector3::y(), 0.1).is_err());
        let t = AlignTarget::new(Vector3::new(0.0, 0.0, -5.0), Vector3::y(), 0.1).unwrap();
        assert_eq!(t.forward, -Vector3::z());
    }

    #[test]
    fn converges_and_releases_gyros() {
        let target = AlignTarget::new(
            UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 1.0) * -Vector3::z(),
            Vector3::y(),
            0.01,
        )
        .unwrap();
        let mut pose = Pose::at(Vector3::zeros(), 1000.0);
        let mut act = rig();

        let mut prev = angle_between(&pose.forward, &target.forward);
        let mut steps = 0;
        while !steer(&target, &pose, &mut act, 2.0).is_aligned() {
            integrate(&mut pose, &act, 0.05);
            let angle = angle_between(&pose.forward, &target.forward);
            assert!(angle < prev, "angle must strictly decrease ({} -> {})", prev, angle);
            prev = angle;
            steps += 1;
            assert!(steps < 10_000, "did not converge");
        }
        assert!(prev <= 0.01);
        assert!(act.gyros[0].override_rates.is_none());
    }

    #[test]
    fn corrects_both_axes_at_once() {
        // target needs both a yaw and a roll
        let q = UnitQuaternion::from_euler_angles(0.4, 0.7, 0.0);
        let target = AlignTarget::new(q * -Vector3::z(), q * Vector3::y(), 0.01).unwrap();
        let mut pose = Pose::at(Vector3::zeros(), 1000.0);
        let mut act = rig();

        let first = steer(&target, &pose, &mut act, 2.0);
        assert!(matches!(first, Alignment::Turning { forward_error, up_error } if forward_error > 0.01 && up_error > 0.01));

        for _ in 0..5_000 {
            if steer(&target, &pose, &mut act, 2.0).is_aligned() {
                return;
            }
            integrate(&mut pose, &act, 0.02);
        }
        panic!("dual-axis alignment did not converge");
    }

    #[test]
    fn antiparallel_target_still_turns() {
        let target = AlignTarget::new(Vector3::z(), Vector3::y(), 0.01).unwrap();
        let pose = Pose::at(Vector3::zeros(), 1000.0);
        let mut act = rig();
        steer(&target, &pose, &mut act, 1.0);
        let rates = act.gyros[0].override_rates.unwrap();
        assert!(rates.norm() > 0.5);
        assert!(rates.iter().all(|r| r.is_finite()));
    }

    #[test]
    fn controller_fires_token_once_when_aligned() {
        let mut ctl = AlignmentController::new(AlignConfig::default());
        ctl.initialize(-Vector3::z(), Vector3::y(), None, Some("ALIGNED"));
        let mut act = rig();
        let mut sensor = Blind;
        let mut log: Vec<String> = Vec::new();
        {
            let mut vessel = Vessel {
                now: 0.0,
                pose: Pose::at(Vector3::zeros(), 1000.0),
                actuators: &mut act,
                sensor: &mut sensor,
                connector: &false,
                cargo: &0.0_f64,
                dispatcher: &mut log,
            };
            ctl.tick(&mut vessel);
            ctl.tick(&mut vessel);
        }
        assert_eq!(log, vec!["ALIGNED".to_string()]);
        assert!(!ctl.has_target());
    }

    #[test]
    fn empty_token_means_none() {
        let mut ctl = AlignmentController::new(AlignConfig::default());
        ctl.initialize(-Vector3::z(), Vector3::y(), Some(0.05), Some("  "));
        assert_eq!(ctl.state().unwrap().token, None);
    }

    #[test]
    fn checkpoint_round_trip() {
        let mut ctl = AlignmentController::new(AlignConfig::default());
        assert_eq!(AlignmentController::load(&ctl.save()).state(), None);
        ctl.initialize(Vector3::new(0.3, 0.1, -0.9), Vector3::new(0.0, 1.0, 0.1), Some(0.03), Some("DOCK=A;B"));
        let restored = AlignmentController::load(&ctl.save());
        assert_eq!(restored.state(), ctl.state());
    }
}
