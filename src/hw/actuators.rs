use nalgebra::{UnitQuaternion, Vector3};

// ---------------------------------------------------------------------------
// Actuator handles
// ---------------------------------------------------------------------------

/// Cosine between a thruster's push direction and "up" (against gravity)
/// above which it takes part in holding the agent's weight.
const OPPOSING_COSINE: f64 = 0.9;

/// Gravity below this magnitude is ignored by the compensated allocator.
const GRAVITY_EPS: f64 = 1e-3;

/// A resolved thruster.
#[derive(Debug, Clone, PartialEq)]
pub struct Thruster {
    pub backward: Vector3<f64>,          // unit, world: direction the agent is pushed
    pub max_force: f64,                  // N
    pub override_fraction: Option<f64>,  // None = no override
}

impl Thruster {
    pub fn new(backward: Vector3<f64>, max_force: f64) -> Self {
        Self { backward, max_force, override_fraction: None }
    }

    /// Force this thruster currently produces (world frame).
    pub fn force(&self) -> Vector3<f64> {
        self.backward * self.override_fraction.unwrap_or(0.0) * self.max_force
    }
}

/// A resolved gyroscope.
#[derive(Debug, Clone, PartialEq)]
pub struct Gyro {
    pub orientation: UnitQuaternion<f64>,     // gyro local → world
    pub override_rates: Option<Vector3<f64>>, // [pitch, yaw, roll], rad/s, local
}

impl Gyro {
    pub fn new(orientation: UnitQuaternion<f64>) -> Self {
        Self { orientation, override_rates: None }
    }
}

/// The actuator arrays driven by whichever controller is active.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Actuators {
    pub thrusters: Vec<Thruster>,
    pub gyros: Vec<Gyro>,
    pub dampeners: bool,
}

impl Actuators {
    pub fn new(thrusters: Vec<Thruster>, gyros: Vec<Gyro>) -> Self {
        Self { thrusters, gyros, dampeners: true }
    }

    /// Allocate `force` (N, world) across the thrusters.
    ///
    /// Each thruster gets the projection of the force onto its push
    /// direction as a fraction of its max force, clipped to [0, 1]. There is
    /// no global rebalancing, so gross force is under-allocated whenever a
    /// component saturates.
    pub fn apply_thrust(&mut self, force: &Vector3<f64>) {
        for t in &mut self.thrusters {
            let alignment = t.backward.dot(force);
            let fraction = if alignment > 0.0 && t.max_force > 0.0 {
                (alignment / t.max_force).min(1.0)
            } else {
                0.0
            };
            t.override_fraction = Some(fraction);
        }
    }

    /// Allocate `force` while also holding the agent's weight.
    ///
    /// Thrusters pushing within [`OPPOSING_COSINE`] of "up" share
    /// `mass * |gravity|` in proportion to their max force, on top of their
    /// maneuvering share. Falls back to [`apply_thrust`](Self::apply_thrust)
    /// in negligible gravity or when no thruster opposes it.
    pub fn apply_thrust_compensated(&mut self, force: &Vector3<f64>, gravity: &Vector3<f64>, mass: f64) {
        let g = gravity.norm();
        if g < GRAVITY_EPS {
            self.apply_thrust(force);
            return;
        }
        let up = -gravity / g;
        let opposing_total: f64 = self
            .thrusters
            .iter()
            .filter(|t| t.backward.dot(&up) >= OPPOSING_COSINE)
            .map(|t| t.max_force)
            .sum();
        if opposing_total <= 0.0 {
            self.apply_thrust(force);
            return;
        }

        let weight = mass * g;
        for t in &mut self.thrusters {
            if t.max_force <= 0.0 {
                t.override_fraction = Some(0.0);
                continue;
            }
            let maneuver = t.backward.dot(force).max(0.0);
            let hold = if t.backward.dot(&up) >= OPPOSING_COSINE {
                weight * t.max_force / opposing_total
            } else {
                0.0
            };
            t.override_fraction = Some(((maneuver + hold) / t.max_force).clamp(0.0, 1.0));
        }
    }

    /// Command every gyro to rotate about `axis` (world frame).
    ///
    /// The axis is expressed in each gyro's local frame and scaled by
    /// `-angular_rate`; gyros mounted in any orientation agree on the
    /// resulting world rotation.
    pub fn apply_gyro(&mut self, axis: &Vector3<f64>, angular_rate: f64) {
        for g in &mut self.gyros {
            let local = g.orientation.inverse_transform_vector(axis);
            g.override_rates = Some(local * -angular_rate);
        }
    }

    pub fn reset_thrust(&mut self) {
        for t in &mut self.thrusters {
            t.override_fraction = None;
        }
    }

    pub fn reset_gyros(&mut self) {
        for g in &mut self.gyros {
            g.override_rates = None;
        }
    }

    /// Release every override.
    pub fn reset(&mut self) {
        self.reset_thrust();
        self.reset_gyros();
    }

    pub fn set_dampeners(&mut self, on: bool) {
        self.dampeners = on;
    }

    /// Total commanded thrust force (world frame).
    pub fn net_force(&self) -> Vector3<f64> {
        self.thrusters.iter().map(Thruster::force).sum()
    }

    /// World angular velocity implied by the gyro overrides (mean over gyros).
    pub fn commanded_rotation(&self) -> Vector3<f64> {
        let active: Vec<Vector3<f64>> = self
            .gyros
            .iter()
            .filter_map(|g| g.override_rates.map(|r| g.orientation * r))
            .collect();
        if active.is_empty() {
            Vector3::zeros()
        } else {
            active.iter().sum::<Vector3<f64>>() / active.len() as f64
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    fn six_axis(max_force: f64) -> Actuators {
        let dirs = [
            Vector3::x(),
            -Vector3::x(),
            Vector3::y(),
            -Vector3::y(),
            Vector3::z(),
            -Vector3::z(),
        ];
        Actuators::new(
            dirs.iter().map(|d| Thruster::new(*d, max_force)).collect(),
            vec![Gyro::new(UnitQuaternion::identity())],
        )
    }

    #[test]
    fn thrust_is_proportional_to_projection() {
        let mut act = six_axis(1000.0);
        act.apply_thrust(&Vector3::new(250.0, 0.0, 0.0));
        assert_relative_eq!(act.thrusters[0].override_fraction.unwrap(), 0.25);
        assert_eq!(act.thrusters[1].override_fraction, Some(0.0));
        assert_eq!(act.thrusters[2].override_fraction, Some(0.0));
    }

    #[test]
    fn thrust_saturates_at_one() {
        let mut act = six_axis(1000.0);
        act.apply_thrust(&Vector3::new(0.0, -5000.0, 0.0));
        assert_eq!(act.thrusters[3].override_fraction, Some(1.0));
        assert_relative_eq!(act.net_force(), Vector3::new(0.0, -1000.0, 0.0));
    }

    #[test]
    fn compensated_thrust_holds_weight() {
        let mut act = Actuators::new(
            vec![
                Thruster::new(Vector3::y(), 2000.0),
                Thruster::new(Vector3::y(), 1000.0),
                Thruster::new(Vector3::x(), 1000.0),
            ],
            vec![],
        );
        let gravity = Vector3::new(0.0, -10.0, 0.0);
        act.apply_thrust_compensated(&Vector3::zeros(), &gravity, 150.0);
        // 1500 N weight over 3000 N of lift → every lift thruster at 50%
        assert_relative_eq!(act.thrusters[0].override_fraction.unwrap(), 0.5);
        assert_relative_eq!(act.thrusters[1].override_fraction.unwrap(), 0.5);
        assert_eq!(act.thrusters[2].override_fraction, Some(0.0));
        assert_relative_eq!(act.net_force() + gravity * 150.0, Vector3::zeros(), epsilon = 1e-9);
    }

    #[test]
    fn compensated_without_gravity_matches_plain() {
        let mut a = six_axis(800.0);
        let mut b = six_axis(800.0);
        let f = Vector3::new(100.0, -40.0, 300.0);
        a.apply_thrust(&f);
        b.apply_thrust_compensated(&f, &Vector3::zeros(), 500.0);
        assert_eq!(a, b);
    }

    #[test]
    fn gyro_override_in_local_frame() {
        let mut act = Actuators::new(
            vec![],
            vec![
                Gyro::new(UnitQuaternion::identity()),
                Gyro::new(UnitQuaternion::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2)),
            ],
        );
        act.apply_gyro(&Vector3::x(), 2.0);
        assert_relative_eq!(act.gyros[0].override_rates.unwrap(), Vector3::new(-2.0, 0.0, 0.0));
        // world X is the rotated gyro's local -Y
        assert_relative_eq!(
            act.gyros[1].override_rates.unwrap(),
            Vector3::new(0.0, 2.0, 0.0),
            epsilon = 1e-12
        );
        assert_relative_eq!(act.commanded_rotation(), Vector3::new(-2.0, 0.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn reset_releases_everything() {
        let mut act = six_axis(100.0);
        act.apply_thrust(&Vector3::x());
        act.apply_gyro(&Vector3::y(), 1.0);
        act.reset();
        assert!(act.thrusters.iter().all(|t| t.override_fraction.is_none()));
        assert!(act.gyros.iter().all(|g| g.override_rates.is_none()));
    }
}
