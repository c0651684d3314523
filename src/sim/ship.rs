use nalgebra::{UnitQuaternion, Vector3};
use tracing::{debug, info};

use crate::hw::{Actuators, Connector, Gyro, Pose, Thruster, Vessel};
use super::integrator::{rk4_step, ShipState};
use super::obstacles::SphereField;

/// Per-thruster force as a multiple of ship mass (N/kg).
pub const THRUST_TO_MASS: f64 = 10.0;

/// Velocity dampening rate of the inertial dampeners (1/s).
pub const DAMPENING_RATE: f64 = 1.0;

// ---------------------------------------------------------------------------
// Connector
// ---------------------------------------------------------------------------

/// Proximity connector: locks when the ship comes within `range` of any
/// port.
///
/// After a release it stays disarmed until the ship has moved clear, so a
/// ship undocking at the port does not immediately lock again.
#[derive(Debug, Clone, PartialEq)]
pub struct SimConnector {
    pub ports: Vec<Vector3<f64>>,
    pub range: f64, // m
    pub connected: bool,
    /// Scheduled release (wall clock, s), as an undock command would.
    pub release_at: Option<f64>,
    armed: bool,
}

impl SimConnector {
    pub fn new() -> Self {
        Self { ports: Vec::new(), range: 1.5, connected: false, release_at: None, armed: true }
    }

    pub fn at(port: Vector3<f64>, range: f64) -> Self {
        Self { ports: vec![port], range, connected: false, release_at: None, armed: true }
    }

    pub fn release(&mut self) {
        if self.connected {
            info!("connector: released");
        }
        self.connected = false;
        self.armed = false;
    }

    fn update(&mut self, position: &Vector3<f64>, now: f64) {
        if self.release_at.is_some_and(|t| now >= t) {
            self.release_at = None;
            self.release();
        }
        let Some(distance) = self
            .ports
            .iter()
            .map(|p| (position - p).norm())
            .min_by(|a, b| a.total_cmp(b))
        else {
            return;
        };
        if !self.armed {
            self.armed = distance > self.range * 2.0;
        } else if !self.connected && distance <= self.range {
            info!("connector: locked at {:.2} m", distance);
            self.connected = true;
        }
    }
}

impl Default for SimConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for SimConnector {
    fn is_connected(&self) -> bool {
        self.connected
    }
}

// ---------------------------------------------------------------------------
// Ship
// ---------------------------------------------------------------------------

/// Point mass with attitude, driven through the same actuator handles the
/// controllers write.
#[derive(Debug, Clone)]
pub struct SimShip {
    pub state: ShipState,
    pub gravity: Vector3<f64>, // m/s^2
    pub actuators: Actuators,
    pub sensor: SphereField,
    pub connector: SimConnector,
    pub cargo: f64,      // filled fraction
    pub cargo_rate: f64, // fraction/s while connected; negative unloads
    pub log: Vec<String>,
    thruster_mounts: Vec<Vector3<f64>>,  // body-frame push directions
    gyro_mounts: Vec<UnitQuaternion<f64>>, // gyro → body
}

impl SimShip {
    /// Ship at rest at the origin, facing -Z, with one thruster along each
    /// body axis and a single gyro.
    pub fn new(mass: f64) -> Self {
        let thruster_mounts = vec![
            Vector3::x(),
            -Vector3::x(),
            Vector3::y(),
            -Vector3::y(),
            Vector3::z(),
            -Vector3::z(),
        ];
        let gyro_mounts = vec![UnitQuaternion::identity()];
        let actuators = Actuators::new(
            thruster_mounts
                .iter()
                .map(|m| Thruster::new(*m, mass * THRUST_TO_MASS))
                .collect(),
            gyro_mounts.iter().map(|q| Gyro::new(*q)).collect(),
        );
        let mut ship = Self {
            state: ShipState::at_rest(mass),
            gravity: Vector3::zeros(),
            actuators,
            sensor: SphereField::default(),
            connector: SimConnector::new(),
            cargo: 0.0,
            cargo_rate: 0.0,
            log: Vec::new(),
            thruster_mounts,
            gyro_mounts,
        };
        ship.sync_mounts();
        ship
    }

    pub fn with_attitude(mut self, quat: UnitQuaternion<f64>) -> Self {
        self.state.quat = quat;
        self.sync_mounts();
        self
    }

    pub fn pose(&self) -> Pose {
        Pose {
            position: self.state.pos,
            velocity: self.state.vel,
            forward: self.state.forward(),
            up: self.state.up(),
            mass: self.state.mass,
            gravity: self.gravity,
        }
    }

    /// Tick context over this ship's collaborators.
    pub fn vessel(&mut self) -> Vessel<'_> {
        let pose = self.pose();
        self.sensor.origin = self.state.pos;
        Vessel {
            now: self.state.time,
            pose,
            actuators: &mut self.actuators,
            sensor: &mut self.sensor,
            connector: &self.connector,
            cargo: &self.cargo,
            dispatcher: &mut self.log,
        }
    }

    /// Advance by `dt` seconds under the current actuator commands.
    pub fn step(&mut self, dt: f64) {
        let thrust = self.actuators.net_force();
        let omega = self.actuators.commanded_rotation();
        let gravity = self.gravity;
        let dampeners = self.actuators.dampeners;
        let free: Vec<&Thruster> = self
            .actuators
            .thrusters
            .iter()
            .filter(|t| t.override_fraction.is_none())
            .collect();

        self.state = rk4_step(&self.state, &omega, dt, |s| {
            let mut force = thrust;
            if dampeners {
                let wanted = (-s.vel * DAMPENING_RATE - gravity) * s.mass;
                force += dampener_force(&free, &wanted);
            }
            force / s.mass + gravity
        });

        if self.connector.connected {
            self.cargo = (self.cargo + self.cargo_rate * dt).clamp(0.0, 1.0);
        }
        self.connector.update(&self.state.pos, self.state.time);
        self.sync_mounts();
        debug!("sim: t={:.2} pos={:?}", self.state.time, self.state.pos);
    }

    /// Rotate thruster and gyro handles into the current attitude.
    fn sync_mounts(&mut self) {
        let q = self.state.quat;
        for (t, m) in self.actuators.thrusters.iter_mut().zip(&self.thruster_mounts) {
            t.backward = q * m;
        }
        for (g, m) in self.actuators.gyros.iter_mut().zip(&self.gyro_mounts) {
            g.orientation = q * m;
        }
    }
}

/// What the free (non-overridden) thrusters deliver towards `wanted`.
fn dampener_force(free: &[&Thruster], wanted: &Vector3<f64>) -> Vector3<f64> {
    free.iter()
        .map(|t| {
            let fraction = if t.max_force > 0.0 {
                (t.backward.dot(wanted) / t.max_force).clamp(0.0, 1.0)
            } else {
                0.0
            };
            t.backward * fraction * t.max_force
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn thrust_accelerates() {
        let mut ship = SimShip::new(1_000.0);
        ship.actuators.apply_thrust(&Vector3::new(0.0, 0.0, -1_000.0));
        for _ in 0..100 {
            ship.step(0.01);
        }
        assert_relative_eq!(ship.state.vel.z, -1.0, epsilon = 1e-9);
    }

    #[test]
    fn attitude_carries_the_mounts() {
        let yaw = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), std::f64::consts::FRAC_PI_2);
        let ship = SimShip::new(1_000.0).with_attitude(yaw);
        assert_relative_eq!(ship.pose().forward, -Vector3::x(), epsilon = 1e-12);
        assert_relative_eq!(ship.actuators.thrusters[4].backward, Vector3::x(), epsilon = 1e-12);
        assert_relative_eq!(ship.actuators.gyros[0].orientation, yaw, epsilon = 1e-12);
    }

    #[test]
    fn dampeners_stop_a_drifting_ship() {
        let mut ship = SimShip::new(1_000.0);
        ship.state.vel = Vector3::new(5.0, 0.0, -3.0);
        for _ in 0..600 {
            ship.step(1.0 / 60.0);
        }
        assert!(ship.state.vel.norm() < 0.01, "still moving at {:?}", ship.state.vel);

        ship.state.vel = Vector3::new(5.0, 0.0, 0.0);
        ship.actuators.set_dampeners(false);
        ship.step(1.0);
        assert_relative_eq!(ship.state.vel.x, 5.0);
    }

    #[test]
    fn dampeners_hover_in_gravity() {
        let mut ship = SimShip::new(1_000.0);
        ship.gravity = Vector3::new(0.0, -9.81, 0.0);
        for _ in 0..600 {
            ship.step(1.0 / 60.0);
        }
        assert!(ship.state.pos.norm() < 1e-6);
    }

    #[test]
    fn gyro_override_turns_the_ship() {
        let mut ship = SimShip::new(1_000.0);
        ship.actuators.apply_gyro(&Vector3::y(), 0.5);
        ship.step(1.0);
        // world rate is -0.5 rad/s about Y: forward swings from -Z towards +X
        assert!(ship.state.forward().x > 0.4);
        // thruster handles follow the hull
        assert_relative_eq!(ship.actuators.thrusters[5].backward, ship.state.forward(), epsilon = 1e-12);
    }

    #[test]
    fn connector_locks_and_rearms() {
        let mut ship = SimShip::new(1_000.0);
        ship.connector = SimConnector::at(Vector3::new(0.0, 0.0, -1.0), 1.5);
        ship.step(0.01);
        assert!(ship.connector.is_connected());

        ship.connector.release();
        ship.step(0.01);
        assert!(!ship.connector.is_connected());

        ship.state.pos = Vector3::new(0.0, 0.0, 10.0);
        ship.step(0.01);
        ship.state.pos = Vector3::zeros();
        ship.step(0.01);
        assert!(ship.connector.is_connected());
    }

    #[test]
    fn scheduled_release() {
        let mut ship = SimShip::new(1_000.0);
        ship.connector.connected = true;
        ship.connector.release_at = Some(0.5);
        ship.step(0.25);
        assert!(ship.connector.is_connected());
        ship.step(0.25);
        assert!(!ship.connector.is_connected());
        assert_eq!(ship.connector.release_at, None);
    }

    #[test]
    fn cargo_flows_only_while_connected() {
        let mut ship = SimShip::new(1_000.0);
        ship.cargo_rate = 0.1;
        ship.step(1.0);
        assert_eq!(ship.cargo, 0.0);
        ship.connector.connected = true;
        ship.step(1.0);
        assert_relative_eq!(ship.cargo, 0.1);
    }
}
