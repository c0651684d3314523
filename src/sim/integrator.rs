use nalgebra::{UnitQuaternion, Vector3};

// ---------------------------------------------------------------------------
// Rigid-body state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ShipState {
    pub time: f64,                 // s
    pub pos: Vector3<f64>,         // m, world
    pub vel: Vector3<f64>,         // m/s, world
    pub quat: UnitQuaternion<f64>, // body → world
    pub omega: Vector3<f64>,       // rad/s, world
    pub mass: f64,                 // kg
}

impl ShipState {
    pub fn at_rest(mass: f64) -> Self {
        Self {
            time: 0.0,
            pos: Vector3::zeros(),
            vel: Vector3::zeros(),
            quat: UnitQuaternion::identity(),
            omega: Vector3::zeros(),
            mass,
        }
    }

    fn apply(&self, d: &Deriv, dt: f64) -> ShipState {
        ShipState {
            time: self.time + dt,
            pos: self.pos + d.dpos * dt,
            vel: self.vel + d.dvel * dt,
            ..self.clone()
        }
    }

    /// Body -Z in world frame.
    pub fn forward(&self) -> Vector3<f64> {
        self.quat * -Vector3::z()
    }

    /// Body +Y in world frame.
    pub fn up(&self) -> Vector3<f64> {
        self.quat * Vector3::y()
    }
}

#[derive(Debug, Clone)]
struct Deriv {
    dpos: Vector3<f64>,
    dvel: Vector3<f64>,
}

fn derivatives<F: Fn(&ShipState) -> Vector3<f64>>(state: &ShipState, accel: &F) -> Deriv {
    Deriv { dpos: state.vel, dvel: accel(state) }
}

// ---------------------------------------------------------------------------
// RK4 translation, exact rotation at constant angular velocity
// ---------------------------------------------------------------------------

/// Single RK4 step. `accel` (m/s^2, world) may depend on the state, e.g. for
/// velocity-dependent dampening; `omega` is held constant over the step.
pub fn rk4_step<F>(state: &ShipState, omega: &Vector3<f64>, dt: f64, accel: F) -> ShipState
where
    F: Fn(&ShipState) -> Vector3<f64>,
{
    let k1 = derivatives(state, &accel);
    let k2 = derivatives(&state.apply(&k1, dt * 0.5), &accel);
    let k3 = derivatives(&state.apply(&k2, dt * 0.5), &accel);
    let k4 = derivatives(&state.apply(&k3, dt), &accel);

    let rotation = UnitQuaternion::from_scaled_axis(omega * dt);

    ShipState {
        time: state.time + dt,
        pos: state.pos + (k1.dpos + 2.0 * k2.dpos + 2.0 * k3.dpos + k4.dpos) * (dt / 6.0),
        vel: state.vel + (k1.dvel + 2.0 * k2.dvel + 2.0 * k3.dvel + k4.dvel) * (dt / 6.0),
        quat: rotation * state.quat,
        omega: *omega,
        mass: state.mass,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn constant_acceleration_is_exact() {
        let mut s = ShipState::at_rest(100.0);
        let g = Vector3::new(0.0, -9.81, 0.0);
        for _ in 0..100 {
            s = rk4_step(&s, &Vector3::zeros(), 0.01, |_| g);
        }
        assert_relative_eq!(s.time, 1.0, epsilon = 1e-12);
        assert_relative_eq!(s.pos.y, -0.5 * 9.81, epsilon = 1e-9);
        assert_relative_eq!(s.vel.y, -9.81, epsilon = 1e-9);
    }

    #[test]
    fn linear_drag_decays_exponentially() {
        let mut s = ShipState::at_rest(100.0);
        s.vel = Vector3::new(10.0, 0.0, 0.0);
        for _ in 0..100 {
            s = rk4_step(&s, &Vector3::zeros(), 0.01, |st| -st.vel);
        }
        assert_relative_eq!(s.vel.x, 10.0 * (-1.0_f64).exp(), epsilon = 1e-6);
    }

    #[test]
    fn rotation_about_world_axis() {
        let s = ShipState::at_rest(1.0);
        let s = rk4_step(&s, &Vector3::new(0.0, -FRAC_PI_2, 0.0), 1.0, |_| Vector3::zeros());
        // -Z turned a quarter about -Y lands on +X
        assert_relative_eq!(s.forward(), Vector3::x(), epsilon = 1e-12);
        assert_relative_eq!(s.quat.quaternion().norm(), 1.0, epsilon = 1e-12);
    }
}
