use nalgebra::Vector3;

// ---------------------------------------------------------------------------
// Pose snapshot
// ---------------------------------------------------------------------------

/// Sensor snapshot of the agent for one tick. Read only.
#[derive(Debug, Clone, PartialEq)]
pub struct Pose {
    pub position: Vector3<f64>, // m, world
    pub velocity: Vector3<f64>, // m/s, world
    pub forward: Vector3<f64>,  // unit, world
    pub up: Vector3<f64>,       // unit, world
    pub mass: f64,              // kg
    pub gravity: Vector3<f64>,  // m/s^2, natural gravity at the agent
}

impl Pose {
    /// Stationary pose at `position`, facing -Z with +Y up, no gravity.
    pub fn at(position: Vector3<f64>, mass: f64) -> Self {
        Self {
            position,
            velocity: Vector3::zeros(),
            forward: -Vector3::z(),
            up: Vector3::y(),
            mass,
            gravity: Vector3::zeros(),
        }
    }

    pub fn speed(&self) -> f64 {
        self.velocity.norm()
    }

    pub fn distance_to(&self, point: &Vector3<f64>) -> f64 {
        (point - self.position).norm()
    }

    /// True when natural gravity exceeds `threshold` (m/s^2).
    pub fn in_gravity(&self, threshold: f64) -> bool {
        self.gravity.norm() > threshold
    }
}

// ---------------------------------------------------------------------------
// Obstacle sensor
// ---------------------------------------------------------------------------

/// Nearest object returned by a raycast.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub position: Vector3<f64>, // center of the hit object's bounding sphere
    pub bounding_radius: f64,   // m
    pub distance: f64,          // m, from the sensor to the hit point
    pub is_planet: bool,        // planetary surface, never evaded
}

/// Forward-looking range sensor (camera raycast).
pub trait ObstacleSensor {
    /// Cast along `direction` up to `range` metres from the sensor.
    fn try_raycast(&mut self, range: f64, direction: &Vector3<f64>) -> Option<Hit>;
}

/// Sensor that never sees anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct Blind;

impl ObstacleSensor for Blind {
    fn try_raycast(&mut self, _range: f64, _direction: &Vector3<f64>) -> Option<Hit> {
        None
    }
}

// ---------------------------------------------------------------------------
// Connector, cargo, command dispatch
// ---------------------------------------------------------------------------

/// Docking connector state.
pub trait Connector {
    fn is_connected(&self) -> bool;
}

impl Connector for bool {
    fn is_connected(&self) -> bool {
        *self
    }
}

/// Cargo capacity query.
pub trait CargoHold {
    /// Filled fraction of total cargo volume, in [0, 1].
    fn capacity_fraction(&self) -> f64;
}

impl CargoHold for f64 {
    fn capacity_fraction(&self) -> f64 {
        self.clamp(0.0, 1.0)
    }
}

/// Executes completion commands. Tokens are opaque to the core.
pub trait CommandDispatcher {
    fn execute(&mut self, command: &str);
}

/// Records every command, in order.
impl CommandDispatcher for Vec<String> {
    fn execute(&mut self, command: &str) {
        self.push(command.to_string());
    }
}
