//! Closed-loop simulation harness: a ship model implementing every hardware
//! collaborator, plus a runner that drives an [`Autopilot`](crate::nav::Autopilot).

pub mod integrator;
pub mod obstacles;
pub mod ship;
pub mod event;
pub mod runner;
pub mod scenario;

pub use integrator::{rk4_step, ShipState};
pub use obstacles::{Sphere, SphereField};
pub use ship::{SimConnector, SimShip};
pub use event::{EventKind, SimEvent};
pub use runner::{run, RunConfig, RunResult, Sample};
pub use scenario::{presets, Scenario, ScenarioBuilder};
