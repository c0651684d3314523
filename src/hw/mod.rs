//! Hardware contracts between the control core and the host.
//!
//! The core never discovers blocks. The host resolves thrusters, gyros and
//! sensors, hands them over as plain handles and trait objects, and syncs
//! the override values back to the real hardware after each tick.

pub mod actuators;
pub mod sensors;
pub mod vessel;

pub use actuators::{Actuators, Gyro, Thruster};
pub use sensors::{Blind, CargoHold, CommandDispatcher, Connector, Hit, ObstacleSensor, Pose};
pub use vessel::Vessel;
