//! Navigation and docking control stack for thruster-and-gyro vessels.
//!
//! Tick-driven controllers (alignment, docking approach, arrival watch,
//! long-range cruise, atmospheric transit) drive plain actuator handles and
//! persist themselves as text checkpoints. A point-mass simulator closes the
//! loop for testing and the demo binary.

pub mod error;
pub mod config;
pub mod checkpoint;
pub mod hw;
pub mod nav;
pub mod sim;
pub mod io;

pub use config::NavConfig;
pub use error::{NavError, Result};
pub use nav::Autopilot;
