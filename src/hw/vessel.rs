use tracing::info;

use super::actuators::Actuators;
use super::sensors::{CargoHold, CommandDispatcher, Connector, ObstacleSensor, Pose};

/// Everything a controller may read or drive during one tick.
///
/// `now` is wall-clock seconds from any fixed epoch; only differences are
/// used, so behaviour does not depend on the tick rate.
pub struct Vessel<'a> {
    pub now: f64,
    pub pose: Pose,
    pub actuators: &'a mut Actuators,
    pub sensor: &'a mut dyn ObstacleSensor,
    pub connector: &'a dyn Connector,
    pub cargo: &'a dyn CargoHold,
    pub dispatcher: &'a mut dyn CommandDispatcher,
}

impl<'a> Vessel<'a> {
    /// Execute a completion token, if there is one.
    pub fn complete(&mut self, token: Option<String>) {
        if let Some(command) = token {
            info!("completion: executing {:?}", command);
            self.dispatcher.execute(&command);
        }
    }
}
