use crate::hw::{Actuators, Vessel};

/// Trait for tick-driven navigation controllers.
///
/// Every controller owns its task state outright. `tick` is a no-op without
/// a target; `clear` drops the task without firing its completion token.
pub trait Controller {
    /// Advance the task by one control cycle.
    fn tick(&mut self, vessel: &mut Vessel<'_>);

    /// Drop the task and release the actuators this controller drives.
    fn clear(&mut self, actuators: &mut Actuators);

    fn has_target(&self) -> bool;

    /// One-line human-readable status for display panels.
    fn status(&self) -> Option<String> {
        None
    }

    /// Human-readable name for logging/display.
    fn name(&self) -> &str {
        "unnamed"
    }
}
