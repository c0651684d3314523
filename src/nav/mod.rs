pub mod kinematics;
pub mod controller;
pub mod align;
pub mod approach;
pub mod arrival;
pub mod cruise;
pub mod transit;
pub mod autopilot;

pub use controller::Controller;
pub use align::{steer, AlignTarget, Alignment, AlignmentController};
pub use approach::{SpeedProfile, WaypointFollower};
pub use arrival::ArrivalMonitor;
pub use cruise::{compute_evasion_waypoints, CruiseController, CruisePhase, ObstacleSnapshot};
pub use transit::{AtmosphericTransitController, ExchangePoint, ExchangeTask, TransitPhase};
pub use autopilot::Autopilot;

/// Completion tokens are opaque; blank input means "no callback".
pub(crate) fn completion_token(token: Option<&str>) -> Option<String> {
    token
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}
