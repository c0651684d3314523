use nalgebra::Vector3;
use tracing::{info, warn};

use crate::checkpoint::{read_records, write_records, Checkpoint};
use crate::config::NavConfig;
use crate::hw::{Actuators, Vessel};
use super::align::{AlignState, AlignTarget, AlignmentController};
use super::approach::{ApproachState, SpeedProfile, WaypointFollower};
use super::arrival::{ArrivalMonitor, ArrivalState};
use super::controller::Controller;
use super::cruise::{CruiseController, CruiseState};
use super::transit::{AtmosphericTransitController, ExchangePoint, ExchangeTask, TransitState};

// Checkpoint record keys
pub const ALIGN_KEY: &str = "Align";
pub const APPROACH_KEY: &str = "Approach";
pub const ARRIVAL_KEY: &str = "Arrival";
pub const CRUISE_KEY: &str = "Cruise";
pub const TRANSIT_KEY: &str = "Transit";

/// One of each controller behind a single command surface.
///
/// Controllers are independent: starting a task on one leaves the others
/// alone, and every controller with a target is ticked each cycle.
#[derive(Debug, Clone)]
pub struct Autopilot {
    config: NavConfig,
    alignment: AlignmentController,
    approach: WaypointFollower,
    arrival: ArrivalMonitor,
    cruise: CruiseController,
    transit: AtmosphericTransitController,
}

impl Autopilot {
    pub fn new(config: NavConfig) -> Self {
        Self {
            alignment: AlignmentController::new(config.alignment.clone()),
            approach: WaypointFollower::new(config.docking.clone(), &config.alignment),
            arrival: ArrivalMonitor::new(config.arrival.clone()),
            cruise: CruiseController::new(config.cruise.clone(), &config.alignment),
            transit: AtmosphericTransitController::new(
                config.transit.clone(),
                config.docking.clone(),
                &config.alignment,
            ),
            config,
        }
    }

    pub fn config(&self) -> &NavConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Task entry points
    // -----------------------------------------------------------------------

    pub fn align(&mut self, forward: Vector3<f64>, up: Vector3<f64>, tolerance: Option<f64>, token: Option<&str>) {
        self.alignment.initialize(forward, up, tolerance, token);
    }

    /// Docking approach holding the `forward`/`up` frame throughout.
    pub fn approach(
        &mut self,
        waypoints: Vec<Vector3<f64>>,
        forward: Vector3<f64>,
        up: Vector3<f64>,
        profile: Option<SpeedProfile>,
        token: Option<&str>,
    ) {
        match AlignTarget::new(forward, up, self.config.alignment.tolerance) {
            Ok(target) => self.approach.initialize(waypoints, target, profile, token),
            Err(e) => {
                warn!("approach: ignoring task: {}", e);
                self.approach.restore(None);
            }
        }
    }

    pub fn arrive(&mut self, destination: Vector3<f64>, radius: Option<f64>, token: Option<&str>) {
        self.arrival.initialize(destination, radius, token);
    }

    pub fn cruise(&mut self, origin: Vector3<f64>, waypoints: Vec<Vector3<f64>>, token: Option<&str>) {
        self.cruise.initialize(origin, waypoints, token);
    }

    pub fn transit(
        &mut self,
        route: Vec<Vector3<f64>>,
        exchange: ExchangePoint,
        task: ExchangeTask,
        landing: bool,
        next_transit: Option<&str>,
    ) {
        self.transit.initialize(route, exchange, task, landing, next_transit);
    }

    // -----------------------------------------------------------------------
    // Control cycle
    // -----------------------------------------------------------------------

    fn controllers_mut(&mut self) -> [&mut dyn Controller; 5] {
        [
            &mut self.alignment,
            &mut self.approach,
            &mut self.arrival,
            &mut self.cruise,
            &mut self.transit,
        ]
    }

    fn controllers(&self) -> [&dyn Controller; 5] {
        [&self.alignment, &self.approach, &self.arrival, &self.cruise, &self.transit]
    }

    /// Tick every controller that has a target, in a fixed order.
    pub fn tick(&mut self, vessel: &mut Vessel<'_>) {
        for c in self.controllers_mut() {
            if c.has_target() {
                c.tick(vessel);
            }
        }
    }

    /// Drop every task and release all overrides. No tokens fire.
    pub fn stop(&mut self, actuators: &mut Actuators) {
        let active = self.active().join(", ");
        if !active.is_empty() {
            info!("autopilot: stopping {}", active);
        }
        for c in self.controllers_mut() {
            c.clear(actuators);
        }
        actuators.reset();
        actuators.set_dampeners(true);
    }

    pub fn is_idle(&self) -> bool {
        self.controllers().iter().all(|c| !c.has_target())
    }

    /// Names of the controllers that currently have a target.
    pub fn active(&self) -> Vec<&str> {
        self.controllers()
            .into_iter()
            .filter(|c| c.has_target())
            .map(|c| c.name())
            .collect()
    }

    /// Status lines for a display panel, one per active controller.
    pub fn status(&self) -> Vec<String> {
        self.controllers()
            .into_iter()
            .filter_map(|c| c.status().map(|s| format!("{}: {}", c.name(), s)))
            .collect()
    }

    pub fn alignment(&self) -> &AlignmentController {
        &self.alignment
    }

    pub fn follower(&self) -> &WaypointFollower {
        &self.approach
    }

    pub fn arrival(&self) -> &ArrivalMonitor {
        &self.arrival
    }

    pub fn cruiser(&self) -> &CruiseController {
        &self.cruise
    }

    pub fn shuttle(&self) -> &AtmosphericTransitController {
        &self.transit
    }

    // -----------------------------------------------------------------------
    // Checkpoint
    // -----------------------------------------------------------------------

    /// Serialize every controller, one `Key=Value` record each.
    pub fn save(&self) -> String {
        write_records(&[
            (ALIGN_KEY, self.alignment.state().cloned().save()),
            (APPROACH_KEY, self.approach.state().cloned().save()),
            (ARRIVAL_KEY, self.arrival.state().cloned().save()),
            (CRUISE_KEY, self.cruise.state().cloned().save()),
            (TRANSIT_KEY, self.transit.state().cloned().save()),
        ])
    }

    /// Restore every controller. Missing records clear their controller.
    pub fn load(&mut self, text: &str) {
        let records = read_records(text);
        let value = |key: &str| records.get(key).map(String::as_str).unwrap_or("");
        self.alignment.restore(Option::<AlignState>::load(value(ALIGN_KEY)));
        self.approach.restore(Option::<ApproachState>::load(value(APPROACH_KEY)));
        self.arrival.restore(Option::<ArrivalState>::load(value(ARRIVAL_KEY)));
        self.cruise.restore(Option::<CruiseState>::load(value(CRUISE_KEY)));
        self.transit.restore(Option::<TransitState>::load(value(TRANSIT_KEY)));
        if !self.is_idle() {
            info!("autopilot: restored {}", self.active().join(", "));
        }
    }
}

impl Default for Autopilot {
    fn default() -> Self {
        Self::new(NavConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimShip;

    #[test]
    fn idle_autopilot_ticks_without_effect() {
        let mut ship = SimShip::new(1_000.0);
        let before = ship.actuators.clone();
        let mut ap = Autopilot::default();
        ap.tick(&mut ship.vessel());
        assert!(ap.is_idle());
        assert_eq!(ship.actuators, before);
        assert!(ap.status().is_empty());
    }

    #[test]
    fn active_lists_controllers_in_tick_order() {
        let mut ap = Autopilot::default();
        ap.cruise(Vector3::zeros(), vec![Vector3::new(0.0, 0.0, -5_000.0)], None);
        ap.align(-Vector3::z(), Vector3::y(), None, None);
        assert_eq!(ap.active(), vec!["Align", "Cruise"]);
    }

    #[test]
    fn stop_fires_nothing() {
        let mut ship = SimShip::new(1_000.0);
        let mut ap = Autopilot::default();
        ap.arrive(Vector3::new(0.0, 0.0, -5_000.0), Some(10.0), Some("ARRIVED"));
        ap.approach(vec![Vector3::new(0.0, 0.0, -50.0)], -Vector3::z(), Vector3::y(), None, Some("DOCKED"));
        ap.tick(&mut ship.vessel());
        assert_eq!(ap.active(), vec!["Approach", "Arrival"]);
        ap.stop(&mut ship.actuators);
        ap.tick(&mut ship.vessel());
        assert!(ap.is_idle());
        assert!(ship.log.is_empty());
        assert!(ship.actuators.thrusters.iter().all(|t| t.override_fraction.is_none()));
    }

    #[test]
    fn bad_approach_frame_is_ignored() {
        let mut ap = Autopilot::default();
        ap.approach(vec![Vector3::new(0.0, 0.0, -50.0)], Vector3::y(), Vector3::y(), None, None);
        assert!(ap.is_idle());
    }

    #[test]
    fn checkpoint_restores_every_controller() {
        let mut ship = SimShip::new(1_000.0);
        ship.state.pos = Vector3::new(0.0, 0.0, 800.0);
        let mut ap = Autopilot::default();
        ap.align(Vector3::x(), Vector3::y(), Some(0.05), Some("A"));
        ap.approach(vec![Vector3::new(0.0, 0.0, -50.0)], -Vector3::z(), Vector3::y(), None, Some("B"));
        ap.arrive(Vector3::zeros(), None, Some("C"));
        ap.cruise(Vector3::zeros(), vec![Vector3::new(0.0, 0.0, -9_000.0)], Some("D"));
        ap.tick(&mut ship.vessel());

        let saved = ap.save();
        let mut restored = Autopilot::default();
        restored.load(&saved);
        assert_eq!(restored.save(), saved);
        assert_eq!(restored.active(), ap.active());
        assert_eq!(restored.cruiser().state(), ap.cruiser().state());

        restored.load("");
        assert!(restored.is_idle());
    }
}
