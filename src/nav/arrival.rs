use nalgebra::Vector3;
use tracing::{info, warn};

use crate::checkpoint::{Checkpoint, FieldWriter, Fields};
use crate::config::ArrivalConfig;
use crate::hw::{Actuators, Vessel};
use super::completion_token;
use super::controller::Controller;
use super::kinematics::format_distance;

#[derive(Debug, Clone, PartialEq)]
pub struct ArrivalState {
    pub destination: Vector3<f64>,
    pub radius: f64,
    pub token: Option<String>,
    pub ticks: u32,
    pub status: String,
}

/// Watches the distance to one point and fires when inside the radius.
///
/// Only every `check_interval`-th tick is evaluated; the first tick always
/// is. The monitor never drives actuators.
#[derive(Debug, Clone)]
pub struct ArrivalMonitor {
    config: ArrivalConfig,
    state: Option<ArrivalState>,
}

impl ArrivalMonitor {
    pub fn new(config: ArrivalConfig) -> Self {
        Self { config, state: None }
    }

    pub fn initialize(&mut self, destination: Vector3<f64>, radius: Option<f64>, token: Option<&str>) {
        let radius = radius.unwrap_or(self.config.radius);
        if destination.iter().any(|c| !c.is_finite()) || !(radius.is_finite() && radius >= 0.0) {
            warn!("arrival: ignoring task with destination {:?} radius {}", destination, radius);
            self.state = None;
            return;
        }
        info!("arrival: watching {:?} within {}", destination, format_distance(radius));
        self.state = Some(ArrivalState {
            destination,
            radius,
            token: completion_token(token),
            ticks: 0,
            status: String::new(),
        });
    }

    pub fn state(&self) -> Option<&ArrivalState> {
        self.state.as_ref()
    }

    pub fn restore(&mut self, state: Option<ArrivalState>) {
        self.state = state;
    }
}

impl Controller for ArrivalMonitor {
    fn tick(&mut self, vessel: &mut Vessel<'_>) {
        let Some(state) = &mut self.state else {
            return;
        };
        let due = state.ticks % self.config.check_interval.max(1) == 0;
        state.ticks = state.ticks.wrapping_add(1);
        if !due {
            return;
        }

        let distance = vessel.pose.distance_to(&state.destination);
        if distance <= state.radius {
            info!("arrival: reached destination ({} out)", format_distance(distance));
            let token = self.state.take().and_then(|s| s.token);
            vessel.complete(token);
        } else {
            state.status = format!("Distance: {}", format_distance(distance));
        }
    }

    fn clear(&mut self, _actuators: &mut Actuators) {
        self.state = None;
    }

    fn has_target(&self) -> bool {
        self.state.is_some()
    }

    fn status(&self) -> Option<String> {
        self.state
            .as_ref()
            .map(|s| if s.status.is_empty() { "Distance: --".to_string() } else { s.status.clone() })
    }

    fn name(&self) -> &str {
        "Arrival"
    }
}

impl Checkpoint for Option<ArrivalState> {
    fn save(&self) -> String {
        let Some(s) = self else {
            return String::new();
        };
        FieldWriter::new()
            .vector("destination", &s.destination)
            .num("radius", s.radius)
            .num("ticks", s.ticks)
            .text("status", Some(&s.status))
            .text("token", s.token.as_deref())
            .finish()
    }

    fn load(value: &str) -> Self {
        let f = Fields::parse(value);
        if !f.has("destination") {
            return None;
        }
        Some(ArrivalState {
            destination: f.vector("destination"),
            radius: f.f64("radius"),
            token: f.text("token"),
            ticks: f.u32("ticks"),
            status: f.text("status").unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimShip;

    fn monitor(interval: u32) -> ArrivalMonitor {
        ArrivalMonitor::new(ArrivalConfig { radius: 200.0, check_interval: interval })
    }

    #[test]
    fn fires_on_first_tick_inside_radius() {
        let mut ship = SimShip::new(1_000.0);
        ship.state.pos = Vector3::new(0.0, 0.0, 150.0);
        let mut m = monitor(10);
        m.initialize(Vector3::zeros(), Some(200.0), Some("ARRIVED"));
        m.tick(&mut ship.vessel());
        assert!(!m.has_target());
        assert_eq!(ship.log, vec!["ARRIVED".to_string()]);
    }

    #[test]
    fn throttled_between_checks() {
        let mut ship = SimShip::new(1_000.0);
        ship.state.pos = Vector3::new(0.0, 0.0, 5_000.0);
        let mut m = monitor(3);
        m.initialize(Vector3::zeros(), None, Some("ARRIVED"));
        m.tick(&mut ship.vessel());
        assert_eq!(m.status().as_deref(), Some("Distance: 5.00 km"));

        // inside the radius now, but the next two ticks are skipped
        ship.state.pos = Vector3::new(0.0, 0.0, 10.0);
        m.tick(&mut ship.vessel());
        m.tick(&mut ship.vessel());
        assert!(m.has_target());
        m.tick(&mut ship.vessel());
        assert!(!m.has_target());
        assert_eq!(ship.log.len(), 1);
    }

    #[test]
    fn idle_tick_is_a_no_op() {
        let mut ship = SimShip::new(1_000.0);
        let before = ship.actuators.clone();
        let mut m = monitor(1);
        m.tick(&mut ship.vessel());
        assert_eq!(ship.actuators, before);
        assert!(m.state().is_none());
    }

    #[test]
    fn checkpoint_round_trip() {
        let mut ship = SimShip::new(1_000.0);
        ship.state.pos = Vector3::new(0.0, 3_000.0, 0.0);
        let mut m = monitor(4);
        m.initialize(Vector3::new(1.0, -2.0, 3.5), Some(75.0), None);
        m.tick(&mut ship.vessel());
        m.tick(&mut ship.vessel());
        let saved = m.state().cloned();
        assert_eq!(Option::<ArrivalState>::load(&saved.save()), saved);
    }
}
