use nalgebra::Vector3;

use crate::config::NavConfig;
use crate::nav::{Autopilot, ExchangePoint, ExchangeTask};
use super::obstacles::Sphere;
use super::ship::{SimConnector, SimShip};

/// A ship, its autopilot and the task already issued.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    pub ship: SimShip,
    pub autopilot: Autopilot,
}

/// Builder for custom scenarios.
pub struct ScenarioBuilder {
    name: String,
    mass: f64,
    position: Vector3<f64>,
    gravity: Vector3<f64>,
    obstacles: Vec<Sphere>,
    connector: SimConnector,
    docked: bool,
    undock_at: Option<f64>,
    cargo: f64,
    cargo_rate: f64,
}

impl ScenarioBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            mass: 20_000.0,
            position: Vector3::zeros(),
            gravity: Vector3::zeros(),
            obstacles: Vec::new(),
            connector: SimConnector::new(),
            docked: false,
            undock_at: None,
            cargo: 0.0,
            cargo_rate: 0.0,
        }
    }

    pub fn mass(mut self, v: f64) -> Self { self.mass = v; self }
    pub fn position(mut self, v: Vector3<f64>) -> Self { self.position = v; self }
    pub fn gravity(mut self, v: Vector3<f64>) -> Self { self.gravity = v; self }
    pub fn obstacle(mut self, s: Sphere) -> Self { self.obstacles.push(s); self }
    pub fn port(mut self, at: Vector3<f64>, range: f64) -> Self {
        self.connector.ports.push(at);
        self.connector.range = range;
        self
    }
    pub fn docked(mut self, v: bool) -> Self { self.docked = v; self }
    pub fn undock_at(mut self, t: f64) -> Self { self.undock_at = Some(t); self }
    pub fn cargo(mut self, fraction: f64, rate: f64) -> Self { self.cargo = fraction; self.cargo_rate = rate; self }

    /// Build the ship; `task` issues the autopilot command.
    pub fn build<F: FnOnce(&mut Autopilot, &SimShip)>(self, config: NavConfig, task: F) -> Scenario {
        let mut ship = SimShip::new(self.mass);
        ship.state.pos = self.position;
        ship.gravity = self.gravity;
        ship.sensor.spheres = self.obstacles;
        ship.connector = self.connector;
        ship.connector.connected = self.docked;
        ship.connector.release_at = self.undock_at;
        ship.cargo = self.cargo;
        ship.cargo_rate = self.cargo_rate;

        let mut autopilot = Autopilot::new(config);
        task(&mut autopilot, &ship);
        Scenario { name: self.name, ship, autopilot }
    }
}

// ---------------------------------------------------------------------------
// Preset scenarios
// ---------------------------------------------------------------------------

pub mod presets {
    use super::*;

    pub const NAMES: [&str; 3] = ["dock", "cruise", "transit"];

    /// Three-leg docking approach onto a connector 270 m ahead.
    pub fn dock(config: NavConfig) -> Scenario {
        let port = Vector3::new(0.0, 0.0, -270.0);
        ScenarioBuilder::new("Docking approach")
            .port(port, 1.0)
            .build(config, |ap, _| {
                ap.approach(
                    vec![Vector3::new(0.0, 0.0, -200.0), Vector3::new(0.0, 0.0, -260.0), port],
                    -Vector3::z(),
                    Vector3::y(),
                    None,
                    Some("DOCKED"),
                );
            })
    }

    /// 20 km cruise with an asteroid across the path.
    pub fn cruise(config: NavConfig) -> Scenario {
        ScenarioBuilder::new("Cruise with evasion")
            .obstacle(Sphere::new(Vector3::new(0.0, 0.0, -6_000.0), 200.0))
            .build(config, |ap, ship| {
                let destination = Vector3::new(0.0, 0.0, -20_000.0);
                ap.cruise(ship.state.pos, vec![destination], Some("ARRIVED"));
                ap.arrive(destination, Some(500.0), Some("IN RANGE"));
            })
    }

    /// Surface cargo run in gravity: undock, fly the route, dock and load.
    pub fn transit(config: NavConfig) -> Scenario {
        let port = Vector3::new(0.0, 0.0, -4_300.0);
        ScenarioBuilder::new("Atmospheric transit")
            .gravity(Vector3::new(0.0, -3.7, 0.0))
            .port(Vector3::zeros(), 1.0)
            .port(port, 1.0)
            .docked(true)
            .undock_at(1.0)
            .cargo(0.1, 0.05)
            .build(config, |ap, _| {
                ap.transit(
                    vec![Vector3::new(0.0, 300.0, -1_500.0), Vector3::new(0.0, 300.0, -3_800.0)],
                    ExchangePoint {
                        waypoints: vec![Vector3::new(0.0, 60.0, -4_300.0), Vector3::new(0.0, 5.0, -4_300.0), port],
                        forward: -Vector3::z(),
                        up: Vector3::y(),
                    },
                    ExchangeTask::Load,
                    true,
                    Some("TRANSIT RETURN"),
                );
            })
    }

    pub fn by_name(name: &str, config: NavConfig) -> Option<Scenario> {
        match name {
            "dock" => Some(dock(config)),
            "cruise" => Some(cruise(config)),
            "transit" => Some(transit(config)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_issue_their_tasks() {
        for name in presets::NAMES {
            let s = presets::by_name(name, NavConfig::default()).unwrap();
            assert!(!s.autopilot.is_idle(), "{} starts idle", name);
        }
        assert!(presets::by_name("orbit", NavConfig::default()).is_none());
    }

    #[test]
    fn transit_starts_docked() {
        let s = presets::transit(NavConfig::default());
        assert!(s.ship.connector.connected);
        assert_eq!(s.autopilot.active(), vec!["Transit"]);
    }
}
