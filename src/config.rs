//! Configuration loading for ship-nav
//!
//! Every tunable of the control stack lives here. The ship, rogue and
//! navigator variants share one implementation and differ only in the
//! preset values below.

use crate::error::{NavError, Result};
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct NavConfig {
    #[serde(default)]
    pub alignment: AlignConfig,
    #[serde(default)]
    pub docking: DockingConfig,
    #[serde(default)]
    pub arrival: ArrivalConfig,
    #[serde(default)]
    pub cruise: CruiseConfig,
    #[serde(default)]
    pub transit: TransitConfig,
}

/// Gyro steering parameters
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct AlignConfig {
    /// Gyro override scale (rad/s at 90° error)
    #[serde(default = "default_angular_rate")]
    pub angular_rate: f64,

    /// Default alignment tolerance (rad)
    #[serde(default = "default_align_tolerance")]
    pub tolerance: f64,
}

/// Docking approach speed profile
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct DockingConfig {
    /// Speed on the first leg (m/s)
    #[serde(default = "default_first_leg_speed")]
    pub first_leg_speed: f64,

    /// Speed on interior legs (m/s)
    #[serde(default = "default_interior_speed")]
    pub interior_speed: f64,

    /// Speed on the final leg into the connector (m/s)
    #[serde(default = "default_last_leg_speed")]
    pub last_leg_speed: f64,

    /// Distance below which first/last legs slow down (m)
    #[serde(default = "default_slowdown_distance")]
    pub slowdown_distance: f64,

    /// Distance at which a waypoint counts as reached (m)
    #[serde(default = "default_arrival_threshold")]
    pub arrival_threshold: f64,

    /// Speed floor so the approach never stalls (m/s)
    #[serde(default = "default_min_speed")]
    pub min_speed: f64,

    /// Velocity-matching gain
    #[serde(default = "default_gain")]
    pub gain: f64,
}

/// Proximity check parameters
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ArrivalConfig {
    /// Radius used when a task does not supply one (m)
    #[serde(default = "default_arrival_radius")]
    pub radius: f64,

    /// Evaluate every N ticks
    #[serde(default = "default_check_interval")]
    pub check_interval: u32,
}

/// Long-range cruise parameters
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct CruiseConfig {
    /// Cruise speed (m/s)
    #[serde(default = "default_cruise_max_speed")]
    pub max_speed: f64,

    /// Fraction of max speed at which acceleration ends
    #[serde(default = "default_speed_threshold")]
    pub speed_threshold: f64,

    /// Reduced speed close to a waypoint (m/s)
    #[serde(default = "default_near_base_speed")]
    pub near_base_speed: f64,

    /// Distance at which the near-base speed applies (m)
    #[serde(default = "default_near_base_distance")]
    pub near_base_distance: f64,

    /// Remaining distance at which braking starts (m)
    #[serde(default = "default_cruise_braking_distance")]
    pub braking_distance: f64,

    /// Obstacle raycast range (m)
    #[serde(default = "default_detection_range")]
    pub detection_range: f64,

    /// Raycast every N ticks
    #[serde(default = "default_scan_interval")]
    pub scan_interval: u32,

    /// Speed while flying evasion waypoints (m/s)
    #[serde(default = "default_evasion_speed")]
    pub evasion_speed: f64,

    /// Distance at which an evasion waypoint counts as reached (m)
    #[serde(default = "default_evasion_radius")]
    pub evasion_radius: f64,

    /// Clearance added past the obstacle's bounding radius (m)
    #[serde(default = "default_safety_margin")]
    pub safety_margin: f64,

    /// Heading tolerance before a course correction burn (rad)
    #[serde(default = "default_course_tolerance")]
    pub course_tolerance: f64,

    /// Duration of a course correction burn (s)
    #[serde(default = "default_rethrust_duration")]
    pub rethrust_duration: f64,

    /// Speed at which the ship counts as stopped (m/s)
    #[serde(default = "default_cruise_stop_speed")]
    pub stop_speed: f64,

    /// Gravity magnitude above which the ship is in a gravity field (m/s^2)
    #[serde(default = "default_gravity_threshold")]
    pub gravity_threshold: f64,

    /// Velocity-matching gain
    #[serde(default = "default_gain")]
    pub gain: f64,
}

/// Atmospheric transit parameters
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct TransitConfig {
    /// Reverse burn duration after undocking (s)
    #[serde(default = "default_separation_duration")]
    pub separation_duration: f64,

    /// Reverse speed during separation (m/s)
    #[serde(default = "default_separation_speed")]
    pub separation_speed: f64,

    /// Route speed (m/s)
    #[serde(default = "default_transit_max_speed")]
    pub max_speed: f64,

    /// Remaining distance at which braking starts (m)
    #[serde(default = "default_transit_braking_distance")]
    pub braking_distance: f64,

    /// Speed at which docking begins (m/s)
    #[serde(default = "default_transit_stop_speed")]
    pub stop_speed: f64,

    /// Heading tolerance while flying the route (rad)
    #[serde(default = "default_course_tolerance")]
    pub course_tolerance: f64,

    /// Cargo fraction at which loading is complete
    #[serde(default = "default_max_load")]
    pub max_load: f64,

    /// Cargo fraction at which unloading is complete
    #[serde(default = "default_min_load")]
    pub min_load: f64,

    /// Poll cargo every N ticks
    #[serde(default = "default_exchange_interval")]
    pub exchange_interval: u32,

    /// Velocity-matching gain
    #[serde(default = "default_gain")]
    pub gain: f64,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            angular_rate: default_angular_rate(),
            tolerance: default_align_tolerance(),
        }
    }
}

impl Default for DockingConfig {
    fn default() -> Self {
        Self {
            first_leg_speed: default_first_leg_speed(),
            interior_speed: default_interior_speed(),
            last_leg_speed: default_last_leg_speed(),
            slowdown_distance: default_slowdown_distance(),
            arrival_threshold: default_arrival_threshold(),
            min_speed: default_min_speed(),
            gain: default_gain(),
        }
    }
}

impl Default for ArrivalConfig {
    fn default() -> Self {
        Self {
            radius: default_arrival_radius(),
            check_interval: default_check_interval(),
        }
    }
}

impl Default for CruiseConfig {
    fn default() -> Self {
        Self {
            max_speed: default_cruise_max_speed(),
            speed_threshold: default_speed_threshold(),
            near_base_speed: default_near_base_speed(),
            near_base_distance: default_near_base_distance(),
            braking_distance: default_cruise_braking_distance(),
            detection_range: default_detection_range(),
            scan_interval: default_scan_interval(),
            evasion_speed: default_evasion_speed(),
            evasion_radius: default_evasion_radius(),
            safety_margin: default_safety_margin(),
            course_tolerance: default_course_tolerance(),
            rethrust_duration: default_rethrust_duration(),
            stop_speed: default_cruise_stop_speed(),
            gravity_threshold: default_gravity_threshold(),
            gain: default_gain(),
        }
    }
}

impl Default for TransitConfig {
    fn default() -> Self {
        Self {
            separation_duration: default_separation_duration(),
            separation_speed: default_separation_speed(),
            max_speed: default_transit_max_speed(),
            braking_distance: default_transit_braking_distance(),
            stop_speed: default_transit_stop_speed(),
            course_tolerance: default_course_tolerance(),
            max_load: default_max_load(),
            min_load: default_min_load(),
            exchange_interval: default_exchange_interval(),
            gain: default_gain(),
        }
    }
}

impl Default for NavConfig {
    fn default() -> Self {
        Self::ship()
    }
}

// Default value functions
fn default_angular_rate() -> f64 {
    2.0
}
fn default_align_tolerance() -> f64 {
    0.02
}
fn default_first_leg_speed() -> f64 {
    10.0
}
fn default_interior_speed() -> f64 {
    5.0
}
fn default_last_leg_speed() -> f64 {
    1.0
}
fn default_slowdown_distance() -> f64 {
    50.0
}
fn default_arrival_threshold() -> f64 {
    0.5
}
fn default_min_speed() -> f64 {
    0.5
}
fn default_gain() -> f64 {
    0.5
}
fn default_arrival_radius() -> f64 {
    200.0
}
fn default_check_interval() -> u32 {
    10
}
fn default_cruise_max_speed() -> f64 {
    100.0
}
fn default_speed_threshold() -> f64 {
    0.95
}
fn default_near_base_speed() -> f64 {
    20.0
}
fn default_near_base_distance() -> f64 {
    1000.0
}
fn default_cruise_braking_distance() -> f64 {
    300.0
}
fn default_detection_range() -> f64 {
    1500.0
}
fn default_scan_interval() -> u32 {
    5
}
fn default_evasion_speed() -> f64 {
    30.0
}
fn default_evasion_radius() -> f64 {
    25.0
}
fn default_safety_margin() -> f64 {
    100.0
}
fn default_course_tolerance() -> f64 {
    0.05
}
fn default_rethrust_duration() -> f64 {
    5.0
}
fn default_cruise_stop_speed() -> f64 {
    0.1
}
fn default_gravity_threshold() -> f64 {
    0.05
}
fn default_separation_duration() -> f64 {
    3.0
}
fn default_separation_speed() -> f64 {
    5.0
}
fn default_transit_max_speed() -> f64 {
    60.0
}
fn default_transit_braking_distance() -> f64 {
    150.0
}
fn default_transit_stop_speed() -> f64 {
    0.5
}
fn default_max_load() -> f64 {
    0.95
}
fn default_min_load() -> f64 {
    0.05
}
fn default_exchange_interval() -> u32 {
    10
}

// ---------------------------------------------------------------------------
// Presets
// ---------------------------------------------------------------------------

impl NavConfig {
    /// Cargo ship: the baseline values.
    pub fn ship() -> Self {
        Self {
            alignment: AlignConfig::default(),
            docking: DockingConfig::default(),
            arrival: ArrivalConfig::default(),
            cruise: CruiseConfig::default(),
            transit: TransitConfig::default(),
        }
    }

    /// Rogue ship: faster, less careful docking and cruise.
    pub fn rogue() -> Self {
        let mut cfg = Self::ship();
        cfg.docking.first_leg_speed = 15.0;
        cfg.docking.interior_speed = 8.0;
        cfg.docking.last_leg_speed = 2.0;
        cfg.docking.slowdown_distance = 40.0;
        cfg.cruise.max_speed = 120.0;
        cfg.cruise.near_base_speed = 30.0;
        cfg.cruise.safety_margin = 60.0;
        cfg
    }

    /// Navigator: long-haul cruise with wide scanning, no cargo runs.
    pub fn navigator() -> Self {
        let mut cfg = Self::ship();
        cfg.alignment.tolerance = 0.01;
        cfg.arrival.check_interval = 30;
        cfg.cruise.max_speed = 100.0;
        cfg.cruise.detection_range = 3000.0;
        cfg.cruise.braking_distance = 500.0;
        cfg.cruise.scan_interval = 10;
        cfg.cruise.course_tolerance = 0.03;
        cfg
    }

    /// Look up a preset by name.
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "ship" => Some(Self::ship()),
            "rogue" => Some(Self::rogue()),
            "navigator" => Some(Self::navigator()),
            _ => None,
        }
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NavError::Config(format!("Failed to read config file: {}", e)))?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text; missing keys take their defaults.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: NavConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the controllers cannot run with.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("alignment.angular_rate", self.alignment.angular_rate),
            ("alignment.tolerance", self.alignment.tolerance),
            ("docking.slowdown_distance", self.docking.slowdown_distance),
            ("docking.arrival_threshold", self.docking.arrival_threshold),
            ("cruise.max_speed", self.cruise.max_speed),
            ("cruise.rethrust_duration", self.cruise.rethrust_duration),
            ("transit.max_speed", self.transit.max_speed),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(NavError::Config(format!("{} must be positive, got {}", name, value)));
            }
        }
        if self.transit.min_load > self.transit.max_load {
            return Err(NavError::Config(format!(
                "transit.min_load ({}) exceeds transit.max_load ({})",
                self.transit.min_load, self.transit.max_load
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_ship_defaults() {
        let cfg = NavConfig::from_toml("").unwrap();
        assert_eq!(cfg, NavConfig::ship());
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let cfg = NavConfig::from_toml(
            r#"
            [docking]
            last_leg_speed = 0.8

            [cruise]
            max_speed = 90.0
            "#,
        )
        .unwrap();
        assert_eq!(cfg.docking.last_leg_speed, 0.8);
        assert_eq!(cfg.docking.first_leg_speed, 10.0);
        assert_eq!(cfg.cruise.max_speed, 90.0);
        assert_eq!(cfg.cruise.speed_threshold, 0.95);
    }

    #[test]
    fn rejects_inverted_load_thresholds() {
        let err = NavConfig::from_toml(
            r#"
            [transit]
            min_load = 0.9
            max_load = 0.5
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, NavError::Config(_)));
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(NavConfig::from_toml("[cruise\nmax_speed = ").is_err());
    }

    #[test]
    fn presets_diverge_on_docking_profile() {
        assert_ne!(NavConfig::ship().docking, NavConfig::rogue().docking);
        assert!(NavConfig::preset("navigator").is_some());
        assert!(NavConfig::preset("freighter").is_none());
    }
}
