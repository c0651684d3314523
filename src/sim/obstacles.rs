use nalgebra::Vector3;

use crate::hw::{Hit, ObstacleSensor};

/// A spherical body: asteroid, station hull or planet.
#[derive(Debug, Clone, PartialEq)]
pub struct Sphere {
    pub center: Vector3<f64>, // m, world
    pub radius: f64,          // m
    pub is_planet: bool,
}

impl Sphere {
    pub fn new(center: Vector3<f64>, radius: f64) -> Self {
        Self { center, radius, is_planet: false }
    }

    pub fn planet(center: Vector3<f64>, radius: f64) -> Self {
        Self { center, radius, is_planet: true }
    }

    /// Distance along a unit ray to the first surface crossing ahead of
    /// `origin`, if any. A ray starting inside hits the far side.
    pub fn intersect(&self, origin: &Vector3<f64>, direction: &Vector3<f64>) -> Option<f64> {
        let oc = origin - self.center;
        let b = oc.dot(direction);
        let c = oc.norm_squared() - self.radius * self.radius;
        let disc = b * b - c;
        if disc < 0.0 {
            return None;
        }
        let root = disc.sqrt();
        [-b - root, -b + root].into_iter().find(|t| *t >= 0.0)
    }
}

/// Raycasting sensor over a static set of spheres.
#[derive(Debug, Clone, Default)]
pub struct SphereField {
    pub origin: Vector3<f64>,
    pub spheres: Vec<Sphere>,
    pub casts: u64,
}

impl SphereField {
    pub fn new(spheres: Vec<Sphere>) -> Self {
        Self { origin: Vector3::zeros(), spheres, casts: 0 }
    }
}

impl ObstacleSensor for SphereField {
    fn try_raycast(&mut self, range: f64, direction: &Vector3<f64>) -> Option<Hit> {
        self.casts += 1;
        let n = direction.norm();
        if n < f64::EPSILON || !n.is_finite() {
            return None;
        }
        let dir = direction / n;
        self.spheres
            .iter()
            .filter_map(|s| s.intersect(&self.origin, &dir).map(|t| (t, s)))
            .filter(|(t, _)| *t <= range)
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(t, s)| Hit {
                position: s.center,
                bounding_radius: s.radius,
                distance: t,
                is_planet: s.is_planet,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn nearest_sphere_wins() {
        let mut field = SphereField::new(vec![
            Sphere::new(Vector3::new(0.0, 0.0, -800.0), 50.0),
            Sphere::new(Vector3::new(0.0, 0.0, -300.0), 20.0),
        ]);
        let hit = field.try_raycast(1_000.0, &-Vector3::z()).unwrap();
        assert_relative_eq!(hit.distance, 280.0);
        assert_eq!(hit.position, Vector3::new(0.0, 0.0, -300.0));
        assert_eq!(field.casts, 1);
    }

    #[test]
    fn out_of_range_and_behind_are_missed() {
        let mut field = SphereField::new(vec![
            Sphere::new(Vector3::new(0.0, 0.0, -3_000.0), 50.0),
            Sphere::new(Vector3::new(0.0, 0.0, 500.0), 50.0),
        ]);
        assert!(field.try_raycast(1_000.0, &-Vector3::z()).is_none());
        assert!(field.try_raycast(1_000.0, &Vector3::x()).is_none());
    }

    #[test]
    fn planet_flag_is_reported() {
        let mut field = SphereField::new(vec![Sphere::planet(Vector3::new(0.0, -61_000.0, 0.0), 60_000.0)]);
        let hit = field.try_raycast(1_500.0, &-Vector3::y()).unwrap();
        assert!(hit.is_planet);
        assert_relative_eq!(hit.distance, 1_000.0, epsilon = 1e-6);
    }
}
