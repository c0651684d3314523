use nalgebra::Vector3;

// ---------------------------------------------------------------------------
// Vector helpers
// ---------------------------------------------------------------------------

/// Cross products shorter than this are treated as parallel vectors.
pub const DEGENERATE_AXIS: f64 = 1e-3;

/// Speeds below this give no meaningful ETA or direction.
pub const SPEED_EPS: f64 = 1e-3;

/// Angle between two vectors (rad). Zero-length input yields 0.
pub fn angle_between(a: &Vector3<f64>, b: &Vector3<f64>) -> f64 {
    let (na, nb) = (a.norm(), b.norm());
    if na < f64::EPSILON || nb < f64::EPSILON {
        return 0.0;
    }
    (a.dot(b) / (na * nb)).clamp(-1.0, 1.0).acos()
}

/// Rotation axis `a × b`.
///
/// For (anti)parallel inputs the cross product vanishes; a fixed unit axis
/// perpendicular-ish to `a` is returned instead so an antiparallel target
/// still produces torque.
pub fn rotation_axis(a: &Vector3<f64>, b: &Vector3<f64>) -> Vector3<f64> {
    let axis = a.cross(b);
    if axis.norm() > DEGENERATE_AXIS {
        axis
    } else {
        fallback_axis(a)
    }
}

/// X̂, or Ŷ when `v` itself lies along X.
pub fn fallback_axis(v: &Vector3<f64>) -> Vector3<f64> {
    let n = v.norm();
    if n > f64::EPSILON && (v.x / n).abs() > 0.9 {
        Vector3::y()
    } else {
        Vector3::x()
    }
}

/// Unit vector from `from` towards `to`; the fallback axis when they coincide.
pub fn direction_to(from: &Vector3<f64>, to: &Vector3<f64>) -> Vector3<f64> {
    unit_or(&(to - from), Vector3::x())
}

/// Normalize `v`, or return `fallback` for a (near) zero vector.
pub fn unit_or(v: &Vector3<f64>, fallback: Vector3<f64>) -> Vector3<f64> {
    let n = v.norm();
    if n > f64::EPSILON && n.is_finite() {
        v / n
    } else {
        fallback
    }
}

/// Up vector orthogonal to `forward`, as close to `hint` as possible.
pub fn level_up(forward: &Vector3<f64>, hint: &Vector3<f64>) -> Vector3<f64> {
    let f = unit_or(forward, -Vector3::z());
    let projected = hint - f * f.dot(hint);
    if projected.norm() > DEGENERATE_AXIS {
        projected.normalize()
    } else {
        // hint along forward: any perpendicular will do
        f.cross(&fallback_axis(&f)).normalize()
    }
}

/// Sum of leg lengths along `points`, starting at `start`.
pub fn path_length(start: &Vector3<f64>, points: &[Vector3<f64>]) -> f64 {
    let mut prev = *start;
    let mut total = 0.0;
    for p in points {
        total += (p - prev).norm();
        prev = *p;
    }
    total
}

// ---------------------------------------------------------------------------
// Status formatting
// ---------------------------------------------------------------------------

pub fn format_distance(meters: f64) -> String {
    if meters >= 1000.0 {
        format!("{:.2} km", meters / 1000.0)
    } else {
        format!("{:.0} m", meters)
    }
}

pub fn format_speed(speed: f64) -> String {
    format!("{:.1} m/s", speed)
}

/// Time to cover `distance` at `speed`, or `None` when nearly stationary.
pub fn eta_seconds(distance: f64, speed: f64) -> Option<f64> {
    if speed > SPEED_EPS {
        Some(distance / speed)
    } else {
        None
    }
}

pub fn format_eta(eta: Option<f64>) -> String {
    match eta {
        Some(s) if s.is_finite() => {
            let s = s.max(0.0).round() as u64;
            format!("{:02}:{:02}:{:02}", s / 3600, (s / 60) % 60, s % 60)
        }
        _ => "--:--:--".to_string(),
    }
}
