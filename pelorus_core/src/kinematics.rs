//! Geodesic and kinematic helpers shared by correlation and fusion.
//!
//! Distances are great-circle (haversine) in meters; courses are degrees
//! clockwise from true north; velocities are [north, east] m/s.

use crate::model::GeoPos;
use geo::{HaversineDestination, HaversineDistance};
use nalgebra::Vector2;

/// Knots to meters per second.
pub const KNOTS_TO_MS: f64 = 0.5144;

/// Meters per second to knots.
pub const MS_TO_KNOTS: f64 = 1.0 / KNOTS_TO_MS;

/// Great-circle distance between two positions, in meters.
pub fn haversine_m(a: GeoPos, b: GeoPos) -> f64 {
    a.to_point().haversine_distance(&b.to_point())
}

/// Extrapolates a position along a velocity vector for `dt_s` seconds
/// (linear motion model on the great circle).
///
/// A negligible velocity short-circuits to the input position so a
/// stationary track never wanders numerically.
pub fn predict_position(position: GeoPos, velocity_ms: Vector2<f64>, dt_s: f64) -> GeoPos {
    let speed = velocity_ms.norm();
    if speed < 1e-6 || dt_s.abs() < 1e-9 {
        return position;
    }
    let bearing_deg = bearing_from_velocity(velocity_ms);
    let distance_m = speed * dt_s;
    GeoPos::from_point(
        position
            .to_point()
            .haversine_destination(bearing_deg, distance_m),
    )
}

/// Converts reported speed/course to a [north, east] velocity vector.
pub fn velocity_from_speed_course(speed_knots: f64, course_deg: f64) -> Vector2<f64> {
    let speed_ms = speed_knots * KNOTS_TO_MS;
    let course_rad = course_deg.to_radians();
    Vector2::new(speed_ms * course_rad.cos(), speed_ms * course_rad.sin())
}

/// Bearing (degrees clockwise from north, [0, 360)) of a velocity vector.
pub fn bearing_from_velocity(velocity_ms: Vector2<f64>) -> f64 {
    // atan2(east, north) gives clockwise-from-north directly
    let deg = velocity_ms.y.atan2(velocity_ms.x).to_degrees();
    (deg + 360.0) % 360.0
}

/// Speed in knots of a velocity vector.
pub fn speed_knots_from_velocity(velocity_ms: Vector2<f64>) -> f64 {
    velocity_ms.norm() * MS_TO_KNOTS
}

/// Smallest angular difference between two courses, in [0, 180].
pub fn course_delta_deg(a_deg: f64, b_deg: f64) -> f64 {
    let diff = (a_deg - b_deg).abs() % 360.0;
    diff.min(360.0 - diff)
}

/// Velocity implied by moving `from` -> `to` over `dt_s` seconds.
///
/// Returns `None` when `dt_s` is too small to divide by meaningfully
/// (e.g. two sensors matched in the same cycle).
pub fn velocity_between(from: GeoPos, to: GeoPos, dt_s: f64) -> Option<Vector2<f64>> {
    if dt_s < 0.5 {
        return None;
    }
    let distance_m = haversine_m(from, to);
    let speed_ms = distance_m / dt_s;
    if distance_m < 1e-6 {
        return Some(Vector2::zeros());
    }
    // Bearing from the initial point of the leg
    let from_pt = from.to_point();
    let to_pt = to.to_point();
    let lat1 = from_pt.y().to_radians();
    let lat2 = to_pt.y().to_radians();
    let dlon = (to_pt.x() - from_pt.x()).to_radians();
    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    let bearing_rad = y.atan2(x);
    Some(Vector2::new(
        speed_ms * bearing_rad.cos(),
        speed_ms * bearing_rad.sin(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_haversine_known_distance() {
        // One degree of latitude is ~111.2 km
        let a = GeoPos::new(18.0, 72.0);
        let b = GeoPos::new(19.0, 72.0);
        let d = haversine_m(a, b);
        assert!((d - 111_200.0).abs() < 1_000.0, "got {d}");
    }

    #[test]
    fn test_predict_position_northbound() {
        let start = GeoPos::new(18.0, 72.0);
        // 10 m/s due north for 1112 s ~= 0.1 degrees of latitude
        let predicted = predict_position(start, Vector2::new(10.0, 0.0), 1112.0);
        assert_relative_eq!(predicted.lat_deg, 18.1, epsilon = 0.005);
        assert_relative_eq!(predicted.lon_deg, 72.0, epsilon = 0.005);
    }

    #[test]
    fn test_predict_position_stationary() {
        let start = GeoPos::new(18.0, 72.0);
        let predicted = predict_position(start, Vector2::zeros(), 600.0);
        assert_eq!(predicted, start);
    }

    #[test]
    fn test_velocity_course_round_trip() {
        let v = velocity_from_speed_course(10.0, 45.0);
        assert_relative_eq!(bearing_from_velocity(v), 45.0, epsilon = 1e-9);
        assert_relative_eq!(speed_knots_from_velocity(v), 10.0, epsilon = 1e-9);
    }

    #[test]
    fn test_course_delta_wraps() {
        assert_relative_eq!(course_delta_deg(350.0, 10.0), 20.0);
        assert_relative_eq!(course_delta_deg(10.0, 350.0), 20.0);
        assert_relative_eq!(course_delta_deg(180.0, 0.0), 180.0);
    }

    #[test]
    fn test_velocity_between_eastbound() {
        let from = GeoPos::new(0.0, 72.0);
        let to = GeoPos::new(0.0, 72.01);
        // ~1113 m east over 111.3 s -> ~10 m/s east
        let v = velocity_between(from, to, 111.3).unwrap();
        assert_relative_eq!(v.x, 0.0, epsilon = 0.1);
        assert_relative_eq!(v.y, 10.0, epsilon = 0.2);
    }

    #[test]
    fn test_velocity_between_tiny_dt() {
        let from = GeoPos::new(0.0, 72.0);
        let to = GeoPos::new(0.0, 72.01);
        assert!(velocity_between(from, to, 0.1).is_none());
    }
}
