//! Observer-to-aircraft geometry
//!
//! Spherical earth, mean radius. Over the ~100 km an ADS-B receiver hears,
//! haversine distances are within a few metres of the ellipsoidal answer,
//! which is far below what matters for an elevation threshold.

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;
pub const METERS_PER_FOOT: f64 = 0.3048;
pub const METERS_PER_STATUTE_MILE: f64 = 1609.344;
pub const METERS_PER_SECOND_PER_KNOT: f64 = 1852.0 / 3600.0;

const COMPASS_POINTS: [&str; 16] = [
    "north",
    "north north east",
    "north east",
    "east north east",
    "east",
    "east south east",
    "south east",
    "south south east",
    "south",
    "south south west",
    "south west",
    "west south west",
    "west",
    "west north west",
    "north west",
    "north north west",
];

/// A point in decimal degrees with altitude in feet
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_ft: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64, altitude_ft: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude_ft,
        }
    }

    pub fn altitude_m(&self) -> f64 {
        self.altitude_ft * METERS_PER_FOOT
    }
}

/// Where the target appears from the observer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LookAngles {
    /// Initial great-circle bearing, degrees in [0, 360)
    pub bearing_deg: f64,
    /// Degrees above the observer's local horizontal
    pub elevation_deg: f64,
    /// Horizontal (surface) distance in metres
    pub range_m: f64,
    /// Straight-line distance in metres
    pub slant_range_m: f64,
}

/// Calculate distance between two points using Haversine formula
pub fn great_circle_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Calculate initial bearing from point 1 to point 2 in degrees
pub fn bearing(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let dlon = (lon2 - lon1).to_radians();

    let y = dlon.sin() * lat2_rad.cos();
    let x = lat1_rad.cos() * lat2_rad.sin() - lat1_rad.sin() * lat2_rad.cos() * dlon.cos();

    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

/// Angle in degrees above the horizontal for a target `altitude_difference_m`
/// above (negative: below) the observer at `horizontal_range_m`.
///
/// Directly overhead or underfoot yields +90 or -90.
pub fn elevation_angle(horizontal_range_m: f64, altitude_difference_m: f64) -> f64 {
    if horizontal_range_m == 0.0 {
        return if altitude_difference_m > 0.0 {
            90.0
        } else if altitude_difference_m < 0.0 {
            -90.0
        } else {
            0.0
        };
    }
    altitude_difference_m.atan2(horizontal_range_m).to_degrees()
}

/// Point reached travelling `distance_m` from (lat, lon) along initial `bearing_deg`
pub fn destination(lat: f64, lon: f64, bearing_deg: f64, distance_m: f64) -> (f64, f64) {
    let angular = distance_m / EARTH_RADIUS_M;
    let bearing_rad = bearing_deg.to_radians();
    let lat1 = lat.to_radians();
    let lon1 = lon.to_radians();

    let lat2 = (lat1.sin() * angular.cos() + lat1.cos() * angular.sin() * bearing_rad.cos()).asin();
    let lon2 = lon1
        + (bearing_rad.sin() * angular.sin() * lat1.cos())
            .atan2(angular.cos() - lat1.sin() * lat2.sin());

    let lon2 = (lon2.to_degrees() + 540.0) % 360.0 - 180.0;
    (lat2.to_degrees(), lon2)
}

pub fn look_angles(observer: &GeoPoint, target: &GeoPoint) -> LookAngles {
    let range_m = great_circle_distance(
        observer.latitude,
        observer.longitude,
        target.latitude,
        target.longitude,
    );
    let altitude_difference_m = target.altitude_m() - observer.altitude_m();

    LookAngles {
        bearing_deg: bearing(
            observer.latitude,
            observer.longitude,
            target.latitude,
            target.longitude,
        ),
        elevation_deg: elevation_angle(range_m, altitude_difference_m),
        range_m,
        slant_range_m: range_m.hypot(altitude_difference_m),
    }
}

/// 16-point compass name for a bearing
pub fn cardinal(bearing_deg: f64) -> &'static str {
    let normalized = bearing_deg.rem_euclid(360.0);
    let index = ((normalized + 11.25) / 22.5).floor() as usize % COMPASS_POINTS.len();
    COMPASS_POINTS[index]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overhead_and_underfoot() {
        assert_eq!(elevation_angle(0.0, 1000.0), 90.0);
        assert_eq!(elevation_angle(0.0, -1000.0), -90.0);
        assert_eq!(elevation_angle(0.0, 0.0), 0.0);
    }

    #[test]
    fn test_elevation_angle_values() {
        assert!((elevation_angle(1000.0, 1000.0) - 45.0).abs() < 1e-9);
        assert!((elevation_angle(1000.0, -1000.0) + 45.0).abs() < 1e-9);
        assert!(elevation_angle(100_000.0, 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_great_circle_distance() {
        // One degree of latitude on the mean sphere
        let d = great_circle_distance(37.0, -122.0, 38.0, -122.0);
        assert!((d - 111_194.9).abs() < 1.0, "got {d}");

        // SFO to LAX, about 543 km
        let d = great_circle_distance(37.6189, -122.375, 33.9425, -118.408);
        assert!((d - 543_000.0).abs() < 3_000.0, "got {d}");

        assert_eq!(great_circle_distance(37.0, -122.0, 37.0, -122.0), 0.0);
    }

    #[test]
    fn test_bearing() {
        assert!((bearing(37.0, -122.0, 38.0, -122.0) - 0.0).abs() < 1e-6);
        assert!((bearing(37.0, -122.0, 36.0, -122.0) - 180.0).abs() < 1e-6);
        let east = bearing(0.0, 0.0, 0.0, 1.0);
        assert!((east - 90.0).abs() < 1e-6);
        let west = bearing(0.0, 0.0, 0.0, -1.0);
        assert!((west - 270.0).abs() < 1e-6);
    }

    #[test]
    fn test_destination_round_trip_distance() {
        let (lat, lon) = destination(37.0, -122.0, 45.0, 10_000.0);
        let d = great_circle_distance(37.0, -122.0, lat, lon);
        assert!((d - 10_000.0).abs() < 0.5, "got {d}");
        let b = bearing(37.0, -122.0, lat, lon);
        assert!((b - 45.0).abs() < 0.01, "got {b}");
    }

    #[test]
    fn test_look_angles() {
        let observer = GeoPoint::new(37.0, -122.0, 0.0);
        let overhead = GeoPoint::new(37.0, -122.0, 5000.0);
        let angles = look_angles(&observer, &overhead);
        assert_eq!(angles.elevation_deg, 90.0);
        assert_eq!(angles.range_m, 0.0);
        assert!((angles.slant_range_m - 1524.0).abs() < 1e-6);

        // 1524 m up at 1524 m out is 45 degrees
        let (lat, _) = destination(37.0, -122.0, 0.0, 1524.0);
        let target = GeoPoint::new(lat, -122.0, 5000.0);
        let angles = look_angles(&observer, &target);
        assert!((angles.elevation_deg - 45.0).abs() < 0.01);
        assert_eq!(cardinal(angles.bearing_deg), "north");
    }

    #[test]
    fn test_cardinal() {
        assert_eq!(cardinal(0.0), "north");
        assert_eq!(cardinal(359.0), "north");
        assert_eq!(cardinal(45.0), "north east");
        assert_eq!(cardinal(100.0), "east");
        assert_eq!(cardinal(190.0), "south");
        assert_eq!(cardinal(-90.0), "west");
    }
}
