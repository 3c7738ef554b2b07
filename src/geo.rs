use serde::{Deserialize, Serialize};

/// Mean radius of the Earth, in miles.
pub const EARTH_RADIUS_MILES: f64 = 3958.8;

/// Any requested distance at or above this many miles means "no distance limit".
pub const UNLIMITED_DISTANCE_MILES: f64 = 510.0;

/// Name under which `haversine_miles` is registered on every SQLite connection.
pub const SQL_DISTANCE_FN: &str = "haversine_miles";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Great-circle distance between two points, in miles.
///
/// This is the only implementation of the formula: the query layer calls it through the
/// `haversine_miles` SQL function registered in `tpdb::connect`.
pub fn haversine_miles(from: Coordinates, to: Coordinates) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let d_lat = (to.latitude - from.latitude).to_radians();
    let d_lon = (to.longitude - from.longitude).to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_MILES * c
}

/// Whether a requested distance actually restricts results.
pub fn is_limited(distance: f64) -> bool {
    distance < UNLIMITED_DISTANCE_MILES
}

/// Rounds to one decimal place, the precision every distance and average is reported at.
pub fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn san_francisco_to_oakland() {
        let sf = Coordinates::new(37.7749, -122.4194);
        let oakland = Coordinates::new(37.8044, -122.2712);

        let miles = haversine_miles(sf, oakland);
        assert!((miles - 8.4).abs() < 0.1, "got {miles}");
    }

    #[test]
    fn distance_is_symmetric_and_zero_on_self() {
        let a = Coordinates::new(40.7128, -74.0060);
        let b = Coordinates::new(34.0522, -118.2437);

        assert_eq!(haversine_miles(a, a), 0.0);
        assert!((haversine_miles(a, b) - haversine_miles(b, a)).abs() < 1e-9);
        // NYC to LA is roughly 2445 miles
        assert!((haversine_miles(a, b) - 2445.0).abs() < 10.0);
    }

    #[test]
    fn sentinel_disables_limit() {
        assert!(is_limited(25.0));
        assert!(is_limited(509.9));
        assert!(!is_limited(510.0));
        assert!(!is_limited(10_000.0));
    }

    #[test]
    fn coordinate_bounds() {
        assert!(Coordinates::new(0.0, 0.0).is_valid());
        assert!(!Coordinates::new(91.0, 0.0).is_valid());
        assert!(!Coordinates::new(0.0, f64::NAN).is_valid());
    }

    #[test]
    fn rounds_to_tenths() {
        assert_eq!(round_tenth(4.25), 4.3);
        assert_eq!(round_tenth(3.333), 3.3);
    }
}
