//! Geodetic point types shared by the tile layer and its consumers.

use std::f64::consts::PI;

/// A point given by its geodetic coordinates: latitude and longitude in
/// radians, altitude above the reference ellipsoid in meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeodeticPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

impl GeodeticPoint {
    pub fn new(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
        }
    }
}

/// A geodetic point whose longitude has been shifted by multiples of 2π so
/// that it lies within π of a stated central longitude.
///
/// Longitude comparisons between points sharing a central longitude are
/// monotone even across the ±π seam, which the tile walking code relies on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedGeodeticPoint {
    latitude: f64,
    longitude: f64,
    altitude: f64,
    central_longitude: f64,
}

impl NormalizedGeodeticPoint {
    pub fn new(latitude: f64, longitude: f64, altitude: f64, central_longitude: f64) -> Self {
        Self {
            latitude,
            longitude: normalize_longitude(longitude, central_longitude),
            altitude,
            central_longitude,
        }
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Longitude, guaranteed within `[central - π, central + π)`.
    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn altitude(&self) -> f64 {
        self.altitude
    }

    pub fn central_longitude(&self) -> f64 {
        self.central_longitude
    }
}

impl From<NormalizedGeodeticPoint> for GeodeticPoint {
    fn from(p: NormalizedGeodeticPoint) -> Self {
        GeodeticPoint::new(p.latitude, p.longitude, p.altitude)
    }
}

/// A Cartesian direction expressed as derivatives of the local geodetic
/// coordinates, per meter along the original direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeodeticLos {
    /// Latitude change, rad/m.
    pub d_lat: f64,
    /// Longitude change, rad/m.
    pub d_lon: f64,
    /// Altitude change, m/m.
    pub d_alt: f64,
}

/// Returns `longitude` shifted by a multiple of 2π into
/// `[center - π, center + π)`.
pub fn normalize_longitude(longitude: f64, center: f64) -> f64 {
    center - PI + (longitude - center + PI).rem_euclid(2.0 * PI)
}

#[cfg(test)]
mod tests {
    use super::{normalize_longitude, NormalizedGeodeticPoint, PI};
    use approx::assert_relative_eq;

    #[test]
    fn test_normalize_longitude() {
        assert_relative_eq!(normalize_longitude(0.1, 0.0), 0.1, epsilon = 1.0e-12);
        assert_relative_eq!(normalize_longitude(0.1 - 2.0 * PI, 0.0), 0.1, epsilon = 1.0e-12);
        assert_relative_eq!(normalize_longitude(0.1 + 4.0 * PI, 0.0), 0.1, epsilon = 1.0e-12);
        // upper bound is exclusive
        assert_relative_eq!(normalize_longitude(PI, 0.0), -PI, epsilon = 1.0e-12);
    }

    #[test]
    fn test_seam_monotony() {
        // two points straddling the antimeridian, normalized around it,
        // compare monotonically
        let west = NormalizedGeodeticPoint::new(0.0, PI - 0.01, 0.0, PI);
        let east = NormalizedGeodeticPoint::new(0.0, -PI + 0.01, 0.0, PI);
        assert!(east.longitude() > west.longitude());
        assert_relative_eq!(east.longitude(), PI + 0.01, epsilon = 1.0e-12);
    }
}
