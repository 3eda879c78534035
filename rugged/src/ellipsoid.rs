//! Reference ellipsoid with the line-of-sight primitives terrain
//! intersection needs.

use crate::RuggedError;
use demtile::{GeodeticLos, GeodeticPoint, NormalizedGeodeticPoint};
use nalgebra::Vector3;

/// Convergence threshold of the iterative geodetic latitude solve, rad.
const LATITUDE_CONVERGENCE: f64 = 1.0e-13;

/// Convergence threshold of the altitude crossing solve, m.
const ALTITUDE_CONVERGENCE: f64 = 1.0e-9;

const MAX_ITERATIONS: usize = 100;

/// Reference ellipsoid identifiers recognized by the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EllipsoidId {
    Wgs84,
    Grs80,
    Iers96,
    Iers2003,
}

/// Reference ellipsoid extended with ray crossing operations.
///
/// Pure value, never mutated after construction. Cartesian coordinates are
/// understood in the body-fixed frame the ellipsoid is attached to.
#[derive(Debug, Clone, Copy)]
pub struct ExtendedEllipsoid {
    equatorial_radius: f64,
    flattening: f64,
    /// First eccentricity squared.
    e2: f64,
}

impl ExtendedEllipsoid {
    pub fn new(equatorial_radius: f64, flattening: f64) -> Self {
        Self {
            equatorial_radius,
            flattening,
            e2: flattening * (2.0 - flattening),
        }
    }

    pub fn from_id(id: EllipsoidId) -> Self {
        match id {
            EllipsoidId::Wgs84 => Self::new(6_378_137.0, 1.0 / 298.257_223_563),
            EllipsoidId::Grs80 => Self::new(6_378_137.0, 1.0 / 298.257_222_101),
            EllipsoidId::Iers96 => Self::new(6_378_136.49, 1.0 / 298.256_45),
            EllipsoidId::Iers2003 => Self::new(6_378_136.6, 1.0 / 298.256_42),
        }
    }

    pub fn equatorial_radius(&self) -> f64 {
        self.equatorial_radius
    }

    pub fn flattening(&self) -> f64 {
        self.flattening
    }

    /// Unit vector along the local vertical at a geodetic location.
    pub fn zenith(latitude: f64, longitude: f64) -> Vector3<f64> {
        let (sin_lat, cos_lat) = latitude.sin_cos();
        let (sin_lon, cos_lon) = longitude.sin_cos();
        Vector3::new(cos_lat * cos_lon, cos_lat * sin_lon, sin_lat)
    }

    pub fn transform_geodetic_to_cartesian(&self, gp: &GeodeticPoint) -> Vector3<f64> {
        let (sin_lat, cos_lat) = gp.latitude.sin_cos();
        let (sin_lon, cos_lon) = gp.longitude.sin_cos();
        let n = self.equatorial_radius / (1.0 - self.e2 * sin_lat * sin_lat).sqrt();
        Vector3::new(
            (n + gp.altitude) * cos_lat * cos_lon,
            (n + gp.altitude) * cos_lat * sin_lon,
            (n * (1.0 - self.e2) + gp.altitude) * sin_lat,
        )
    }

    /// Geodetic coordinates of a body-frame Cartesian point, solving the
    /// latitude by fixed point iteration.
    pub fn transform_cartesian_to_geodetic(&self, p: &Vector3<f64>) -> GeodeticPoint {
        let r_axis = p.x.hypot(p.y);
        let longitude = p.y.atan2(p.x);

        let mut latitude = p.z.atan2(r_axis * (1.0 - self.e2));
        for _ in 0..MAX_ITERATIONS {
            let sin_lat = latitude.sin();
            let n = self.equatorial_radius / (1.0 - self.e2 * sin_lat * sin_lat).sqrt();
            let new_latitude = (p.z + n * self.e2 * sin_lat).atan2(r_axis);
            let converged = (new_latitude - latitude).abs() < LATITUDE_CONVERGENCE;
            latitude = new_latitude;
            if converged {
                break;
            }
        }

        let sin_lat = latitude.sin();
        let n = self.equatorial_radius / (1.0 - self.e2 * sin_lat * sin_lat).sqrt();
        let altitude = if latitude.abs() < std::f64::consts::FRAC_PI_4 {
            r_axis / latitude.cos() - n
        } else {
            p.z / sin_lat - n * (1.0 - self.e2)
        };
        GeodeticPoint::new(latitude, longitude, altitude)
    }

    /// Same as [`Self::transform_cartesian_to_geodetic`], normalizing the
    /// longitude around `central_longitude`.
    pub fn transform_cartesian_to_normalized(
        &self,
        p: &Vector3<f64>,
        central_longitude: f64,
    ) -> NormalizedGeodeticPoint {
        let gp = self.transform_cartesian_to_geodetic(p);
        NormalizedGeodeticPoint::new(gp.latitude, gp.longitude, gp.altitude, central_longitude)
    }

    /// Point of the ray `position + t los` at geodetic altitude `altitude`,
    /// taking the first crossing along the ray.
    pub fn point_at_altitude(
        &self,
        position: &Vector3<f64>,
        los: &Vector3<f64>,
        altitude: f64,
    ) -> Result<Vector3<f64>, RuggedError> {
        // spherical first guess, refined by a Newton iteration on the exact
        // geodetic altitude
        let los2 = los.norm_squared();
        let dot = position.dot(los);
        let t0 = -dot / los2;
        let close0 = position + los * t0;
        let r = self.equatorial_radius + altitude;
        let delta2 = r * r - close0.norm_squared();
        if delta2 < 0.0 {
            return Err(RuggedError::LineOfSightDoesNotReachGround);
        }
        let delta_t = (delta2 / los2).sqrt();
        let mut t = if dot < 0.0 { t0 - delta_t } else { t0 + delta_t };

        for _ in 0..MAX_ITERATIONS {
            let point = position + los * t;
            let gp = self.transform_cartesian_to_geodetic(&point);
            let delta_h = altitude - gp.altitude;
            if delta_h.abs() <= ALTITUDE_CONVERGENCE {
                return Ok(point);
            }
            let slope = los.dot(&Self::zenith(gp.latitude, gp.longitude));
            if slope.abs() < 1.0e-12 * los2.sqrt() {
                // grazing ray, the crossing is not transverse
                return Err(RuggedError::LineOfSightDoesNotReachGround);
            }
            t += delta_h / slope;
        }
        Err(RuggedError::LineOfSightDoesNotReachGround)
    }

    /// First crossing of the ray with the iso-latitude cone, choosing among
    /// the two cone intersections the one closest to `close_reference`.
    pub fn point_at_latitude(
        &self,
        position: &Vector3<f64>,
        los: &Vector3<f64>,
        latitude: f64,
        close_reference: &Vector3<f64>,
    ) -> Result<Vector3<f64>, RuggedError> {
        let err = RuggedError::LineOfSightNeverCrossesLatitude { latitude };
        let (sin_lat, cos_lat) = latitude.sin_cos();

        // apex of the cone of constant geodetic latitude, on the polar axis
        let z_apex =
            -self.equatorial_radius * self.e2 * sin_lat / (1.0 - self.e2 * sin_lat * sin_lat).sqrt();
        let pz = position.z - z_apex;

        // sin²φ (x² + y²) - cos²φ (z - z_apex)² = 0, quadratic in t
        let s2 = sin_lat * sin_lat;
        let c2 = cos_lat * cos_lat;
        let a = s2 * (los.x * los.x + los.y * los.y) - c2 * los.z * los.z;
        let b = 2.0 * (s2 * (position.x * los.x + position.y * los.y) - c2 * pz * los.z);
        let c = s2 * (position.x * position.x + position.y * position.y) - c2 * pz * pz;

        let mut candidates = [f64::NAN, f64::NAN];
        if a.abs() < 1.0e-20 {
            if b.abs() < 1.0e-20 {
                return Err(err);
            }
            candidates[0] = -c / b;
        } else {
            let disc = b * b - 4.0 * a * c;
            if disc < 0.0 {
                return Err(err);
            }
            let q = -0.5 * (b + b.signum() * disc.sqrt());
            candidates = if q == 0.0 {
                [0.0, 0.0]
            } else {
                [q / a, c / q]
            };
        }

        let t_ref = (close_reference - position).dot(los) / los.norm_squared();
        let mut best: Option<f64> = None;
        for t in candidates {
            if !t.is_finite() {
                continue;
            }
            // keep the nappe matching the latitude sign
            if sin_lat != 0.0 && (pz + t * los.z) * sin_lat < 0.0 {
                continue;
            }
            match best {
                Some(other) if (other - t_ref).abs() <= (t - t_ref).abs() => {}
                _ => best = Some(t),
            }
        }
        match best {
            Some(t) => Ok(position + los * t),
            None => Err(err),
        }
    }

    /// Crossing of the ray with the meridian plane at `longitude`.
    pub fn point_at_longitude(
        &self,
        position: &Vector3<f64>,
        los: &Vector3<f64>,
        longitude: f64,
    ) -> Result<Vector3<f64>, RuggedError> {
        let (sin_lon, cos_lon) = longitude.sin_cos();
        let normal = Vector3::new(-sin_lon, cos_lon, 0.0);
        let d = los.dot(&normal);
        if d.abs() < 1.0e-12 * los.norm() {
            return Err(RuggedError::LineOfSightNeverCrossesLongitude { longitude });
        }
        let t = -position.dot(&normal) / d;
        Ok(position + los * t)
    }

    /// Expresses a body-frame Cartesian direction as derivatives of the
    /// geodetic coordinates at `gp`, per meter along the direction.
    pub fn convert_los(&self, gp: &GeodeticPoint, los: &Vector3<f64>) -> GeodeticLos {
        let (sin_lat, cos_lat) = gp.latitude.sin_cos();
        let (sin_lon, cos_lon) = gp.longitude.sin_cos();
        let zenith = Vector3::new(cos_lat * cos_lon, cos_lat * sin_lon, sin_lat);
        let north = Vector3::new(-sin_lat * cos_lon, -sin_lat * sin_lon, cos_lat);
        let east = Vector3::new(-sin_lon, cos_lon, 0.0);

        // radius to the rotation axis at the point, and meridian curvature
        // radius raised by the altitude
        let p = self.transform_geodetic_to_cartesian(gp);
        let r = p.x.hypot(p.y).max(1.0e-9);
        let w2 = 1.0 - self.e2 * sin_lat * sin_lat;
        let meridian = self.equatorial_radius * (1.0 - self.e2) / (w2 * w2.sqrt()) + gp.altitude;

        GeodeticLos {
            d_lat: los.dot(&north) / meridian,
            d_lon: los.dot(&east) / r,
            d_alt: los.dot(&zenith),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{EllipsoidId, ExtendedEllipsoid};
    use crate::RuggedError;
    use approx::assert_relative_eq;
    use demtile::GeodeticPoint;
    use nalgebra::Vector3;

    fn wgs84() -> ExtendedEllipsoid {
        ExtendedEllipsoid::from_id(EllipsoidId::Wgs84)
    }

    #[test]
    fn test_geodetic_round_trip() {
        let ellipsoid = wgs84();
        for &lat in &[-1.4, -0.8, -0.2, 0.0, 0.3, 0.9, 1.5] {
            for &lon in &[-3.0, -1.0, 0.0, 2.0] {
                for &alt in &[-200.0, 0.0, 2463.0, 700.0e3] {
                    let gp = GeodeticPoint::new(lat, lon, alt);
                    let p = ellipsoid.transform_geodetic_to_cartesian(&gp);
                    let back = ellipsoid.transform_cartesian_to_geodetic(&p);
                    let p2 = ellipsoid.transform_geodetic_to_cartesian(&back);
                    assert!((p - p2).norm() < 1.0e-8, "lat {lat} lon {lon} alt {alt}");
                    assert_relative_eq!(back.latitude, lat, epsilon = 1.0e-12);
                    assert_relative_eq!(back.longitude, lon, epsilon = 1.0e-12);
                }
            }
        }
    }

    #[test]
    fn test_point_at_altitude_nadir() {
        let ellipsoid = wgs84();
        let gp = GeodeticPoint::new(0.3, 1.1, 700.0e3);
        let position = ellipsoid.transform_geodetic_to_cartesian(&gp);
        let los = -ExtendedEllipsoid::zenith(0.3, 1.1);
        let hit = ellipsoid.point_at_altitude(&position, &los, 1250.0).unwrap();
        let hit_gp = ellipsoid.transform_cartesian_to_geodetic(&hit);
        assert_relative_eq!(hit_gp.altitude, 1250.0, epsilon = 1.0e-6);
        assert_relative_eq!(hit_gp.latitude, 0.3, epsilon = 1.0e-9);
        assert_relative_eq!(hit_gp.longitude, 1.1, epsilon = 1.0e-12);
    }

    #[test]
    fn test_point_at_altitude_never_reaches() {
        let ellipsoid = wgs84();
        let gp = GeodeticPoint::new(0.3, 1.1, 700.0e3);
        let position = ellipsoid.transform_geodetic_to_cartesian(&gp);
        // looking up
        let los = ExtendedEllipsoid::zenith(0.3, 1.1);
        assert!(matches!(
            ellipsoid.point_at_altitude(&position, &los, 0.0),
            Err(RuggedError::LineOfSightDoesNotReachGround)
        ));
    }

    #[test]
    fn test_point_at_latitude() {
        let ellipsoid = wgs84();
        let gp = GeodeticPoint::new(0.2, 0.5, 600.0e3);
        let position = ellipsoid.transform_geodetic_to_cartesian(&gp);
        // slanted descent toward the north
        let los = (-ExtendedEllipsoid::zenith(0.2, 0.5)
            + Vector3::new(-0.1, -0.05, 0.3))
        .normalize();
        let reference = ellipsoid.point_at_altitude(&position, &los, 0.0).unwrap();
        let target = 0.21;
        let hit = ellipsoid
            .point_at_latitude(&position, &los, target, &reference)
            .unwrap();
        let hit_gp = ellipsoid.transform_cartesian_to_geodetic(&hit);
        assert_relative_eq!(hit_gp.latitude, target, epsilon = 1.0e-10);
    }

    #[test]
    fn test_point_at_longitude() {
        let ellipsoid = wgs84();
        let gp = GeodeticPoint::new(0.2, 0.5, 600.0e3);
        let position = ellipsoid.transform_geodetic_to_cartesian(&gp);
        let los = (-ExtendedEllipsoid::zenith(0.2, 0.5) + Vector3::new(-0.2, 0.2, 0.0)).normalize();
        let hit = ellipsoid.point_at_longitude(&position, &los, 0.51).unwrap();
        let hit_gp = ellipsoid.transform_cartesian_to_geodetic(&hit);
        assert_relative_eq!(hit_gp.longitude, 0.51, epsilon = 1.0e-10);
    }

    #[test]
    fn test_point_at_longitude_parallel_ray() {
        let ellipsoid = wgs84();
        let position = Vector3::new(7.0e6, 0.0, 0.0);
        // running along the meridian plane x-z, never crossing it
        let los = Vector3::new(0.3, 0.0, -1.0).normalize();
        assert!(ellipsoid.point_at_longitude(&position, &los, 0.0).is_err());
    }

    #[test]
    fn test_convert_los_matches_finite_differences() {
        let ellipsoid = wgs84();
        let gp = GeodeticPoint::new(0.4, -1.2, 1500.0);
        let p = ellipsoid.transform_geodetic_to_cartesian(&gp);
        let los = Vector3::new(0.3, -0.4, -0.86).normalize();
        let converted = ellipsoid.convert_los(&gp, &los);

        let step = 0.5;
        let moved = ellipsoid.transform_cartesian_to_geodetic(&(p + los * step));
        assert_relative_eq!(
            (moved.latitude - gp.latitude) / step,
            converted.d_lat,
            epsilon = 1.0e-9
        );
        assert_relative_eq!(
            (moved.longitude - gp.longitude) / step,
            converted.d_lon,
            epsilon = 1.0e-9
        );
        assert_relative_eq!(
            (moved.altitude - gp.altitude) / step,
            converted.d_alt,
            epsilon = 1.0e-6
        );
    }
}
