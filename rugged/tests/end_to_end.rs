//! End-to-end scenarios: synthetic volcano, cliff discontinuity, and the
//! direct/inverse location round trip.

use approx::assert_relative_eq;
use demtile::{DemError, GeodeticPoint, TileUpdater, UpdatableTile};
use hifitime::{Epoch, Unit};
use nalgebra::{Matrix3, Rotation3, UnitQuaternion, Vector3};
use rugged::{
    AlgorithmChoice, AngularDerivatives, AttitudeSample, BasicScanAlgorithm,
    CartesianDerivatives, DuvenhageAlgorithm, EllipsoidId, ExtendedEllipsoid,
    LinearLineDatation, LineSensor, NonRotatingFrame, PvSample, Rugged, RuggedError,
};

const EQUATORIAL_RADIUS: f64 = 6_378_137.0;

fn epoch() -> Epoch {
    Epoch::from_gregorian_utc_hms(2012, 1, 1, 0, 0, 0)
}

fn wgs84() -> ExtendedEllipsoid {
    ExtendedEllipsoid::from_id(EllipsoidId::Wgs84)
}

/// Synthetic conical volcano, one 1201 x 1201 tile over one degree.
struct ConeUpdater {
    center_latitude: f64,
    center_longitude: f64,
    peak: f64,
    slope_tan: f64,
}

impl ConeUpdater {
    fn mayon() -> Self {
        Self {
            center_latitude: 13.25667_f64.to_radians(),
            center_longitude: 123.685_f64.to_radians(),
            peak: 2463.0,
            slope_tan: 30.0_f64.to_radians().tan(),
        }
    }

    fn elevation(&self, latitude: f64, longitude: f64) -> f64 {
        let d_lat = (latitude - self.center_latitude) * EQUATORIAL_RADIUS;
        let d_lon =
            (longitude - self.center_longitude) * EQUATORIAL_RADIUS * self.center_latitude.cos();
        let distance = d_lat.hypot(d_lon);
        (self.peak - distance * self.slope_tan).max(0.0)
    }
}

impl TileUpdater for ConeUpdater {
    fn update_tile(
        &self,
        _latitude: f64,
        _longitude: f64,
        tile: &mut dyn UpdatableTile,
    ) -> Result<(), DemError> {
        let step = 1.0_f64.to_radians() / 1200.0;
        let min_latitude = self.center_latitude - 600.0 * step;
        let min_longitude = self.center_longitude - 600.0 * step;
        tile.set_geometry(min_latitude, min_longitude, step, step, 1201, 1201)?;
        for i in 0..1201 {
            for j in 0..1201 {
                let latitude = min_latitude + i as f64 * step;
                let longitude = min_longitude + j as f64 * step;
                tile.set_elevation(i, j, self.elevation(latitude, longitude))?;
            }
        }
        Ok(())
    }
}

/// 101 x 101 tile with a 120 m vertical step along a meridian.
struct CliffUpdater {
    min_latitude: f64,
    min_longitude: f64,
    step: f64,
    cliff_column: usize,
    height: f64,
}

impl CliffUpdater {
    fn moher() -> Self {
        Self {
            min_latitude: 52.97_f64.to_radians(),
            min_longitude: -9.43_f64.to_radians(),
            step: 1.5e-6,
            cliff_column: 50,
            height: 120.0,
        }
    }

    fn cliff_longitude(&self) -> f64 {
        self.min_longitude + self.cliff_column as f64 * self.step
    }
}

impl TileUpdater for CliffUpdater {
    fn update_tile(
        &self,
        _latitude: f64,
        _longitude: f64,
        tile: &mut dyn UpdatableTile,
    ) -> Result<(), DemError> {
        tile.set_geometry(
            self.min_latitude,
            self.min_longitude,
            self.step,
            self.step,
            101,
            101,
        )?;
        for i in 0..101 {
            for j in 0..101 {
                let elevation = if j >= self.cliff_column {
                    self.height
                } else {
                    0.0
                };
                tile.set_elevation(i, j, elevation)?;
            }
        }
        Ok(())
    }
}

/// Flat sea-level checkerboard covering the whole globe, 0.02 rad tiles.
struct FlatUpdater;

impl TileUpdater for FlatUpdater {
    fn update_tile(
        &self,
        latitude: f64,
        longitude: f64,
        tile: &mut dyn UpdatableTile,
    ) -> Result<(), DemError> {
        let size = 0.02;
        let min_latitude = (latitude / size).floor() * size;
        let min_longitude = (longitude / size).floor() * size;
        tile.set_geometry(min_latitude, min_longitude, size / 10.0, size / 10.0, 11, 11)?;
        for i in 0..11 {
            for j in 0..11 {
                tile.set_elevation(i, j, 0.0)?;
            }
        }
        Ok(())
    }
}

/// Checkerboard of small flat tiles with a 3000 m plateau east of a wall
/// longitude, the wall ramp sitting well inside one tile band.
struct WallUpdater {
    ridge_longitude: f64,
}

impl WallUpdater {
    const BAND: f64 = 5.0e-4;
    const STEP: f64 = 5.0e-5;
}

impl TileUpdater for WallUpdater {
    fn update_tile(
        &self,
        latitude: f64,
        longitude: f64,
        tile: &mut dyn UpdatableTile,
    ) -> Result<(), DemError> {
        let min_latitude = (latitude / Self::BAND).floor() * Self::BAND;
        let min_longitude = (longitude / Self::BAND).floor() * Self::BAND;
        tile.set_geometry(min_latitude, min_longitude, Self::STEP, Self::STEP, 11, 11)?;
        for i in 0..11 {
            for j in 0..11 {
                let lon = min_longitude + j as f64 * Self::STEP;
                let elevation = if lon >= self.ridge_longitude { 3000.0 } else { 0.0 };
                tile.set_elevation(i, j, elevation)?;
            }
        }
        Ok(())
    }
}

/// Hovering-platform instance: static trajectory, identity attitude, body
/// frame frozen on the inertial frame.
fn static_instance<U: TileUpdater>(
    updater: U,
    position: Vector3<f64>,
) -> Rugged<U> {
    let pv_samples: Vec<PvSample> = (0..41)
        .map(|k| PvSample {
            date: epoch() + Unit::Second * (2.5 * k as f64),
            position,
            velocity: Vector3::zeros(),
        })
        .collect();
    let attitude_samples: Vec<AttitudeSample> = (0..101)
        .map(|k| AttitudeSample {
            date: epoch() + Unit::Second * (k as f64),
            quaternion: UnitQuaternion::identity(),
        })
        .collect();
    Rugged::builder()
        .algorithm(AlgorithmChoice::Duvenhage)
        .ellipsoid(EllipsoidId::Wgs84)
        .frame_provider(Box::new(NonRotatingFrame))
        .time_span(epoch(), epoch() + Unit::Second * 100.0, 0.25, 0.01)
        .trajectory(
            pv_samples,
            8,
            CartesianDerivatives::UsePositionVelocity,
            attitude_samples,
            2,
            AngularDerivatives::UseRotation,
        )
        .tile_updater(updater, 8)
        .light_time(false)
        .aberration(false)
        .build()
        .unwrap()
}

#[test]
fn test_mayon_volcano_summit() {
    let cone = ConeUpdater::mayon();
    let (latitude, longitude) = (cone.center_latitude, cone.center_longitude);
    let position = wgs84().transform_geodetic_to_cartesian(&GeodeticPoint::new(
        latitude, longitude, 700.0e3,
    ));
    let mut rugged = static_instance(ConeUpdater::mayon(), position);

    let nadir = -ExtendedEllipsoid::zenith(latitude, longitude);
    let ground = rugged
        .direct_location_of(epoch() + Unit::Second * 50.0, &Vector3::zeros(), &nadir)
        .unwrap();
    assert_relative_eq!(ground.latitude, latitude, epsilon = 1.0e-9);
    assert_relative_eq!(ground.longitude, longitude, epsilon = 1.0e-9);
    assert_relative_eq!(ground.altitude, 2463.0, epsilon = 1.0e-6);
}

#[test]
fn test_mayon_flank_oblique_ray_against_basic_scan() {
    let cone = ConeUpdater::mayon();
    let ellipsoid = wgs84();
    let satellite = ellipsoid.transform_geodetic_to_cartesian(&GeodeticPoint::new(
        cone.center_latitude - 0.05,
        cone.center_longitude,
        700.0e3,
    ));
    // aim at a point on the northern flank
    let target_latitude = cone.center_latitude + 2.0e-4;
    let target_longitude = cone.center_longitude + 1.0e-4;
    let target_elevation = cone.elevation(target_latitude, target_longitude);
    assert!(target_elevation > 1000.0);
    let aim = ellipsoid.transform_geodetic_to_cartesian(&GeodeticPoint::new(
        target_latitude,
        target_longitude,
        target_elevation,
    ));
    let los = (aim - satellite).normalize();

    let mut duvenhage = DuvenhageAlgorithm::new(ConeUpdater::mayon(), 4);
    let hit = duvenhage.intersection(&ellipsoid, &satellite, &los).unwrap();
    assert_relative_eq!(
        hit.altitude(),
        cone.elevation(hit.latitude(), hit.longitude()),
        epsilon = 1.0
    );

    // the exhaustive scan must find the same impact
    let mut basic = BasicScanAlgorithm::new(ConeUpdater::mayon(), 4);
    let reference = basic.intersection(&ellipsoid, &satellite, &los).unwrap();
    let distance = (ellipsoid.transform_geodetic_to_cartesian(&hit.into())
        - ellipsoid.transform_geodetic_to_cartesian(&reference.into()))
    .norm();
    assert!(distance < 0.05, "duvenhage vs basic scan: {distance} m");

    // refining its own output is a fixed point
    let refined = duvenhage
        .refine_intersection(&ellipsoid, &satellite, &los, &hit)
        .unwrap()
        .unwrap();
    let again = duvenhage
        .refine_intersection(&ellipsoid, &satellite, &los, &refined)
        .unwrap()
        .unwrap();
    let drift = (ellipsoid.transform_geodetic_to_cartesian(&refined.into())
        - ellipsoid.transform_geodetic_to_cartesian(&again.into()))
    .norm();
    assert!(drift < 1.0e-6, "refine drift: {drift} m");
}

#[test]
fn test_basic_scan_across_tiles() {
    // grazing equatorial ray: the scan rectangle between the 3000 m entry
    // altitude and sea level spans about ten tile bands, and the plateau
    // wall being hit sits in a band touching neither end of the rectangle
    let ridge_longitude = 0.36017;
    let ellipsoid = wgs84();
    let satellite = ellipsoid
        .transform_geodetic_to_cartesian(&GeodeticPoint::new(0.0, 0.0, 700.0e3));
    let aim = ellipsoid.transform_geodetic_to_cartesian(&GeodeticPoint::new(
        0.0,
        ridge_longitude,
        1500.0,
    ));
    let los = (aim - satellite).normalize();

    let mut basic = BasicScanAlgorithm::new(WallUpdater { ridge_longitude }, 32);
    let hit = basic.intersection(&ellipsoid, &satellite, &los).unwrap();

    // the impact is on the wall ramp, inside the cell straddling the ridge
    assert!(
        hit.altitude() > 100.0 && hit.altitude() < 2900.0,
        "altitude {}",
        hit.altitude()
    );
    assert!(
        hit.longitude() > ridge_longitude - 2.0 * WallUpdater::STEP
            && hit.longitude() < ridge_longitude + WallUpdater::STEP,
        "longitude {}",
        hit.longitude()
    );
    // and it sits on the interpolated terrain surface
    let surface = basic.elevation(hit.latitude(), hit.longitude()).unwrap();
    assert!((hit.altitude() - surface).abs() < 1.0e-3);

    // the production walker crosses the same tiles and agrees up to the
    // reference scan's single-point ray linearization
    let mut duvenhage = DuvenhageAlgorithm::new(WallUpdater { ridge_longitude }, 32);
    let reference = duvenhage.intersection(&ellipsoid, &satellite, &los).unwrap();
    let distance = (ellipsoid.transform_geodetic_to_cartesian(&hit.into())
        - ellipsoid.transform_geodetic_to_cartesian(&reference.into()))
    .norm();
    assert!(distance < 50.0, "basic scan vs duvenhage: {distance} m");
}

#[test]
fn test_cliffs_of_moher() {
    let cliff = CliffUpdater::moher();
    let latitude = cliff.min_latitude + 50.0 * cliff.step;
    let meters_per_lon_radian = EQUATORIAL_RADIUS * latitude.cos();
    let inland = cliff.cliff_longitude() + 15.0 / meters_per_lon_radian;
    let seaward = cliff.cliff_longitude() - 15.0 / meters_per_lon_radian;

    for (longitude, expected) in [(inland, 120.0), (seaward, 0.0)] {
        let position = wgs84().transform_geodetic_to_cartesian(&GeodeticPoint::new(
            latitude, longitude, 700.0e3,
        ));
        let mut rugged = static_instance(CliffUpdater::moher(), position);
        let nadir = -ExtendedEllipsoid::zenith(latitude, longitude);
        let ground = rugged
            .direct_location_of(epoch() + Unit::Second * 50.0, &Vector3::zeros(), &nadir)
            .unwrap();
        assert_relative_eq!(ground.altitude, expected, epsilon = 1.0e-4);
        assert_relative_eq!(ground.latitude, latitude, epsilon = 1.0e-9);
        assert_relative_eq!(ground.longitude, longitude, epsilon = 1.0e-9);
    }
}

/// Polar-ish pass over a flat body with a 2001-pixel across-track fan.
fn orbiting_instance() -> Rugged<FlatUpdater> {
    let ellipsoid = wgs84();
    let lat0 = 0.1;
    let lon0 = 0.2;
    let omega = 1.0e-3;
    let altitude = 700.0e3;

    let position_at = |t: f64| {
        ellipsoid.transform_geodetic_to_cartesian(&GeodeticPoint::new(
            lat0 + omega * t,
            lon0,
            altitude,
        ))
    };
    let velocity_at = |t: f64| (position_at(t + 0.5) - position_at(t - 0.5)) / 1.0;
    let attitude_at = |t: f64| {
        let z = -ExtendedEllipsoid::zenith(lat0 + omega * t, lon0);
        let along = velocity_at(t).normalize();
        let y = z.cross(&along).normalize();
        let x = y.cross(&z);
        let sc_to_inertial = UnitQuaternion::from_rotation_matrix(
            &Rotation3::from_matrix_unchecked(Matrix3::from_columns(&[x, y, z])),
        );
        sc_to_inertial.inverse()
    };

    let pv_samples: Vec<PvSample> = (0..41)
        .map(|k| {
            let t = 2.5 * k as f64;
            PvSample {
                date: epoch() + Unit::Second * t,
                position: position_at(t),
                velocity: velocity_at(t),
            }
        })
        .collect();
    let attitude_samples: Vec<AttitudeSample> = (0..101)
        .map(|k| {
            let t = k as f64;
            AttitudeSample {
                date: epoch() + Unit::Second * t,
                quaternion: attitude_at(t),
            }
        })
        .collect();

    // across-track fan with a small out-of-plane jitter
    let n = 2001;
    let pixels: Vec<Vector3<f64>> = (0..n)
        .map(|i| {
            let t = 2.0 * i as f64 / (n - 1) as f64 - 1.0;
            let theta = 0.35 * t;
            let off = 1.0e-5 * (t * t - 1.0 / 3.0 + 0.5 * (-1.0f64).powi(i as i32));
            Vector3::new(off, theta.sin(), theta.cos())
        })
        .collect();
    let sensor = LineSensor::new(
        "line",
        Vector3::zeros(),
        Box::new(LinearLineDatation::new(epoch(), 0.0, 10.0).unwrap()),
        pixels,
    )
    .unwrap();

    Rugged::builder()
        .algorithm(AlgorithmChoice::Duvenhage)
        .ellipsoid(EllipsoidId::Wgs84)
        .frame_provider(Box::new(NonRotatingFrame))
        .time_span(epoch(), epoch() + Unit::Second * 100.0, 0.1, 0.1)
        .trajectory(
            pv_samples,
            8,
            CartesianDerivatives::UsePositionVelocity,
            attitude_samples,
            2,
            AngularDerivatives::UseRotation,
        )
        .line_sensor(sensor)
        .tile_updater(FlatUpdater, 8)
        .light_time(false)
        .aberration(false)
        .build()
        .unwrap()
}

#[test]
fn test_direct_then_inverse_recovers_pixels() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut rugged = orbiting_instance();

    let line = 500.0;
    let ground = rugged.direct_location("line", line).unwrap();
    assert_eq!(ground.len(), 2001);

    for pixel in [0usize, 700, 1000, 1300, 2000] {
        let found = rugged
            .inverse_location("line", &ground[pixel], 0, 1000)
            .unwrap()
            .unwrap_or_else(|| panic!("pixel {pixel} not recovered"));
        assert!(
            (found.line - line).abs() < 1.0e-6,
            "pixel {pixel}: line {} vs {line}",
            found.line
        );
        assert!(
            (found.pixel - pixel as f64).abs() < 1.0e-6,
            "pixel {pixel}: recovered {}",
            found.pixel
        );
    }
}

#[test]
fn test_inverse_location_outside_range_is_none() {
    let mut rugged = orbiting_instance();
    let ground = rugged.direct_location("line", 900.0).unwrap();
    // the point is seen near line 900, far outside [0, 300]
    let found = rugged
        .inverse_location("line", &ground[1000], 0, 300)
        .unwrap();
    assert!(found.is_none());
}

#[test]
fn test_date_location() {
    let mut rugged = orbiting_instance();
    let ground = rugged.direct_location("line", 500.0).unwrap();
    let date = rugged
        .date_location("line", &ground[1000], 0, 1000)
        .unwrap()
        .unwrap();
    assert!(((date - epoch()).to_seconds() - 50.0).abs() < 1.0e-6);
}

#[test]
fn test_ray_away_from_ground_errors() {
    let mut rugged = orbiting_instance();
    // across-track horizontal ray: the supporting line misses the body
    let result = rugged.direct_location_of(
        epoch() + Unit::Second * 50.0,
        &Vector3::zeros(),
        &Vector3::new(0.0, 1.0, 0.0),
    );
    assert!(matches!(
        result,
        Err(RuggedError::LineOfSightDoesNotReachGround)
    ));
    // straight up in the spacecraft frame: the crossing is behind
    let result = rugged.direct_location_of(
        epoch() + Unit::Second * 50.0,
        &Vector3::zeros(),
        &Vector3::new(0.0, 0.0, -1.0),
    );
    assert!(matches!(
        result,
        Err(RuggedError::DemEntryPointIsBehindSpacecraft)
    ));
}
