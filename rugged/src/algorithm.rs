//! Intersection algorithm selection.

use crate::{
    basic_scan::BasicScanAlgorithm, duvenhage::DuvenhageAlgorithm,
    ellipsoid::ExtendedEllipsoid, RuggedError,
};
use demtile::{NormalizedGeodeticPoint, TileUpdater};
use nalgebra::Vector3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgorithmId {
    Duvenhage,
    BasicScan,
    ConstantElevation,
    IgnoreDem,
}

/// Terrain intersection strategies.
///
/// `Duvenhage` is the production path; `BasicScan` the exhaustive
/// reference; `ConstantElevation` and `IgnoreDem` serve calibration and
/// degraded modes where no DEM is wanted.
pub enum IntersectionAlgorithm<U: TileUpdater> {
    Duvenhage(DuvenhageAlgorithm<U>),
    BasicScan(BasicScanAlgorithm<U>),
    ConstantElevation(f64),
    IgnoreDem,
}

impl<U: TileUpdater> IntersectionAlgorithm<U> {
    pub fn algorithm_id(&self) -> AlgorithmId {
        match self {
            Self::Duvenhage(_) => AlgorithmId::Duvenhage,
            Self::BasicScan(_) => AlgorithmId::BasicScan,
            Self::ConstantElevation(_) => AlgorithmId::ConstantElevation,
            Self::IgnoreDem => AlgorithmId::IgnoreDem,
        }
    }

    pub fn intersection(
        &mut self,
        ellipsoid: &ExtendedEllipsoid,
        position: &Vector3<f64>,
        los: &Vector3<f64>,
    ) -> Result<NormalizedGeodeticPoint, RuggedError> {
        match self {
            Self::Duvenhage(algorithm) => algorithm.intersection(ellipsoid, position, los),
            Self::BasicScan(algorithm) => algorithm.intersection(ellipsoid, position, los),
            Self::ConstantElevation(h) => altitude_intersection(ellipsoid, position, los, *h),
            Self::IgnoreDem => altitude_intersection(ellipsoid, position, los, 0.0),
        }
    }

    pub fn refine_intersection(
        &mut self,
        ellipsoid: &ExtendedEllipsoid,
        position: &Vector3<f64>,
        los: &Vector3<f64>,
        close_guess: &NormalizedGeodeticPoint,
    ) -> Result<Option<NormalizedGeodeticPoint>, RuggedError> {
        match self {
            Self::Duvenhage(algorithm) => {
                algorithm.refine_intersection(ellipsoid, position, los, close_guess)
            }
            Self::BasicScan(algorithm) => {
                algorithm.refine_intersection(ellipsoid, position, los, close_guess)
            }
            Self::ConstantElevation(h) => {
                altitude_intersection(ellipsoid, position, los, *h).map(Some)
            }
            Self::IgnoreDem => altitude_intersection(ellipsoid, position, los, 0.0).map(Some),
        }
    }

    /// Terrain elevation this algorithm sees at a point.
    pub fn elevation(&mut self, latitude: f64, longitude: f64) -> Result<f64, RuggedError> {
        match self {
            Self::Duvenhage(algorithm) => algorithm.elevation(latitude, longitude),
            Self::BasicScan(algorithm) => algorithm.elevation(latitude, longitude),
            Self::ConstantElevation(h) => Ok(*h),
            Self::IgnoreDem => Ok(0.0),
        }
    }
}

fn altitude_intersection(
    ellipsoid: &ExtendedEllipsoid,
    position: &Vector3<f64>,
    los: &Vector3<f64>,
    altitude: f64,
) -> Result<NormalizedGeodeticPoint, RuggedError> {
    let p = ellipsoid.point_at_altitude(position, los, altitude)?;
    let gp = ellipsoid.transform_cartesian_to_geodetic(&p);
    Ok(NormalizedGeodeticPoint::new(
        gp.latitude,
        gp.longitude,
        gp.altitude,
        gp.longitude,
    ))
}
