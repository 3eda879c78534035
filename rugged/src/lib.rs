//! Geometric correction of pushbroom (line-scan) optical satellite
//! imagery.
//!
//! Given a spacecraft trajectory, an instrument model and a Digital
//! Elevation Model of the observed body, this crate answers the two coupled
//! geolocation questions:
//!
//! - **direct location** — which terrain point does an image line/pixel
//!   observe;
//! - **inverse location** — which image line/pixel observes a given ground
//!   point.
//!
//! The heavy lifting is the Duvenhage ray/terrain walker over min/max
//! pyramid tiles from the [`demtile`] crate, and the sensor mean-plane
//! crossing search that turns inverse location into two one-dimensional
//! root finds. Elevation sources plug in through
//! [`demtile::TileUpdater`]; precise astronomy (frame realizations, time
//! scale subtleties) plugs in through [`FrameTransformProvider`].
//!
//! ```no_run
//! # use rugged::*;
//! # fn main() -> Result<(), RuggedError> {
//! # let (pv, q, sensor, my_updater): (Vec<PvSample>, Vec<AttitudeSample>, LineSensor, NoDemUpdater) = unimplemented!();
//! # let (t0, t1) = unimplemented!();
//! let mut rugged = Rugged::builder()
//!     .algorithm(AlgorithmChoice::Duvenhage)
//!     .ellipsoid(EllipsoidId::Wgs84)
//!     .time_span(t0, t1, 0.1, 0.01)
//!     .trajectory(
//!         pv,
//!         8,
//!         CartesianDerivatives::UsePositionVelocity,
//!         q,
//!         2,
//!         AngularDerivatives::UseRotation,
//!     )
//!     .line_sensor(sensor)
//!     .tile_updater(my_updater, 8)
//!     .build()?;
//! let ground = rugged.direct_location("camera", 1200.0)?;
//! # Ok(())
//! # }
//! ```

pub use crate::{
    algorithm::{AlgorithmId, IntersectionAlgorithm},
    api::{AlgorithmChoice, NoDemUpdater, Rugged, RuggedBuilder, SensorPixel},
    basic_scan::BasicScanAlgorithm,
    crossing::{locate_pixel, CrossingResult, SensorMeanPlaneCrossing},
    duvenhage::DuvenhageAlgorithm,
    ellipsoid::{EllipsoidId, ExtendedEllipsoid},
    error::RuggedError,
    frames::{
        BodyFrame, FrameTransformProvider, InertialFrame, NonRotatingFrame,
        UniformlyRotatingFrame,
    },
    sensor::{LineDatation, LinearLineDatation, LineSensor},
    trajectory::{
        AngularDerivatives, AttitudeSample, CartesianDerivatives, PvSample, SpacecraftToBody,
    },
    transform::StateTransform,
};
pub use demtile;
pub use hifitime;
pub use nalgebra;

mod algorithm;
mod api;
mod basic_scan;
mod crossing;
mod duvenhage;
mod ellipsoid;
mod error;
mod frames;
mod math;
mod sensor;
mod trajectory;
mod transform;
