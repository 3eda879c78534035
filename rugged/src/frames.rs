//! Frame models.
//!
//! Precise frame transforms (precession, nutation, polar motion) belong to
//! an astronomy library; this crate only needs something that yields an
//! inertial ↔ body-fixed transform at a date. The
//! [`FrameTransformProvider`] trait is that seam, and
//! [`UniformlyRotatingFrame`] is the shipped default: a body spinning
//! uniformly about the inertial +z axis, with the prime meridian located by
//! the mean sidereal angle. Callers with an astronomy backend implement the
//! trait on top of it.

use crate::transform::StateTransform;
use hifitime::Epoch;
use nalgebra::{UnitQuaternion, Vector3};

/// Inertial frame identifiers recognized by the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InertialFrame {
    Eme2000,
    Gcrf,
    Mod,
    Tod,
    Veis1950,
}

/// Body-fixed frame identifiers recognized by the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFrame {
    Itrf,
    Gtod,
}

/// Source of inertial ↔ body-fixed transforms.
pub trait FrameTransformProvider {
    /// Transform mapping inertial coordinates to body-fixed coordinates at
    /// `date`.
    fn inertial_to_body(&self, date: Epoch) -> StateTransform;
}

/// Earth rotation rate, rad/s.
const EARTH_ROTATION_RATE: f64 = 7.292_115_146_706_979e-5;

/// Mean sidereal angle at the J2000 reference, rad.
const GMST_J2000: f64 = 4.894_961_212_823_058;

/// Uniformly rotating Earth model.
///
/// All inertial realizations are treated as one non-rotating frame here;
/// the identifiers are kept for reporting. The approximation is the frame
/// realization offset only, and stays consistent between direct and inverse
/// location since both go through the same provider.
pub struct UniformlyRotatingFrame {
    inertial: InertialFrame,
    body: BodyFrame,
    reference: Epoch,
}

impl UniformlyRotatingFrame {
    pub fn new(inertial: InertialFrame, body: BodyFrame) -> Self {
        Self {
            inertial,
            body,
            reference: Epoch::from_gregorian_utc_hms(2000, 1, 1, 12, 0, 0),
        }
    }

    pub fn inertial_frame(&self) -> InertialFrame {
        self.inertial
    }

    pub fn body_frame(&self) -> BodyFrame {
        self.body
    }
}

impl FrameTransformProvider for UniformlyRotatingFrame {
    fn inertial_to_body(&self, date: Epoch) -> StateTransform {
        let theta = GMST_J2000 + EARTH_ROTATION_RATE * (date - self.reference).to_seconds();
        StateTransform {
            rotation: UnitQuaternion::from_scaled_axis(Vector3::new(0.0, 0.0, -theta)),
            translation: Vector3::zeros(),
            velocity: Vector3::zeros(),
            spin: Vector3::new(0.0, 0.0, -EARTH_ROTATION_RATE),
        }
    }
}

/// Body frame frozen onto the inertial frame.
///
/// Useful for calibration and tests where the geometry should not move with
/// the body rotation.
pub struct NonRotatingFrame;

impl FrameTransformProvider for NonRotatingFrame {
    fn inertial_to_body(&self, _date: Epoch) -> StateTransform {
        StateTransform::identity()
    }
}
