//! Spacecraft trajectory and attitude, pre-sampled as rigid transforms.

use crate::{
    frames::FrameTransformProvider,
    math::hermite_vector3,
    transform::StateTransform,
    RuggedError,
};
use hifitime::{Duration, Epoch};
use log::debug;
use nalgebra::{UnitQuaternion, Vector3};

/// One spacecraft position/velocity sample, in the inertial frame.
#[derive(Debug, Clone, Copy)]
pub struct PvSample {
    pub date: Epoch,
    /// Position, m.
    pub position: Vector3<f64>,
    /// Velocity, m/s.
    pub velocity: Vector3<f64>,
}

/// One attitude sample: rotation mapping inertial coordinates to spacecraft
/// coordinates, the usual AOCS convention. The cache reverts it internally.
#[derive(Debug, Clone, Copy)]
pub struct AttitudeSample {
    pub date: Epoch,
    pub quaternion: UnitQuaternion<f64>,
}

/// Which derivatives the position/velocity interpolation uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartesianDerivatives {
    UsePosition,
    UsePositionVelocity,
}

/// Which derivatives the attitude interpolation uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AngularDerivatives {
    UseRotation,
    UseRotationRate,
}

/// Pre-sampled spacecraft → inertial → body transforms over a time span,
/// interpolated on lookup.
///
/// Each sample stores the three transforms consistently at its date; lookup
/// picks the nearest sample and shifts it by the date offset, so the
/// linearization error is bounded by the sampling step the caller chose.
pub struct SpacecraftToBody {
    min_date: Epoch,
    max_date: Epoch,
    /// Sampling step, s.
    t_step: f64,
    /// Tolerance in s for dates slightly outside `[min_date, max_date]`.
    overshoot_tolerance: f64,
    sc_to_inertial: Vec<StateTransform>,
    body_to_inertial: Vec<StateTransform>,
    inertial_to_body: Vec<StateTransform>,
}

impl SpacecraftToBody {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        provider: &dyn FrameTransformProvider,
        min_date: Epoch,
        max_date: Epoch,
        t_step: f64,
        overshoot_tolerance: f64,
        pv_samples: &[PvSample],
        pv_order: usize,
        pv_filter: CartesianDerivatives,
        attitude_samples: &[AttitudeSample],
        attitude_order: usize,
        attitude_filter: AngularDerivatives,
    ) -> Result<Self, RuggedError> {
        if !(t_step > 0.0) {
            return Err(RuggedError::InvalidStep { step: t_step });
        }
        check_coverage(
            min_date,
            max_date,
            pv_samples.first().map(|s| s.date),
            pv_samples.last().map(|s| s.date),
        )?;
        check_coverage(
            min_date,
            max_date,
            attitude_samples.first().map(|s| s.date),
            attitude_samples.last().map(|s| s.date),
        )?;

        let span = (max_date - min_date).to_seconds();
        let count = (span / t_step).ceil() as usize + 1;
        // attitude interpolation works on the bracketing sample pair, so
        // requested orders clamp down to 2
        let attitude_order = attitude_order.clamp(2, attitude_samples.len().max(2));
        debug!(
            "sampling {count} trajectory transforms, step {t_step} s, \
             orders {pv_order}/{attitude_order}"
        );

        let mut sc_to_inertial = Vec::with_capacity(count);
        let mut body_to_inertial = Vec::with_capacity(count);
        let mut inertial_to_body = Vec::with_capacity(count);
        for k in 0..count {
            let date = min_date + Duration::from_seconds(k as f64 * t_step);
            let (position, velocity) = interpolate_pv(pv_samples, pv_order, pv_filter, date);
            let (rotation, spin) = interpolate_attitude(attitude_samples, attitude_filter, date);
            sc_to_inertial.push(StateTransform {
                rotation,
                translation: position,
                velocity,
                spin,
            });
            let to_body = provider.inertial_to_body(date);
            body_to_inertial.push(to_body.inverse());
            inertial_to_body.push(to_body);
        }

        Ok(Self {
            min_date,
            max_date,
            t_step,
            overshoot_tolerance,
            sc_to_inertial,
            body_to_inertial,
            inertial_to_body,
        })
    }

    pub fn min_date(&self) -> Epoch {
        self.min_date
    }

    pub fn max_date(&self) -> Epoch {
        self.max_date
    }

    pub fn sc_to_inertial(&self, date: Epoch) -> Result<StateTransform, RuggedError> {
        let (k, dt) = self.sample_at(date)?;
        Ok(self.sc_to_inertial[k].shifted_by(dt))
    }

    pub fn body_to_inertial(&self, date: Epoch) -> Result<StateTransform, RuggedError> {
        let (k, dt) = self.sample_at(date)?;
        Ok(self.body_to_inertial[k].shifted_by(dt))
    }

    pub fn inertial_to_body(&self, date: Epoch) -> Result<StateTransform, RuggedError> {
        let (k, dt) = self.sample_at(date)?;
        Ok(self.inertial_to_body[k].shifted_by(dt))
    }

    /// Spacecraft frame straight to the body frame.
    pub fn sc_to_body(&self, date: Epoch) -> Result<StateTransform, RuggedError> {
        Ok(self.sc_to_inertial(date)?.then(&self.inertial_to_body(date)?))
    }

    fn sample_at(&self, date: Epoch) -> Result<(usize, f64), RuggedError> {
        let offset = (date - self.min_date).to_seconds();
        let span = (self.max_date - self.min_date).to_seconds();
        if offset < -self.overshoot_tolerance || offset > span + self.overshoot_tolerance {
            return Err(RuggedError::OutOfTimeRange {
                date,
                min_date: self.min_date,
                max_date: self.max_date,
            });
        }
        let last = self.sc_to_inertial.len() - 1;
        let k = ((offset / self.t_step).round().max(0.0) as usize).min(last);
        Ok((k, offset - k as f64 * self.t_step))
    }
}

fn check_coverage(
    min_date: Epoch,
    max_date: Epoch,
    first: Option<Epoch>,
    last: Option<Epoch>,
) -> Result<(), RuggedError> {
    let out_of_range = |date| RuggedError::OutOfTimeRange {
        date,
        min_date,
        max_date,
    };
    match (first, last) {
        (Some(first), Some(last)) if first <= min_date && last >= max_date => Ok(()),
        (Some(first), Some(last)) => Err(out_of_range(if first > min_date { first } else { last })),
        _ => Err(out_of_range(min_date)),
    }
}

/// Hermite interpolation over the `order` samples nearest to `date`.
fn interpolate_pv(
    samples: &[PvSample],
    order: usize,
    filter: CartesianDerivatives,
    date: Epoch,
) -> (Vector3<f64>, Vector3<f64>) {
    if samples.len() < 2 {
        return (samples[0].position, samples[0].velocity);
    }
    let order = order.clamp(2, samples.len());
    let pivot = samples.partition_point(|s| s.date < date);
    let start = pivot
        .saturating_sub(order / 2)
        .min(samples.len() - order);
    let window = &samples[start..start + order];

    let reference = window[0].date;
    let abscissae: Vec<f64> = window
        .iter()
        .map(|s| (s.date - reference).to_seconds())
        .collect();
    let values: Vec<Vector3<f64>> = window.iter().map(|s| s.position).collect();
    let derivatives: Vec<Vector3<f64>> = window.iter().map(|s| s.velocity).collect();
    let x = (date - reference).to_seconds();

    match filter {
        CartesianDerivatives::UsePositionVelocity => {
            hermite_vector3(&abscissae, &values, Some(&derivatives), x)
        }
        CartesianDerivatives::UsePosition => hermite_vector3(&abscissae, &values, None, x),
    }
}

/// Spherical linear interpolation between the bracketing attitude samples,
/// reverted to the spacecraft → inertial rotation. The spin estimate comes
/// from the bracketing pair when rates are requested.
fn interpolate_attitude(
    samples: &[AttitudeSample],
    filter: AngularDerivatives,
    date: Epoch,
) -> (UnitQuaternion<f64>, Vector3<f64>) {
    if samples.len() < 2 {
        return (samples[0].quaternion.inverse(), Vector3::zeros());
    }
    let pivot = samples.partition_point(|s| s.date < date);
    let i = pivot.clamp(1, samples.len() - 1) - 1;
    let (before, after) = (&samples[i], &samples[i + 1]);

    let dt = (after.date - before.date).to_seconds();
    let tau = if dt > 0.0 {
        ((date - before.date).to_seconds() / dt).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let interpolated = before.quaternion.slerp(&after.quaternion, tau);
    let rotation = interpolated.inverse();

    let spin = match filter {
        AngularDerivatives::UseRotationRate if dt > 0.0 => {
            // sc -> inertial rotations of the bracketing samples
            let r0 = before.quaternion.inverse();
            let r1 = after.quaternion.inverse();
            (r0.inverse() * r1).scaled_axis() / dt
        }
        _ => Vector3::zeros(),
    };
    (rotation, spin)
}

#[cfg(test)]
mod tests {
    use super::{
        AngularDerivatives, AttitudeSample, CartesianDerivatives, PvSample, SpacecraftToBody,
    };
    use crate::frames::NonRotatingFrame;
    use crate::RuggedError;
    use approx::assert_relative_eq;
    use hifitime::{Epoch, Unit};
    use nalgebra::{UnitQuaternion, Vector3};

    fn epoch() -> Epoch {
        Epoch::from_gregorian_utc_hms(2012, 1, 1, 0, 0, 0)
    }

    /// Circular motion in the x-y plane, radius 7000 km.
    fn pv(t: f64) -> PvSample {
        let omega = 1.0e-3;
        let r = 7.0e6;
        let (sin, cos) = (omega * t).sin_cos();
        PvSample {
            date: epoch() + Unit::Second * t,
            position: Vector3::new(r * cos, r * sin, 0.0),
            velocity: Vector3::new(-r * omega * sin, r * omega * cos, 0.0),
        }
    }

    fn attitude(t: f64) -> AttitudeSample {
        AttitudeSample {
            date: epoch() + Unit::Second * t,
            quaternion: UnitQuaternion::from_scaled_axis(Vector3::new(0.0, 0.0, 1.0e-3 * t)),
        }
    }

    fn cache() -> SpacecraftToBody {
        let pv_samples: Vec<_> = (0..41).map(|k| pv(k as f64 * 2.5)).collect();
        let attitude_samples: Vec<_> = (0..101).map(|k| attitude(k as f64)).collect();
        SpacecraftToBody::new(
            &NonRotatingFrame,
            epoch(),
            epoch() + Unit::Second * 100.0,
            0.1,
            0.01,
            &pv_samples,
            8,
            CartesianDerivatives::UsePositionVelocity,
            &attitude_samples,
            2,
            AngularDerivatives::UseRotationRate,
        )
        .unwrap()
    }

    #[test]
    fn test_interpolated_position_matches_motion() {
        // nearest-sample shift bounds the error by the 0.1 s step
        // linearization, a few centimeters at 7 m/s^2
        let cache = cache();
        for &t in &[0.0, 13.37, 50.0, 99.9] {
            let transform = cache.sc_to_inertial(epoch() + Unit::Second * t).unwrap();
            let expected = pv(t);
            assert!((transform.translation - expected.position).norm() < 0.05);
            assert!((transform.velocity - expected.velocity).norm() < 0.5);
        }
    }

    #[test]
    fn test_lookup_is_continuous_across_sample_boundary() {
        // the nearest sample switches at 40.05 s; both sides must agree up
        // to the shift linearization
        let cache = cache();
        let p = Vector3::new(1.0, -2.0, 0.5);
        let before = cache
            .sc_to_body(epoch() + Unit::Second * (40.05 - 1.0e-6))
            .unwrap()
            .transform_position(&p);
        let after = cache
            .sc_to_body(epoch() + Unit::Second * (40.05 + 1.0e-6))
            .unwrap()
            .transform_position(&p);
        assert!((before - after).norm() < 0.05);
    }

    #[test]
    fn test_out_of_time_range() {
        let cache = cache();
        assert!(matches!(
            cache.sc_to_inertial(epoch() + Unit::Second * 101.0),
            Err(RuggedError::OutOfTimeRange { .. })
        ));
        assert!(cache
            .sc_to_inertial(epoch() + Unit::Second * 100.005)
            .is_ok());
    }

    #[test]
    fn test_samples_must_span_range() {
        let pv_samples: Vec<_> = (0..11).map(|k| pv(k as f64 * 2.5)).collect();
        let attitude_samples: Vec<_> = (0..101).map(|k| attitude(k as f64)).collect();
        let result = SpacecraftToBody::new(
            &NonRotatingFrame,
            epoch(),
            epoch() + Unit::Second * 100.0,
            0.5,
            0.01,
            &pv_samples,
            8,
            CartesianDerivatives::UsePositionVelocity,
            &attitude_samples,
            2,
            AngularDerivatives::UseRotationRate,
        );
        assert!(matches!(result, Err(RuggedError::OutOfTimeRange { .. })));
    }
}
