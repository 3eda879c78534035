//! Rigid frame transforms with first-order time derivatives.

use nalgebra::{UnitQuaternion, Vector3};

/// Transform mapping coordinates of a source frame A into a destination
/// frame B: `x_B = rotation * x_A + translation`.
///
/// The transform carries its own first-order motion so that it can be
/// shifted by a small time offset without going back to the provider that
/// built it: `velocity` is the translation rate and `spin` the angular
/// velocity of the apparent rotation, expressed in the source frame.
#[derive(Debug, Clone, Copy)]
pub struct StateTransform {
    pub rotation: UnitQuaternion<f64>,
    pub translation: Vector3<f64>,
    pub velocity: Vector3<f64>,
    pub spin: Vector3<f64>,
}

impl StateTransform {
    pub fn identity() -> Self {
        Self {
            rotation: UnitQuaternion::identity(),
            translation: Vector3::zeros(),
            velocity: Vector3::zeros(),
            spin: Vector3::zeros(),
        }
    }

    pub fn transform_position(&self, p: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * p + self.translation
    }

    pub fn transform_direction(&self, d: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * d
    }

    /// Transform mapping B back to A, derivatives included.
    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.inverse();
        let translation = -(rotation * self.translation);
        // d/dt of -(R^-1 T): the inverse rotation sees the spin conjugated
        // and negated
        let velocity = self.spin.cross(&(rotation * self.translation)) - rotation * self.velocity;
        let spin = -(self.rotation * self.spin);
        Self {
            rotation,
            translation,
            velocity,
            spin,
        }
    }

    /// Composition applying `self` first, `second` next (A -> B -> C).
    pub fn then(&self, second: &StateTransform) -> Self {
        let rotation = second.rotation * self.rotation;
        let translation = second.rotation * self.translation + second.translation;
        let velocity = second.rotation * (second.spin.cross(&self.translation))
            + second.rotation * self.velocity
            + second.velocity;
        let spin = self.spin + self.rotation.inverse() * second.spin;
        Self {
            rotation,
            translation,
            velocity,
            spin,
        }
    }

    /// First-order advance of the transform by `dt` seconds.
    pub fn shifted_by(&self, dt: f64) -> Self {
        Self {
            rotation: self.rotation * UnitQuaternion::from_scaled_axis(self.spin * dt),
            translation: self.translation + self.velocity * dt,
            velocity: self.velocity,
            spin: self.spin,
        }
    }
}
