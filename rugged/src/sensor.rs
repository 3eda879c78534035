//! Pushbroom line sensor model.

use crate::RuggedError;
use hifitime::{Duration, Epoch};
use nalgebra::{DMatrix, Vector3};

/// Strictly monotone map between image lines and acquisition dates.
pub trait LineDatation {
    fn date(&self, line: f64) -> Epoch;
    fn line(&self, date: Epoch) -> f64;
}

/// Affine datation: `rate` lines per second around a reference line/date.
#[derive(Debug, Clone, Copy)]
pub struct LinearLineDatation {
    reference_date: Epoch,
    reference_line: f64,
    rate: f64,
}

impl LinearLineDatation {
    pub fn new(reference_date: Epoch, reference_line: f64, rate: f64) -> Result<Self, RuggedError> {
        if !(rate != 0.0 && rate.is_finite()) {
            return Err(RuggedError::InvalidStep { step: rate });
        }
        Ok(Self {
            reference_date,
            reference_line,
            rate,
        })
    }
}

impl LineDatation for LinearLineDatation {
    fn date(&self, line: f64) -> Epoch {
        self.reference_date + Duration::from_seconds((line - self.reference_line) / self.rate)
    }

    fn line(&self, date: Epoch) -> f64 {
        self.reference_line + self.rate * (date - self.reference_date).to_seconds()
    }
}

/// Line sensor: one row of pixels with their viewing directions in the
/// spacecraft frame, a datation model, and the derived mean viewing plane.
///
/// The mean plane is the best fitting plane through the pixel directions;
/// its normal parameterizes the scan direction and is oriented so that the
/// pixel index increases counter-clockwise around it.
pub struct LineSensor {
    name: String,
    position: Vector3<f64>,
    datation: Box<dyn LineDatation>,
    los: Vec<Vector3<f64>>,
    normal: Vector3<f64>,
    transversal: Vec<Vector3<f64>>,
    width: Vec<f64>,
}

impl LineSensor {
    pub fn new(
        name: impl Into<String>,
        position: Vector3<f64>,
        datation: Box<dyn LineDatation>,
        raw_los: Vec<Vector3<f64>>,
    ) -> Result<Self, RuggedError> {
        if raw_los.len() < 2 {
            return Err(RuggedError::NotEnoughPixels);
        }
        let los: Vec<Vector3<f64>> = raw_los.iter().map(|l| l.normalize()).collect();
        let n = los.len();

        // best fitting plane through the directions: centroid subtracted,
        // smallest singular vector of the 3 x n matrix is the normal
        let centroid = los
            .iter()
            .fold(Vector3::zeros(), |acc, l| acc + l)
            / n as f64;
        let matrix = DMatrix::from_fn(3, n, |r, c| (los[c] - centroid)[r]);
        let svd = matrix.svd(true, false);
        let u = svd.u.ok_or(RuggedError::Internal("svd without u factor"))?;
        let smallest = svd
            .singular_values
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))
            .map(|(k, _)| k)
            .ok_or(RuggedError::Internal("svd without singular values"))?;
        let mut normal =
            Vector3::new(u[(0, smallest)], u[(1, smallest)], u[(2, smallest)]).normalize();
        if normal.dot(&los[0].cross(&los[n - 1])) < 0.0 {
            normal = -normal;
        }

        let transversal: Vec<Vector3<f64>> =
            los.iter().map(|x| normal.cross(x).normalize()).collect();

        let mut sensor = Self {
            name: name.into(),
            position,
            datation,
            los,
            normal,
            transversal,
            width: Vec::new(),
        };
        // per-pixel angular widths: mean one-sided azimuth step, one-sided
        // at the edges
        let mut width = Vec::with_capacity(n);
        for i in 0..n {
            let w = if i == 0 {
                sensor.azimuth(&sensor.los[1], 0)
            } else if i == n - 1 {
                -sensor.azimuth(&sensor.los[n - 2], n - 1)
            } else {
                0.5 * (sensor.azimuth(&sensor.los[i + 1], i)
                    - sensor.azimuth(&sensor.los[i - 1], i))
            };
            width.push(w);
        }
        sensor.width = width;
        Ok(sensor)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sensor position in the spacecraft frame, m.
    pub fn position(&self) -> Vector3<f64> {
        self.position
    }

    pub fn nb_pixels(&self) -> usize {
        self.los.len()
    }

    /// Normalized viewing direction of a pixel, in the spacecraft frame.
    pub fn los(&self, pixel: usize) -> Vector3<f64> {
        self.los[pixel]
    }

    /// Viewing direction linearly interpolated at a fractional pixel.
    pub fn interpolated_los(&self, pixel: f64) -> Vector3<f64> {
        let i = (pixel.floor().max(0.0) as usize).min(self.los.len() - 2);
        let frac = (pixel - i as f64).clamp(0.0, 1.0);
        ((1.0 - frac) * self.los[i] + frac * self.los[i + 1]).normalize()
    }

    pub fn date(&self, line: f64) -> Epoch {
        self.datation.date(line)
    }

    pub fn line(&self, date: Epoch) -> f64 {
        self.datation.line(date)
    }

    /// Unit normal of the mean viewing plane.
    pub fn mean_plane_normal(&self) -> Vector3<f64> {
        self.normal
    }

    /// Signed angle from pixel `pixel`'s direction to `direction`, measured
    /// in the mean plane, counter-clockwise around the normal.
    pub fn azimuth(&self, direction: &Vector3<f64>, pixel: usize) -> f64 {
        direction
            .dot(&self.transversal[pixel])
            .atan2(direction.dot(&self.los[pixel]))
    }

    /// Angular width of a pixel, rad.
    pub fn width(&self, pixel: usize) -> f64 {
        self.width[pixel]
    }
}
