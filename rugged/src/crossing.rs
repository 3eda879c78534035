//! Inverse location kernels: sensor mean-plane crossing and pixel crossing.

use crate::{
    math::brent, sensor::LineSensor, trajectory::SpacecraftToBody, transform::StateTransform,
    RuggedError,
};
use nalgebra::Vector3;

/// Result of a mean-plane crossing search.
#[derive(Debug, Clone, Copy)]
pub struct CrossingResult {
    pub line: f64,
    /// Direction from the sensor to the target, in the sensor frame.
    pub target_direction: Vector3<f64>,
    /// Derivative of the target direction with respect to the line.
    pub target_direction_derivative: Vector3<f64>,
}

/// Precomputed body → sensor transforms, one per line of a line range.
///
/// The table is what makes inverse location cheap to repeat: the secant
/// search interpolates it linearly instead of interrogating the trajectory
/// cache, and only the final refinement goes back to exact transforms. It
/// is rebuilt whenever the `(sensor, min_line, max_line)` triple changes.
pub struct SensorMeanPlaneCrossing {
    sensor_name: String,
    min_line: usize,
    max_line: usize,
    max_eval: usize,
    accuracy: f64,
    body_to_sensor: Vec<StateTransform>,
}

impl SensorMeanPlaneCrossing {
    pub fn new(
        sensor: &LineSensor,
        trajectory: &SpacecraftToBody,
        min_line: usize,
        max_line: usize,
        max_eval: usize,
        accuracy: f64,
    ) -> Result<Self, RuggedError> {
        if min_line >= max_line {
            return Err(RuggedError::InvalidRangeForLines { min_line, max_line });
        }
        let mut body_to_sensor = Vec::with_capacity(max_line - min_line + 1);
        for line in min_line..=max_line {
            let date = sensor.date(line as f64);
            body_to_sensor.push(trajectory.sc_to_body(date)?.inverse());
        }
        Ok(Self {
            sensor_name: sensor.name().to_string(),
            min_line,
            max_line,
            max_eval,
            accuracy,
            body_to_sensor,
        })
    }

    pub fn matches(&self, sensor_name: &str, min_line: usize, max_line: usize) -> bool {
        self.sensor_name == sensor_name && self.min_line == min_line && self.max_line == max_line
    }

    /// Finds the line whose mean-plane offset of the target direction is
    /// `offset` (0 for the plane itself).
    ///
    /// A secant iteration runs on the linear-interpolated table from the
    /// middle of the line range; leaving the range means the target is not
    /// seen and yields `None`. The converged estimate is then polished
    /// against exact trajectory transforms.
    pub fn find(
        &self,
        sensor: &LineSensor,
        trajectory: &SpacecraftToBody,
        target_body: &Vector3<f64>,
        offset: f64,
    ) -> Result<Option<CrossingResult>, RuggedError> {
        let normal = sensor.mean_plane_normal();
        let f_table = |line: f64| {
            normal.dot(&self.table_direction(sensor, target_body, line)) - offset
        };

        let mut l0 = 0.5 * (self.min_line + self.max_line) as f64;
        let mut l1 = l0 + 1.0;
        let mut f0 = f_table(l0);
        let mut f1 = f_table(l1);
        let mut converged = false;
        for _ in 0..self.max_eval {
            if f1 == f0 {
                break;
            }
            let l2 = l1 - f1 * (l1 - l0) / (f1 - f0);
            if !l2.is_finite() {
                return Err(RuggedError::SensorMeanPlaneNotFound);
            }
            if l2 < self.min_line as f64 || l2 > self.max_line as f64 {
                return Ok(None);
            }
            l0 = l1;
            f0 = f1;
            l1 = l2;
            f1 = f_table(l1);
            if (l1 - l0).abs() < self.accuracy {
                converged = true;
                break;
            }
        }
        if !converged {
            return Err(RuggedError::SensorMeanPlaneNotFound);
        }

        // polish on exact transforms, secant again with a short step
        let h = 0.25;
        let mut line = l1;
        for _ in 0..3 {
            let f = self.exact_offset(sensor, trajectory, target_body, line, offset)?;
            let f_ahead = self.exact_offset(sensor, trajectory, target_body, line + h, offset)?;
            let slope = (f_ahead - f) / h;
            if slope == 0.0 {
                break;
            }
            let correction = f / slope;
            line -= correction;
            if !line.is_finite() {
                return Err(RuggedError::SensorMeanPlaneNotFound);
            }
            if correction.abs() < 1.0e-10 {
                break;
            }
        }
        if line < self.min_line as f64 || line > self.max_line as f64 {
            return Ok(None);
        }

        let direction = self.exact_direction(sensor, trajectory, target_body, line)?;
        let ahead = self.exact_direction(sensor, trajectory, target_body, line + h)?;
        let behind = self.exact_direction(sensor, trajectory, target_body, line - h)?;
        Ok(Some(CrossingResult {
            line,
            target_direction: direction,
            target_direction_derivative: (ahead - behind) / (2.0 * h),
        }))
    }

    /// Target direction using the linear-interpolated table.
    fn table_direction(
        &self,
        sensor: &LineSensor,
        target_body: &Vector3<f64>,
        line: f64,
    ) -> Vector3<f64> {
        let offset = (line - self.min_line as f64)
            .clamp(0.0, (self.body_to_sensor.len() - 2) as f64);
        let k = offset.floor() as usize;
        let tau = offset - k as f64;
        let p0 = self.body_to_sensor[k].transform_position(target_body);
        let p1 = self.body_to_sensor[k + 1].transform_position(target_body);
        let in_sensor = p0 * (1.0 - tau) + p1 * tau;
        (in_sensor - sensor.position()).normalize()
    }

    fn exact_direction(
        &self,
        sensor: &LineSensor,
        trajectory: &SpacecraftToBody,
        target_body: &Vector3<f64>,
        line: f64,
    ) -> Result<Vector3<f64>, RuggedError> {
        let date = sensor.date(line);
        let in_sensor = trajectory
            .sc_to_body(date)?
            .inverse()
            .transform_position(target_body);
        Ok((in_sensor - sensor.position()).normalize())
    }

    fn exact_offset(
        &self,
        sensor: &LineSensor,
        trajectory: &SpacecraftToBody,
        target_body: &Vector3<f64>,
        line: f64,
        offset: f64,
    ) -> Result<f64, RuggedError> {
        Ok(sensor
            .mean_plane_normal()
            .dot(&self.exact_direction(sensor, trajectory, target_body, line)?)
            - offset)
    }
}

/// Continuous pixel index seeing `direction`, or `None` when the direction
/// falls outside the sensor's azimuth span.
pub fn locate_pixel(sensor: &LineSensor, direction: &Vector3<f64>) -> Result<Option<f64>, RuggedError> {
    let n = sensor.nb_pixels();
    let azimuth_at = |i: usize| sensor.azimuth(direction, i);

    // azimuths decrease as the pixel index increases; bracket the sign
    // change by bisection over the integer pixels, tolerating roundoff at
    // the very first and last pixels
    let (first, last) = (azimuth_at(0), azimuth_at(n - 1));
    if first < -1.0e-9 || last > 1.0e-9 {
        return Ok(None);
    }
    let (mut lo, mut hi) = (0, n - 1);
    while hi - lo > 1 {
        let mid = (lo + hi) / 2;
        if azimuth_at(mid) >= 0.0 {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    // solve azimuth(direction, lo) = (p - lo) * width(lo) inside the cell
    let g = |p: f64| azimuth_at(lo) - (p - lo as f64) * sensor.width(lo);
    let (a, b) = (lo as f64, lo as f64 + 1.0);
    if g(a) == 0.0 {
        return Ok(Some(a));
    }
    match brent(g, a, b, 1.0e-10, 100) {
        Some(pixel) => Ok(Some(pixel)),
        None => {
            // the mean width slightly disagrees with the local spacing near
            // the cell end; fall back to the linear solve
            let width = sensor.width(lo);
            if width == 0.0 {
                return Err(RuggedError::PixelNotFound);
            }
            let pixel = lo as f64 + azimuth_at(lo) / width;
            if (a - 0.1..=b + 0.1).contains(&pixel) {
                Ok(Some(pixel))
            } else {
                Err(RuggedError::PixelNotFound)
            }
        }
    }
}
