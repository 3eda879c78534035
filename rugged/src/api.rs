//! Public entry points: [`RuggedBuilder`] configuration and the [`Rugged`]
//! location queries.

use crate::{
    algorithm::IntersectionAlgorithm,
    basic_scan::BasicScanAlgorithm,
    crossing::{locate_pixel, SensorMeanPlaneCrossing},
    duvenhage::DuvenhageAlgorithm,
    ellipsoid::{EllipsoidId, ExtendedEllipsoid},
    frames::{BodyFrame, FrameTransformProvider, InertialFrame, UniformlyRotatingFrame},
    sensor::LineSensor,
    trajectory::{
        AngularDerivatives, AttitudeSample, CartesianDerivatives, PvSample, SpacecraftToBody,
    },
    RuggedError,
};
use demtile::{GeodeticPoint, TileUpdater};
use hifitime::Epoch;
use log::debug;
use nalgebra::Vector3;

const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// Evaluation cap and accuracy of the coarse mean-plane crossing search.
const CROSSING_MAX_EVAL: usize = 50;
const CROSSING_ACCURACY: f64 = 1.0e-4;

/// A found image coordinate; both components are continuous.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorPixel {
    pub line: f64,
    pub pixel: f64,
}

/// Intersection algorithm selection for the builder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AlgorithmChoice {
    Duvenhage,
    BasicScan,
    ConstantElevation(f64),
    IgnoreDem,
}

/// Tile updater for configurations that use no DEM at all.
pub struct NoDemUpdater;

impl TileUpdater for NoDemUpdater {
    fn update_tile(
        &self,
        latitude: f64,
        longitude: f64,
        _tile: &mut dyn demtile::UpdatableTile,
    ) -> Result<(), demtile::DemError> {
        Err(demtile::DemError::WrongTile {
            latitude,
            longitude,
        })
    }
}

/// Configuration of a [`Rugged`] instance.
pub struct RuggedBuilder<U: TileUpdater> {
    algorithm: AlgorithmChoice,
    ellipsoid: EllipsoidId,
    inertial_frame: InertialFrame,
    body_frame: BodyFrame,
    provider: Option<Box<dyn FrameTransformProvider>>,
    time_span: Option<(Epoch, Epoch, f64, f64)>,
    pv_samples: Vec<PvSample>,
    pv_order: usize,
    pv_filter: CartesianDerivatives,
    attitude_samples: Vec<AttitudeSample>,
    attitude_order: usize,
    attitude_filter: AngularDerivatives,
    sensors: Vec<LineSensor>,
    updater: Option<(U, usize)>,
    light_time_correction: bool,
    aberration_of_light_correction: bool,
}

impl<U: TileUpdater> RuggedBuilder<U> {
    pub fn new() -> Self {
        Self {
            algorithm: AlgorithmChoice::Duvenhage,
            ellipsoid: EllipsoidId::Wgs84,
            inertial_frame: InertialFrame::Eme2000,
            body_frame: BodyFrame::Itrf,
            provider: None,
            time_span: None,
            pv_samples: Vec::new(),
            pv_order: 8,
            pv_filter: CartesianDerivatives::UsePositionVelocity,
            attitude_samples: Vec::new(),
            attitude_order: 2,
            attitude_filter: AngularDerivatives::UseRotation,
            sensors: Vec::new(),
            updater: None,
            light_time_correction: true,
            aberration_of_light_correction: true,
        }
    }

    pub fn algorithm(mut self, algorithm: AlgorithmChoice) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn ellipsoid(mut self, ellipsoid: EllipsoidId) -> Self {
        self.ellipsoid = ellipsoid;
        self
    }

    pub fn inertial_frame(mut self, frame: InertialFrame) -> Self {
        self.inertial_frame = frame;
        self
    }

    pub fn body_frame(mut self, frame: BodyFrame) -> Self {
        self.body_frame = frame;
        self
    }

    /// Overrides the default uniformly rotating Earth model with a caller
    /// supplied frame transform source.
    pub fn frame_provider(mut self, provider: Box<dyn FrameTransformProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Time span covered by the instance, the trajectory sampling step and
    /// the tolerance accepted slightly outside the span, all in seconds.
    pub fn time_span(mut self, min_date: Epoch, max_date: Epoch, t_step: f64, tolerance: f64) -> Self {
        self.time_span = Some((min_date, max_date, t_step, tolerance));
        self
    }

    /// Spacecraft trajectory and attitude samples with the interpolation
    /// settings.
    pub fn trajectory(
        mut self,
        pv_samples: Vec<PvSample>,
        pv_order: usize,
        pv_filter: CartesianDerivatives,
        attitude_samples: Vec<AttitudeSample>,
        attitude_order: usize,
        attitude_filter: AngularDerivatives,
    ) -> Self {
        self.pv_samples = pv_samples;
        self.pv_order = pv_order;
        self.pv_filter = pv_filter;
        self.attitude_samples = attitude_samples;
        self.attitude_order = attitude_order;
        self.attitude_filter = attitude_filter;
        self
    }

    pub fn line_sensor(mut self, sensor: LineSensor) -> Self {
        self.sensors.push(sensor);
        self
    }

    pub fn tile_updater(mut self, updater: U, max_cached_tiles: usize) -> Self {
        self.updater = Some((updater, max_cached_tiles));
        self
    }

    pub fn light_time(mut self, correction: bool) -> Self {
        self.light_time_correction = correction;
        self
    }

    pub fn aberration(mut self, correction: bool) -> Self {
        self.aberration_of_light_correction = correction;
        self
    }

    pub fn build(self) -> Result<Rugged<U>, RuggedError> {
        let (min_date, max_date, t_step, tolerance) = self
            .time_span
            .ok_or(RuggedError::MissingConfiguration("time span"))?;
        let provider = self.provider.unwrap_or_else(|| {
            Box::new(UniformlyRotatingFrame::new(
                self.inertial_frame,
                self.body_frame,
            ))
        });
        let trajectory = SpacecraftToBody::new(
            provider.as_ref(),
            min_date,
            max_date,
            t_step,
            tolerance,
            &self.pv_samples,
            self.pv_order,
            self.pv_filter,
            &self.attitude_samples,
            self.attitude_order,
            self.attitude_filter,
        )?;
        let algorithm = match self.algorithm {
            AlgorithmChoice::Duvenhage => {
                let (updater, max_cached) = self
                    .updater
                    .ok_or(RuggedError::MissingConfiguration("tile updater"))?;
                IntersectionAlgorithm::Duvenhage(DuvenhageAlgorithm::new(updater, max_cached))
            }
            AlgorithmChoice::BasicScan => {
                let (updater, max_cached) = self
                    .updater
                    .ok_or(RuggedError::MissingConfiguration("tile updater"))?;
                IntersectionAlgorithm::BasicScan(BasicScanAlgorithm::new(updater, max_cached))
            }
            AlgorithmChoice::ConstantElevation(h) => IntersectionAlgorithm::ConstantElevation(h),
            AlgorithmChoice::IgnoreDem => IntersectionAlgorithm::IgnoreDem,
        };
        debug!(
            "built instance over [{min_date}, {max_date}] with {} sensors",
            self.sensors.len()
        );
        Ok(Rugged {
            ellipsoid: ExtendedEllipsoid::from_id(self.ellipsoid),
            trajectory,
            algorithm,
            sensors: self.sensors,
            light_time_correction: self.light_time_correction,
            aberration_of_light_correction: self.aberration_of_light_correction,
            crossings: Vec::new(),
        })
    }
}

impl<U: TileUpdater> Default for RuggedBuilder<U> {
    fn default() -> Self {
        Self::new()
    }
}

/// Geometric correction engine for one spacecraft/instrument setup.
///
/// One instance is owned by one logical worker; parallelism across images
/// comes from independent instances.
pub struct Rugged<U: TileUpdater> {
    ellipsoid: ExtendedEllipsoid,
    trajectory: SpacecraftToBody,
    algorithm: IntersectionAlgorithm<U>,
    sensors: Vec<LineSensor>,
    light_time_correction: bool,
    aberration_of_light_correction: bool,
    crossings: Vec<SensorMeanPlaneCrossing>,
}

impl<U: TileUpdater> Rugged<U> {
    pub fn builder() -> RuggedBuilder<U> {
        RuggedBuilder::new()
    }

    pub fn ellipsoid(&self) -> &ExtendedEllipsoid {
        &self.ellipsoid
    }

    fn sensor_index(&self, sensor_name: &str) -> Result<usize, RuggedError> {
        self.sensors
            .iter()
            .position(|s| s.name() == sensor_name)
            .ok_or_else(|| RuggedError::UnknownSensor(sensor_name.to_string()))
    }

    pub fn sensor(&self, sensor_name: &str) -> Result<&LineSensor, RuggedError> {
        Ok(&self.sensors[self.sensor_index(sensor_name)?])
    }

    /// Ground points observed by every pixel of a sensor line.
    pub fn direct_location(
        &mut self,
        sensor_name: &str,
        line: f64,
    ) -> Result<Vec<GeodeticPoint>, RuggedError> {
        let index = self.sensor_index(sensor_name)?;
        let date = self.sensors[index].date(line);
        let position = self.sensors[index].position();
        let mut points = Vec::with_capacity(self.sensors[index].nb_pixels());
        for pixel in 0..self.sensors[index].nb_pixels() {
            let los = self.sensors[index].los(pixel);
            points.push(self.locate_single(date, &position, &los)?);
        }
        Ok(points)
    }

    /// Ground point observed along one ray, given in the spacecraft frame.
    pub fn direct_location_of(
        &mut self,
        date: Epoch,
        position: &Vector3<f64>,
        los: &Vector3<f64>,
    ) -> Result<GeodeticPoint, RuggedError> {
        self.locate_single(date, position, los)
    }

    fn locate_single(
        &mut self,
        date: Epoch,
        position: &Vector3<f64>,
        los: &Vector3<f64>,
    ) -> Result<GeodeticPoint, RuggedError> {
        let sc_to_inertial = self.trajectory.sc_to_inertial(date)?;
        let inertial_to_body = self.trajectory.inertial_to_body(date)?;

        let p_inertial = sc_to_inertial.transform_position(position);
        let mut l_inertial = sc_to_inertial.transform_direction(los);
        if self.aberration_of_light_correction {
            // classical velocity addition; the spacecraft velocity is small
            // with respect to the speed of light
            l_inertial = (l_inertial * SPEED_OF_LIGHT + sc_to_inertial.velocity).normalize();
        }

        let (p_body, l_body) = if self.light_time_correction {
            // transit-time compensated body transform
            let p0 = inertial_to_body.transform_position(&p_inertial);
            let l0 = inertial_to_body.transform_direction(&l_inertial);
            let ground = self.ellipsoid.point_at_altitude(&p0, &l0, 0.0)?;
            let transit = (ground - p0).norm() / SPEED_OF_LIGHT;
            let shifted = inertial_to_body.shifted_by(-transit);
            (
                shifted.transform_position(&p_inertial),
                shifted.transform_direction(&l_inertial),
            )
        } else {
            (
                inertial_to_body.transform_position(&p_inertial),
                inertial_to_body.transform_direction(&l_inertial),
            )
        };

        let hit = self
            .algorithm
            .intersection(&self.ellipsoid, &p_body, &l_body)?;
        let refined = self
            .algorithm
            .refine_intersection(&self.ellipsoid, &p_body, &l_body, &hit)?
            .unwrap_or(hit);
        Ok(refined.into())
    }

    /// Image coordinates observing a ground point, or `None` when no pixel
    /// of the line range sees it.
    pub fn inverse_location(
        &mut self,
        sensor_name: &str,
        ground_point: &GeodeticPoint,
        min_line: usize,
        max_line: usize,
    ) -> Result<Option<SensorPixel>, RuggedError> {
        let index = self.sensor_index(sensor_name)?;
        let sensor = &self.sensors[index];
        let target = self.ellipsoid.transform_geodetic_to_cartesian(ground_point);

        // the crossing table survives between queries with the same key
        let position = self
            .crossings
            .iter()
            .position(|c| c.matches(sensor_name, min_line, max_line));
        let crossing_table = match position {
            Some(k) => &self.crossings[k],
            None => {
                debug!("building mean plane table for {sensor_name} [{min_line}, {max_line}]");
                let table = SensorMeanPlaneCrossing::new(
                    sensor,
                    &self.trajectory,
                    min_line,
                    max_line,
                    CROSSING_MAX_EVAL,
                    CROSSING_ACCURACY,
                )?;
                self.crossings.push(table);
                self.crossings
                    .last()
                    .ok_or(RuggedError::Internal("crossing table vanished"))?
            }
        };

        let Some(mut crossing) = crossing_table.find(sensor, &self.trajectory, &target, 0.0)?
        else {
            return Ok(None);
        };
        let Some(mut pixel) = locate_pixel(sensor, &crossing.target_direction)? else {
            return Ok(None);
        };

        // the found line assumed the target sits in the mean plane; pull it
        // to the actual pixel direction, which is slightly off plane
        for _ in 0..2 {
            let offset = sensor
                .mean_plane_normal()
                .dot(&sensor.interpolated_los(pixel));
            let Some(better) = crossing_table.find(sensor, &self.trajectory, &target, offset)?
            else {
                return Ok(None);
            };
            let Some(better_pixel) = locate_pixel(sensor, &better.target_direction)? else {
                return Ok(None);
            };
            crossing = better;
            pixel = better_pixel;
        }

        Ok(Some(SensorPixel {
            line: crossing.line,
            pixel,
        }))
    }

    /// Acquisition date of the line observing a ground point.
    pub fn date_location(
        &mut self,
        sensor_name: &str,
        ground_point: &GeodeticPoint,
        min_line: usize,
        max_line: usize,
    ) -> Result<Option<Epoch>, RuggedError> {
        let found = self.inverse_location(sensor_name, ground_point, min_line, max_line)?;
        match found {
            Some(sensor_pixel) => {
                Ok(Some(self.sensor(sensor_name)?.date(sensor_pixel.line)))
            }
            None => Ok(None),
        }
    }

    /// Terrain elevation seen by the configured algorithm.
    pub fn elevation(&mut self, latitude: f64, longitude: f64) -> Result<f64, RuggedError> {
        self.algorithm.elevation(latitude, longitude)
    }
}
