use demtile::DemError;
use hifitime::Epoch;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RuggedError {
    #[error("date {date} is out of time range [{min_date}, {max_date}]")]
    OutOfTimeRange {
        date: Epoch,
        min_date: Epoch,
        max_date: Epoch,
    },

    #[error("invalid line range [{min_line}, {max_line}]")]
    InvalidRangeForLines { min_line: usize, max_line: usize },

    #[error("invalid step {step} s")]
    InvalidStep { step: f64 },

    #[error("sensor has fewer than two pixels")]
    NotEnoughPixels,

    #[error("line of sight does not reach ground")]
    LineOfSightDoesNotReachGround,

    #[error("line of sight never crosses latitude {latitude} rad")]
    LineOfSightNeverCrossesLatitude { latitude: f64 },

    #[error("line of sight never crosses longitude {longitude} rad")]
    LineOfSightNeverCrossesLongitude { longitude: f64 },

    #[error("DEM entry point is behind the spacecraft")]
    DemEntryPointIsBehindSpacecraft,

    #[error("sensor mean plane crossing did not converge")]
    SensorMeanPlaneNotFound,

    #[error("pixel not found inside a bracketed field-of-view interval")]
    PixelNotFound,

    #[error("no sensor named {0}")]
    UnknownSensor(String),

    #[error("builder is missing {0}")]
    MissingConfiguration(&'static str),

    #[error(transparent)]
    Dem(#[from] DemError),

    /// Unreachable branch reached: a bug signal, not an expected condition.
    #[error("internal error, please report: {0}")]
    Internal(&'static str),
}
