//! Digital Elevation Model tiles for geometric correction pipelines.
//!
//! This crate holds the raster layer of the geolocation stack: plain
//! elevation tiles with bilinear interpolation and per-cell ray
//! intersection, tiles augmented with a min/max elevation pyramid for
//! logarithmic terrain pruning, and a bounded least-recently-used cache
//! that materializes tiles on demand through a user [`TileUpdater`].
//!
//! Elevation sources (file formats, archives, services) stay outside; they
//! plug in by implementing [`TileUpdater`].

pub use crate::{
    cache::{TileCache, TileUpdater},
    error::DemError,
    geodetic::{normalize_longitude, GeodeticLos, GeodeticPoint, NormalizedGeodeticPoint},
    minmax::{MinMaxTile, SplitBoundary},
    tile::{Location, SimpleTile, Tile, UpdatableTile},
};

mod cache;
mod error;
mod geodetic;
mod minmax;
mod tile;
