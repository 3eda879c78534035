//! Raster elevation tile on a geodetic grid.
//!
//! A tile is a rectangular latitude/longitude raster whose samples sit at
//! cell corners: the raster element at `(i, j)` is the elevation of the
//! south-west corner of cell `(i, j)`. Tiles are filled exactly once by a
//! [`TileUpdater`](crate::TileUpdater) and published with
//! [`Tile::tile_update_completed`] before any read.

use crate::{
    geodetic::{GeodeticLos, NormalizedGeodeticPoint},
    DemError,
};

/// Fraction of a cell by which interpolation may reach outside the raster.
const OUT_OF_TILE_TOLERANCE: f64 = 1.0 / 8.0;

/// Location of a geodetic point with respect to a tile.
///
/// `InTile` means the point has the four neighbors bilinear interpolation
/// needs; points on the northern-most row or eastern-most column do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    SouthWest,
    South,
    SouthEast,
    West,
    InTile,
    East,
    NorthWest,
    North,
    NorthEast,
}

/// Mutation interface handed to tile updaters.
pub trait UpdatableTile {
    /// Sets the tile geometry. Must be called exactly once, before any
    /// elevation is stored.
    fn set_geometry(
        &mut self,
        min_latitude: f64,
        min_longitude: f64,
        latitude_step: f64,
        longitude_step: f64,
        latitude_rows: usize,
        longitude_columns: usize,
    ) -> Result<(), DemError>;

    /// Stores one elevation sample, in meters.
    fn set_elevation(
        &mut self,
        latitude_index: usize,
        longitude_index: usize,
        elevation: f64,
    ) -> Result<(), DemError>;
}

/// Capability the tile cache needs from a tile kind.
pub trait Tile: UpdatableTile + Default {
    /// Publication barrier: invoked once the updater has filled the tile,
    /// before the tile becomes visible to readers.
    fn tile_update_completed(&mut self) -> Result<(), DemError>;

    /// Locates a geodetic point with respect to this tile.
    fn location(&self, latitude: f64, longitude: f64) -> Location;

    /// Returns true when the point falls anywhere on the raster footprint,
    /// interpolation neighbors or not.
    fn covers(&self, latitude: f64, longitude: f64) -> bool;
}

/// Plain raster tile.
#[derive(Debug, Default)]
pub struct SimpleTile {
    min_latitude: f64,
    min_longitude: f64,
    latitude_step: f64,
    longitude_step: f64,
    latitude_rows: usize,
    longitude_columns: usize,
    min_elevation: f64,
    max_elevation: f64,
    elevations: Vec<f64>,
}

impl UpdatableTile for SimpleTile {
    fn set_geometry(
        &mut self,
        min_latitude: f64,
        min_longitude: f64,
        latitude_step: f64,
        longitude_step: f64,
        latitude_rows: usize,
        longitude_columns: usize,
    ) -> Result<(), DemError> {
        if self.latitude_rows != 0 {
            return Err(DemError::GeometryAlreadySet);
        }
        if latitude_rows < 1 || longitude_columns < 1 {
            return Err(DemError::EmptyTile {
                rows: latitude_rows,
                columns: longitude_columns,
            });
        }
        self.min_latitude = min_latitude;
        self.min_longitude = min_longitude;
        self.latitude_step = latitude_step;
        self.longitude_step = longitude_step;
        self.latitude_rows = latitude_rows;
        self.longitude_columns = longitude_columns;
        self.elevations = vec![0.0; latitude_rows * longitude_columns];
        Ok(())
    }

    fn set_elevation(
        &mut self,
        latitude_index: usize,
        longitude_index: usize,
        elevation: f64,
    ) -> Result<(), DemError> {
        if latitude_index >= self.latitude_rows || longitude_index >= self.longitude_columns {
            return Err(DemError::OutOfTileIndices {
                row: latitude_index,
                column: longitude_index,
                rows: self.latitude_rows,
                columns: self.longitude_columns,
            });
        }
        self.elevations[latitude_index * self.longitude_columns + longitude_index] = elevation;
        Ok(())
    }
}

impl Tile for SimpleTile {
    fn tile_update_completed(&mut self) -> Result<(), DemError> {
        self.publish()
    }

    fn location(&self, latitude: f64, longitude: f64) -> Location {
        // an index is "inside" when the cell it starts has interpolation
        // neighbors, i.e. it is at most rows - 2
        let i = self.double_latitude_index(latitude).floor();
        let j = self.double_longitude_index(longitude).floor();
        let south = i < 0.0;
        let north = i > self.latitude_rows as f64 - 2.0;
        let west = j < 0.0;
        let east = j > self.longitude_columns as f64 - 2.0;
        match (south, north, west, east) {
            (true, _, true, _) => Location::SouthWest,
            (true, _, _, true) => Location::SouthEast,
            (true, _, _, _) => Location::South,
            (_, true, true, _) => Location::NorthWest,
            (_, true, _, true) => Location::NorthEast,
            (_, true, _, _) => Location::North,
            (_, _, true, _) => Location::West,
            (_, _, _, true) => Location::East,
            _ => Location::InTile,
        }
    }

    fn covers(&self, latitude: f64, longitude: f64) -> bool {
        let i = self.double_latitude_index(latitude);
        let j = self.double_longitude_index(longitude);
        i >= 0.0
            && i <= self.latitude_rows as f64 - 1.0
            && j >= 0.0
            && j <= self.longitude_columns as f64 - 1.0
    }
}

impl SimpleTile {
    pub(crate) fn publish(&mut self) -> Result<(), DemError> {
        if self.latitude_rows == 0 {
            return Err(DemError::EmptyTile {
                rows: 0,
                columns: 0,
            });
        }
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for &e in &self.elevations {
            min = min.min(e);
            max = max.max(e);
        }
        self.min_elevation = min;
        self.max_elevation = max;
        Ok(())
    }

    /// Latitude of the southern-most sample row, in radians.
    pub fn min_latitude(&self) -> f64 {
        self.min_latitude
    }

    /// Latitude of the northern-most sample row, in radians.
    pub fn max_latitude(&self) -> f64 {
        self.latitude_at_index(self.latitude_rows.saturating_sub(1))
    }

    pub fn min_longitude(&self) -> f64 {
        self.min_longitude
    }

    pub fn max_longitude(&self) -> f64 {
        self.longitude_at_index(self.longitude_columns.saturating_sub(1))
    }

    pub fn latitude_step(&self) -> f64 {
        self.latitude_step
    }

    pub fn longitude_step(&self) -> f64 {
        self.longitude_step
    }

    pub fn latitude_rows(&self) -> usize {
        self.latitude_rows
    }

    pub fn longitude_columns(&self) -> usize {
        self.longitude_columns
    }

    /// Lowest elevation sample of this tile, in meters.
    pub fn min_elevation(&self) -> f64 {
        self.min_elevation
    }

    /// Highest elevation sample of this tile, in meters.
    pub fn max_elevation(&self) -> f64 {
        self.max_elevation
    }

    pub fn latitude_at_index(&self, latitude_index: usize) -> f64 {
        self.min_latitude + latitude_index as f64 * self.latitude_step
    }

    pub fn longitude_at_index(&self, longitude_index: usize) -> f64 {
        self.min_longitude + longitude_index as f64 * self.longitude_step
    }

    /// Returns the elevation sample at `(latitude_index, longitude_index)`.
    pub fn elevation_at(
        &self,
        latitude_index: usize,
        longitude_index: usize,
    ) -> Result<f64, DemError> {
        if latitude_index >= self.latitude_rows || longitude_index >= self.longitude_columns {
            return Err(DemError::OutOfTileIndices {
                row: latitude_index,
                column: longitude_index,
                rows: self.latitude_rows,
                columns: self.longitude_columns,
            });
        }
        Ok(self.elevation_unchecked(latitude_index, longitude_index))
    }

    pub(crate) fn elevation_unchecked(
        &self,
        latitude_index: usize,
        longitude_index: usize,
    ) -> f64 {
        self.elevations[latitude_index * self.longitude_columns + longitude_index]
    }

    pub(crate) fn raw_elevations(&self) -> &[f64] {
        &self.elevations
    }

    fn double_latitude_index(&self, latitude: f64) -> f64 {
        (latitude - self.min_latitude) / self.latitude_step
    }

    fn double_longitude_index(&self, longitude: f64) -> f64 {
        (longitude - self.min_longitude) / self.longitude_step
    }

    /// Index of the cell row containing `latitude`, clamped so that the cell
    /// keeps a northern neighbor row.
    pub fn floor_latitude_index(&self, latitude: f64) -> usize {
        let max = self.latitude_rows.saturating_sub(2) as f64;
        self.double_latitude_index(latitude).floor().clamp(0.0, max) as usize
    }

    /// Index of the cell column containing `longitude`, clamped so that the
    /// cell keeps an eastern neighbor column.
    pub fn floor_longitude_index(&self, longitude: f64) -> usize {
        let max = self.longitude_columns.saturating_sub(2) as f64;
        self.double_longitude_index(longitude)
            .floor()
            .clamp(0.0, max) as usize
    }

    /// Bilinear interpolation of the elevation at a geodetic point.
    ///
    /// Points up to 1/8 of a cell outside the raster are admitted and
    /// evaluated on the clamped border cell; farther out the call fails with
    /// [`DemError::OutOfTileAngles`].
    pub fn interpolate_elevation(&self, latitude: f64, longitude: f64) -> Result<f64, DemError> {
        let di = self.double_latitude_index(latitude);
        let dj = self.double_longitude_index(longitude);
        if self.latitude_rows < 2
            || self.longitude_columns < 2
            || di < -OUT_OF_TILE_TOLERANCE
            || di >= self.latitude_rows as f64 - 1.0 + OUT_OF_TILE_TOLERANCE
            || dj < -OUT_OF_TILE_TOLERANCE
            || dj >= self.longitude_columns as f64 - 1.0 + OUT_OF_TILE_TOLERANCE
        {
            return Err(DemError::OutOfTileAngles {
                latitude,
                longitude,
            });
        }
        let i = self.floor_latitude_index(latitude);
        let j = self.floor_longitude_index(longitude);
        let d_lat = di - i as f64;
        let d_lon = dj - j as f64;
        let e00 = self.elevation_unchecked(i, j);
        let e10 = self.elevation_unchecked(i, j + 1);
        let e01 = self.elevation_unchecked(i + 1, j);
        let e11 = self.elevation_unchecked(i + 1, j + 1);
        Ok((e00 * (1.0 - d_lon) + d_lon * e10) * (1.0 - d_lat)
            + (e01 * (1.0 - d_lon) + d_lon * e11) * d_lat)
    }

    /// Intersects a line of sight with the bilinear surface over one DEM
    /// cell.
    ///
    /// `entry` is a point on the ray, `los` the ray direction expressed as
    /// geodetic derivatives per meter. The cell surface is bilinear in the
    /// cell fractions, so the elevation difference along the ray is quadratic
    /// in the ray parameter; the first forward root whose foot lies inside
    /// the unit cell is returned, with the entry point's central longitude.
    pub fn cell_intersection(
        &self,
        entry: &NormalizedGeodeticPoint,
        los: &GeodeticLos,
        latitude_index: usize,
        longitude_index: usize,
    ) -> Option<NormalizedGeodeticPoint> {
        // keep the north/east neighbors of the cell inside the raster
        let i = latitude_index.min(self.latitude_rows.saturating_sub(2));
        let j = longitude_index.min(self.longitude_columns.saturating_sub(2));
        if self.latitude_rows < 2 || self.longitude_columns < 2 {
            return None;
        }

        let e00 = self.elevation_unchecked(i, j);
        let e01 = self.elevation_unchecked(i, j + 1);
        let e10 = self.elevation_unchecked(i + 1, j);
        let e11 = self.elevation_unchecked(i + 1, j + 1);

        // cell fractions of the entry point and their rates along the ray
        let u_a = (entry.longitude() - self.longitude_at_index(j)) / self.longitude_step;
        let v_a = (entry.latitude() - self.latitude_at_index(i)) / self.latitude_step;
        let du = los.d_lon / self.longitude_step;
        let dv = los.d_lat / self.latitude_step;

        // z_dem(t) - z_ray(t) = a2 t^2 + a1 t + a0
        let k = e00 - e01 - e10 + e11;
        let a2 = k * du * dv;
        let a1 = (e01 - e00) * du + (e10 - e00) * dv + k * (u_a * dv + v_a * du) - los.d_alt;
        let a0 = e00 + (e01 - e00) * u_a + (e10 - e00) * v_a + k * u_a * v_a - entry.altitude();

        let mut roots = [f64::NAN, f64::NAN];
        if a2.abs() < 1.0e-20 {
            if a1.abs() < 1.0e-20 {
                return None;
            }
            roots[0] = -a0 / a1;
        } else {
            let disc = a1 * a1 - 4.0 * a2 * a0;
            if disc < 0.0 {
                return None;
            }
            let q = -0.5 * (a1 + a1.signum() * disc.sqrt());
            let (t1, t2) = if q == 0.0 {
                (0.0, 0.0)
            } else {
                (q / a2, a0 / q)
            };
            roots = if t1 <= t2 { [t1, t2] } else { [t2, t1] };
        }

        for t in roots {
            if !t.is_finite() || t < -1.0e-6 {
                continue;
            }
            let u = u_a + t * du;
            let v = v_a + t * dv;
            if (-1.0e-7..=1.0 + 1.0e-7).contains(&u) && (-1.0e-7..=1.0 + 1.0e-7).contains(&v) {
                return Some(NormalizedGeodeticPoint::new(
                    entry.latitude() + t * los.d_lat,
                    entry.longitude() + t * los.d_lon,
                    entry.altitude() + t * los.d_alt,
                    entry.central_longitude(),
                ));
            }
        }
        None
    }
}
