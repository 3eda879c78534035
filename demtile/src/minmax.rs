//! Raster tile augmented with a min/max elevation pyramid.
//!
//! The pyramid is a packed K-D tree over the raster: starting from the raw
//! grid, the longer dimension is halved at each stage (ties halve rows, odd
//! dimensions round up) until one dimension reaches a single cell. Levels
//! are stored coarsest first, so a whole sub-tile min or max is one array
//! read. The Duvenhage intersector uses this to discard sub-tiles that lie
//! entirely below a line of sight.

use crate::{
    geodetic::{GeodeticLos, NormalizedGeodeticPoint},
    tile::{Location, SimpleTile, Tile, UpdatableTile},
    DemError,
};

#[derive(Debug, Clone, Copy)]
struct Level {
    rows: usize,
    columns: usize,
    /// Offset of this level in the packed tree arrays.
    start: usize,
    /// Leaf row index -> level row index is a right shift by this amount.
    row_shift: u32,
    /// Leaf column index -> level column index, same.
    column_shift: u32,
}

/// Boundary a Duvenhage segment must be split at, as leaf indices of the
/// grid line separating two sub-tiles.
#[derive(Debug, Clone, Copy, Default)]
pub struct SplitBoundary {
    pub row: Option<usize>,
    pub column: Option<usize>,
}

/// Tile with a min/max K-D pyramid, built when the tile is published.
#[derive(Debug, Default)]
pub struct MinMaxTile {
    base: SimpleTile,
    levels: Vec<Level>,
    min_tree: Vec<f64>,
    max_tree: Vec<f64>,
}

impl UpdatableTile for MinMaxTile {
    fn set_geometry(
        &mut self,
        min_latitude: f64,
        min_longitude: f64,
        latitude_step: f64,
        longitude_step: f64,
        latitude_rows: usize,
        longitude_columns: usize,
    ) -> Result<(), DemError> {
        self.base.set_geometry(
            min_latitude,
            min_longitude,
            latitude_step,
            longitude_step,
            latitude_rows,
            longitude_columns,
        )
    }

    fn set_elevation(
        &mut self,
        latitude_index: usize,
        longitude_index: usize,
        elevation: f64,
    ) -> Result<(), DemError> {
        self.base
            .set_elevation(latitude_index, longitude_index, elevation)
    }
}

impl Tile for MinMaxTile {
    fn tile_update_completed(&mut self) -> Result<(), DemError> {
        self.base.publish()?;
        self.build_pyramid();
        Ok(())
    }

    fn location(&self, latitude: f64, longitude: f64) -> Location {
        self.base.location(latitude, longitude)
    }

    fn covers(&self, latitude: f64, longitude: f64) -> bool {
        self.base.covers(latitude, longitude)
    }
}

/// Read API forwarded to the underlying raster.
impl MinMaxTile {
    pub fn min_latitude(&self) -> f64 {
        self.base.min_latitude()
    }

    pub fn max_latitude(&self) -> f64 {
        self.base.max_latitude()
    }

    pub fn min_longitude(&self) -> f64 {
        self.base.min_longitude()
    }

    pub fn max_longitude(&self) -> f64 {
        self.base.max_longitude()
    }

    pub fn latitude_step(&self) -> f64 {
        self.base.latitude_step()
    }

    pub fn longitude_step(&self) -> f64 {
        self.base.longitude_step()
    }

    pub fn latitude_rows(&self) -> usize {
        self.base.latitude_rows()
    }

    pub fn longitude_columns(&self) -> usize {
        self.base.longitude_columns()
    }

    pub fn min_elevation(&self) -> f64 {
        self.base.min_elevation()
    }

    pub fn max_elevation(&self) -> f64 {
        self.base.max_elevation()
    }

    pub fn latitude_at_index(&self, latitude_index: usize) -> f64 {
        self.base.latitude_at_index(latitude_index)
    }

    pub fn longitude_at_index(&self, longitude_index: usize) -> f64 {
        self.base.longitude_at_index(longitude_index)
    }

    pub fn elevation_at(
        &self,
        latitude_index: usize,
        longitude_index: usize,
    ) -> Result<f64, DemError> {
        self.base.elevation_at(latitude_index, longitude_index)
    }

    pub fn floor_latitude_index(&self, latitude: f64) -> usize {
        self.base.floor_latitude_index(latitude)
    }

    pub fn floor_longitude_index(&self, longitude: f64) -> usize {
        self.base.floor_longitude_index(longitude)
    }

    pub fn interpolate_elevation(&self, latitude: f64, longitude: f64) -> Result<f64, DemError> {
        self.base.interpolate_elevation(latitude, longitude)
    }

    pub fn cell_intersection(
        &self,
        entry: &NormalizedGeodeticPoint,
        los: &GeodeticLos,
        latitude_index: usize,
        longitude_index: usize,
    ) -> Option<NormalizedGeodeticPoint> {
        self.base
            .cell_intersection(entry, los, latitude_index, longitude_index)
    }
}

/// Pyramid API.
impl MinMaxTile {
    /// Number of stored pyramid levels.
    pub fn levels(&self) -> usize {
        self.levels.len()
    }

    /// Minimum elevation over the sub-tile containing leaf
    /// `(latitude_index, longitude_index)` at `level` (0 is the coarsest
    /// stored level).
    pub fn min_elevation_at(
        &self,
        latitude_index: usize,
        longitude_index: usize,
        level: usize,
    ) -> f64 {
        self.tree_value(&self.min_tree, latitude_index, longitude_index, level)
            .unwrap_or_else(|| self.base.min_elevation())
    }

    /// Maximum elevation over the sub-tile containing the leaf at `level`.
    pub fn max_elevation_at(
        &self,
        latitude_index: usize,
        longitude_index: usize,
        level: usize,
    ) -> f64 {
        self.tree_value(&self.max_tree, latitude_index, longitude_index, level)
            .unwrap_or_else(|| self.base.max_elevation())
    }

    /// Deepest (finest) level at which the two leaves fall in one pyramid
    /// cell, or `None` when they differ already at the coarsest level.
    pub fn merge_level(
        &self,
        latitude_index_1: usize,
        longitude_index_1: usize,
        latitude_index_2: usize,
        longitude_index_2: usize,
    ) -> Option<usize> {
        let mut merged = None;
        for (level, lv) in self.levels.iter().enumerate() {
            if latitude_index_1 >> lv.row_shift != latitude_index_2 >> lv.row_shift
                || longitude_index_1 >> lv.column_shift != longitude_index_2 >> lv.column_shift
            {
                return merged;
            }
            merged = Some(level);
        }
        merged
    }

    /// Leaf indices of the sub-tile boundary separating two leaves one level
    /// below their merge level (or at the coarsest level when they never
    /// merge). Both components may be set when the leaves only split at raw
    /// resolution and sit on a diagonal.
    pub fn split_boundary(
        &self,
        cell_1: (usize, usize),
        cell_2: (usize, usize),
        merge_level: Option<usize>,
    ) -> SplitBoundary {
        let split_level = match merge_level {
            None => 0,
            Some(level) => level + 1,
        };
        let (row_shift, column_shift) = match self.levels.get(split_level) {
            Some(lv) => (lv.row_shift, lv.column_shift),
            // below the finest stored level the sub-tiles are the leaves
            None => (0, 0),
        };
        let row = boundary(cell_1.0, cell_2.0, row_shift);
        let column = boundary(cell_1.1, cell_2.1, column_shift);
        SplitBoundary { row, column }
    }

    fn tree_value(&self, tree: &[f64], i: usize, j: usize, level: usize) -> Option<f64> {
        let lv = self.levels.get(level)?;
        let r = (i >> lv.row_shift).min(lv.rows - 1);
        let c = (j >> lv.column_shift).min(lv.columns - 1);
        Some(tree[lv.start + r * lv.columns + c])
    }

    fn build_pyramid(&mut self) {
        let rows = self.base.latitude_rows();
        let columns = self.base.longitude_columns();

        // fine-to-coarse merged dimensions, halving the longer axis
        let mut fine_to_coarse: Vec<(usize, usize, u32, u32)> = Vec::new();
        let (mut r, mut c) = (rows, columns);
        let (mut rs, mut cs) = (0u32, 0u32);
        while r > 1 && c > 1 {
            if c > r {
                c = (c + 1) / 2;
                cs += 1;
            } else {
                r = (r + 1) / 2;
                rs += 1;
            }
            fine_to_coarse.push((r, c, rs, cs));
        }

        self.levels = fine_to_coarse
            .iter()
            .rev()
            .scan(0usize, |start, &(rows, columns, row_shift, column_shift)| {
                let level = Level {
                    rows,
                    columns,
                    start: *start,
                    row_shift,
                    column_shift,
                };
                *start += rows * columns;
                Some(level)
            })
            .collect();

        let size = self
            .levels
            .first()
            .map(|_| {
                let last = self.levels[self.levels.len() - 1];
                last.start + last.rows * last.columns
            })
            .unwrap_or(0);
        self.min_tree = vec![0.0; size];
        self.max_tree = vec![0.0; size];

        // build finest level from the raw raster, then coarser levels from
        // their finer neighbor
        for k in (0..self.levels.len()).rev() {
            let lv = self.levels[k];
            let (child_rows, child_columns, child_start, split_columns) =
                if k + 1 < self.levels.len() {
                    let child = self.levels[k + 1];
                    (
                        child.rows,
                        child.columns,
                        Some(child.start),
                        lv.column_shift > child.column_shift,
                    )
                } else {
                    (rows, columns, None, lv.column_shift > 0)
                };
            for i in 0..lv.rows {
                for j in 0..lv.columns {
                    let ((i0, j0), (i1, j1)) = if split_columns {
                        ((i, 2 * j), (i, (2 * j + 1).min(child_columns - 1)))
                    } else {
                        ((2 * i, j), ((2 * i + 1).min(child_rows - 1), j))
                    };
                    let (min0, max0) = self.child_value(child_start, child_columns, i0, j0);
                    let (min1, max1) = self.child_value(child_start, child_columns, i1, j1);
                    self.min_tree[lv.start + i * lv.columns + j] = min0.min(min1);
                    self.max_tree[lv.start + i * lv.columns + j] = max0.max(max1);
                }
            }
        }
    }

    fn child_value(
        &self,
        child_start: Option<usize>,
        child_columns: usize,
        i: usize,
        j: usize,
    ) -> (f64, f64) {
        match child_start {
            Some(start) => (
                self.min_tree[start + i * child_columns + j],
                self.max_tree[start + i * child_columns + j],
            ),
            None => {
                let e = self.base.elevation_unchecked(i, j);
                (e, e)
            }
        }
    }

    #[cfg(test)]
    fn level_shape(&self, level: usize) -> (usize, usize, usize) {
        let lv = self.levels[level];
        (lv.rows, lv.columns, lv.start)
    }
}

fn boundary(k1: usize, k2: usize, shift: u32) -> Option<usize> {
    if k1 >> shift == k2 >> shift {
        None
    } else {
        Some(((k1 >> shift).max(k2 >> shift)) << shift)
    }
}
