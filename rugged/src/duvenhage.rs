//! Duvenhage ray/terrain intersection.
//!
//! The line of sight enters the DEM at the highest cached elevation and is
//! walked tile by tile. Inside a tile, the segment down to the tile exit is
//! refined through a LIFO of split points: sub-tiles of the min/max pyramid
//! wholly below the ray are skipped in one test, the rest are split at the
//! pyramid boundary the ray crosses, until single cells remain and the
//! bilinear cell intersection gives the exact impact.

use crate::{ellipsoid::ExtendedEllipsoid, RuggedError};
use demtile::{
    GeodeticPoint, Location, MinMaxTile, NormalizedGeodeticPoint, Tile, TileCache, TileUpdater,
};
use log::trace;
use nalgebra::Vector3;

/// Forward hop between adjacent tiles, m.
const STEP: f64 = 0.01;

/// Default bound on the entry-tile search iterations.
const DEFAULT_MAX_TILE_JUMPS: usize = 5;

/// Bound on tile crossings of a single ray; a bug signal when exceeded.
const MAX_TILE_CROSSINGS: usize = 1000;

/// Bound on split-point stack iterations inside one tile.
const MAX_SPLITS: usize = 100_000;

struct TileExit {
    point: NormalizedGeodeticPoint,
    at_side: bool,
}

pub struct DuvenhageAlgorithm<U: TileUpdater> {
    cache: TileCache<MinMaxTile, U>,
    max_tile_jumps: usize,
}

impl<U: TileUpdater> DuvenhageAlgorithm<U> {
    pub fn new(updater: U, max_cached_tiles: usize) -> Self {
        Self {
            cache: TileCache::new(updater, max_cached_tiles),
            max_tile_jumps: DEFAULT_MAX_TILE_JUMPS,
        }
    }

    /// Bounds the entry-point search over growing tile elevations.
    pub fn set_max_tile_jumps(&mut self, max_tile_jumps: usize) {
        self.max_tile_jumps = max_tile_jumps.max(1);
    }

    /// First geodetic point where the ray from `position` along `los`
    /// (body frame) meets the terrain.
    pub fn intersection(
        &mut self,
        ellipsoid: &ExtendedEllipsoid,
        position: &Vector3<f64>,
        los: &Vector3<f64>,
    ) -> Result<NormalizedGeodeticPoint, RuggedError> {
        let los_unit = los.normalize();

        // enter the DEM at the highest elevation the covering tiles report,
        // refetching when a tile reveals taller terrain
        let mut h_max = 0.0_f64;
        let mut entry = None;
        for _ in 0..self.max_tile_jumps {
            let entry_cart = ellipsoid.point_at_altitude(position, &los_unit, h_max.max(0.0))?;
            if (entry_cart - position).dot(&los_unit) < 0.0 {
                return Err(RuggedError::DemEntryPointIsBehindSpacecraft);
            }
            let gp = ellipsoid.transform_cartesian_to_geodetic(&entry_cart);
            let tile_max = self
                .cache
                .get_tile(gp.latitude, gp.longitude)?
                .max_elevation();
            if tile_max > h_max {
                h_max = tile_max;
            } else {
                entry = Some(gp);
                break;
            }
        }
        let Some(gp) = entry else {
            return Err(RuggedError::Internal("DEM entry point search did not settle"));
        };
        let mut current =
            NormalizedGeodeticPoint::new(gp.latitude, gp.longitude, gp.altitude, gp.longitude);

        for _ in 0..MAX_TILE_CROSSINGS {
            let tile = self.cache.get_tile(current.latitude(), current.longitude())?;
            let exit = find_exit(tile, ellipsoid, position, &los_unit, &current)?;
            if let Some(hit) = walk_tile(tile, ellipsoid, position, &los_unit, current, exit.point)?
            {
                return Ok(hit);
            }
            if !exit.at_side {
                // exited through the tile floor without meeting terrain
                return Err(RuggedError::Internal("line of sight left the tile at its floor"));
            }

            // hop a short step into the neighboring tile
            let exit_cart = ellipsoid.transform_geodetic_to_cartesian(&exit.point.into());
            let forward = exit_cart + los_unit * STEP;
            let forward_gp = ellipsoid.transform_cartesian_to_geodetic(&forward);
            trace!(
                "crossing tile boundary at ({}, {})",
                forward_gp.latitude,
                forward_gp.longitude
            );
            let next = NormalizedGeodeticPoint::new(
                forward_gp.latitude,
                forward_gp.longitude,
                forward_gp.altitude,
                current.central_longitude(),
            );
            let tile = self.cache.get_tile(next.latitude(), next.longitude())?;
            if tile.interpolate_elevation(next.latitude(), next.longitude())? >= next.altitude() {
                // the short hop already went under the terrain
                return Ok(next);
            }
            current = next;
        }
        Err(RuggedError::Internal("unbounded tile crossing sequence"))
    }

    /// Refines an intersection guess by projecting it back on the ray and
    /// intersecting the single DEM cell it falls in.
    pub fn refine_intersection(
        &mut self,
        ellipsoid: &ExtendedEllipsoid,
        position: &Vector3<f64>,
        los: &Vector3<f64>,
        close_guess: &NormalizedGeodeticPoint,
    ) -> Result<Option<NormalizedGeodeticPoint>, RuggedError> {
        let guess_cart = ellipsoid.transform_geodetic_to_cartesian(&(*close_guess).into());
        let s = (guess_cart - position).dot(los) / los.norm_squared();
        let projected_gp = ellipsoid.transform_cartesian_to_geodetic(&(position + los * s));
        let projected = NormalizedGeodeticPoint::new(
            projected_gp.latitude,
            projected_gp.longitude,
            projected_gp.altitude,
            close_guess.central_longitude(),
        );
        let tile = self
            .cache
            .get_tile(projected.latitude(), projected.longitude())?;
        let los_geodetic = ellipsoid.convert_los(&projected.into(), los);
        Ok(tile.cell_intersection(
            &projected,
            &los_geodetic,
            tile.floor_latitude_index(projected.latitude()),
            tile.floor_longitude_index(projected.longitude()),
        ))
    }

    /// Terrain elevation at a point, interpolated from the covering tile.
    pub fn elevation(&mut self, latitude: f64, longitude: f64) -> Result<f64, RuggedError> {
        let tile = self.cache.get_tile(latitude, longitude)?;
        Ok(tile.interpolate_elevation(latitude, longitude)?)
    }
}

/// Where the ray leaves the tile: through a side boundary or the floor.
fn find_exit(
    tile: &MinMaxTile,
    ellipsoid: &ExtendedEllipsoid,
    position: &Vector3<f64>,
    los: &Vector3<f64>,
    current: &NormalizedGeodeticPoint,
) -> Result<TileExit, RuggedError> {
    let floor_cart = ellipsoid.point_at_altitude(position, los, tile.min_elevation())?;
    let floor = ellipsoid.transform_cartesian_to_geodetic(&floor_cart);
    let central = current.central_longitude();

    let lat_crossing = |latitude: f64| -> Result<NormalizedGeodeticPoint, RuggedError> {
        let p = ellipsoid.point_at_latitude(position, los, latitude, &floor_cart)?;
        Ok(ellipsoid.transform_cartesian_to_normalized(&p, central))
    };
    let lon_crossing = |longitude: f64| -> Result<NormalizedGeodeticPoint, RuggedError> {
        let p = ellipsoid.point_at_longitude(position, los, longitude)?;
        Ok(ellipsoid.transform_cartesian_to_normalized(&p, central))
    };

    let side = |point| TileExit {
        point,
        at_side: true,
    };
    match tile.location(floor.latitude, floor.longitude) {
        Location::InTile => Ok(TileExit {
            point: NormalizedGeodeticPoint::new(
                floor.latitude,
                floor.longitude,
                floor.altitude,
                central,
            ),
            at_side: false,
        }),
        Location::South => Ok(side(lat_crossing(tile.min_latitude())?)),
        Location::North => Ok(side(lat_crossing(tile.max_latitude())?)),
        Location::West => Ok(side(lon_crossing(tile.min_longitude())?)),
        Location::East => Ok(side(lon_crossing(tile.max_longitude())?)),
        corner => {
            let latitude = match corner {
                Location::SouthWest | Location::SouthEast => tile.min_latitude(),
                _ => tile.max_latitude(),
            };
            let longitude = match corner {
                Location::SouthWest | Location::NorthWest => tile.min_longitude(),
                _ => tile.max_longitude(),
            };
            // pick the boundary crossed first along the ray
            let by_lat = lat_crossing(latitude);
            let by_lon = lon_crossing(longitude);
            match (by_lat, by_lon) {
                (Ok(a), Ok(b)) => {
                    let ta = ray_abscissa(ellipsoid, position, los, &a);
                    let tb = ray_abscissa(ellipsoid, position, los, &b);
                    Ok(side(if ta <= tb { a } else { b }))
                }
                (Ok(a), Err(_)) => Ok(side(a)),
                (Err(_), Ok(b)) => Ok(side(b)),
                (Err(e), Err(_)) => Err(e),
            }
        }
    }
}

/// Abscissa of a geodetic point along the ray, m.
fn ray_abscissa(
    ellipsoid: &ExtendedEllipsoid,
    position: &Vector3<f64>,
    los: &Vector3<f64>,
    point: &NormalizedGeodeticPoint,
) -> f64 {
    (ellipsoid.transform_geodetic_to_cartesian(&(*point).into()) - position).dot(los)
}

/// Walks one tile from `entry` to `exit`, returning the first terrain
/// impact if any.
fn walk_tile(
    tile: &MinMaxTile,
    ellipsoid: &ExtendedEllipsoid,
    position: &Vector3<f64>,
    los: &Vector3<f64>,
    entry: NormalizedGeodeticPoint,
    exit: NormalizedGeodeticPoint,
) -> Result<Option<NormalizedGeodeticPoint>, RuggedError> {
    let cell_of = |p: &NormalizedGeodeticPoint| {
        (
            tile.floor_latitude_index(p.latitude()),
            tile.floor_longitude_index(p.longitude()),
        )
    };

    let mut current = entry;
    let mut stack = vec![exit];
    for _ in 0..MAX_SPLITS {
        let Some(next) = stack.pop() else {
            return Ok(None);
        };
        let (r0, c0) = cell_of(&current);
        let (r1, c1) = cell_of(&next);

        if (r0, c0) == (r1, c1) {
            // single cell: try the exact intersection when a corner of the
            // cell pokes above the ray
            if corner_max(tile, r1, c1)? >= next.altitude() {
                if let Some(hit) = intersect_cell(tile, ellipsoid, los, &current, r1, c1) {
                    return Ok(Some(hit));
                }
            }
            current = next;
            continue;
        }

        let merge = tile.merge_level(r0, c0, r1, c1);
        if let Some(level) = merge {
            if next.altitude() >= tile.max_elevation_at(r1, c1, level) {
                // the whole shared sub-tile is below the ray
                current = next;
                continue;
            }
        }

        // split the segment at the sub-tile boundary between the two cells
        let boundary = tile.split_boundary((r0, c0), (r1, c1), merge);
        let t0 = ray_abscissa(ellipsoid, position, los, &current);
        let t1 = ray_abscissa(ellipsoid, position, los, &next);
        let mut crossing: Option<(f64, NormalizedGeodeticPoint)> = None;
        if let Some(row) = boundary.row {
            if let Ok(p) = ellipsoid.point_at_latitude(
                position,
                los,
                tile.latitude_at_index(row),
                &ellipsoid.transform_geodetic_to_cartesian(&next.into()),
            ) {
                let ngp = ellipsoid.transform_cartesian_to_normalized(&p, current.central_longitude());
                let t = ray_abscissa(ellipsoid, position, los, &ngp);
                crossing = Some((t, ngp));
            }
        }
        if let Some(column) = boundary.column {
            if let Ok(p) =
                ellipsoid.point_at_longitude(position, los, tile.longitude_at_index(column))
            {
                let ngp = ellipsoid.transform_cartesian_to_normalized(&p, current.central_longitude());
                let t = ray_abscissa(ellipsoid, position, los, &ngp);
                // keep the crossing reached first
                if crossing.map_or(true, |(tc, _)| t < tc) {
                    crossing = Some((t, ngp));
                }
            }
        }

        match crossing {
            Some((t, ngp)) if t > t0 + 1.0e-9 && t < t1 - 1.0e-9 => {
                stack.push(next);
                stack.push(ngp);
            }
            _ => {
                // degenerate split: the segment straddles a cell corner or
                // boundary; test both end cells directly
                if corner_max(tile, r0, c0)? >= next.altitude().min(current.altitude()) {
                    if let Some(hit) = intersect_cell(tile, ellipsoid, los, &current, r0, c0) {
                        return Ok(Some(hit));
                    }
                }
                if corner_max(tile, r1, c1)? >= next.altitude().min(current.altitude()) {
                    if let Some(hit) = intersect_cell(tile, ellipsoid, los, &current, r1, c1) {
                        return Ok(Some(hit));
                    }
                }
                current = next;
            }
        }
    }
    Err(RuggedError::Internal("split point stack failed to drain"))
}

/// Highest corner elevation of cell `(i, j)`.
fn corner_max(tile: &MinMaxTile, i: usize, j: usize) -> Result<f64, RuggedError> {
    let i = i.min(tile.latitude_rows().saturating_sub(2));
    let j = j.min(tile.longitude_columns().saturating_sub(2));
    Ok(tile
        .elevation_at(i, j)?
        .max(tile.elevation_at(i + 1, j)?)
        .max(tile.elevation_at(i, j + 1)?)
        .max(tile.elevation_at(i + 1, j + 1)?))
}

fn intersect_cell(
    tile: &MinMaxTile,
    ellipsoid: &ExtendedEllipsoid,
    los: &Vector3<f64>,
    from: &NormalizedGeodeticPoint,
    i: usize,
    j: usize,
) -> Option<NormalizedGeodeticPoint> {
    let los_geodetic = ellipsoid.convert_los(&GeodeticPoint::from(*from), los);
    tile.cell_intersection(from, &los_geodetic, i, j)
}
