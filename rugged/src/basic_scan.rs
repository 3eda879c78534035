//! Exhaustive-scan ray/terrain intersection, the slow reference used to
//! validate the Duvenhage walker.

use crate::{ellipsoid::ExtendedEllipsoid, RuggedError};
use demtile::{
    GeodeticPoint, NormalizedGeodeticPoint, SimpleTile, TileCache, TileUpdater,
};
use nalgebra::Vector3;

/// Bound on envelope-widening passes; a bug signal when exceeded.
const MAX_ENVELOPE_PASSES: usize = 8;

/// Bound on tiles visited by one pass; a bug signal when exceeded.
const MAX_SCANNED_TILES: usize = 10_000;

pub struct BasicScanAlgorithm<U: TileUpdater> {
    cache: TileCache<SimpleTile, U>,
}

impl<U: TileUpdater> BasicScanAlgorithm<U> {
    pub fn new(updater: U, max_cached_tiles: usize) -> Self {
        Self {
            cache: TileCache::new(updater, max_cached_tiles),
        }
    }

    /// Closest terrain impact of the ray, found by scanning every cell of
    /// every tile touching the rectangle spanned by the entry and exit
    /// points.
    pub fn intersection(
        &mut self,
        ellipsoid: &ExtendedEllipsoid,
        position: &Vector3<f64>,
        los: &Vector3<f64>,
    ) -> Result<NormalizedGeodeticPoint, RuggedError> {
        let los_unit = los.normalize();

        // widen the altitude envelope until every visited tile agrees with
        // it, re-running the scan on the enlarged rectangle
        let mut h_min = 0.0_f64;
        let mut h_max = 0.0_f64;
        for _ in 0..MAX_ENVELOPE_PASSES {
            let entry_cart = ellipsoid.point_at_altitude(position, &los_unit, h_max)?;
            let entry = ellipsoid.transform_cartesian_to_geodetic(&entry_cart);
            let exit_cart = ellipsoid.point_at_altitude(position, &los_unit, h_min)?;
            let exit = ellipsoid.transform_cartesian_to_geodetic(&exit_cart);

            let central = entry.longitude;
            let entry_ngp = NormalizedGeodeticPoint::new(
                entry.latitude,
                entry.longitude,
                entry.altitude,
                central,
            );
            let los_geodetic = ellipsoid.convert_los(&entry, &los_unit);
            let exit_lon = demtile::normalize_longitude(exit.longitude, central);
            let lat_range = (
                entry.latitude.min(exit.latitude),
                entry.latitude.max(exit.latitude),
            );
            let lon_range = (entry.longitude.min(exit_lon), entry.longitude.max(exit_lon));

            // seed the envelope with the entry tile, then the exit tile
            let mut scanned_min = f64::INFINITY;
            let mut scanned_max = f64::NEG_INFINITY;
            for (latitude, longitude) in
                [(entry.latitude, entry.longitude), (exit.latitude, exit_lon)]
            {
                let tile = self.cache.get_tile(latitude, longitude)?;
                scanned_min = scanned_min.min(tile.min_elevation());
                scanned_max = scanned_max.max(tile.max_elevation());
            }

            // visit every tile whose footprint touches the rectangle by
            // stepping across it in tile-sized strides, scanning each
            // tile's own index range and keeping the hit closest to the
            // spacecraft
            let mut best: Option<(f64, NormalizedGeodeticPoint)> = None;
            let mut seen: Vec<(f64, f64)> = Vec::new();
            let mut visited = 0_usize;
            let mut latitude = lat_range.0;
            loop {
                let mut band_top = f64::INFINITY;
                let mut band_step = f64::INFINITY;
                let mut longitude = lon_range.0;
                loop {
                    visited += 1;
                    if visited > MAX_SCANNED_TILES {
                        return Err(RuggedError::Internal(
                            "exhaustive scan visited too many tiles",
                        ));
                    }
                    let (east, east_step) = {
                        let tile = self.cache.get_tile(latitude, longitude)?;
                        band_top = band_top.min(tile.max_latitude());
                        band_step = band_step.min(tile.latitude_step());
                        let key = (tile.min_latitude(), tile.min_longitude());
                        if !seen.contains(&key) {
                            seen.push(key);
                            scanned_min = scanned_min.min(tile.min_elevation());
                            scanned_max = scanned_max.max(tile.max_elevation());
                            let i_min = tile.floor_latitude_index(lat_range.0);
                            let i_max = tile.floor_latitude_index(lat_range.1);
                            let j_min = tile.floor_longitude_index(lon_range.0);
                            let j_max = tile.floor_longitude_index(lon_range.1);
                            for i in i_min..=i_max {
                                for j in j_min..=j_max {
                                    if let Some(hit) =
                                        tile.cell_intersection(&entry_ngp, &los_geodetic, i, j)
                                    {
                                        let t = (ellipsoid
                                            .transform_geodetic_to_cartesian(&hit.into())
                                            - position)
                                            .dot(&los_unit);
                                        if best.map_or(true, |(tb, _)| t < tb) {
                                            best = Some((t, hit));
                                        }
                                    }
                                }
                            }
                        }
                        (tile.max_longitude(), tile.longitude_step())
                    };
                    if east >= lon_range.1 {
                        break;
                    }
                    longitude = if east > longitude {
                        east
                    } else {
                        longitude + east_step
                    };
                }
                if band_top >= lat_range.1 {
                    break;
                }
                latitude = if band_top > latitude {
                    band_top
                } else {
                    latitude + band_step
                };
            }

            if scanned_min >= h_min && scanned_max <= h_max {
                return match best {
                    Some((_, hit)) => Ok(hit),
                    None => Err(RuggedError::Internal("exhaustive scan found no impact")),
                };
            }
            h_min = h_min.min(scanned_min);
            h_max = h_max.max(scanned_max);
        }
        Err(RuggedError::Internal("scan altitude envelope failed to settle"))
    }

    /// Same single-cell refinement as the Duvenhage algorithm.
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
        let los_geodetic = ellipsoid.convert_los(&GeodeticPoint::from(projected), los);
        Ok(tile.cell_intersection(
            &projected,
            &los_geodetic,
            tile.floor_latitude_index(projected.latitude()),
            tile.floor_longitude_index(projected.longitude()),
        ))
    }

    pub fn elevation(&mut self, latitude: f64, longitude: f64) -> Result<f64, RuggedError> {
        let tile = self.cache.get_tile(latitude, longitude)?;
        Ok(tile.interpolate_elevation(latitude, longitude)?)
    }
}
