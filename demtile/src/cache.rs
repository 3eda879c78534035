//! Bounded, on-demand tile cache.

use crate::{
    tile::{Location, Tile, UpdatableTile},
    DemError,
};
use log::debug;

/// User-supplied source of elevation data.
///
/// On a cache miss the updater receives a fresh tile and must call
/// `set_geometry` once, with a footprint covering the requested point, then
/// `set_elevation` for every raster sample. Reading files or decompressing
/// archives here is fine; the cache calls the updater at most once per
/// missing tile.
pub trait TileUpdater {
    fn update_tile(
        &self,
        latitude: f64,
        longitude: f64,
        tile: &mut dyn UpdatableTile,
    ) -> Result<(), DemError>;
}

/// Cache of elevation tiles, materialized lazily and evicted least recently
/// used first.
///
/// Tiles are owned by the cache; callers get a shared borrow that lasts
/// until the next cache call. The cache is generic over the tile kind so the
/// Duvenhage intersector can ask for min/max pyramid tiles while the basic
/// scan uses plain ones.
pub struct TileCache<T: Tile, U: TileUpdater> {
    updater: U,
    max_cached_tiles: usize,
    /// Most recently used first.
    tiles: Vec<T>,
}

impl<T: Tile, U: TileUpdater> TileCache<T, U> {
    pub fn new(updater: U, max_cached_tiles: usize) -> Self {
        Self {
            updater,
            max_cached_tiles: max_cached_tiles.max(1),
            tiles: Vec::new(),
        }
    }

    /// Returns the tile covering a geodetic point, fetching it from the
    /// updater if no cached tile covers it.
    pub fn get_tile(&mut self, latitude: f64, longitude: f64) -> Result<&T, DemError> {
        // the cache is small, a linear scan is cheaper than bookkeeping
        if let Some(i) = self
            .tiles
            .iter()
            .position(|tile| tile.location(latitude, longitude) == Location::InTile)
        {
            let tile = self.tiles.remove(i);
            self.tiles.insert(0, tile);
            return Ok(&self.tiles[0]);
        }

        debug!("tile cache miss for ({latitude} rad, {longitude} rad)");
        let mut tile = T::default();
        self.updater.update_tile(latitude, longitude, &mut tile)?;
        tile.tile_update_completed()?;

        match tile.location(latitude, longitude) {
            Location::InTile => {}
            _ if tile.covers(latitude, longitude) => {
                return Err(DemError::TileWithoutRequiredNeighbors {
                    latitude,
                    longitude,
                });
            }
            _ => {
                return Err(DemError::WrongTile {
                    latitude,
                    longitude,
                });
            }
        }

        if self.tiles.len() >= self.max_cached_tiles {
            self.tiles.pop();
            debug!("evicting least recently used tile");
        }
        self.tiles.insert(0, tile);
        Ok(&self.tiles[0])
    }
}
