use thiserror::Error;

#[derive(Error, Debug)]
pub enum DemError {
    #[error("tile geometry is empty: {rows} rows x {columns} columns")]
    EmptyTile { rows: usize, columns: usize },

    #[error("tile geometry has already been set")]
    GeometryAlreadySet,

    #[error("indices ({row}, {column}) out of tile ({rows} rows x {columns} columns)")]
    OutOfTileIndices {
        row: usize,
        column: usize,
        rows: usize,
        columns: usize,
    },

    #[error("point ({latitude} rad, {longitude} rad) is out of tile angular range")]
    OutOfTileAngles { latitude: f64, longitude: f64 },

    #[error("updated tile does not cover point ({latitude} rad, {longitude} rad)")]
    WrongTile { latitude: f64, longitude: f64 },

    #[error(
        "tile selected for ({latitude} rad, {longitude} rad) has no interpolation neighbors"
    )]
    TileWithoutRequiredNeighbors { latitude: f64, longitude: f64 },
}
