use criterion::{black_box, criterion_group, criterion_main, Criterion};
use demtile::{MinMaxTile, Tile, UpdatableTile};

fn filled_tile(rows: usize, columns: usize) -> MinMaxTile {
    let mut tile = MinMaxTile::default();
    tile.set_geometry(0.2, 0.4, 1.0e-5, 1.0e-5, rows, columns)
        .unwrap();
    for i in 0..rows {
        for j in 0..columns {
            let e = (10000.0 * (1.0 + (i * columns + j) as f64).sin()).rem_euclid(1000.0);
            tile.set_elevation(i, j, e).unwrap();
        }
    }
    tile.tile_update_completed().unwrap();
    tile
}

fn pyramid_build(c: &mut Criterion) {
    c.bench_function("min/max pyramid build 1201x1201", |b| {
        b.iter(|| filled_tile(black_box(1201), black_box(1201)))
    });
}

fn merge_level_lookup(c: &mut Criterion) {
    let tile = filled_tile(1201, 1201);
    c.bench_function("merge level + subtile max", |b| {
        b.iter(|| {
            let level = tile
                .merge_level(black_box(17), black_box(1100), black_box(980), black_box(43));
            level.map(|level| tile.max_elevation_at(17, 1100, level))
        })
    });
}

criterion_group!(benches, pyramid_build, merge_level_lookup);
criterion_main!(benches);
