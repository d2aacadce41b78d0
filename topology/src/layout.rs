//! Default arrangement of tiles on a square-ish grid per side.

use hitglow_core::{TileId, TileSpec};

/// Arranges `tiles_per_side[side]` tiles of edge `tile_size` on each side.
///
/// Tile `n` of a side lands on row `n / width` and column `n % width`, where
/// `width` is the smallest integer whose square covers the side's tile count.
/// Identifiers run sequentially across sides. When `mirror` is set, every
/// primary tile receives a partner with a flipped column on the same side;
/// partners are numbered after all primary tiles.
#[must_use]
pub fn grid_layout(tiles_per_side: &[u32], tile_size: u32, mirror: bool) -> Vec<TileSpec> {
    let mut tiles = Vec::new();
    let mut next_id = 0;

    for (side, &count) in (0u32..).zip(tiles_per_side) {
        let width = ceil_sqrt(count);
        for index in 0..count {
            tiles.push(TileSpec {
                id: TileId::new(next_id),
                side,
                column: index % width,
                row: index / width,
                size: tile_size,
                mirror_of: None,
            });
            next_id += 1;
        }
    }

    if mirror {
        let primaries = tiles.clone();
        for primary in primaries {
            let width = ceil_sqrt(tiles_per_side[primary.side as usize]);
            tiles.push(TileSpec {
                id: TileId::new(next_id),
                column: width - 1 - primary.column,
                mirror_of: Some(primary.id),
                ..primary
            });
            next_id += 1;
        }
    }

    tiles
}

fn ceil_sqrt(count: u32) -> u32 {
    let mut width = 0;
    while width * width < count {
        width += 1;
    }
    width
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widths_cover_tile_counts() {
        assert_eq!(ceil_sqrt(0), 0);
        assert_eq!(ceil_sqrt(1), 1);
        assert_eq!(ceil_sqrt(4), 2);
        assert_eq!(ceil_sqrt(5), 3);
    }

    #[test]
    fn lays_out_rows_before_columns() {
        let tiles = grid_layout(&[3], 8, false);
        let cells: Vec<_> = tiles.iter().map(|tile| (tile.column, tile.row)).collect();

        assert_eq!(cells, vec![(0, 0), (1, 0), (0, 1)]);
    }

    #[test]
    fn numbers_tiles_across_sides() {
        let tiles = grid_layout(&[4, 4], 8, false);

        assert_eq!(tiles.len(), 8);
        assert_eq!(tiles[4].id, TileId::new(4));
        assert_eq!(tiles[4].side, 1);
        assert_eq!((tiles[4].column, tiles[4].row), (0, 0));
    }

    #[test]
    fn mirror_partners_follow_primaries() {
        let tiles = grid_layout(&[4], 8, true);

        assert_eq!(tiles.len(), 8);
        let partner = tiles[5];
        assert_eq!(partner.mirror_of, Some(TileId::new(1)));
        assert_eq!(partner.id, TileId::new(5));
        assert_eq!((partner.column, partner.row), (0, 0));
    }
}
