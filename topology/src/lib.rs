#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Physical display topology for hitglow.
//!
//! A [`DisplayTopology`] maps global detector pixels onto the LED tiles that
//! show them. Tiles sit on a per-side logical grid; every tile shares one
//! edge length so a global coordinate resolves to its grid cell by integer
//! division. Mirror tiles reproduce a primary tile with flipped columns.

mod layout;

use std::collections::HashMap;

use hitglow_core::{PixelKey, TileId, TileSpec};
use thiserror::Error;

pub use layout::grid_layout;

/// Logical grid cells each side must provide for the phase and scatter modes.
pub const PHASE_LAYOUT_CELLS: [(u32, u32); 4] = [(0, 0), (0, 1), (1, 0), (1, 1)];

/// Validated arrangement of display tiles.
#[derive(Clone, Debug)]
pub struct DisplayTopology {
    tiles: Vec<TileSpec>,
    tile_size: u32,
    primaries: HashMap<(u32, u32, u32), TileId>,
    mirrors: HashMap<TileId, TileId>,
}

/// A global pixel expressed in the local coordinates of one tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LocalPixel {
    /// Tile showing the pixel.
    pub tile: TileId,
    /// Column within the tile.
    pub x: u32,
    /// Row within the tile.
    pub y: u32,
}

/// Tiles showing one global pixel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Resolved {
    /// Location on the primary tile, if one covers the pixel.
    pub primary: Option<LocalPixel>,
    /// Location on the primary tile's mirror partner, if requested and present.
    pub mirror: Option<LocalPixel>,
}

impl Resolved {
    /// Iterates over the locations that exist.
    pub fn iter(&self) -> impl Iterator<Item = LocalPixel> + '_ {
        self.primary.iter().chain(self.mirror.iter()).copied()
    }
}

impl DisplayTopology {
    /// Validates the supplied tiles and builds the lookup tables.
    pub fn new(tiles: Vec<TileSpec>) -> Result<Self, TopologyError> {
        let first = tiles.first().ok_or(TopologyError::Empty)?;
        let tile_size = first.size;
        if tile_size == 0 {
            return Err(TopologyError::ZeroSize { tile: first.id });
        }

        let mut ids = HashMap::with_capacity(tiles.len());
        for tile in &tiles {
            if tile.size != tile_size {
                return Err(TopologyError::MixedSizes {
                    tile: tile.id,
                    expected: tile_size,
                    found: tile.size,
                });
            }
            if ids.insert(tile.id, *tile).is_some() {
                return Err(TopologyError::DuplicateId { tile: tile.id });
            }
        }

        let mut primaries = HashMap::new();
        for tile in tiles.iter().filter(|tile| !tile.is_mirror()) {
            if primaries
                .insert((tile.side, tile.column, tile.row), tile.id)
                .is_some()
            {
                return Err(TopologyError::DuplicateCell {
                    side: tile.side,
                    column: tile.column,
                    row: tile.row,
                });
            }
        }

        let mut mirrors = HashMap::new();
        for tile in &tiles {
            let Some(target) = tile.mirror_of else {
                continue;
            };
            let primary = ids.get(&target).ok_or(TopologyError::UnknownMirrorTarget {
                tile: tile.id,
                target,
            })?;
            if primary.is_mirror() {
                return Err(TopologyError::MirrorOfMirror {
                    tile: tile.id,
                    target,
                });
            }
            if primary.side != tile.side {
                return Err(TopologyError::MirrorSideMismatch {
                    tile: tile.id,
                    target,
                });
            }
            if mirrors.insert(target, tile.id).is_some() {
                return Err(TopologyError::SharedMirror { target });
            }
        }

        Ok(Self {
            tiles,
            tile_size,
            primaries,
            mirrors,
        })
    }

    /// Tiles in the order they were supplied.
    #[must_use]
    pub fn tiles(&self) -> &[TileSpec] {
        &self.tiles
    }

    /// Edge length shared by every tile.
    #[must_use]
    pub const fn tile_size(&self) -> u32 {
        self.tile_size
    }

    /// Looks up the description of a tile.
    #[must_use]
    pub fn tile(&self, id: TileId) -> Option<&TileSpec> {
        self.tiles.iter().find(|tile| tile.id == id)
    }

    /// Logical grid cell `(X, Y)` containing the global coordinate.
    #[must_use]
    pub const fn grid_cell(&self, x: u32, y: u32) -> (u32, u32) {
        (x / self.tile_size, y / self.tile_size)
    }

    /// Primary tile showing the global pixel, if any.
    #[must_use]
    pub fn tile_for(&self, pixel: PixelKey) -> Option<TileId> {
        let (column, row) = self.grid_cell(pixel.x, pixel.y);
        self.primaries.get(&(pixel.side, column, row)).copied()
    }

    /// Mirror partner of the primary tile showing the global pixel, if any.
    #[must_use]
    pub fn mirror_for(&self, pixel: PixelKey) -> Option<TileId> {
        self.tile_for(pixel)
            .and_then(|primary| self.mirrors.get(&primary).copied())
    }

    /// Resolves a global pixel to local tile coordinates.
    ///
    /// Missing tiles resolve to `None`. The mirror location flips the local
    /// column as `size - 1 - (x mod size)`.
    #[must_use]
    pub fn resolve(&self, pixel: PixelKey, include_mirror: bool) -> Resolved {
        let local_x = pixel.x % self.tile_size;
        let local_y = pixel.y % self.tile_size;

        let primary = self.tile_for(pixel).map(|tile| LocalPixel {
            tile,
            x: local_x,
            y: local_y,
        });
        let mirror = if include_mirror {
            self.mirror_for(pixel).map(|tile| LocalPixel {
                tile,
                x: self.tile_size - 1 - local_x,
                y: local_y,
            })
        } else {
            None
        };

        Resolved { primary, mirror }
    }

    /// Ensures both sides present the complete 2×2 grid needed to draw the
    /// phase diagram and the displayed pairs.
    pub fn require_phase_layout(&self) -> Result<(), TopologyError> {
        for side in 0..=1 {
            for (column, row) in PHASE_LAYOUT_CELLS {
                if !self.primaries.contains_key(&(side, column, row)) {
                    return Err(TopologyError::MissingPhaseTile { side, column, row });
                }
            }
        }
        Ok(())
    }
}

/// Errors raised while validating a tile arrangement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum TopologyError {
    /// No tiles were supplied.
    #[error("display topology contains no tiles")]
    Empty,
    /// A tile declared an edge length of zero.
    #[error("{tile} has an edge length of zero")]
    ZeroSize {
        /// Offending tile.
        tile: TileId,
    },
    /// Tiles disagree in edge length.
    #[error("{tile} has edge length {found}, expected {expected} like every other tile")]
    MixedSizes {
        /// Offending tile.
        tile: TileId,
        /// Edge length of the first tile.
        expected: u32,
        /// Edge length of the offending tile.
        found: u32,
    },
    /// Two tiles share an identifier.
    #[error("{tile} is declared more than once")]
    DuplicateId {
        /// Repeated identifier.
        tile: TileId,
    },
    /// Two primary tiles occupy the same grid cell.
    #[error("grid cell ({column}, {row}) on side {side} holds more than one tile")]
    DuplicateCell {
        /// Side of the contested cell.
        side: u32,
        /// Column of the contested cell.
        column: u32,
        /// Row of the contested cell.
        row: u32,
    },
    /// A mirror tile referenced a tile that does not exist.
    #[error("{tile} mirrors {target}, which is not part of the topology")]
    UnknownMirrorTarget {
        /// Mirror tile.
        tile: TileId,
        /// Missing target.
        target: TileId,
    },
    /// A mirror tile referenced another mirror tile.
    #[error("{tile} mirrors {target}, which is itself a mirror")]
    MirrorOfMirror {
        /// Mirror tile.
        tile: TileId,
        /// Target that is also a mirror.
        target: TileId,
    },
    /// A mirror tile showed a different side than its primary.
    #[error("{tile} mirrors {target} but sits on another side")]
    MirrorSideMismatch {
        /// Mirror tile.
        tile: TileId,
        /// Primary tile on the other side.
        target: TileId,
    },
    /// More than one mirror referenced the same primary tile.
    #[error("{target} has more than one mirror partner")]
    SharedMirror {
        /// Primary tile with several mirrors.
        target: TileId,
    },
    /// The phase layout lacks a tile.
    #[error("phase layout needs a tile at grid cell ({column}, {row}) on side {side}")]
    MissingPhaseTile {
        /// Side missing the tile.
        side: u32,
        /// Column of the missing cell.
        column: u32,
        /// Row of the missing cell.
        row: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile(id: u32, side: u32, column: u32, row: u32) -> TileSpec {
        TileSpec {
            id: TileId::new(id),
            side,
            column,
            row,
            size: 8,
            mirror_of: None,
        }
    }

    #[test]
    fn grid_cell_divides_by_tile_size() {
        let topology = DisplayTopology::new(vec![tile(0, 0, 0, 0)]).expect("valid topology");

        assert_eq!(topology.grid_cell(9, 3), (1, 0));
        assert_eq!(topology.grid_cell(7, 15), (0, 1));
    }

    #[test]
    fn rejects_mixed_sizes() {
        let mut odd = tile(1, 0, 1, 0);
        odd.size = 16;

        let error = DisplayTopology::new(vec![tile(0, 0, 0, 0), odd]).expect_err("mixed sizes");
        assert_eq!(
            error,
            TopologyError::MixedSizes {
                tile: TileId::new(1),
                expected: 8,
                found: 16,
            }
        );
    }

    #[test]
    fn rejects_duplicate_cells_and_ids() {
        assert_eq!(
            DisplayTopology::new(vec![tile(0, 0, 0, 0), tile(1, 0, 0, 0)]).unwrap_err(),
            TopologyError::DuplicateCell {
                side: 0,
                column: 0,
                row: 0,
            }
        );
        assert_eq!(
            DisplayTopology::new(vec![tile(0, 0, 0, 0), tile(0, 1, 0, 0)]).unwrap_err(),
            TopologyError::DuplicateId {
                tile: TileId::new(0)
            }
        );
    }

    #[test]
    fn rejects_dangling_and_shared_mirrors() {
        let mut dangling = tile(1, 0, 1, 0);
        dangling.mirror_of = Some(TileId::new(7));
        assert!(matches!(
            DisplayTopology::new(vec![tile(0, 0, 0, 0), dangling]),
            Err(TopologyError::UnknownMirrorTarget { .. })
        ));

        let mut first = tile(1, 0, 1, 0);
        first.mirror_of = Some(TileId::new(0));
        let mut second = tile(2, 0, 2, 0);
        second.mirror_of = Some(TileId::new(0));
        assert_eq!(
            DisplayTopology::new(vec![tile(0, 0, 0, 0), first, second]).unwrap_err(),
            TopologyError::SharedMirror {
                target: TileId::new(0)
            }
        );
    }

    #[test]
    fn mirror_tiles_do_not_claim_grid_cells() {
        let mut mirror = tile(1, 0, 0, 0);
        mirror.mirror_of = Some(TileId::new(0));

        let topology =
            DisplayTopology::new(vec![tile(0, 0, 0, 0), mirror]).expect("valid topology");

        assert_eq!(topology.tile_for(PixelKey::new(3, 3, 0)), Some(TileId::new(0)));
        assert_eq!(topology.mirror_for(PixelKey::new(3, 3, 0)), Some(TileId::new(1)));
    }

    #[test]
    fn phase_layout_requires_both_sides() {
        let mut tiles: Vec<_> = PHASE_LAYOUT_CELLS
            .iter()
            .enumerate()
            .map(|(index, &(column, row))| tile(index as u32, 0, column, row))
            .collect();
        let partial = DisplayTopology::new(tiles.clone()).expect("valid topology");
        assert_eq!(
            partial.require_phase_layout(),
            Err(TopologyError::MissingPhaseTile {
                side: 1,
                column: 0,
                row: 0,
            })
        );

        tiles.extend(
            PHASE_LAYOUT_CELLS
                .iter()
                .enumerate()
                .map(|(index, &(column, row))| tile(4 + index as u32, 1, column, row)),
        );
        let complete = DisplayTopology::new(tiles).expect("valid topology");
        assert_eq!(complete.require_phase_layout(), Ok(()));
    }
}
