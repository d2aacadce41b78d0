//! Contract for pushing finished frames to physical tiles.

use std::time::{Duration, Instant};

use hitglow_core::{ColorCode, TileId};

/// How long a pushed frame stays on the tile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Hold {
    /// Keep the frame until the next push.
    #[default]
    Forever,
    /// Keep the frame for the given duration.
    For(Duration),
}

/// Sink receiving the frames published by the scheduler.
///
/// Only the display worker ever calls a transport.
pub trait Transport {
    /// Shows `frame` (row-major, `size * size` colors) on `tile`.
    fn push_frame(&mut self, tile: TileId, frame: &[ColorCode], hold: Hold) -> anyhow::Result<()>;

    /// Blanks `tile`.
    fn clear(&mut self, tile: TileId) -> anyhow::Result<()>;
}

/// Frame captured by a [`RecordingTransport`].
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedPush {
    /// Tile the frame was pushed to.
    pub tile: TileId,
    /// Colors of the frame.
    pub frame: Vec<ColorCode>,
    /// Requested hold.
    pub hold: Hold,
    /// Moment the push was received.
    pub at: Instant,
}

/// Transport keeping every push and clear in memory.
#[derive(Clone, Debug, Default)]
pub struct RecordingTransport {
    pushes: Vec<RecordedPush>,
    clears: Vec<TileId>,
}

impl RecordingTransport {
    /// Creates an empty recording transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames pushed so far, in arrival order.
    #[must_use]
    pub fn pushes(&self) -> &[RecordedPush] {
        &self.pushes
    }

    /// Tiles cleared so far, in arrival order.
    #[must_use]
    pub fn clears(&self) -> &[TileId] {
        &self.clears
    }
}

impl Transport for RecordingTransport {
    fn push_frame(&mut self, tile: TileId, frame: &[ColorCode], hold: Hold) -> anyhow::Result<()> {
        self.pushes.push(RecordedPush {
            tile,
            frame: frame.to_vec(),
            hold,
            at: Instant::now(),
        });
        Ok(())
    }

    fn clear(&mut self, tile: TileId) -> anyhow::Result<()> {
        self.clears.push(tile);
        Ok(())
    }
}
