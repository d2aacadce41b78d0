#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Double-buffered real-time playback of synthesized events onto LED tiles.
//!
//! Every tile owns a shown and a pending frame. The data worker copies the
//! shown frame into the pending one, applies an event, waits for the event's
//! start time and publishes by swapping the frames. The display worker polls
//! the dirty flags and hands whole frames to a [`Transport`]. Once the data
//! worker has drained the list, or panics, the shared [`StopToken`] is
//! cancelled; the display worker flushes the last frames, clears every tile
//! and exits.

mod context;
mod frames;
mod scheduler;
mod transport;

pub use context::{PlaybackContext, StopToken};
pub use frames::TileFrames;
pub use scheduler::{PlaybackReport, PlaybackScheduler, PlaybackSettings};
pub use transport::{Hold, RecordedPush, RecordingTransport, Transport};

use hitglow_core::TileId;
use thiserror::Error;

/// Failures raised while preparing or running playback.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// An event writes to a tile the context does not know.
    #[error("event {event} writes to unknown {tile}")]
    UnknownTile {
        /// Position of the offending event.
        event: usize,
        /// Tile the event addressed.
        tile: TileId,
    },
    /// A write addressed a pixel outside its tile.
    #[error("pixel ({x}, {y}) lies outside {tile} of size {size}")]
    PixelOutOfRange {
        /// Tile the write addressed.
        tile: TileId,
        /// Local column of the write.
        x: u32,
        /// Local row of the write.
        y: u32,
        /// Edge length of the tile.
        size: u32,
    },
    /// Event start times decrease.
    #[error("event {index} starts at {start_time} before its predecessor at {previous}")]
    Unordered {
        /// Position of the offending event.
        index: usize,
        /// Start time of the offending event.
        start_time: f64,
        /// Start time of the preceding event.
        previous: f64,
    },
    /// A worker thread could not be started.
    #[error("failed to spawn playback worker")]
    Spawn(#[source] std::io::Error),
    /// A worker thread panicked.
    #[error("{worker} worker panicked")]
    WorkerPanicked {
        /// Name of the worker.
        worker: &'static str,
    },
}
