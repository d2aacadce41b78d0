//! Double-buffered frame state of a single tile.

use std::sync::atomic::{AtomicBool, Ordering};

use hitglow_core::{ColorCode, TileId, TileSpec};
use parking_lot::Mutex;

use crate::PlaybackError;

#[derive(Debug)]
struct FramePair {
    frames: [Vec<ColorCode>; 2],
    shown: usize,
}

impl FramePair {
    fn pending_index(&self) -> usize {
        1 - self.shown
    }
}

/// Shown and pending frame of one tile plus its dirty flag.
///
/// The data worker is the only writer and only ever mutates the pending
/// frame; [`TileFrames::publish`] swaps the two frames in one step, so a
/// reader of the shown frame never observes a half-written update.
#[derive(Debug)]
pub struct TileFrames {
    id: TileId,
    size: u32,
    buffers: Mutex<FramePair>,
    dirty: AtomicBool,
}

impl TileFrames {
    /// Creates blank frames for `spec`, filled with `background`.
    #[must_use]
    pub fn new(spec: &TileSpec, background: ColorCode) -> Self {
        let pixels = spec.pixel_count();
        Self {
            id: spec.id,
            size: spec.size,
            buffers: Mutex::new(FramePair {
                frames: [vec![background; pixels], vec![background; pixels]],
                shown: 0,
            }),
            dirty: AtomicBool::new(false),
        }
    }

    /// Tile driven by these frames.
    #[must_use]
    pub const fn id(&self) -> TileId {
        self.id
    }

    /// Edge length of the tile.
    #[must_use]
    pub const fn size(&self) -> u32 {
        self.size
    }

    /// Starts a new frame by copying the shown frame into the pending one.
    ///
    /// The copy finishes before this call returns, so pixel writes issued
    /// afterwards never race it.
    pub fn begin_frame(&self) {
        let mut pair = self.buffers.lock();
        let shown = pair.shown;
        let [first, second] = &mut pair.frames;
        let (source, target) = if shown == 0 {
            (&*first, second)
        } else {
            (&*second, first)
        };
        target.copy_from_slice(source);
    }

    /// Writes one pixel of the pending frame.
    pub fn write(&self, x: u32, y: u32, color: ColorCode) -> Result<(), PlaybackError> {
        if x >= self.size || y >= self.size {
            return Err(PlaybackError::PixelOutOfRange {
                tile: self.id,
                x,
                y,
                size: self.size,
            });
        }
        let index = x as usize + self.size as usize * y as usize;

        let mut pair = self.buffers.lock();
        let pending = pair.pending_index();
        pair.frames[pending][index] = color;
        Ok(())
    }

    /// Makes the pending frame visible and marks the tile dirty.
    pub fn publish(&self) {
        let mut pair = self.buffers.lock();
        pair.shown = pair.pending_index();
        drop(pair);
        self.dirty.store(true, Ordering::Release);
    }

    /// Copies the shown frame into `out` if it changed since the last call.
    pub fn take_dirty(&self, out: &mut Vec<ColorCode>) -> bool {
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return false;
        }
        self.copy_shown(out);
        true
    }

    /// Copies the shown frame into `out`.
    pub fn copy_shown(&self, out: &mut Vec<ColorCode>) {
        let pair = self.buffers.lock();
        out.clear();
        out.extend_from_slice(&pair.frames[pair.shown]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames() -> TileFrames {
        TileFrames::new(
            &TileSpec {
                id: TileId::new(3),
                side: 0,
                column: 0,
                row: 0,
                size: 4,
                mirror_of: None,
            },
            ColorCode::BACKGROUND,
        )
    }

    #[test]
    fn writes_stay_hidden_until_published() {
        let frames = frames();
        let mut shown = Vec::new();

        frames.begin_frame();
        frames.write(1, 2, ColorCode::RED).expect("inside the tile");
        assert!(!frames.take_dirty(&mut shown));
        frames.copy_shown(&mut shown);
        assert!(shown.iter().all(|&color| color == ColorCode::BACKGROUND));

        frames.publish();
        assert!(frames.take_dirty(&mut shown));
        assert_eq!(shown[1 + 4 * 2], ColorCode::RED);
        assert!(!frames.take_dirty(&mut shown));
    }

    #[test]
    fn new_frames_start_from_the_shown_frame() {
        let frames = frames();
        let mut shown = Vec::new();

        frames.begin_frame();
        frames.write(0, 0, ColorCode::BLUE).expect("inside the tile");
        frames.publish();

        frames.begin_frame();
        frames.write(3, 3, ColorCode::GREEN).expect("inside the tile");
        frames.publish();

        frames.copy_shown(&mut shown);
        assert_eq!(shown[0], ColorCode::BLUE);
        assert_eq!(shown[15], ColorCode::GREEN);
    }

    #[test]
    fn rejects_pixels_outside_the_tile() {
        let frames = frames();

        assert!(matches!(
            frames.write(4, 0, ColorCode::RED),
            Err(PlaybackError::PixelOutOfRange { x: 4, size: 4, .. })
        ));
    }
}
