//! Shared state handed to both playback workers.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use hitglow_core::{ColorCode, TileId};
use hitglow_topology::DisplayTopology;

use crate::TileFrames;

/// Cooperative cancellation flag shared by the playback workers.
#[derive(Clone, Debug, Default)]
pub struct StopToken(Arc<AtomicBool>);

impl StopToken {
    /// Creates a token that has not been cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests every holder of the token to stop.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Reports whether the token has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Frames of every tile plus the stop flag of one playback run.
#[derive(Debug)]
pub struct PlaybackContext {
    tiles: Vec<TileFrames>,
    index: HashMap<TileId, usize>,
    stop: StopToken,
}

impl PlaybackContext {
    /// Creates blank frames for every tile of the topology.
    #[must_use]
    pub fn new(topology: &DisplayTopology, background: ColorCode) -> Self {
        let tiles: Vec<_> = topology
            .tiles()
            .iter()
            .map(|spec| TileFrames::new(spec, background))
            .collect();
        let index = tiles
            .iter()
            .enumerate()
            .map(|(position, frames)| (frames.id(), position))
            .collect();

        Self {
            tiles,
            index,
            stop: StopToken::new(),
        }
    }

    /// Frames of every tile in topology order.
    #[must_use]
    pub fn tiles(&self) -> &[TileFrames] {
        &self.tiles
    }

    /// Frames of one tile.
    #[must_use]
    pub fn tile(&self, id: TileId) -> Option<&TileFrames> {
        self.index.get(&id).map(|&position| &self.tiles[position])
    }

    /// Token stopping both workers once cancelled.
    #[must_use]
    pub fn stop_token(&self) -> StopToken {
        self.stop.clone()
    }
}

/// Cancels the wrapped token when dropped, even while unwinding.
pub(crate) struct CancelOnDrop(pub(crate) StopToken);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}
