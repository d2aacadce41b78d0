#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Coincidence phase diagram drawn on the reference side of the display.
//!
//! Every displayed pair `(A, B)` is compared with its reference pair `(C, D)`.
//! The resulting phase lands in one of [`PHASE_BIN_COUNT`] angular bins; each
//! bin is drawn as a single lit cell whose distance from the centre grows with
//! its share of the busiest bin's count. The diagram emits "on" and "off"
//! glow points whenever a cell gains its first bin or loses its last one.

use std::f64::consts::TAU;

use hitglow_core::{
    GlowPoint, HitRecord, PixelKey, DEFAULT_PHASE_TICK_DELAY, DEFAULT_TILE_SIZE, PHASE_BIN_COUNT,
};
use thiserror::Error;
use tracing::trace;

/// Detector side that shows the phase diagram.
pub const DIAGRAM_SIDE: u32 = 0;

/// Nudge applied to a phase that fell between bins because of rounding.
const PHASE_EPSILON: f64 = 1.0e-9;

/// One angular bucket `(lower, upper]` of the phase diagram.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PhaseBin {
    lower: f64,
    upper: f64,
    count: u32,
    cell: Option<(u32, u32)>,
}

impl PhaseBin {
    /// Exclusive lower bound of the bin in radians.
    #[must_use]
    pub const fn lower(&self) -> f64 {
        self.lower
    }

    /// Inclusive upper bound of the bin in radians.
    #[must_use]
    pub const fn upper(&self) -> f64 {
        self.upper
    }

    /// Angle drawn for the bin.
    #[must_use]
    pub fn center(&self) -> f64 {
        (self.lower + self.upper) / 2.0
    }

    /// Number of pairs that landed in the bin.
    #[must_use]
    pub const fn count(&self) -> u32 {
        self.count
    }

    /// Diagram cell lit by the bin, or `None` while the bin is empty.
    #[must_use]
    pub const fn cell(&self) -> Option<(u32, u32)> {
        self.cell
    }

    fn contains(&self, phase: f64) -> bool {
        self.lower < phase && phase <= self.upper
    }
}

/// Incrementally maintained phase diagram.
#[derive(Clone, Debug)]
pub struct PhaseDiagram {
    bins: Vec<PhaseBin>,
    occupancy: Vec<u32>,
    snapshot: Vec<u32>,
    max_count: u32,
    radius: u32,
    tick_delay: f64,
}

impl PhaseDiagram {
    /// Creates an empty diagram drawn on a square of `2 * radius` cells.
    #[must_use]
    pub fn new(radius: u32, tick_delay: f64) -> Self {
        let bins = (0..PHASE_BIN_COUNT)
            .map(|index| PhaseBin {
                lower: TAU * index as f64 / PHASE_BIN_COUNT as f64,
                upper: TAU * (index + 1) as f64 / PHASE_BIN_COUNT as f64,
                count: 0,
                cell: None,
            })
            .collect();
        let extent = 2 * radius as usize;

        Self {
            bins,
            occupancy: vec![0; extent * extent],
            snapshot: Vec::with_capacity(extent * extent),
            max_count: 0,
            radius,
            tick_delay,
        }
    }

    /// Bins ordered by angle.
    #[must_use]
    pub fn bins(&self) -> &[PhaseBin] {
        &self.bins
    }

    /// Number of bins currently lighting the cell `(x, y)`.
    #[must_use]
    pub fn occupancy(&self, x: u32, y: u32) -> u32 {
        self.cell_index(x, y)
            .and_then(|index| self.occupancy.get(index).copied())
            .unwrap_or(0)
    }

    /// Finds the bin whose `(lower, upper]` range contains `phase`.
    ///
    /// A phase that misses every bin is nudged down by a tiny epsilon,
    /// wrapped into `[0, 2π)` and looked up once more, so that `0` lands in
    /// the last bin.
    pub fn locate(&self, phase: f64) -> Result<usize, PhaseError> {
        if let Some(index) = self.find(phase) {
            return Ok(index);
        }

        let mut nudged = phase - PHASE_EPSILON;
        if nudged < 0.0 {
            nudged += TAU;
        }
        self.find(nudged).ok_or(PhaseError::Unbinned { phase })
    }

    fn find(&self, phase: f64) -> Option<usize> {
        self.bins.iter().position(|bin| bin.contains(phase))
    }

    /// Counts one more pair in `bin` and emits the resulting cell changes.
    ///
    /// An "on" point (`+∞` energy) is emitted when the bin's new cell was
    /// dark before the update; an "off" point (`-∞` energy) when the cell it
    /// left is dark after the update.
    pub fn record(
        &mut self,
        bin: usize,
        start_time: f64,
        out: &mut Vec<GlowPoint>,
    ) -> Result<(), PhaseError> {
        if bin >= self.bins.len() {
            return Err(PhaseError::UnknownBin { bin });
        }

        self.snapshot.clear();
        self.snapshot.extend_from_slice(&self.occupancy);

        if let Some((x, y)) = self.bins[bin].cell {
            let index = self.cell_index(x, y).ok_or(PhaseError::CellOutOfRange {
                bin,
                x: i64::from(x),
                y: i64::from(y),
            })?;
            self.occupancy[index] = self.occupancy[index]
                .checked_sub(1)
                .ok_or(PhaseError::Inconsistent { bin })?;
        }

        self.bins[bin].count += 1;
        self.max_count = self.max_count.max(self.bins[bin].count);

        let (x, y) = self.cell_for(bin)?;
        let index = self.cell_index(x, y).ok_or(PhaseError::CellOutOfRange {
            bin,
            x: i64::from(x),
            y: i64::from(y),
        })?;
        self.occupancy[index] += 1;
        self.bins[bin].cell = Some((x, y));

        let mut lit = None;
        let mut darkened = None;
        for (index, (after, before)) in self.occupancy.iter().zip(&self.snapshot).enumerate() {
            let slot = if after > before {
                &mut lit
            } else if after < before {
                &mut darkened
            } else {
                continue;
            };
            if slot.replace(index).is_some() {
                return Err(PhaseError::Inconsistent { bin });
            }
        }

        if let Some(index) = lit {
            if self.snapshot[index] == 0 {
                out.push(self.cell_point(index, f64::INFINITY, start_time));
            }
        }
        if let Some(index) = darkened {
            if self.occupancy[index] == 0 {
                out.push(self.cell_point(index, f64::NEG_INFINITY, start_time));
            }
        }

        trace!(bin, count = self.bins[bin].count, x, y, "phase bin updated");
        Ok(())
    }

    /// Feeds displayed pairs and their reference pairs into the diagram.
    ///
    /// `displayed[n]` and `displayed[n + 1]` form the pair compared with
    /// `reference[n]` and `reference[n + 1]`. Emitted points start with the
    /// first member of the displayed pair.
    pub fn handle(
        &mut self,
        displayed: &[GlowPoint],
        reference: &[HitRecord],
        out: &mut Vec<GlowPoint>,
    ) -> Result<(), PhaseError> {
        if displayed.len() != reference.len() {
            return Err(PhaseError::StreamMismatch {
                displayed: displayed.len(),
                reference: reference.len(),
            });
        }
        if displayed.len() % 2 != 0 {
            return Err(PhaseError::Unpaired {
                count: displayed.len(),
            });
        }

        for (pair, (shown, seen)) in displayed
            .chunks_exact(2)
            .zip(reference.chunks_exact(2))
            .enumerate()
        {
            let phase = phase_metric(
                (shown[0].x, shown[0].y),
                (shown[1].x, shown[1].y),
                (seen[0].x, seen[0].y),
                (seen[1].x, seen[1].y),
            )
            .ok_or(PhaseError::DegeneratePair { pair })?;
            let bin = self.locate(phase)?;
            self.record(bin, shown[0].start_time, out)?;
        }
        Ok(())
    }

    fn cell_for(&self, bin: usize) -> Result<(u32, u32), PhaseError> {
        let phase_bin = &self.bins[bin];
        let radius = f64::from(self.radius);
        let norm = f64::from(phase_bin.count) / f64::from(self.max_count.max(1));
        let angle = phase_bin.center();

        let x = (norm * radius * angle.cos()).ceil() as i64 + i64::from(self.radius) - 1;
        let y = i64::from(self.radius) - (norm * radius * angle.sin()).ceil() as i64;

        let extent = 2 * i64::from(self.radius);
        if !(0..extent).contains(&x) || !(0..extent).contains(&y) {
            return Err(PhaseError::CellOutOfRange { bin, x, y });
        }
        Ok((x as u32, y as u32))
    }

    fn cell_index(&self, x: u32, y: u32) -> Option<usize> {
        let extent = 2 * self.radius;
        (x < extent && y < extent).then(|| y as usize * extent as usize + x as usize)
    }

    fn cell_point(&self, index: usize, energy: f64, start_time: f64) -> GlowPoint {
        let extent = 2 * self.radius as usize;
        let x = (index % extent) as u32;
        let y = (index / extent) as u32;
        GlowPoint::instant(
            PixelKey::new(x, y, DIAGRAM_SIDE),
            energy,
            start_time,
            self.tick_delay,
        )
    }
}

impl Default for PhaseDiagram {
    fn default() -> Self {
        Self::new(DEFAULT_TILE_SIZE, DEFAULT_PHASE_TICK_DELAY)
    }
}

/// Normalised x-projection of the displayed pair against the reference pair,
/// wrapped into `[0, 2π)`.
///
/// Returns `None` when either pair collapses onto a single pixel.
#[must_use]
pub fn phase_metric(a: (u32, u32), b: (u32, u32), c: (u32, u32), d: (u32, u32)) -> Option<f64> {
    let (abx, aby) = delta(a, b);
    let (cdx, cdy) = delta(c, d);
    let ab = abx.hypot(aby);
    let cd = cdx.hypot(cdy);
    if ab == 0.0 || cd == 0.0 {
        return None;
    }

    let phase = abx * cdx / (ab * cd);
    Some(if phase < 0.0 { phase + TAU } else { phase })
}

fn delta(from: (u32, u32), to: (u32, u32)) -> (f64, f64) {
    (
        f64::from(from.0) - f64::from(to.0),
        f64::from(from.1) - f64::from(to.1),
    )
}

/// Errors raised while building the phase diagram.
#[derive(Clone, Copy, Debug, PartialEq, Error)]
pub enum PhaseError {
    /// The displayed and reference streams differ in length.
    #[error("{displayed} displayed points cannot be paired with {reference} reference hits")]
    StreamMismatch {
        /// Number of displayed glow points.
        displayed: usize,
        /// Number of reference hits.
        reference: usize,
    },
    /// The streams hold an odd number of entries.
    #[error("phase diagram needs pairs, got {count} entries")]
    Unpaired {
        /// Number of entries per stream.
        count: usize,
    },
    /// A pair's members share one pixel so no phase can be computed.
    #[error("pair {pair} collapses onto a single pixel")]
    DegeneratePair {
        /// Index of the offending pair.
        pair: usize,
    },
    /// A phase fell outside every bin even after the epsilon nudge.
    #[error("phase {phase} does not fall into any bin")]
    Unbinned {
        /// Offending phase.
        phase: f64,
    },
    /// A bin index beyond the diagram was recorded.
    #[error("bin {bin} does not exist")]
    UnknownBin {
        /// Offending bin.
        bin: usize,
    },
    /// A bin was placed outside the diagram grid.
    #[error("bin {bin} maps to cell ({x}, {y}) outside the diagram")]
    CellOutOfRange {
        /// Bin being placed.
        bin: usize,
        /// Computed column.
        x: i64,
        /// Computed row.
        y: i64,
    },
    /// An update changed more than one cell in the same direction.
    #[error("updating bin {bin} changed the diagram inconsistently")]
    Inconsistent {
        /// Bin being updated.
        bin: usize,
    },
}
