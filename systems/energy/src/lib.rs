#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Energy models that turn detector hits into glow windows.
//!
//! Two strategies exist. [`EnergyModel::Accumulate`] lights every hit with the
//! running energy total of its pixel, while [`EnergyModel::Tick`] lets each
//! hit glow and decay in discrete ticks, folding the undecayed energy of an
//! interrupted glow into the hit that interrupts it.

use std::collections::HashMap;

use hitglow_core::{
    GlowPoint, HitRecord, PixelKey, DEFAULT_ENERGY_TICK_RATE, DEFAULT_TICK_DELAY,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Most ticks a single glow point may span.
pub const MAX_GLOW_TICKS: u32 = 100_000;

/// Decides whether two glow points light the same pixel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PixelMatch {
    /// Points match when their global coordinates agree.
    #[default]
    Position,
    /// Points match when their global coordinates and detector sides agree.
    PositionAndSide,
}

impl PixelMatch {
    /// Reports whether `left` and `right` address the same pixel.
    #[must_use]
    pub fn matches(self, left: PixelKey, right: PixelKey) -> bool {
        let same_position = left.x == right.x && left.y == right.y;
        match self {
            Self::Position => same_position,
            Self::PositionAndSide => same_position && left.side == right.side,
        }
    }

    fn key(self, pixel: PixelKey) -> PixelKey {
        match self {
            Self::Position => PixelKey::new(pixel.x, pixel.y, 0),
            Self::PositionAndSide => pixel,
        }
    }
}

/// Decides when tick-model glow windows begin.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TickSchedule {
    /// Windows begin at their hit times and overlapping windows are merged.
    #[default]
    HitTime,
    /// Points are played as consecutive pairs: the second member of a pair
    /// starts with the first, and every pair starts when the previous pair's
    /// first member stops glowing.
    SequentialPairs,
}

/// Parameters of the tick energy model.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TickModel {
    rate: f64,
    delay: f64,
    pixel_match: PixelMatch,
    schedule: TickSchedule,
}

impl TickModel {
    /// Creates a tick model removing `rate` energy every `delay` seconds.
    pub fn new(rate: f64, delay: f64) -> Result<Self, EnergyError> {
        if !(rate.is_finite() && rate > 0.0) {
            return Err(EnergyError::InvalidTickRate { rate });
        }
        if !(delay.is_finite() && delay > 0.0) {
            return Err(EnergyError::InvalidTickDelay { delay });
        }

        Ok(Self {
            rate,
            delay,
            pixel_match: PixelMatch::default(),
            schedule: TickSchedule::default(),
        })
    }

    /// Replaces the predicate used to detect overlapping windows.
    #[must_use]
    pub const fn with_pixel_match(mut self, pixel_match: PixelMatch) -> Self {
        self.pixel_match = pixel_match;
        self
    }

    /// Replaces the scheduling strategy.
    #[must_use]
    pub const fn with_schedule(mut self, schedule: TickSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Energy removed on every tick.
    #[must_use]
    pub const fn rate(&self) -> f64 {
        self.rate
    }

    /// Seconds between ticks.
    #[must_use]
    pub const fn delay(&self) -> f64 {
        self.delay
    }

    /// Predicate used to detect overlapping windows.
    #[must_use]
    pub const fn pixel_match(&self) -> PixelMatch {
        self.pixel_match
    }

    /// Scheduling strategy applied to the windows.
    #[must_use]
    pub const fn schedule(&self) -> TickSchedule {
        self.schedule
    }

    fn point(&self, pixel: PixelKey, energy: f64, start_time: f64) -> GlowPoint {
        let ticks = tick_count(energy, self.rate);
        GlowPoint {
            x: pixel.x,
            y: pixel.y,
            side: pixel.side,
            energy,
            energy_tick_rate: self.rate,
            ticks,
            tick_delay: self.delay,
            start_time,
            end_time: start_time + f64::from(ticks) * self.delay,
        }
    }

    fn glow_points(&self, hits: &[HitRecord], out: &mut Vec<GlowPoint>) -> Result<(), EnergyError> {
        let first = out.len();
        out.extend(
            hits.iter()
                .map(|hit| self.point(hit.pixel(), hit.energy, hit.time)),
        );

        let points = &mut out[first..];
        points.sort_by(|left, right| left.start_time.total_cmp(&right.start_time));

        if self.schedule == TickSchedule::SequentialPairs {
            schedule_pairs(points)?;
        }
        self.resolve_overlaps(points);

        match points.iter().find(|point| point.ticks > MAX_GLOW_TICKS) {
            Some(point) => Err(EnergyError::TooManyTicks {
                energy: point.energy,
                ticks: point.ticks,
            }),
            None => Ok(()),
        }
    }

    /// Merges every window into the first later window on the same pixel that
    /// starts while it is still glowing.
    fn resolve_overlaps(&self, points: &mut [GlowPoint]) {
        for index in 0..points.len() {
            let (head, tail) = points.split_at_mut(index + 1);
            let current = &mut head[index];

            for later in tail.iter_mut() {
                if later.start_time >= current.end_time {
                    break;
                }
                if !self.pixel_match.matches(current.pixel(), later.pixel()) {
                    continue;
                }

                let elapsed = later.start_time - current.start_time;
                let kept = tick_count(elapsed, self.delay).saturating_add(1);
                current.ticks = current.ticks.min(kept);
                current.end_time = later.start_time;

                let residual = current.energy - f64::from(current.ticks) * self.rate;
                later.energy += residual.max(0.0);
                later.ticks = tick_count(later.energy, self.rate);
                later.end_time = later.start_time + f64::from(later.ticks) * self.delay;
                break;
            }
        }
    }
}

impl Default for TickModel {
    fn default() -> Self {
        Self {
            rate: DEFAULT_ENERGY_TICK_RATE,
            delay: DEFAULT_TICK_DELAY,
            pixel_match: PixelMatch::default(),
            schedule: TickSchedule::default(),
        }
    }
}

/// Strategy used to derive glow windows from hits.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EnergyModel {
    /// Every hit shows its own energy plus the energy of every strictly
    /// earlier hit on the same pixel.
    Accumulate {
        /// Predicate deciding which hits share a running total.
        pixel_match: PixelMatch,
    },
    /// Every hit glows for `ceil(energy / rate)` ticks.
    Tick(TickModel),
}

impl EnergyModel {
    /// Appends the glow points derived from `hits` to `out`, ordered by start time.
    pub fn glow_points(&self, hits: &[HitRecord], out: &mut Vec<GlowPoint>) -> Result<(), EnergyError> {
        match self {
            Self::Accumulate { pixel_match } => {
                accumulate(*pixel_match, hits, out);
                Ok(())
            }
            Self::Tick(model) => model.glow_points(hits, out),
        }
    }

    /// Reports whether the model lets pixels decay tick by tick.
    #[must_use]
    pub const fn is_tick(&self) -> bool {
        matches!(self, Self::Tick(_))
    }
}

/// Number of ticks needed to decay `energy` to zero at `rate` per tick.
///
/// Exact multiples are not rounded up: `tick_count(10.0, 5.0) == 2`.
/// Non-positive energies need no ticks.
#[must_use]
pub fn tick_count(energy: f64, rate: f64) -> u32 {
    let ticks = (energy / rate).ceil();
    if ticks.is_nan() || ticks <= 0.0 {
        0
    } else if ticks >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        ticks as u32
    }
}

#[derive(Clone, Copy)]
struct RunningTotal {
    time: f64,
    before: f64,
    total: f64,
}

fn accumulate(pixel_match: PixelMatch, hits: &[HitRecord], out: &mut Vec<GlowPoint>) {
    let mut ordered: Vec<&HitRecord> = hits.iter().collect();
    ordered.sort_by(|left, right| left.time.total_cmp(&right.time));

    let mut totals: HashMap<PixelKey, RunningTotal> = HashMap::new();
    out.reserve(ordered.len());

    for hit in ordered {
        let key = pixel_match.key(hit.pixel());
        let running = match totals.get(&key) {
            Some(previous) if previous.time == hit.time => RunningTotal {
                time: hit.time,
                before: previous.before,
                total: previous.total + hit.energy,
            },
            Some(previous) => RunningTotal {
                time: hit.time,
                before: previous.total,
                total: previous.total + hit.energy,
            },
            None => RunningTotal {
                time: hit.time,
                before: 0.0,
                total: hit.energy,
            },
        };
        let _ = totals.insert(key, running);

        out.push(GlowPoint::instant(
            hit.pixel(),
            running.before + hit.energy,
            hit.time,
            DEFAULT_TICK_DELAY,
        ));
    }
}

fn schedule_pairs(points: &mut [GlowPoint]) -> Result<(), EnergyError> {
    if points.len() % 2 != 0 {
        return Err(EnergyError::UnpairedPoints {
            count: points.len(),
        });
    }

    let mut previous_end = None;
    for pair in points.chunks_exact_mut(2) {
        if let Some(end) = previous_end {
            shift(&mut pair[0], end);
        }
        let lead_start = pair[0].start_time;
        shift(&mut pair[1], lead_start);
        previous_end = Some(pair[0].end_time);
    }
    Ok(())
}

fn shift(point: &mut GlowPoint, start_time: f64) {
    point.start_time = start_time;
    point.end_time = start_time + f64::from(point.ticks) * point.tick_delay;
}

/// Errors raised while deriving glow points.
#[derive(Clone, Copy, Debug, PartialEq, Error)]
pub enum EnergyError {
    /// The tick rate was not a positive finite number.
    #[error("energy tick rate must be positive and finite, got {rate}")]
    InvalidTickRate {
        /// Offending rate.
        rate: f64,
    },
    /// The tick delay was not a positive finite number.
    #[error("tick delay must be positive and finite, got {delay}")]
    InvalidTickDelay {
        /// Offending delay.
        delay: f64,
    },
    /// Sequential pair scheduling received an odd number of points.
    #[error("sequential pair scheduling needs an even number of points, got {count}")]
    UnpairedPoints {
        /// Number of points supplied.
        count: usize,
    },
    /// A glow point would decay over more than [`MAX_GLOW_TICKS`] ticks.
    #[error("energy {energy} needs {ticks} ticks, at most {} are allowed", MAX_GLOW_TICKS)]
    TooManyTicks {
        /// Energy of the offending point.
        energy: f64,
        /// Ticks the point would need.
        ticks: u32,
    },
}
