#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the hitglow pipeline.
//!
//! Detector hits enter as [`HitRecord`] values. Energy models turn them into
//! [`GlowPoint`] windows describing how long and how brightly a pixel glows,
//! the synthesizer expands those windows into [`Event`] pixel writes addressed
//! to physical tiles described by [`TileSpec`], and the playback scheduler
//! replays the events in real time. Everything in this crate is plain data
//! plus the pure [`ColorGradient`] lookup.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Seconds between successive decay steps of a glowing pixel.
pub const DEFAULT_TICK_DELAY: f64 = 0.5;

/// Seconds between decay steps while the phase diagram is being played.
pub const DEFAULT_PHASE_TICK_DELAY: f64 = 1.0;

/// Energy removed from a glowing pixel on every tick.
pub const DEFAULT_ENERGY_TICK_RATE: f64 = 5.0;

/// Events closer together than this many seconds share one frame update.
pub const EVENT_GROUP_TOLERANCE: f64 = 0.001;

/// Edge length of the LED matrix tiles fitted to the instrument.
pub const DEFAULT_TILE_SIZE: u32 = 8;

/// Number of equal angular bins partitioning `[0, 2π)` in the phase diagram.
pub const PHASE_BIN_COUNT: usize = 60;

/// Seconds the final accumulate-mode frame is repeated after the last hit.
pub const ACCUMULATE_LINGER: f64 = 1.0;

/// Color code understood by the LED tiles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColorCode(u8);

impl ColorCode {
    /// Pure red.
    pub const RED: Self = Self(0x00);
    /// Orange.
    pub const ORANGE: Self = Self(0x12);
    /// Yellow.
    pub const YELLOW: Self = Self(0x18);
    /// Green.
    pub const GREEN: Self = Self(0x52);
    /// Cyan.
    pub const CYAN: Self = Self(0x7f);
    /// Blue.
    pub const BLUE: Self = Self(0xaa);
    /// Purple.
    pub const PURPLE: Self = Self(0xc3);
    /// Pink.
    pub const PINK: Self = Self(0xdc);
    /// White.
    pub const WHITE: Self = Self(0xfe);
    /// Black, which switches the LED off.
    pub const BLACK: Self = Self(0xff);
    /// Color shown by pixels that are not glowing.
    pub const BACKGROUND: Self = Self::BLACK;

    /// Wraps a raw color code.
    #[must_use]
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    /// Retrieves the raw color code.
    #[must_use]
    pub const fn get(&self) -> u8 {
        self.0
    }

    /// Looks up one of the named colors of the tile palette.
    #[must_use]
    pub fn named(name: &str) -> Option<Self> {
        let color = match name.trim().to_ascii_lowercase().as_str() {
            "red" => Self::RED,
            "orange" => Self::ORANGE,
            "yellow" => Self::YELLOW,
            "green" => Self::GREEN,
            "cyan" => Self::CYAN,
            "blue" => Self::BLUE,
            "purple" => Self::PURPLE,
            "pink" => Self::PINK,
            "white" => Self::WHITE,
            "black" => Self::BLACK,
            _ => return None,
        };
        Some(color)
    }
}

impl Default for ColorCode {
    fn default() -> Self {
        Self::BACKGROUND
    }
}

/// One step of a [`ColorGradient`]: quantities up to `threshold` use `color`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GradientStep {
    /// Inclusive upper bound of the quantities covered by this step.
    pub threshold: f64,
    /// Color shown for quantities covered by this step.
    pub color: ColorCode,
}

impl GradientStep {
    /// Creates a new gradient step.
    #[must_use]
    pub const fn new(threshold: f64, color: ColorCode) -> Self {
        Self { threshold, color }
    }
}

/// Monotone step table mapping a quantity such as energy to a color.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<GradientStep>", into = "Vec<GradientStep>")]
pub struct ColorGradient {
    steps: Vec<GradientStep>,
}

impl ColorGradient {
    /// Builds a gradient from the provided steps, ordering them by threshold.
    ///
    /// Returns an error when no steps are supplied, a threshold is NaN or
    /// infinite, or two steps share a threshold.
    pub fn new(mut steps: Vec<GradientStep>) -> Result<Self, GradientError> {
        if steps.is_empty() {
            return Err(GradientError::Empty);
        }

        if let Some(step) = steps.iter().find(|step| !step.threshold.is_finite()) {
            return Err(GradientError::NonFiniteThreshold {
                threshold: step.threshold,
            });
        }

        steps.sort_by(|left, right| left.threshold.total_cmp(&right.threshold));

        if let Some(pair) = steps
            .windows(2)
            .find(|pair| pair[0].threshold == pair[1].threshold)
        {
            return Err(GradientError::DuplicateThreshold {
                threshold: pair[0].threshold,
            });
        }

        Ok(Self { steps })
    }

    /// Steps of the gradient ordered by ascending threshold.
    #[must_use]
    pub fn steps(&self) -> &[GradientStep] {
        &self.steps
    }

    /// Returns the color of the smallest threshold that is `>= quantity`.
    ///
    /// Quantities above every threshold saturate to the color of the largest
    /// threshold. Callers map non-positive quantities to
    /// [`ColorCode::BACKGROUND`] themselves.
    #[must_use]
    pub fn color_for(&self, quantity: f64) -> ColorCode {
        self.steps
            .iter()
            .find(|step| quantity <= step.threshold)
            .map_or_else(|| self.saturated(), |step| step.color)
    }

    fn saturated(&self) -> ColorCode {
        self.steps
            .last()
            .map_or(ColorCode::BACKGROUND, |step| step.color)
    }
}

impl Default for ColorGradient {
    fn default() -> Self {
        Self {
            steps: vec![
                GradientStep::new(5.0, ColorCode::new(10)),
                GradientStep::new(10.0, ColorCode::new(20)),
                GradientStep::new(15.0, ColorCode::new(30)),
                GradientStep::new(20.0, ColorCode::new(40)),
                GradientStep::new(25.0, ColorCode::new(50)),
            ],
        }
    }
}

impl TryFrom<Vec<GradientStep>> for ColorGradient {
    type Error = GradientError;

    fn try_from(steps: Vec<GradientStep>) -> Result<Self, Self::Error> {
        Self::new(steps)
    }
}

impl From<ColorGradient> for Vec<GradientStep> {
    fn from(gradient: ColorGradient) -> Self {
        gradient.steps
    }
}

/// Reasons a [`ColorGradient`] cannot be constructed.
#[derive(Clone, Copy, Debug, PartialEq, Error)]
pub enum GradientError {
    /// The gradient contained no steps.
    #[error("color gradient must contain at least one step")]
    Empty,
    /// A threshold was NaN or infinite.
    #[error("color gradient threshold {threshold} is not finite")]
    NonFiniteThreshold {
        /// Offending threshold.
        threshold: f64,
    },
    /// Two steps used the same threshold.
    #[error("color gradient threshold {threshold} appears more than once")]
    DuplicateThreshold {
        /// Threshold shared by several steps.
        threshold: f64,
    },
}

/// Identifier of a physical display tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TileId(u32);

impl TileId {
    /// Creates a new tile identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tile {}", self.0)
    }
}

/// Global pixel coordinate on one detector side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PixelKey {
    /// Global column of the pixel.
    pub x: u32,
    /// Global row of the pixel.
    pub y: u32,
    /// Detector side the pixel belongs to.
    pub side: u32,
}

impl PixelKey {
    /// Creates a new pixel key.
    #[must_use]
    pub const fn new(x: u32, y: u32, side: u32) -> Self {
        Self { x, y, side }
    }
}

/// One physical detection reported by the instrument.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HitRecord {
    /// Detection time in seconds.
    pub time: f64,
    /// Identifier of the crystal that registered the hit.
    pub crystal_id: u32,
    /// Detector side that registered the hit.
    pub side: u32,
    /// Global pixel column of the hit.
    pub x: u32,
    /// Global pixel row of the hit.
    pub y: u32,
    /// Deposited energy.
    pub energy: f64,
}

impl HitRecord {
    /// Global pixel hit by the record.
    #[must_use]
    pub const fn pixel(&self) -> PixelKey {
        PixelKey::new(self.x, self.y, self.side)
    }
}

/// Time window during which one pixel glows in response to one or more hits.
///
/// A point with `ticks == n` produces `n + 1` color updates spaced
/// `tick_delay` seconds apart, the last of which normally returns the pixel
/// to the background color.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GlowPoint {
    /// Global pixel column.
    pub x: u32,
    /// Global pixel row.
    pub y: u32,
    /// Detector side.
    pub side: u32,
    /// Energy shown on the first tick. `+∞` keeps the pixel fully lit,
    /// `-∞` extinguishes it.
    pub energy: f64,
    /// Energy removed on every tick.
    pub energy_tick_rate: f64,
    /// Number of remaining decay steps.
    pub ticks: u32,
    /// Seconds between decay steps.
    pub tick_delay: f64,
    /// Time of the first color update.
    pub start_time: f64,
    /// Time the glow window closes.
    pub end_time: f64,
}

impl GlowPoint {
    /// Creates a point that updates its pixel exactly once at `start_time`.
    #[must_use]
    pub const fn instant(pixel: PixelKey, energy: f64, start_time: f64, tick_delay: f64) -> Self {
        Self {
            x: pixel.x,
            y: pixel.y,
            side: pixel.side,
            energy,
            energy_tick_rate: 0.0,
            ticks: 0,
            tick_delay,
            start_time,
            end_time: start_time,
        }
    }

    /// Global pixel the point lights up.
    #[must_use]
    pub const fn pixel(&self) -> PixelKey {
        PixelKey::new(self.x, self.y, self.side)
    }

    /// Energy displayed after `tick` decay steps.
    #[must_use]
    pub fn energy_at_tick(&self, tick: u32) -> f64 {
        if tick == 0 {
            return self.energy;
        }
        self.energy - f64::from(tick) * self.energy_tick_rate
    }

    /// Time of the color update belonging to `tick`.
    #[must_use]
    pub fn tick_time(&self, tick: u32) -> f64 {
        self.start_time + f64::from(tick) * self.tick_delay
    }
}

/// A single pixel write addressed to a physical tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PixelWrite {
    /// Tile receiving the write.
    pub tile: TileId,
    /// Local column within the tile.
    pub x: u32,
    /// Local row within the tile.
    pub y: u32,
    /// Color written to the pixel.
    pub color: ColorCode,
}

/// One or more simultaneous pixel writes scheduled at `start_time`.
///
/// The four parallel arrays always have the same length.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "EventRecord", into = "EventRecord")]
pub struct Event {
    x_values: Vec<u32>,
    y_values: Vec<u32>,
    colors: Vec<ColorCode>,
    tile_ids: Vec<TileId>,
    start_time: f64,
}

impl Event {
    /// Creates an event carrying a single pixel write.
    #[must_use]
    pub fn single(write: PixelWrite, start_time: f64) -> Self {
        Self {
            x_values: vec![write.x],
            y_values: vec![write.y],
            colors: vec![write.color],
            tile_ids: vec![write.tile],
            start_time,
        }
    }

    /// Assembles an event from parallel arrays.
    ///
    /// Returns an error when the arrays disagree in length or the start time
    /// is not finite.
    pub fn from_parts(
        x_values: Vec<u32>,
        y_values: Vec<u32>,
        colors: Vec<ColorCode>,
        tile_ids: Vec<TileId>,
        start_time: f64,
    ) -> Result<Self, EventShapeError> {
        let len = x_values.len();
        if y_values.len() != len || colors.len() != len || tile_ids.len() != len {
            return Err(EventShapeError::LengthMismatch {
                x_values: len,
                y_values: y_values.len(),
                colors: colors.len(),
                tile_ids: tile_ids.len(),
            });
        }
        if !start_time.is_finite() {
            return Err(EventShapeError::NonFiniteStart { start_time });
        }

        Ok(Self {
            x_values,
            y_values,
            colors,
            tile_ids,
            start_time,
        })
    }

    /// Time the writes become visible, in seconds from the start of the run.
    #[must_use]
    pub const fn start_time(&self) -> f64 {
        self.start_time
    }

    /// Number of pixel writes carried by the event.
    #[must_use]
    pub fn len(&self) -> usize {
        self.x_values.len()
    }

    /// Reports whether the event carries no writes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.x_values.is_empty()
    }

    /// Local columns of the writes.
    #[must_use]
    pub fn x_values(&self) -> &[u32] {
        &self.x_values
    }

    /// Local rows of the writes.
    #[must_use]
    pub fn y_values(&self) -> &[u32] {
        &self.y_values
    }

    /// Colors of the writes.
    #[must_use]
    pub fn colors(&self) -> &[ColorCode] {
        &self.colors
    }

    /// Tiles addressed by the writes.
    #[must_use]
    pub fn tile_ids(&self) -> &[TileId] {
        &self.tile_ids
    }

    /// Iterator over the writes in application order.
    pub fn writes(&self) -> impl Iterator<Item = PixelWrite> + '_ {
        self.x_values
            .iter()
            .zip(&self.y_values)
            .zip(&self.colors)
            .zip(&self.tile_ids)
            .map(|(((&x, &y), &color), &tile)| PixelWrite { tile, x, y, color })
    }

    /// Appends the writes of `other`, keeping this event's start time.
    pub fn absorb(&mut self, other: Event) {
        self.x_values.extend(other.x_values);
        self.y_values.extend(other.y_values);
        self.colors.extend(other.colors);
        self.tile_ids.extend(other.tile_ids);
    }

    /// Collects the distinct tiles touched by the event in first-seen order.
    pub fn touched_tiles(&self, out: &mut Vec<TileId>) {
        out.clear();
        for tile in &self.tile_ids {
            if !out.contains(tile) {
                out.push(*tile);
            }
        }
    }

    /// Copy of the event rescheduled `offset` seconds later.
    #[must_use]
    pub fn delayed(&self, offset: f64) -> Self {
        Self {
            start_time: self.start_time + offset,
            ..self.clone()
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
struct EventRecord {
    x_values: Vec<u32>,
    y_values: Vec<u32>,
    colors: Vec<ColorCode>,
    tile_ids: Vec<TileId>,
    start_time: f64,
}

impl TryFrom<EventRecord> for Event {
    type Error = EventShapeError;

    fn try_from(record: EventRecord) -> Result<Self, Self::Error> {
        Self::from_parts(
            record.x_values,
            record.y_values,
            record.colors,
            record.tile_ids,
            record.start_time,
        )
    }
}

impl From<Event> for EventRecord {
    fn from(event: Event) -> Self {
        Self {
            x_values: event.x_values,
            y_values: event.y_values,
            colors: event.colors,
            tile_ids: event.tile_ids,
            start_time: event.start_time,
        }
    }
}

/// Reasons an [`Event`] cannot be assembled.
#[derive(Clone, Copy, Debug, PartialEq, Error)]
pub enum EventShapeError {
    /// The parallel arrays disagree in length.
    #[error(
        "event arrays disagree in length ({x_values} x, {y_values} y, {colors} colors, {tile_ids} tiles)"
    )]
    LengthMismatch {
        /// Number of x values supplied.
        x_values: usize,
        /// Number of y values supplied.
        y_values: usize,
        /// Number of colors supplied.
        colors: usize,
        /// Number of tile ids supplied.
        tile_ids: usize,
    },
    /// The start time was NaN or infinite.
    #[error("event start time {start_time} is not finite")]
    NonFiniteStart {
        /// Offending start time.
        start_time: f64,
    },
}

/// Static description of one physical tile supplied by the layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileSpec {
    /// Identifier of the tile.
    pub id: TileId,
    /// Detector side the tile shows.
    pub side: u32,
    /// Logical grid column `X` of the tile.
    pub column: u32,
    /// Logical grid row `Y` of the tile.
    pub row: u32,
    /// Edge length of the tile in pixels.
    pub size: u32,
    /// Tile whose content this tile reproduces with flipped columns, if any.
    #[serde(default)]
    pub mirror_of: Option<TileId>,
}

impl TileSpec {
    /// Reports whether the tile is a mirror partner rather than a primary tile.
    #[must_use]
    pub const fn is_mirror(&self) -> bool {
        self.mirror_of.is_some()
    }

    /// Number of pixels held by a frame buffer of this tile.
    #[must_use]
    pub const fn pixel_count(&self) -> usize {
        (self.size as usize) * (self.size as usize)
    }
}

/// Selects how hits are routed through the pipeline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Every hit is displayed with the configured energy model.
    #[default]
    Normal,
    /// Side-1 pairs are displayed sequentially and side 0 shows the phase diagram.
    Phase,
    /// The second half of the hits is displayed and side 0 shows the phase diagram.
    Scatter,
}

impl Mode {
    /// Reports whether the mode builds a phase diagram.
    #[must_use]
    pub const fn draws_phase_diagram(self) -> bool {
        matches!(self, Self::Phase | Self::Scatter)
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Phase => "phase",
            Self::Scatter => "scatter",
        }
    }
}

impl FromStr for Mode {
    type Err = UnknownSetting;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(Self::Normal),
            "phase" => Ok(Self::Phase),
            "scatter" => Ok(Self::Scatter),
            _ => Err(UnknownSetting::new("mode", value, "normal, phase, scatter")),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Selects the energy model used to turn hits into glow windows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnergyMethod {
    /// Each hit shows the running energy total of its pixel.
    Accumulate,
    /// Each hit glows and decays tick by tick.
    #[default]
    Tick,
}

impl EnergyMethod {
    const fn name(self) -> &'static str {
        match self {
            Self::Accumulate => "accumulate",
            Self::Tick => "tick",
        }
    }
}

impl FromStr for EnergyMethod {
    type Err = UnknownSetting;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "accumulate" => Ok(Self::Accumulate),
            "tick" => Ok(Self::Tick),
            _ => Err(UnknownSetting::new("energy method", value, "accumulate, tick")),
        }
    }
}

impl fmt::Display for EnergyMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Selects the quantity that decides pixel colors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColorMethod {
    /// Colors follow the deposited energy.
    #[default]
    Energy,
}

impl FromStr for ColorMethod {
    type Err = UnknownSetting;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "energy" => Ok(Self::Energy),
            _ => Err(UnknownSetting::new("color method", value, "energy")),
        }
    }
}

impl fmt::Display for ColorMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Energy => f.write_str("energy"),
        }
    }
}

/// A mode or method name that is not recognised.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}' (expected one of: {expected})")]
pub struct UnknownSetting {
    /// Kind of setting that failed to parse.
    pub kind: &'static str,
    /// Value that was supplied.
    pub value: String,
    /// Accepted spellings.
    pub expected: &'static str,
}

impl UnknownSetting {
    fn new(kind: &'static str, value: &str, expected: &'static str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
            expected,
        }
    }
}

/// Serialises an ordered event list with bincode.
pub fn encode_events(events: &[Event]) -> Result<Vec<u8>, CodecError> {
    bincode::serialize(events).map_err(CodecError::Encode)
}

/// Restores an event list produced by [`encode_events`].
///
/// Rejects payloads whose events are not in ascending start-time order.
pub fn decode_events(bytes: &[u8]) -> Result<Vec<Event>, CodecError> {
    let events: Vec<Event> = bincode::deserialize(bytes).map_err(CodecError::Decode)?;

    if let Some(index) = events
        .windows(2)
        .position(|pair| pair[1].start_time() < pair[0].start_time())
    {
        return Err(CodecError::Unordered {
            index: index + 1,
            start_time: events[index + 1].start_time(),
            previous: events[index].start_time(),
        });
    }

    Ok(events)
}

/// Errors raised while persisting or restoring event lists.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The event list could not be serialised.
    #[error("could not encode event list: {0}")]
    Encode(#[source] bincode::Error),
    /// The payload could not be deserialised.
    #[error("could not decode event list: {0}")]
    Decode(#[source] bincode::Error),
    /// The decoded events were not ordered by start time.
    #[error("event {index} starts at {start_time}s, before its predecessor at {previous}s")]
    Unordered {
        /// Position of the first out-of-order event.
        index: usize,
        /// Start time of the out-of-order event.
        start_time: f64,
        /// Start time of its predecessor.
        previous: f64,
    },
}
