#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Top-level entry point turning a hit list into a playable event list.
//!
//! [`Pipeline::run`] validates the hits, routes them according to the
//! selected [`Mode`], derives glow points with the configured energy model,
//! feeds the phase diagram when the mode draws one and finally synthesizes
//! grouped events. Any fatal condition aborts the run; a partial event list
//! is never returned.

mod input;

use hitglow_core::{
    ColorGradient, ColorMethod, EnergyMethod, Event, HitRecord, Mode, ACCUMULATE_LINGER,
    DEFAULT_ENERGY_TICK_RATE, DEFAULT_PHASE_TICK_DELAY, DEFAULT_TICK_DELAY, EVENT_GROUP_TOLERANCE,
};
use hitglow_system_energy::{EnergyError, EnergyModel, PixelMatch, TickModel, TickSchedule};
use hitglow_system_phase::{PhaseDiagram, PhaseError};
use hitglow_system_synthesis::{EventSynthesis, SynthesisSettings};
use hitglow_topology::{DisplayTopology, TopologyError};
use thiserror::Error;
use tracing::{debug, info};

pub use input::{normalise_times, route_hits, validate_hits, RoutedHits};

/// Hit rate used when normalising times unless configured otherwise.
pub const DEFAULT_HITS_PER_SECOND: f64 = 1000.0;

/// Parameters selecting how hits become events.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineSettings {
    /// Routing mode.
    pub mode: Mode,
    /// Quantity deciding pixel colors.
    pub color_method: ColorMethod,
    /// Energy model requested for the displayed hits. The phase mode always ticks.
    pub energy_method: EnergyMethod,
    /// Energy removed per tick.
    pub tick_rate: f64,
    /// Seconds between ticks outside the phase mode.
    pub tick_delay: f64,
    /// Seconds between ticks in the phase mode.
    pub phase_tick_delay: f64,
    /// Grouping tolerance in seconds.
    pub group_tolerance: f64,
    /// Also drive the mirror partner of every tile.
    pub mirror: bool,
    /// Overlap predicate; `None` picks the mode's default.
    pub pixel_match: Option<PixelMatch>,
    /// Rescale hit times to this many hits per second when set.
    pub normalise: Option<f64>,
    /// Energy to color mapping.
    pub gradient: ColorGradient,
}

impl PipelineSettings {
    /// Energy method actually used once the mode's constraints apply.
    #[must_use]
    pub fn effective_energy_method(&self) -> EnergyMethod {
        match self.mode {
            Mode::Phase => EnergyMethod::Tick,
            Mode::Normal | Mode::Scatter => self.energy_method,
        }
    }

    /// Overlap predicate actually used for the mode.
    #[must_use]
    pub fn effective_pixel_match(&self) -> PixelMatch {
        self.pixel_match.unwrap_or(match self.mode {
            Mode::Phase => PixelMatch::PositionAndSide,
            Mode::Normal | Mode::Scatter => PixelMatch::Position,
        })
    }

    /// Builds the energy model described by the settings.
    pub fn energy_model(&self) -> Result<EnergyModel, EnergyError> {
        let pixel_match = self.effective_pixel_match();
        match (self.mode, self.effective_energy_method()) {
            (Mode::Phase, _) => Ok(EnergyModel::Tick(
                TickModel::new(self.tick_rate, self.phase_tick_delay)?
                    .with_pixel_match(pixel_match)
                    .with_schedule(TickSchedule::SequentialPairs),
            )),
            (_, EnergyMethod::Tick) => Ok(EnergyModel::Tick(
                TickModel::new(self.tick_rate, self.tick_delay)?.with_pixel_match(pixel_match),
            )),
            (_, EnergyMethod::Accumulate) => Ok(EnergyModel::Accumulate { pixel_match }),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            color_method: ColorMethod::default(),
            energy_method: EnergyMethod::default(),
            tick_rate: DEFAULT_ENERGY_TICK_RATE,
            tick_delay: DEFAULT_TICK_DELAY,
            phase_tick_delay: DEFAULT_PHASE_TICK_DELAY,
            group_tolerance: EVENT_GROUP_TOLERANCE,
            mirror: false,
            pixel_match: None,
            normalise: None,
            gradient: ColorGradient::default(),
        }
    }
}

/// Validated pipeline bound to a display topology.
#[derive(Debug)]
pub struct Pipeline {
    settings: PipelineSettings,
    topology: DisplayTopology,
    model: EnergyModel,
}

impl Pipeline {
    /// Checks the settings against the topology.
    ///
    /// Modes drawing the phase diagram require a complete 2×2 tile grid on
    /// both sides.
    pub fn new(settings: PipelineSettings, topology: DisplayTopology) -> Result<Self, PipelineError> {
        let model = settings.energy_model()?;
        if settings.mode.draws_phase_diagram() {
            topology.require_phase_layout()?;
        }
        if let Some(rate) = settings.normalise {
            if !(rate.is_finite() && rate > 0.0) {
                return Err(PipelineError::InvalidHitRate { rate });
            }
        }

        Ok(Self {
            settings,
            topology,
            model,
        })
    }

    /// Settings the pipeline was built with.
    #[must_use]
    pub const fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Display topology receiving the events.
    #[must_use]
    pub const fn topology(&self) -> &DisplayTopology {
        &self.topology
    }

    /// Turns `hits` into grouped events ordered by start time.
    pub fn run(&self, mut hits: Vec<HitRecord>) -> Result<Vec<Event>, PipelineError> {
        let mode = self.settings.mode;
        validate_hits(&hits, mode)?;
        if let Some(rate) = self.settings.normalise {
            normalise_times(&mut hits, rate);
        }

        let hit_count = hits.len();
        let routed = route_hits(hits, mode);

        let mut points = Vec::with_capacity(routed.displayed.len());
        self.model.glow_points(&routed.displayed, &mut points)?;

        let mut diagram_points = Vec::new();
        if mode.draws_phase_diagram() {
            let mut diagram =
                PhaseDiagram::new(self.topology.tile_size(), self.settings.phase_tick_delay);
            diagram.handle(&points, &routed.reference, &mut diagram_points)?;
        }
        debug!(
            glow_points = points.len(),
            diagram_points = diagram_points.len(),
            "derived glow points"
        );

        let linger = match self.model {
            EnergyModel::Accumulate { .. } => Some(ACCUMULATE_LINGER),
            EnergyModel::Tick(_) => None,
        };
        let mut synthesis = EventSynthesis::new(
            self.settings.gradient.clone(),
            SynthesisSettings {
                mirror: self.settings.mirror,
                group_tolerance: self.settings.group_tolerance,
            },
        );
        synthesis.handle(&self.topology, &points, linger);
        synthesis.handle(&self.topology, &diagram_points, None);

        let mut events = Vec::new();
        synthesis.finish(&mut events);

        info!(
            %mode,
            energy_method = %self.settings.effective_energy_method(),
            color_method = %self.settings.color_method,
            hits = hit_count,
            events = events.len(),
            "pipeline finished"
        );
        Ok(events)
    }
}

/// Fatal conditions raised by the pipeline.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum PipelineError {
    /// A hit carried a negative or non-finite value.
    #[error("hit {index} has invalid {field} {value}")]
    InvalidHit {
        /// Position of the hit in the input.
        index: usize,
        /// Offending field.
        field: &'static str,
        /// Offending value.
        value: f64,
    },
    /// A hit used a side other than 0 or 1 in a diagram mode.
    #[error("hit {index} is on side {side}, only sides 0 and 1 are allowed")]
    SideOutOfRange {
        /// Position of the hit in the input.
        index: usize,
        /// Offending side.
        side: u32,
    },
    /// The hit count does not fit the mode's grouping.
    #[error("{mode} mode needs a multiple of four hits, got {count}")]
    HitCount {
        /// Selected mode.
        mode: Mode,
        /// Number of hits supplied.
        count: usize,
    },
    /// Phase mode received different hit counts per side.
    #[error("phase mode needs as many reference hits as displayed hits ({reference} vs {displayed})")]
    UnbalancedSides {
        /// Hits on side 0.
        reference: usize,
        /// Hits on side 1.
        displayed: usize,
    },
    /// The normalisation rate was not positive.
    #[error("hits per second must be positive and finite, got {rate}")]
    InvalidHitRate {
        /// Offending rate.
        rate: f64,
    },
    /// The display topology cannot serve the mode.
    #[error(transparent)]
    Topology(#[from] TopologyError),
    /// The energy model rejected its parameters or input.
    #[error(transparent)]
    Energy(#[from] EnergyError),
    /// The phase diagram detected an inconsistency.
    #[error(transparent)]
    Phase(#[from] PhaseError),
}
