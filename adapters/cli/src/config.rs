use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result};
use hitglow_core::{
    ColorGradient, ColorMethod, EnergyMethod, Mode, TileSpec, DEFAULT_ENERGY_TICK_RATE,
    DEFAULT_PHASE_TICK_DELAY, DEFAULT_TICK_DELAY, DEFAULT_TILE_SIZE, EVENT_GROUP_TOLERANCE,
};
use hitglow_system_energy::PixelMatch;
use hitglow_system_pipeline::{PipelineSettings, DEFAULT_HITS_PER_SECOND};
use hitglow_system_playback::{Hold, PlaybackSettings};
use hitglow_topology::{grid_layout, DisplayTopology};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Contents of `hitglow.toml`. Missing sections and fields fall back to defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct AppConfig {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub gradient: GradientConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct PipelineConfig {
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub color_method: ColorMethod,
    #[serde(default)]
    pub energy_method: EnergyMethod,
    #[serde(default = "PipelineConfig::default_tick_rate")]
    pub tick_rate: f64,
    #[serde(default = "PipelineConfig::default_tick_delay")]
    pub tick_delay: f64,
    #[serde(default = "PipelineConfig::default_phase_tick_delay")]
    pub phase_tick_delay: f64,
    #[serde(default = "PipelineConfig::default_group_tolerance")]
    pub group_tolerance: f64,
    #[serde(default)]
    pub mirror: bool,
    #[serde(default)]
    pub pixel_match: Option<PixelMatch>,
    #[serde(default)]
    pub normalise: bool,
    #[serde(default = "PipelineConfig::default_hits_per_second")]
    pub hits_per_second: f64,
}

impl PipelineConfig {
    fn default_tick_rate() -> f64 {
        DEFAULT_ENERGY_TICK_RATE
    }
    fn default_tick_delay() -> f64 {
        DEFAULT_TICK_DELAY
    }
    fn default_phase_tick_delay() -> f64 {
        DEFAULT_PHASE_TICK_DELAY
    }
    fn default_group_tolerance() -> f64 {
        EVENT_GROUP_TOLERANCE
    }
    fn default_hits_per_second() -> f64 {
        DEFAULT_HITS_PER_SECOND
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            color_method: ColorMethod::default(),
            energy_method: EnergyMethod::default(),
            tick_rate: Self::default_tick_rate(),
            tick_delay: Self::default_tick_delay(),
            phase_tick_delay: Self::default_phase_tick_delay(),
            group_tolerance: Self::default_group_tolerance(),
            mirror: false,
            pixel_match: None,
            normalise: false,
            hits_per_second: Self::default_hits_per_second(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct GradientConfig {
    #[serde(default)]
    pub steps: ColorGradient,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct LayoutConfig {
    #[serde(default = "LayoutConfig::default_tile_size")]
    pub tile_size: u32,
    #[serde(default = "LayoutConfig::default_tiles_per_side")]
    pub tiles_per_side: Vec<u32>,
    #[serde(default)]
    pub mirror: bool,
    /// Explicit tile list; replaces the generated grid when present.
    #[serde(default)]
    pub tiles: Option<Vec<TileSpec>>,
}

impl LayoutConfig {
    fn default_tile_size() -> u32 {
        DEFAULT_TILE_SIZE
    }
    fn default_tiles_per_side() -> Vec<u32> {
        vec![4, 4]
    }

    /// Validated topology described by this section.
    pub(crate) fn topology(&self) -> Result<DisplayTopology> {
        let tiles = match &self.tiles {
            Some(tiles) => tiles.clone(),
            None => grid_layout(&self.tiles_per_side, self.tile_size, self.mirror),
        };
        DisplayTopology::new(tiles).context("invalid tile layout")
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            tile_size: Self::default_tile_size(),
            tiles_per_side: Self::default_tiles_per_side(),
            mirror: false,
            tiles: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct PlaybackConfig {
    #[serde(default = "PlaybackConfig::default_poll_interval_ms")]
    pub poll_interval_ms: f64,
    #[serde(default = "PlaybackConfig::default_overrun_tolerance_ms")]
    pub overrun_tolerance_ms: f64,
    #[serde(default = "PlaybackConfig::default_warning_interval_ms")]
    pub warning_interval_ms: f64,
    /// Seconds a pushed frame stays lit; frames are held until replaced when unset.
    #[serde(default)]
    pub hold_seconds: Option<f64>,
}

impl PlaybackConfig {
    fn default_poll_interval_ms() -> f64 {
        1000.0 / 30.0
    }
    fn default_overrun_tolerance_ms() -> f64 {
        0.1
    }
    fn default_warning_interval_ms() -> f64 {
        1000.0
    }

    /// Scheduler timing described by this section.
    pub(crate) fn settings(&self) -> Result<PlaybackSettings> {
        let hold = match self.hold_seconds {
            Some(seconds) => Hold::For(
                Duration::try_from_secs_f64(seconds)
                    .with_context(|| format!("invalid hold-seconds {seconds}"))?,
            ),
            None => Hold::Forever,
        };
        Ok(PlaybackSettings {
            poll_interval: millis("poll-interval-ms", self.poll_interval_ms)?,
            overrun_tolerance: millis("overrun-tolerance-ms", self.overrun_tolerance_ms)?,
            warning_interval: millis("warning-interval-ms", self.warning_interval_ms)?,
            hold,
        })
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: Self::default_poll_interval_ms(),
            overrun_tolerance_ms: Self::default_overrun_tolerance_ms(),
            warning_interval_ms: Self::default_warning_interval_ms(),
            hold_seconds: None,
        }
    }
}

fn millis(field: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value / 1000.0)
        .with_context(|| format!("invalid {field} {value}"))
}

impl AppConfig {
    /// Reads `path`, or returns the defaults when the file does not exist.
    pub(crate) fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("failed to parse config {}", path.display()))
    }

    fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Pipeline parameters described by the `[pipeline]` and `[gradient]` sections.
    pub(crate) fn pipeline_settings(&self) -> PipelineSettings {
        let pipeline = &self.pipeline;
        PipelineSettings {
            mode: pipeline.mode,
            color_method: pipeline.color_method,
            energy_method: pipeline.energy_method,
            tick_rate: pipeline.tick_rate,
            tick_delay: pipeline.tick_delay,
            phase_tick_delay: pipeline.phase_tick_delay,
            group_tolerance: pipeline.group_tolerance,
            mirror: pipeline.mirror,
            pixel_match: pipeline.pixel_match,
            normalise: pipeline.normalise.then_some(pipeline.hits_per_second),
            gradient: self.gradient.steps.clone(),
        }
    }
}
