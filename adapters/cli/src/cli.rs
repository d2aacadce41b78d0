use std::path::PathBuf;

use clap::{Parser, Subcommand};
use hitglow_core::{EnergyMethod, Mode};

use crate::config::AppConfig;

/// Turns scintillator hit lists into LED tile animations.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub(crate) struct Args {
    /// Path to config TOML
    #[arg(long, global = true, default_value = "hitglow.toml")]
    pub config: PathBuf,

    /// Routing mode (overrides config)
    #[arg(long, global = true)]
    pub mode: Option<Mode>,

    /// Energy method (overrides config)
    #[arg(long, global = true)]
    pub energy_method: Option<EnergyMethod>,

    /// Drive a mirror partner for every tile (overrides config)
    #[arg(long, global = true, default_value_t = false)]
    pub mirror: bool,

    /// Replay into memory and print a summary instead of the frames
    #[arg(long, global = true, default_value_t = false)]
    pub dry_run: bool,

    /// Log debug output
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Convert a hit CSV into an event file
    Synthesize {
        /// Hit list with columns time, crystal_id, side, x, y, energy
        hits: PathBuf,
        /// Event file to write
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Replay an event file
    Play {
        /// Event file written by `synthesize`
        events: PathBuf,
    },
    /// Convert a hit CSV and replay it immediately
    Run {
        /// Hit list with columns time, crystal_id, side, x, y, energy
        hits: PathBuf,
    },
    /// Print the tile arrangement of every side
    Layout,
}

impl Args {
    /// Applies the command-line overrides on top of the loaded config.
    pub(crate) fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(mode) = self.mode {
            config.pipeline.mode = mode;
        }
        if let Some(method) = self.energy_method {
            config.pipeline.energy_method = method;
        }
        if self.mirror {
            config.pipeline.mirror = true;
            config.layout.mirror = true;
        }
    }
}
