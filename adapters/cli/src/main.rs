#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that turns hit lists into LED tile playback.

mod cli;
mod config;
mod console_transport;
mod event_file;
mod hits_file;

use std::{collections::BTreeMap, io, path::Path};

use anyhow::{Context, Result};
use clap::Parser;
use hitglow_core::{ColorCode, Event};
use hitglow_system_pipeline::Pipeline;
use hitglow_system_playback::{
    PlaybackContext, PlaybackReport, PlaybackScheduler, RecordingTransport,
};
use hitglow_topology::DisplayTopology;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::{
    cli::{Args, Command},
    config::AppConfig,
    console_transport::ConsoleTransport,
};

/// Entry point for the hitglow command-line interface.
fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut config = AppConfig::load_or_default(&args.config)?;
    args.apply_overrides(&mut config);
    let topology = config.layout.topology()?;

    match &args.command {
        Command::Synthesize { hits, output } => {
            let events = synthesize(&config, topology, hits)?;
            event_file::write_events(output, &events)?;
            info!(events = events.len(), path = %output.display(), "event file written");
        }
        Command::Play { events } => {
            let events = event_file::read_events(events)?;
            play(&config, &topology, events, args.dry_run)?;
        }
        Command::Run { hits } => {
            let events = synthesize(&config, topology.clone(), hits)?;
            play(&config, &topology, events, args.dry_run)?;
        }
        Command::Layout => print!("{}", render_layout(&topology)),
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn synthesize(config: &AppConfig, topology: DisplayTopology, hits: &Path) -> Result<Vec<Event>> {
    let hits = hits_file::read_hits(hits)?;
    let pipeline =
        Pipeline::new(config.pipeline_settings(), topology).context("invalid pipeline settings")?;
    pipeline.run(hits).context("failed to synthesize events")
}

fn play(
    config: &AppConfig,
    topology: &DisplayTopology,
    events: Vec<Event>,
    dry_run: bool,
) -> Result<()> {
    let context = PlaybackContext::new(topology, ColorCode::BACKGROUND);
    let stop = context.stop_token();
    ctrlc::set_handler(move || stop.cancel()).context("failed to install the Ctrl-C handler")?;

    let scheduler = PlaybackScheduler::new(config.playback.settings()?);
    if dry_run {
        let mut transport = RecordingTransport::new();
        let report = scheduler
            .run(&context, events, &mut transport)
            .context("playback failed")?;
        println!("{}", summarize(&report, &transport));
    } else {
        let mut transport = ConsoleTransport::new(io::stdout(), topology.tile_size());
        let _ = scheduler
            .run(&context, events, &mut transport)
            .context("playback failed")?;
    }

    Ok(())
}

fn summarize(report: &PlaybackReport, transport: &RecordingTransport) -> String {
    let span = match (report.first_publish, report.last_publish) {
        (Some(first), Some(last)) => last.saturating_sub(first).as_secs_f64(),
        _ => 0.0,
    };
    format!(
        "played {} events over {span:.3}s: {} frames recorded, {} tiles cleared, {} overruns (max {:.3} ms late), {} transport failures",
        report.events_played,
        transport.pushes().len(),
        transport.clears().len(),
        report.overruns,
        report.max_lateness.as_secs_f64() * 1000.0,
        report.transport_failures,
    )
}

/// Draws the tile ids of every side on their logical grid; mirror tiles are listed separately.
fn render_layout(topology: &DisplayTopology) -> String {
    let mut grids: BTreeMap<(u32, bool), BTreeMap<(u32, u32), u32>> = BTreeMap::new();
    for tile in topology.tiles() {
        let _ = grids
            .entry((tile.side, tile.is_mirror()))
            .or_default()
            .insert((tile.row, tile.column), tile.id.get());
    }

    let mut out = String::new();
    for ((side, mirror), cells) in &grids {
        let label = if *mirror { "mirror" } else { "primary" };
        out.push_str(&format!("side {side} ({label}, {} px tiles)\n", topology.tile_size()));
        let rows = cells.keys().map(|&(row, _)| row).max().unwrap_or(0);
        let columns = cells.keys().map(|&(_, column)| column).max().unwrap_or(0);
        for row in 0..=rows {
            for column in 0..=columns {
                match cells.get(&(row, column)) {
                    Some(id) => out.push_str(&format!("{id:>4}")),
                    None => out.push_str("   ."),
                }
            }
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use hitglow_topology::grid_layout;

    #[test]
    fn layout_lists_primary_and_mirror_grids() {
        let topology =
            DisplayTopology::new(grid_layout(&[3], 8, true)).expect("valid layout");

        let rendered = render_layout(&topology);

        assert_eq!(
            rendered,
            "side 0 (primary, 8 px tiles)\n   0   1\n   2   .\n\
             side 0 (mirror, 8 px tiles)\n   4   3\n   .   5\n"
        );
    }
}
