//! Real-time replay of an event list with one data and one display worker.

use std::{
    collections::VecDeque,
    thread,
    time::{Duration, Instant},
};

use hitglow_core::Event;
use tracing::{debug, info, trace, warn};

use crate::{context::CancelOnDrop, Hold, PlaybackContext, PlaybackError, Transport};

/// Timing parameters of the scheduler.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlaybackSettings {
    /// Pause between two polls of the display worker.
    pub poll_interval: Duration,
    /// Lateness tolerated before an event counts as an overrun.
    pub overrun_tolerance: Duration,
    /// Minimum spacing between two overrun warnings.
    pub warning_interval: Duration,
    /// Hold requested for every pushed frame.
    pub hold: Hold,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_micros(33_333),
            overrun_tolerance: Duration::from_micros(100),
            warning_interval: Duration::from_secs(1),
            hold: Hold::Forever,
        }
    }
}

/// Summary of a finished playback run.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PlaybackReport {
    /// Events whose frames were published.
    pub events_played: usize,
    /// Frames handed to the transport successfully.
    pub frames_pushed: usize,
    /// Events published later than the overrun tolerance allows.
    pub overruns: usize,
    /// Largest lateness observed.
    pub max_lateness: Duration,
    /// Offset of the first publication from the start of the run.
    pub first_publish: Option<Duration>,
    /// Offset of the last publication from the start of the run.
    pub last_publish: Option<Duration>,
    /// Pushes and clears rejected by the transport.
    pub transport_failures: usize,
}

#[derive(Default)]
struct DataStats {
    events_played: usize,
    overruns: usize,
    max_lateness: Duration,
    first_publish: Option<Duration>,
    last_publish: Option<Duration>,
}

#[derive(Default)]
struct DisplayStats {
    frames_pushed: usize,
    transport_failures: usize,
}

/// Emits at most one overrun warning per interval.
struct OverrunWarnings {
    interval: Duration,
    last: Option<Instant>,
    suppressed: usize,
}

impl OverrunWarnings {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
            suppressed: 0,
        }
    }

    fn record(&mut self, lateness: Duration) {
        let now = Instant::now();
        if let Some(last) = self.last {
            if now.duration_since(last) < self.interval {
                self.suppressed += 1;
                return;
            }
        }

        warn!(
            lateness_ms = lateness.as_secs_f64() * 1000.0,
            suppressed = self.suppressed,
            "playback running behind schedule"
        );
        self.last = Some(now);
        self.suppressed = 0;
    }
}

/// Replays events onto tiles in real time.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlaybackScheduler {
    settings: PlaybackSettings,
}

impl PlaybackScheduler {
    /// Creates a scheduler with the provided timing parameters.
    #[must_use]
    pub const fn new(settings: PlaybackSettings) -> Self {
        Self { settings }
    }

    /// Timing parameters of the scheduler.
    #[must_use]
    pub const fn settings(&self) -> &PlaybackSettings {
        &self.settings
    }

    /// Plays `events` through `transport` and returns once every tile was cleared.
    ///
    /// The events are checked before any thread starts: every write must
    /// address a known tile inside its bounds and start times must not
    /// decrease. Playback then runs on a data worker that applies and
    /// publishes the events on schedule and a display worker that pushes
    /// dirty tiles until the stop token is cancelled.
    pub fn run<T>(
        &self,
        context: &PlaybackContext,
        events: Vec<Event>,
        transport: &mut T,
    ) -> Result<PlaybackReport, PlaybackError>
    where
        T: Transport + Send,
    {
        validate(context, &events)?;
        info!(events = events.len(), tiles = context.tiles().len(), "starting playback");

        let origin = Instant::now();
        let (data, display) = thread::scope(|scope| -> Result<_, PlaybackError> {
            let data = thread::Builder::new()
                .name("data".into())
                .spawn_scoped(scope, move || self.data_worker(context, events, origin))
                .map_err(PlaybackError::Spawn)?;
            let display = match thread::Builder::new()
                .name("display".into())
                .spawn_scoped(scope, move || self.display_worker(context, transport))
            {
                Ok(display) => display,
                Err(error) => {
                    context.stop_token().cancel();
                    return Err(PlaybackError::Spawn(error));
                }
            };

            let data = data
                .join()
                .map_err(|_| PlaybackError::WorkerPanicked { worker: "data" })?;
            let display = display
                .join()
                .map_err(|_| PlaybackError::WorkerPanicked { worker: "display" })?;
            Ok((data, display))
        })?;

        let report = PlaybackReport {
            events_played: data.events_played,
            frames_pushed: display.frames_pushed,
            overruns: data.overruns,
            max_lateness: data.max_lateness,
            first_publish: data.first_publish,
            last_publish: data.last_publish,
            transport_failures: display.transport_failures,
        };
        info!(
            played = report.events_played,
            frames = report.frames_pushed,
            overruns = report.overruns,
            "playback finished"
        );
        Ok(report)
    }

    fn data_worker(&self, context: &PlaybackContext, events: Vec<Event>, origin: Instant) -> DataStats {
        let stop = context.stop_token();
        let _cancel = CancelOnDrop(stop.clone());
        let mut queue = VecDeque::from(events);
        let mut warnings = OverrunWarnings::new(self.settings.warning_interval);
        let mut stats = DataStats::default();
        let mut touched = Vec::new();
        let mut previous_start = 0.0;
        let mut previous_publish = origin;

        while let Some(event) = queue.pop_front() {
            if stop.is_cancelled() {
                debug!(remaining = queue.len() + 1, "playback cancelled");
                break;
            }

            event.touched_tiles(&mut touched);
            for tile in touched.iter().filter_map(|&id| context.tile(id)) {
                tile.begin_frame();
            }
            for write in event.writes() {
                let Some(tile) = context.tile(write.tile) else {
                    continue;
                };
                if let Err(error) = tile.write(write.x, write.y, write.color) {
                    warn!(%error, "dropped pixel write");
                }
            }

            let gap = Duration::from_secs_f64((event.start_time() - previous_start).max(0.0));
            let elapsed = previous_publish.elapsed();
            match gap.checked_sub(elapsed) {
                Some(wait) => thread::sleep(wait),
                None => {
                    let lateness = elapsed - gap;
                    if lateness > self.settings.overrun_tolerance {
                        stats.overruns += 1;
                        stats.max_lateness = stats.max_lateness.max(lateness);
                        warnings.record(lateness);
                    }
                }
            }

            for tile in touched.iter().filter_map(|&id| context.tile(id)) {
                tile.publish();
            }

            previous_publish = Instant::now();
            let offset = previous_publish.duration_since(origin);
            if stats.first_publish.is_none() {
                stats.first_publish = Some(offset);
            }
            stats.last_publish = Some(offset);
            stats.events_played += 1;
            previous_start = event.start_time();
            trace!(start_time = previous_start, tiles = touched.len(), "event published");
        }

        stats
    }

    fn display_worker<T: Transport>(&self, context: &PlaybackContext, transport: &mut T) -> DisplayStats {
        let stop = context.stop_token();
        let mut stats = DisplayStats::default();
        let mut frame = Vec::new();

        loop {
            let stopping = stop.is_cancelled();

            for tile in context.tiles() {
                if !tile.take_dirty(&mut frame) {
                    continue;
                }
                match transport.push_frame(tile.id(), &frame, self.settings.hold) {
                    Ok(()) => stats.frames_pushed += 1,
                    Err(error) => {
                        stats.transport_failures += 1;
                        warn!(tile = tile.id().get(), error = %error, "frame push failed");
                    }
                }
            }

            if stopping {
                for tile in context.tiles() {
                    if let Err(error) = transport.clear(tile.id()) {
                        stats.transport_failures += 1;
                        warn!(tile = tile.id().get(), error = %error, "tile clear failed");
                    }
                }
                break;
            }

            thread::sleep(self.settings.poll_interval);
        }

        stats
    }
}

fn validate(context: &PlaybackContext, events: &[Event]) -> Result<(), PlaybackError> {
    let mut previous: Option<f64> = None;
    for (index, event) in events.iter().enumerate() {
        if let Some(previous) = previous {
            if event.start_time() < previous {
                return Err(PlaybackError::Unordered {
                    index,
                    start_time: event.start_time(),
                    previous,
                });
            }
        }
        previous = Some(event.start_time());

        for write in event.writes() {
            let tile = context
                .tile(write.tile)
                .ok_or(PlaybackError::UnknownTile {
                    event: index,
                    tile: write.tile,
                })?;
            if write.x >= tile.size() || write.y >= tile.size() {
                return Err(PlaybackError::PixelOutOfRange {
                    tile: write.tile,
                    x: write.x,
                    y: write.y,
                    size: tile.size(),
                });
            }
        }
    }
    Ok(())
}
