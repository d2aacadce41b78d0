use std::{thread, time::Duration};

use hitglow_core::{ColorCode, Event, TileId};
use hitglow_system_playback::{
    Hold, PlaybackContext, PlaybackError, PlaybackScheduler, PlaybackSettings, RecordingTransport,
    Transport,
};
use hitglow_topology::{grid_layout, DisplayTopology};

const TILE_SIZE: u32 = 4;

fn context(tiles: u32) -> PlaybackContext {
    let topology =
        DisplayTopology::new(grid_layout(&[tiles], TILE_SIZE, false)).expect("valid layout");
    PlaybackContext::new(&topology, ColorCode::BACKGROUND)
}

fn scheduler() -> PlaybackScheduler {
    PlaybackScheduler::new(PlaybackSettings {
        poll_interval: Duration::from_millis(1),
        ..PlaybackSettings::default()
    })
}

fn fill(tiles: &[u32], color: ColorCode, start_time: f64) -> Event {
    let mut x_values = Vec::new();
    let mut y_values = Vec::new();
    let mut colors = Vec::new();
    let mut tile_ids = Vec::new();
    for &tile in tiles {
        for y in 0..TILE_SIZE {
            for x in 0..TILE_SIZE {
                x_values.push(x);
                y_values.push(y);
                colors.push(color);
                tile_ids.push(TileId::new(tile));
            }
        }
    }
    Event::from_parts(x_values, y_values, colors, tile_ids, start_time).expect("matching lengths")
}

/// Records frames while taking longer than the data worker between events.
#[derive(Default)]
struct SlowTransport {
    inner: RecordingTransport,
}

impl Transport for SlowTransport {
    fn push_frame(&mut self, tile: TileId, frame: &[ColorCode], hold: Hold) -> anyhow::Result<()> {
        thread::sleep(Duration::from_millis(3));
        self.inner.push_frame(tile, frame, hold)
    }

    fn clear(&mut self, tile: TileId) -> anyhow::Result<()> {
        self.inner.clear(tile)
    }
}

struct BrokenTransport;

impl Transport for BrokenTransport {
    fn push_frame(&mut self, tile: TileId, _: &[ColorCode], _: Hold) -> anyhow::Result<()> {
        anyhow::bail!("{tile} is unplugged")
    }

    fn clear(&mut self, _: TileId) -> anyhow::Result<()> {
        Ok(())
    }
}

#[test]
fn publications_follow_event_start_times() {
    let context = context(1);
    let mut transport = RecordingTransport::new();
    let events = vec![
        fill(&[0], ColorCode::RED, 0.0),
        fill(&[0], ColorCode::GREEN, 0.2),
        fill(&[0], ColorCode::BLUE, 0.2005),
    ];

    let report = scheduler()
        .run(&context, events, &mut transport)
        .expect("playback succeeds");

    assert_eq!(report.events_played, 3);
    let first = report.first_publish.expect("first event published");
    let last = report.last_publish.expect("last event published");
    assert!(last - first >= Duration::from_millis(200));

    let last_frame = transport
        .pushes()
        .last()
        .expect("final frame reaches the transport");
    assert!(last_frame.frame.iter().all(|&color| color == ColorCode::BLUE));
    assert_eq!(last_frame.hold, Hold::Forever);
}

#[test]
fn slow_transport_never_sees_torn_frames() {
    let context = context(2);
    let mut transport = SlowTransport::default();
    let palette = [ColorCode::RED, ColorCode::GREEN, ColorCode::BLUE];
    let events: Vec<_> = (0..30u32)
        .map(|index| {
            let color = palette[index as usize % palette.len()];
            fill(&[0, 1], color, f64::from(index) * 0.001)
        })
        .collect();

    let report = scheduler()
        .run(&context, events, &mut transport)
        .expect("playback succeeds");

    assert_eq!(report.events_played, 30);
    assert!(!transport.inner.pushes().is_empty());
    for push in transport.inner.pushes() {
        assert_eq!(push.frame.len(), (TILE_SIZE * TILE_SIZE) as usize);
        assert!(
            push.frame.iter().all(|&color| color == push.frame[0]),
            "frame pushed to {} mixes two events",
            push.tile
        );
    }

    let final_color = palette[29 % palette.len()];
    for tile in [TileId::new(0), TileId::new(1)] {
        let last = transport
            .inner
            .pushes()
            .iter()
            .rev()
            .find(|push| push.tile == tile)
            .expect("every tile was pushed");
        assert_eq!(last.frame[0], final_color);
    }
}

#[test]
fn every_tile_is_cleared_on_shutdown() {
    let context = context(3);
    let mut transport = RecordingTransport::new();

    let report = scheduler()
        .run(&context, vec![fill(&[1], ColorCode::WHITE, 0.0)], &mut transport)
        .expect("playback succeeds");

    assert_eq!(report.frames_pushed, 1);
    assert_eq!(transport.pushes()[0].tile, TileId::new(1));
    assert_eq!(
        transport.clears(),
        &[TileId::new(0), TileId::new(1), TileId::new(2)]
    );
    assert!(context.stop_token().is_cancelled());
}

#[test]
fn unknown_tiles_are_rejected_before_playback() {
    let context = context(1);
    let mut transport = RecordingTransport::new();

    let error = scheduler()
        .run(&context, vec![fill(&[7], ColorCode::RED, 0.0)], &mut transport)
        .expect_err("tile 7 does not exist");

    assert!(matches!(
        error,
        PlaybackError::UnknownTile { event: 0, tile } if tile == TileId::new(7)
    ));
    assert!(transport.pushes().is_empty());
    assert!(transport.clears().is_empty());
}

#[test]
fn decreasing_start_times_are_rejected() {
    let context = context(1);
    let mut transport = RecordingTransport::new();
    let events = vec![
        fill(&[0], ColorCode::RED, 0.5),
        fill(&[0], ColorCode::RED, 0.1),
    ];

    let error = scheduler()
        .run(&context, events, &mut transport)
        .expect_err("events are out of order");

    assert!(matches!(error, PlaybackError::Unordered { index: 1, .. }));
}

#[test]
fn transport_failures_are_counted_not_fatal() {
    let context = context(1);

    let report = scheduler()
        .run(
            &context,
            vec![fill(&[0], ColorCode::RED, 0.0)],
            &mut BrokenTransport,
        )
        .expect("playback still completes");

    assert_eq!(report.events_played, 1);
    assert_eq!(report.frames_pushed, 0);
    assert_eq!(report.transport_failures, 1);
}
