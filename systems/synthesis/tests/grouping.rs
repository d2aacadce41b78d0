use hitglow_core::{ColorCode, ColorGradient, Event, GlowPoint, PixelKey, PixelWrite, TileId};
use hitglow_system_synthesis::{group_events, sort_events, EventSynthesis, SynthesisSettings};
use hitglow_topology::{grid_layout, DisplayTopology};

fn at(start_time: f64, x: u32) -> Event {
    Event::single(
        PixelWrite {
            tile: TileId::new(2),
            x,
            y: 0,
            color: ColorCode::GREEN,
        },
        start_time,
    )
}

#[test]
fn near_events_chain_and_far_events_split() {
    let mut events = vec![at(0.0025, 2), at(0.0, 0), at(0.0009, 1)];
    sort_events(&mut events);

    let mut grouped = Vec::new();
    group_events(events, 0.001, &mut grouped);

    assert_eq!(grouped.len(), 2);
    assert_eq!(grouped[0].start_time(), 0.0);
    assert_eq!(grouped[0].x_values(), &[0, 1]);
    assert_eq!(grouped[1].start_time(), 0.0025);
    assert_eq!(grouped[1].x_values(), &[2]);
}

#[test]
fn grouping_never_reorders_writes() {
    let events: Vec<_> = (0..10).map(|step| at(f64::from(step) * 0.0005, step)).collect();

    let mut grouped = Vec::new();
    group_events(events, 0.001, &mut grouped);

    let order: Vec<_> = grouped
        .iter()
        .flat_map(|event| event.x_values().iter().copied())
        .collect();
    assert_eq!(order, (0..10u32).collect::<Vec<_>>());
    assert_eq!(grouped.len(), 1);
}

#[test]
fn mirrored_synthesis_writes_both_tiles() {
    let topology = DisplayTopology::new(grid_layout(&[4], 8, true)).expect("valid layout");
    let mut synthesis = EventSynthesis::new(
        ColorGradient::default(),
        SynthesisSettings {
            mirror: true,
            ..SynthesisSettings::default()
        },
    );

    synthesis.handle(
        &topology,
        &[GlowPoint::instant(PixelKey::new(9, 3, 0), 7.0, 0.0, 0.5)],
        None,
    );
    let mut out = Vec::new();
    synthesis.finish(&mut out);

    assert_eq!(out.len(), 1);
    let writes: Vec<_> = out[0].writes().collect();
    assert_eq!(writes.len(), 2);
    assert_eq!((writes[0].tile, writes[0].x, writes[0].y), (TileId::new(1), 1, 3));
    assert_eq!((writes[1].x, writes[1].y), (6, 3));
    assert_eq!(writes[0].color, writes[1].color);
}

#[test]
fn pixels_without_hardware_are_dropped_silently() {
    let topology = DisplayTopology::new(grid_layout(&[4], 8, false)).expect("valid layout");
    let mut synthesis = EventSynthesis::new(ColorGradient::default(), SynthesisSettings::default());

    synthesis.handle(
        &topology,
        &[
            GlowPoint::instant(PixelKey::new(1, 1, 1), 7.0, 0.0, 0.5),
            GlowPoint::instant(PixelKey::new(1, 1, 0), 7.0, 0.5, 0.5),
        ],
        None,
    );
    let mut out = Vec::new();
    synthesis.finish(&mut out);

    assert_eq!(out.len(), 1);
    assert_eq!(out[0].start_time(), 0.5);
}
