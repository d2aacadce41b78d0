#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Expands glow points into time-ordered, grouped pixel-update events.

use hitglow_core::{ColorCode, ColorGradient, Event, GlowPoint, PixelWrite, EVENT_GROUP_TOLERANCE};
use hitglow_topology::DisplayTopology;
use tracing::debug;

/// Options controlling how glow points become events.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SynthesisSettings {
    /// Also write every pixel to the mirror partner of its tile.
    pub mirror: bool,
    /// Events closer than this many seconds to their predecessor share a group.
    pub group_tolerance: f64,
}

impl Default for SynthesisSettings {
    fn default() -> Self {
        Self {
            mirror: false,
            group_tolerance: EVENT_GROUP_TOLERANCE,
        }
    }
}

/// Event synthesizer collecting single-pixel events until [`EventSynthesis::finish`].
#[derive(Debug)]
pub struct EventSynthesis {
    gradient: ColorGradient,
    settings: SynthesisSettings,
    pending: Vec<Event>,
    dropped: usize,
}

impl EventSynthesis {
    /// Creates a synthesizer coloring pixels with `gradient`.
    #[must_use]
    pub fn new(gradient: ColorGradient, settings: SynthesisSettings) -> Self {
        Self {
            gradient,
            settings,
            pending: Vec::new(),
            dropped: 0,
        }
    }

    /// Settings the synthesizer was created with.
    #[must_use]
    pub const fn settings(&self) -> &SynthesisSettings {
        &self.settings
    }

    /// Emits one single-pixel event per tile and tick of every glow point.
    ///
    /// Pixels without a tile are skipped and a point stops emitting once it has
    /// decayed to the background. When `linger` is set, the events of
    /// the final point are repeated `linger` seconds later.
    pub fn handle(&mut self, topology: &DisplayTopology, points: &[GlowPoint], linger: Option<f64>) {
        let mut last_point = self.pending.len()..self.pending.len();

        for point in points {
            let first = self.pending.len();
            for tick in 0..=point.ticks {
                let start_time = point.tick_time(tick);
                if tick > 0 && start_time > point.end_time {
                    break;
                }
                let color = self.color_for(point.energy_at_tick(tick));

                let resolved = topology.resolve(point.pixel(), self.settings.mirror);
                if resolved.primary.is_none() {
                    self.dropped += 1;
                }
                for local in resolved.iter() {
                    self.pending.push(Event::single(
                        PixelWrite {
                            tile: local.tile,
                            x: local.x,
                            y: local.y,
                            color,
                        },
                        start_time,
                    ));
                }
                if tick > 0 && color == ColorCode::BACKGROUND {
                    break;
                }
            }
            last_point = first..self.pending.len();
        }

        if let Some(offset) = linger {
            let repeated: Vec<_> = self.pending[last_point]
                .iter()
                .map(|event| event.delayed(offset))
                .collect();
            self.pending.extend(repeated);
        }
    }

    /// Sorts and groups every pending event into `out`.
    pub fn finish(&mut self, out: &mut Vec<Event>) {
        let mut events = std::mem::take(&mut self.pending);
        sort_events(&mut events);
        let singles = events.len();
        group_events(events, self.settings.group_tolerance, out);

        debug!(
            singles,
            grouped = out.len(),
            dropped = self.dropped,
            "synthesized events"
        );
        self.dropped = 0;
    }

    fn color_for(&self, energy: f64) -> ColorCode {
        if energy <= 0.0 || energy.is_nan() {
            ColorCode::BACKGROUND
        } else {
            self.gradient.color_for(energy)
        }
    }
}

/// Orders events by start time, keeping the relative order of ties.
pub fn sort_events(events: &mut [Event]) {
    events.sort_by(|left, right| left.start_time().total_cmp(&right.start_time()));
}

/// Merges sorted events whose start times lie within `tolerance` of their
/// immediate predecessor.
///
/// Chains are transitive: an event joins the current group whenever it is
/// close to the previous event, even if it is far from the group's anchor.
/// The merged event keeps the anchor's start time.
pub fn group_events(events: Vec<Event>, tolerance: f64, out: &mut Vec<Event>) {
    let mut events = events.into_iter();
    let Some(mut current) = events.next() else {
        return;
    };
    let mut previous_start = current.start_time();

    for event in events {
        let start_time = event.start_time();
        if start_time - previous_start < tolerance {
            current.absorb(event);
        } else {
            out.push(std::mem::replace(&mut current, event));
        }
        previous_start = start_time;
    }
    out.push(current);
}

#[cfg(test)]
mod tests {
    use super::*;
    use hitglow_core::{PixelKey, TileId};
    use hitglow_topology::grid_layout;

    fn single(start_time: f64) -> Event {
        Event::single(
            PixelWrite {
                tile: TileId::new(0),
                x: 0,
                y: 0,
                color: ColorCode::WHITE,
            },
            start_time,
        )
    }

    fn topology(mirror: bool) -> DisplayTopology {
        DisplayTopology::new(grid_layout(&[4, 4], 8, mirror)).expect("valid layout")
    }

    #[test]
    fn chained_events_share_one_group() {
        let mut out = Vec::new();
        group_events(vec![single(0.0), single(0.0008), single(0.0016)], 0.001, &mut out);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].len(), 3);
        assert_eq!(out[0].start_time(), 0.0);
    }

    #[test]
    fn sorting_keeps_ties_in_order() {
        let mut first = single(1.0);
        first.absorb(single(1.0));
        let mut events = vec![single(2.0), first.clone(), single(1.0)];

        sort_events(&mut events);

        assert_eq!(events[0], first);
        assert_eq!(events[1].len(), 1);
        assert_eq!(events[2].start_time(), 2.0);
    }

    #[test]
    fn ticks_decay_to_background() {
        let mut synthesis = EventSynthesis::new(ColorGradient::default(), SynthesisSettings::default());
        let point = GlowPoint {
            x: 1,
            y: 2,
            side: 0,
            energy: 13.0,
            energy_tick_rate: 5.0,
            ticks: 3,
            tick_delay: 0.5,
            start_time: 0.0,
            end_time: 1.5,
        };

        synthesis.handle(&topology(false), &[point], None);
        let mut out = Vec::new();
        synthesis.finish(&mut out);

        let colors: Vec<_> = out.iter().map(|event| event.colors()[0]).collect();
        assert_eq!(
            colors,
            vec![
                ColorCode::new(30),
                ColorCode::new(20),
                ColorCode::new(10),
                ColorCode::BACKGROUND,
            ]
        );
        let times: Vec<_> = out.iter().map(Event::start_time).collect();
        assert_eq!(times, vec![0.0, 0.5, 1.0, 1.5]);
    }

    #[test]
    fn truncated_windows_stop_at_their_end() {
        let mut synthesis = EventSynthesis::new(ColorGradient::default(), SynthesisSettings::default());
        let point = GlowPoint {
            x: 1,
            y: 2,
            side: 0,
            energy: 18.0,
            energy_tick_rate: 5.0,
            ticks: 3,
            tick_delay: 0.5,
            start_time: 0.0,
            end_time: 0.75,
        };

        synthesis.handle(&topology(false), &[point], None);
        let mut out = Vec::new();
        synthesis.finish(&mut out);

        assert_eq!(out.len(), 2);
    }

    #[test]
    fn decayed_points_stop_emitting() {
        let mut synthesis = EventSynthesis::new(ColorGradient::default(), SynthesisSettings::default());
        let point = GlowPoint {
            x: 1,
            y: 2,
            side: 0,
            energy: 10.0,
            energy_tick_rate: 5.0,
            ticks: 1_000,
            tick_delay: 0.5,
            start_time: 0.0,
            end_time: 500.0,
        };

        synthesis.handle(&topology(false), &[point], None);
        let mut out = Vec::new();
        synthesis.finish(&mut out);

        assert_eq!(out.len(), 3);
        assert_eq!(out[2].colors(), &[ColorCode::BACKGROUND]);
        assert_eq!(out[2].start_time(), 1.0);
    }

    #[test]
    fn instant_points_emit_exactly_once() {
        let mut synthesis = EventSynthesis::new(ColorGradient::default(), SynthesisSettings::default());
        let dark = GlowPoint::instant(PixelKey::new(0, 0, 0), 0.0, 0.0, 0.5);
        let lit = GlowPoint::instant(PixelKey::new(1, 0, 0), f64::INFINITY, 0.5, 0.5);

        synthesis.handle(&topology(false), &[dark, lit], None);
        let mut out = Vec::new();
        synthesis.finish(&mut out);

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].colors(), &[ColorCode::BACKGROUND]);
        assert_eq!(out[1].colors(), &[ColorCode::new(50)]);
    }

    #[test]
    fn linger_repeats_the_final_point() {
        let mut synthesis = EventSynthesis::new(ColorGradient::default(), SynthesisSettings::default());
        let points = [
            GlowPoint::instant(PixelKey::new(0, 0, 0), 4.0, 0.0, 0.5),
            GlowPoint::instant(PixelKey::new(3, 3, 1), 12.0, 0.2, 0.5),
        ];

        synthesis.handle(&topology(false), &points, Some(1.0));
        let mut out = Vec::new();
        synthesis.finish(&mut out);

        assert_eq!(out.len(), 3);
        assert!((out[2].start_time() - 1.2).abs() < 1e-12);
        assert_eq!(out[2].writes().collect::<Vec<_>>(), out[1].writes().collect::<Vec<_>>());
    }
}
