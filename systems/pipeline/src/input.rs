//! Checks and reshapes the hit list before any energy model sees it.

use hitglow_core::{HitRecord, Mode};

use crate::PipelineError;

/// Hits split into the stream shown as glow and the stream feeding the phase diagram.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RoutedHits {
    /// Hits displayed through the energy model.
    pub displayed: Vec<HitRecord>,
    /// Reference hits compared against the displayed pairs.
    pub reference: Vec<HitRecord>,
}

/// Rejects hit lists the selected mode cannot play.
///
/// Every hit needs a finite, non-negative time and energy. The phase and
/// scatter modes also require sides 0 or 1 and a multiple of four hits; the
/// phase mode additionally needs as many hits on side 0 as on side 1.
pub fn validate_hits(hits: &[HitRecord], mode: Mode) -> Result<(), PipelineError> {
    for (index, hit) in hits.iter().enumerate() {
        if !(hit.time.is_finite() && hit.time >= 0.0) {
            return Err(PipelineError::InvalidHit {
                index,
                field: "time",
                value: hit.time,
            });
        }
        if !(hit.energy.is_finite() && hit.energy >= 0.0) {
            return Err(PipelineError::InvalidHit {
                index,
                field: "energy",
                value: hit.energy,
            });
        }
        if mode.draws_phase_diagram() && hit.side > 1 {
            return Err(PipelineError::SideOutOfRange {
                index,
                side: hit.side,
            });
        }
    }

    if !mode.draws_phase_diagram() {
        return Ok(());
    }

    if hits.len() % 4 != 0 {
        return Err(PipelineError::HitCount {
            mode,
            count: hits.len(),
        });
    }

    if mode == Mode::Phase {
        let reference = hits.iter().filter(|hit| hit.side == 0).count();
        let displayed = hits.len() - reference;
        if reference != displayed {
            return Err(PipelineError::UnbalancedSides {
                reference,
                displayed,
            });
        }
    }

    Ok(())
}

/// Rescales hit times onto `[0, n / hits_per_second]`.
///
/// Hits sharing a single timestamp all move to zero.
pub fn normalise_times(hits: &mut [HitRecord], hits_per_second: f64) {
    let Some(first) = hits.first() else {
        return;
    };
    let (min, max) = hits.iter().fold((first.time, first.time), |(min, max), hit| {
        (min.min(hit.time), max.max(hit.time))
    });
    let span = hits.len() as f64 / hits_per_second;
    let range = max - min;

    for hit in hits.iter_mut() {
        hit.time = if range > 0.0 {
            span * (hit.time - min) / range
        } else {
            0.0
        };
    }
}

/// Splits the hits into displayed and reference streams for `mode`.
///
/// The normal mode displays everything. The phase mode orders hits by side
/// then time, using side 0 as reference and side 1 as display. The scatter
/// mode orders hits by time and uses the first half as reference.
#[must_use]
pub fn route_hits(mut hits: Vec<HitRecord>, mode: Mode) -> RoutedHits {
    hits.sort_by(|left, right| left.time.total_cmp(&right.time));

    match mode {
        Mode::Normal => RoutedHits {
            displayed: hits,
            reference: Vec::new(),
        },
        Mode::Phase => {
            let (reference, displayed): (Vec<_>, Vec<_>) =
                hits.into_iter().partition(|hit| hit.side == 0);
            RoutedHits {
                displayed,
                reference,
            }
        }
        Mode::Scatter => {
            let displayed = hits.split_off(hits.len() / 2);
            RoutedHits {
                displayed,
                reference: hits,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(time: f64, side: u32, energy: f64) -> HitRecord {
        HitRecord {
            time,
            crystal_id: 1,
            side,
            x: 0,
            y: 0,
            energy,
        }
    }

    #[test]
    fn rejects_negative_time_and_energy() {
        assert_eq!(
            validate_hits(&[hit(0.0, 0, 1.0), hit(-1.0, 0, 1.0)], Mode::Normal),
            Err(PipelineError::InvalidHit {
                index: 1,
                field: "time",
                value: -1.0,
            })
        );
        assert!(matches!(
            validate_hits(&[hit(0.0, 0, -0.5)], Mode::Normal),
            Err(PipelineError::InvalidHit { field: "energy", .. })
        ));
    }

    #[test]
    fn normal_mode_accepts_any_side_and_count() {
        assert_eq!(validate_hits(&[hit(0.0, 7, 1.0)], Mode::Normal), Ok(()));
    }

    #[test]
    fn diagram_modes_need_groups_of_four() {
        let hits = [hit(0.0, 0, 1.0), hit(0.1, 0, 1.0), hit(0.2, 1, 1.0)];

        assert_eq!(
            validate_hits(&hits, Mode::Scatter),
            Err(PipelineError::HitCount {
                mode: Mode::Scatter,
                count: 3,
            })
        );
        assert!(matches!(
            validate_hits(&[hit(0.0, 2, 1.0)], Mode::Phase),
            Err(PipelineError::SideOutOfRange { index: 0, side: 2 })
        ));
    }

    #[test]
    fn phase_mode_needs_balanced_sides() {
        let hits = [
            hit(0.0, 0, 1.0),
            hit(0.1, 0, 1.0),
            hit(0.2, 0, 1.0),
            hit(0.3, 1, 1.0),
        ];

        assert_eq!(
            validate_hits(&hits, Mode::Phase),
            Err(PipelineError::UnbalancedSides {
                reference: 3,
                displayed: 1,
            })
        );
    }

    #[test]
    fn normalisation_spreads_hits_over_their_count() {
        let mut hits = [hit(10.0, 0, 1.0), hit(20.0, 0, 1.0), hit(15.0, 0, 1.0), hit(12.0, 0, 1.0)];

        normalise_times(&mut hits, 1000.0);

        let expected = [0.0, 0.004, 0.002, 0.0008];
        for (hit, expected) in hits.iter().zip(expected) {
            assert!((hit.time - expected).abs() < 1e-12, "{} != {expected}", hit.time);
        }
    }

    #[test]
    fn normalisation_collapses_single_timestamp() {
        let mut hits = [hit(3.0, 0, 1.0), hit(3.0, 1, 1.0)];

        normalise_times(&mut hits, 1000.0);

        assert!(hits.iter().all(|hit| hit.time == 0.0));
    }

    #[test]
    fn phase_routing_splits_by_side() {
        let routed = route_hits(
            vec![hit(0.3, 1, 1.0), hit(0.2, 0, 2.0), hit(0.1, 1, 3.0), hit(0.0, 0, 4.0)],
            Mode::Phase,
        );

        let reference: Vec<_> = routed.reference.iter().map(|hit| hit.energy).collect();
        let displayed: Vec<_> = routed.displayed.iter().map(|hit| hit.energy).collect();
        assert_eq!(reference, vec![4.0, 2.0]);
        assert_eq!(displayed, vec![3.0, 1.0]);
    }

    #[test]
    fn scatter_routing_splits_by_halves() {
        let routed = route_hits(
            vec![hit(0.3, 1, 1.0), hit(0.2, 0, 2.0), hit(0.1, 1, 3.0), hit(0.0, 0, 4.0)],
            Mode::Scatter,
        );

        let reference: Vec<_> = routed.reference.iter().map(|hit| hit.energy).collect();
        let displayed: Vec<_> = routed.displayed.iter().map(|hit| hit.energy).collect();
        assert_eq!(reference, vec![4.0, 3.0]);
        assert_eq!(displayed, vec![2.0, 1.0]);
    }
}
