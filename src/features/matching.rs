//! Brute-force nearest-neighbor descriptor matching.

use crate::features::{Descriptor, FeatureSet};
use crate::util::math::clamp_unit;

/// Counts query descriptors whose nearest reference descriptor is closer
/// than `max_distance`.
pub fn count_good_matches<D: Descriptor>(
    query: &FeatureSet<D>,
    reference: &FeatureSet<D>,
    max_distance: f32,
) -> usize {
    if reference.is_empty() {
        return 0;
    }
    query
        .descriptors()
        .iter()
        .filter(|q| {
            let mut best = f32::INFINITY;
            for r in reference.descriptors() {
                let d = q.distance(r);
                if d < best {
                    best = d;
                    if best == 0.0 {
                        break;
                    }
                }
            }
            best < max_distance
        })
        .count()
}

/// Fraction of good matches relative to a lower-bounded denominator.
///
/// The denominator is `max(min_denominator, denominator_fraction *
/// reference.len())`, so references with few keypoints cannot reach a high
/// score from a handful of matches. Empty sets score 0. The result is
/// clamped to `[0, 1]`.
pub fn match_ratio<D: Descriptor>(
    query: &FeatureSet<D>,
    reference: &FeatureSet<D>,
    max_distance: f32,
    min_denominator: f32,
    denominator_fraction: f32,
) -> f32 {
    if query.is_empty() || reference.is_empty() {
        return 0.0;
    }
    let good = count_good_matches(query, reference, max_distance) as f32;
    let denom = min_denominator.max(denominator_fraction * reference.len() as f32);
    if denom <= 0.0 {
        return 0.0;
    }
    clamp_unit(good / denom)
}

#[cfg(test)]
mod tests {
    use super::{count_good_matches, match_ratio};
    use crate::features::{BinaryDescriptor, FeatureSet, Keypoint};

    fn set(descs: &[[u8; 32]]) -> FeatureSet<BinaryDescriptor> {
        let kp = Keypoint {
            x: 0.0,
            y: 0.0,
            response: 1.0,
            angle: 0.0,
            octave: 0,
            size: 31.0,
        };
        FeatureSet::new(
            vec![kp; descs.len()],
            descs.iter().copied().map(BinaryDescriptor).collect(),
        )
        .unwrap()
    }

    #[test]
    fn cutoff_is_strict() {
        let mut far = [0u8; 32];
        for b in far.iter_mut().take(6) {
            *b = 0xFF;
        }
        let q = set(&[[0u8; 32], far]);
        let r = set(&[[0u8; 32]]);
        assert_eq!(count_good_matches(&q, &r, 48.0), 1);
        assert_eq!(count_good_matches(&q, &r, 49.0), 2);
    }

    #[test]
    fn small_references_use_the_floor_denominator() {
        let q = set(&[[1u8; 32], [2u8; 32], [3u8; 32]]);
        let r = q.clone();
        let ratio = match_ratio(&q, &r, 50.0, 10.0, 0.3);
        assert!((ratio - 0.3).abs() < 1e-6);
    }

    #[test]
    fn empty_sets_score_zero() {
        let q = set(&[[1u8; 32]]);
        let empty = set(&[]);
        assert_eq!(match_ratio(&q, &empty, 50.0, 10.0, 0.3), 0.0);
        assert_eq!(match_ratio(&empty, &q, 50.0, 10.0, 0.3), 0.0);
    }
}
