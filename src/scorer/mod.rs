//! Multi-metric similarity between a prepared query and one reference.
//!
//! The colour-histogram correlation runs first as a cheap prefilter. Pairs
//! that pass it get the three template correlations and the keypoint match
//! ratios, combined into a weighted composite normalized by the weights of
//! the metrics that were actually computed.

use crate::features::match_ratio;
use crate::preprocess::PreparedImage;
use crate::template::{correlation_coefficient, cross_correlation, Planned};
use crate::util::math::clamp_unit;
use crate::util::{IconMatchError, IconMatchResult};
use std::collections::BTreeMap;

const WEIGHT_SUM_TOLERANCE: f32 = 1e-3;

/// Sub-score identifiers, in breakdown order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metric {
    Histogram,
    TemplateCcoeff,
    TemplateCcorr,
    TemplateEqualized,
    OrbFeatures,
    SiftFeatures,
}

impl Metric {
    /// Every metric, in breakdown order.
    pub const ALL: [Metric; 6] = [
        Metric::Histogram,
        Metric::TemplateCcoeff,
        Metric::TemplateCcorr,
        Metric::TemplateEqualized,
        Metric::OrbFeatures,
        Metric::SiftFeatures,
    ];

    /// Name used in breakdown maps.
    pub fn name(self) -> &'static str {
        match self {
            Metric::Histogram => "histogram",
            Metric::TemplateCcoeff => "template_ccoeff",
            Metric::TemplateCcorr => "template_ccorr",
            Metric::TemplateEqualized => "template_equalized",
            Metric::OrbFeatures => "orb_features",
            Metric::SiftFeatures => "sift_features",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Relative weight of each sub-score in the composite.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoreWeights {
    pub histogram: f32,
    pub template_ccoeff: f32,
    pub template_ccorr: f32,
    pub template_equalized: f32,
    pub orb_features: f32,
    pub sift_features: f32,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            histogram: 0.12,
            template_ccoeff: 0.18,
            template_ccorr: 0.10,
            template_equalized: 0.28,
            orb_features: 0.18,
            sift_features: 0.14,
        }
    }
}

impl ScoreWeights {
    /// Returns the weight of `metric`.
    pub fn weight(&self, metric: Metric) -> f32 {
        match metric {
            Metric::Histogram => self.histogram,
            Metric::TemplateCcoeff => self.template_ccoeff,
            Metric::TemplateCcorr => self.template_ccorr,
            Metric::TemplateEqualized => self.template_equalized,
            Metric::OrbFeatures => self.orb_features,
            Metric::SiftFeatures => self.sift_features,
        }
    }

    /// Requires non-negative finite weights summing to 1.
    pub fn validate(&self) -> IconMatchResult<()> {
        let mut sum = 0.0f32;
        for metric in Metric::ALL {
            let w = self.weight(metric);
            if !w.is_finite() || w < 0.0 {
                return Err(IconMatchError::InvalidConfig {
                    reason: "score weights must be finite and non-negative",
                });
            }
            sum += w;
        }
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(IconMatchError::InvalidConfig {
                reason: "score weights must sum to 1",
            });
        }
        Ok(())
    }
}

/// Weights, prefilter floor and descriptor matching parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoreConfig {
    pub weights: ScoreWeights,
    /// Histogram correlation below which the pair scores 0 immediately.
    pub histogram_floor: f32,
    /// Hamming cutoff for binary descriptor matches.
    pub orb_max_distance: f32,
    /// Euclidean cutoff for float descriptor matches.
    pub sift_max_distance: f32,
    /// Lower bound of the match-ratio denominator.
    pub min_match_denominator: usize,
    /// Share of the reference keypoint count used as denominator.
    pub match_denominator_fraction: f32,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            weights: ScoreWeights::default(),
            histogram_floor: 0.3,
            orb_max_distance: 50.0,
            sift_max_distance: 250.0,
            min_match_denominator: 10,
            match_denominator_fraction: 0.3,
        }
    }
}

impl ScoreConfig {
    /// Checks every parameter range.
    pub fn validate(&self) -> IconMatchResult<()> {
        self.weights.validate()?;
        if !(0.0..=1.0).contains(&self.histogram_floor) {
            return Err(IconMatchError::InvalidConfig {
                reason: "histogram_floor must be in [0, 1]",
            });
        }
        if !(self.orb_max_distance > 0.0) || !(self.sift_max_distance > 0.0) {
            return Err(IconMatchError::InvalidConfig {
                reason: "descriptor distance cutoffs must be positive",
            });
        }
        if self.min_match_denominator == 0 || !(self.match_denominator_fraction >= 0.0) {
            return Err(IconMatchError::InvalidConfig {
                reason: "match denominator must be positive",
            });
        }
        Ok(())
    }
}

/// Per-metric sub-scores plus the weighted composite.
///
/// Metrics that were not computed (prefiltered pair, unavailable float
/// detector) are `None`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScoreBreakdown {
    scores: [Option<f32>; 6],
    final_score: f32,
}

impl ScoreBreakdown {
    /// Returns the sub-score of `metric`, if it was computed.
    pub fn get(&self, metric: Metric) -> Option<f32> {
        self.scores[metric.index()]
    }

    /// Iterates over the computed sub-scores in breakdown order.
    pub fn iter(&self) -> impl Iterator<Item = (Metric, f32)> + '_ {
        Metric::ALL
            .iter()
            .filter_map(move |&m| self.get(m).map(|s| (m, s)))
    }

    /// Returns the weighted composite in `[0, 1]`.
    pub fn final_score(&self) -> f32 {
        self.final_score
    }

    /// Returns true if the histogram prefilter rejected the pair.
    pub fn is_prefiltered(&self) -> bool {
        self.scores[1..].iter().all(Option::is_none)
    }

    /// Name-keyed map including the `final` entry.
    pub fn to_map(&self) -> BTreeMap<&'static str, f32> {
        let mut map: BTreeMap<_, _> = self.iter().map(|(m, s)| (m.name(), s)).collect();
        map.insert("final", self.final_score);
        map
    }

    #[cfg(test)]
    pub(crate) fn with_final(final_score: f32) -> Self {
        Self {
            final_score,
            ..Self::default()
        }
    }

    fn set(&mut self, metric: Metric, score: f32) {
        self.scores[metric.index()] = Some(clamp_unit(score));
    }
}

/// Composite scorer over prepared images.
#[derive(Clone, Debug, Default)]
pub struct Scorer {
    config: ScoreConfig,
}

impl Scorer {
    /// Creates a scorer after validating `config`.
    pub fn new(config: ScoreConfig) -> IconMatchResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ScoreConfig {
        &self.config
    }

    /// Scores `query` against `reference`.
    pub fn score(&self, query: &PreparedImage, reference: &PreparedImage) -> ScoreBreakdown {
        let cfg = &self.config;
        let mut breakdown = ScoreBreakdown::default();

        let histogram = query.histogram.correlation(&reference.histogram);
        breakdown.set(Metric::Histogram, histogram);
        if histogram < cfg.histogram_floor {
            return breakdown;
        }

        let gray_q = Planned::new(&query.gray, &query.gray_plan);
        let gray_r = Planned::new(&reference.gray, &reference.gray_plan);
        breakdown.set(Metric::TemplateCcoeff, correlation_coefficient(gray_q, gray_r));
        breakdown.set(Metric::TemplateCcorr, cross_correlation(gray_q, gray_r));
        breakdown.set(
            Metric::TemplateEqualized,
            correlation_coefficient(
                Planned::new(&query.equalized, &query.equalized_plan),
                Planned::new(&reference.equalized, &reference.equalized_plan),
            ),
        );

        breakdown.set(
            Metric::OrbFeatures,
            match_ratio(
                &query.features.orb,
                &reference.features.orb,
                cfg.orb_max_distance,
                cfg.min_match_denominator as f32,
                cfg.match_denominator_fraction,
            ),
        );
        if let (Some(q), Some(r)) = (&query.features.sift, &reference.features.sift) {
            breakdown.set(
                Metric::SiftFeatures,
                match_ratio(
                    q,
                    r,
                    cfg.sift_max_distance,
                    cfg.min_match_denominator as f32,
                    cfg.match_denominator_fraction,
                ),
            );
        }

        let mut weighted = 0.0f32;
        let mut used = 0.0f32;
        for (metric, score) in breakdown.iter() {
            let w = cfg.weights.weight(metric);
            weighted += w * score;
            used += w;
        }
        breakdown.final_score = if used > 0.0 {
            clamp_unit(weighted / used)
        } else {
            0.0
        };
        breakdown
    }
}

#[cfg(test)]
mod tests {
    use super::{Metric, ScoreBreakdown, ScoreConfig, ScoreWeights};

    #[test]
    fn default_weights_sum_to_one() {
        assert!(ScoreWeights::default().validate().is_ok());
        let sum: f32 = Metric::ALL
            .iter()
            .map(|&m| ScoreWeights::default().weight(m))
            .sum();
        assert!((sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn weights_must_sum_to_one() {
        let weights = ScoreWeights {
            histogram: 0.5,
            ..ScoreWeights::default()
        };
        assert!(weights.validate().is_err());
        let negative = ScoreWeights {
            histogram: -0.12,
            template_equalized: 0.52,
            ..ScoreWeights::default()
        };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn config_rejects_floor_out_of_range() {
        let cfg = ScoreConfig {
            histogram_floor: 1.5,
            ..ScoreConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn breakdown_map_contains_final() {
        let mut b = ScoreBreakdown::default();
        b.set(Metric::Histogram, 0.2);
        assert!(b.is_prefiltered());
        let map = b.to_map();
        assert_eq!(map.len(), 2);
        assert_eq!(map["histogram"], 0.2);
        assert_eq!(map["final"], 0.0);
    }
}
