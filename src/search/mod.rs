//! Library scan and result classification.
//!
//! A [`Matcher`] prepares the query once, scores it against every entry in
//! library order and keeps the best `k` results. The scan runs on the
//! calling thread and polls an optional [`CancellationToken`] before each
//! entry.

mod cancel;

pub use cancel::CancellationToken;

use crate::candidate::topk::{Candidate, TopK};
use crate::image::ColorImage;
use crate::library::ReferenceLibrary;
use crate::preprocess::PreparedImage;
use crate::scorer::{ScoreBreakdown, ScoreConfig, Scorer};
use crate::trace::{trace_event, trace_span, trace_warn};
use crate::util::{IconMatchError, IconMatchResult};
use std::sync::Arc;

/// Confidence thresholds for the recognition entry points.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchConfig {
    /// Minimum score for a confident match.
    pub high_threshold: f32,
    /// Minimum score for a possible match.
    pub low_threshold: f32,
    /// Number of ranked results considered by [`Matcher::recognize_adaptive`].
    pub adaptive_k: usize,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            high_threshold: 0.4,
            low_threshold: 0.3,
            adaptive_k: 3,
        }
    }
}

impl MatchConfig {
    /// Checks every parameter range.
    pub fn validate(&self) -> IconMatchResult<()> {
        let unit = 0.0..=1.0;
        if !unit.contains(&self.high_threshold) || !unit.contains(&self.low_threshold) {
            return Err(IconMatchError::InvalidConfig {
                reason: "thresholds must be in [0, 1]",
            });
        }
        if self.low_threshold > self.high_threshold {
            return Err(IconMatchError::InvalidConfig {
                reason: "low_threshold must not exceed high_threshold",
            });
        }
        if self.adaptive_k == 0 {
            return Err(IconMatchError::InvalidConfig {
                reason: "adaptive_k must be positive",
            });
        }
        Ok(())
    }
}

/// One scored library entry.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchResult {
    pub item_id: String,
    /// Composite score in `[0, 1]`.
    pub confidence: f32,
    pub breakdown: ScoreBreakdown,
}

/// How a scan ended.
#[derive(Clone, Debug, PartialEq)]
pub enum ScanOutcome {
    /// Every entry was scored; results sorted by descending confidence.
    Completed(Vec<MatchResult>),
    /// The token was set after `scanned` entries had been scored.
    Cancelled { scanned: usize },
}

impl ScanOutcome {
    /// Returns the ranked results, or an empty list if cancelled.
    pub fn into_results(self) -> Vec<MatchResult> {
        match self {
            ScanOutcome::Completed(results) => results,
            ScanOutcome::Cancelled { .. } => Vec::new(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ScanOutcome::Cancelled { .. })
    }
}

/// Confidence band of an adaptive recognition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchStatus {
    Confident,
    Possible,
    Failed,
}

impl MatchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchStatus::Confident => "confident",
            MatchStatus::Possible => "possible",
            MatchStatus::Failed => "failed",
        }
    }
}

/// Result of [`Matcher::recognize_adaptive`].
#[derive(Clone, Debug, PartialEq)]
pub struct AdaptiveMatch {
    pub status: MatchStatus,
    /// Best item; `None` unless the status is confident or possible.
    pub item_id: Option<String>,
    /// Best score, reported even when the status is failed.
    pub confidence: f32,
    /// Breakdown of the best entry, if any entry was scored.
    pub breakdown: Option<ScoreBreakdown>,
    /// Runner-up entries, only filled for possible matches.
    pub alternatives: Vec<MatchResult>,
}

impl AdaptiveMatch {
    /// Classifies results ranked by descending confidence.
    pub fn classify(ranked: Vec<MatchResult>, config: &MatchConfig) -> Self {
        let mut ranked = ranked.into_iter();
        let Some(best) = ranked.next() else {
            return Self::failed();
        };

        let status = if best.confidence >= config.high_threshold {
            MatchStatus::Confident
        } else if best.confidence >= config.low_threshold {
            MatchStatus::Possible
        } else {
            MatchStatus::Failed
        };
        let alternatives = match status {
            MatchStatus::Possible => ranked.take(config.adaptive_k.saturating_sub(1)).collect(),
            _ => Vec::new(),
        };
        let item_id = match status {
            MatchStatus::Failed => None,
            _ => Some(best.item_id),
        };
        Self {
            status,
            item_id,
            confidence: best.confidence,
            breakdown: Some(best.breakdown),
            alternatives,
        }
    }

    fn failed() -> Self {
        Self {
            status: MatchStatus::Failed,
            item_id: None,
            confidence: 0.0,
            breakdown: None,
            alternatives: Vec::new(),
        }
    }
}

/// Recognition entry points over a shared reference library.
#[derive(Clone, Debug)]
pub struct Matcher {
    library: Arc<ReferenceLibrary>,
    scorer: Scorer,
    config: MatchConfig,
    cancel: Option<CancellationToken>,
}

impl Matcher {
    /// Creates a matcher with default thresholds and weights.
    pub fn new(library: Arc<ReferenceLibrary>) -> Self {
        Self {
            library,
            scorer: Scorer::default(),
            config: MatchConfig::default(),
            cancel: None,
        }
    }

    /// Replaces the thresholds.
    pub fn with_config(mut self, config: MatchConfig) -> IconMatchResult<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    /// Replaces the scoring weights and cutoffs.
    pub fn with_score_config(mut self, config: ScoreConfig) -> IconMatchResult<Self> {
        self.scorer = Scorer::new(config)?;
        Ok(self)
    }

    /// Polls `token` before every entry of every scan.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn library(&self) -> &Arc<ReferenceLibrary> {
        &self.library
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Preprocesses a capture with the library's pipeline.
    pub fn prepare(&self, image: &ColorImage) -> IconMatchResult<PreparedImage> {
        let _span = trace_span!("prepare", width = image.width(), height = image.height()).entered();
        self.library.preprocessor().prepare_query(image)
    }

    /// Scores `image` against the whole library and keeps the best `k`.
    ///
    /// A query that fails preprocessing is logged and yields an empty
    /// completed scan.
    pub fn scan_top(&self, image: &ColorImage, k: usize) -> ScanOutcome {
        if self.is_cancelled() {
            trace_event!("scan_cancelled", scanned = 0usize);
            return ScanOutcome::Cancelled { scanned: 0 };
        }
        if self.library.is_empty() {
            return ScanOutcome::Completed(Vec::new());
        }
        match self.prepare(image) {
            Ok(query) => self.scan_prepared(&query, k),
            Err(err) => {
                trace_warn!("query preprocessing failed: {err}");
                ScanOutcome::Completed(Vec::new())
            }
        }
    }

    /// Scans with a query that was already prepared.
    pub fn scan_prepared(&self, query: &PreparedImage, k: usize) -> ScanOutcome {
        let entries = self.library.entries();
        let _span = trace_span!("scan", entries = entries.len(), k = k).entered();

        let mut topk = TopK::new(k, entries.len());
        for (index, entry) in entries.iter().enumerate() {
            if self.is_cancelled() {
                trace_event!("scan_cancelled", scanned = index);
                return ScanOutcome::Cancelled { scanned: index };
            }
            let breakdown = self.scorer.score(query, entry.image());
            topk.push(Candidate { index, breakdown });
        }

        let results: Vec<MatchResult> = topk
            .into_sorted_desc()
            .into_iter()
            .map(|c| MatchResult {
                item_id: entries[c.index].item_id().to_string(),
                confidence: c.score(),
                breakdown: c.breakdown,
            })
            .collect();
        trace_event!(
            "scan_completed",
            scanned = entries.len(),
            best = results.first().map(|r| r.confidence).unwrap_or(0.0)
        );
        ScanOutcome::Completed(results)
    }

    /// Best item id if its score reaches the high threshold.
    pub fn recognize(&self, image: &ColorImage) -> Option<String> {
        self.recognize_with_score(image).map(|m| m.item_id)
    }

    /// Best match with its breakdown if its score reaches the high threshold.
    pub fn recognize_with_score(&self, image: &ColorImage) -> Option<MatchResult> {
        self.scan_top(image, 1)
            .into_results()
            .into_iter()
            .next()
            .filter(|m| m.confidence >= self.config.high_threshold)
    }

    /// Up to `k` best matches in descending order, without a threshold.
    pub fn top_matches(&self, image: &ColorImage, k: usize) -> Vec<MatchResult> {
        self.scan_top(image, k).into_results()
    }

    /// Classifies the best `adaptive_k` matches into confidence bands.
    pub fn recognize_adaptive(&self, image: &ColorImage) -> AdaptiveMatch {
        let ranked = self.top_matches(image, self.config.adaptive_k);
        AdaptiveMatch::classify(ranked, &self.config)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(CancellationToken::is_cancelled)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::{AdaptiveMatch, MatchConfig, MatchResult, MatchStatus};
    use crate::scorer::ScoreBreakdown;

    fn result(id: &str, confidence: f32) -> MatchResult {
        MatchResult {
            item_id: id.to_string(),
            confidence,
            breakdown: ScoreBreakdown::with_final(confidence),
        }
    }

    #[test]
    fn classify_bands() {
        let cfg = MatchConfig::default();
        let confident = AdaptiveMatch::classify(vec![result("a", 0.8), result("b", 0.5)], &cfg);
        assert_eq!(confident.status, MatchStatus::Confident);
        assert_eq!(confident.item_id.as_deref(), Some("a"));
        assert!(confident.alternatives.is_empty());

        let possible = AdaptiveMatch::classify(
            vec![result("a", 0.35), result("b", 0.33), result("c", 0.1)],
            &cfg,
        );
        assert_eq!(possible.status, MatchStatus::Possible);
        let alts: Vec<&str> = possible.alternatives.iter().map(|m| m.item_id.as_str()).collect();
        assert_eq!(alts, vec!["b", "c"]);

        let failed = AdaptiveMatch::classify(vec![result("a", 0.1)], &cfg);
        assert_eq!(failed.status, MatchStatus::Failed);
        assert_eq!(failed.item_id, None);
        assert!((failed.confidence - 0.1).abs() < 1e-6);
    }

    #[test]
    fn classify_empty_is_failed() {
        let m = AdaptiveMatch::classify(Vec::new(), &MatchConfig::default());
        assert_eq!(m.status, MatchStatus::Failed);
        assert!(m.breakdown.is_none());
    }

    #[test]
    fn thresholds_are_validated() {
        let cfg = MatchConfig {
            high_threshold: 0.2,
            low_threshold: 0.3,
            ..MatchConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
