use clap::Parser;
use iconmatch::image::io::{is_supported_image, load_color_image};
use iconmatch::{
    AdaptiveMatch, FeatureConfig, IconSize, LibraryConfig, MatchConfig, MatchResult, Matcher,
    OrbConfig, PreprocessConfig, ReferenceLibrary, ScoreBreakdown, ScoreConfig, ScoreWeights,
    SiftConfig,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const EXAMPLE_JSON: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.example.json"));

#[derive(Parser, Debug)]
#[command(author, version, about = "IconMatch CLI (JSON config driven)")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,
    /// Print an example config and exit.
    #[arg(long)]
    print_example: bool,
    /// Enable tracing output.
    #[arg(long)]
    trace: bool,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
enum Mode {
    Top,
    Recognize,
    #[default]
    Adaptive,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct PreprocessConfigJson {
    icon_width: usize,
    icon_height: usize,
    light_threshold: u8,
    edge_band: usize,
    min_light_edges: usize,
    min_content_fraction: f32,
    max_content_fraction: f32,
    crop_padding: usize,
}

impl Default for PreprocessConfigJson {
    fn default() -> Self {
        let cfg = PreprocessConfig::default();
        Self {
            icon_width: cfg.icon_size.width,
            icon_height: cfg.icon_size.height,
            light_threshold: cfg.light_threshold,
            edge_band: cfg.edge_band,
            min_light_edges: cfg.min_light_edges,
            min_content_fraction: cfg.min_content_fraction,
            max_content_fraction: cfg.max_content_fraction,
            crop_padding: cfg.crop_padding,
        }
    }
}

impl PreprocessConfigJson {
    fn to_config(&self) -> iconmatch::IconMatchResult<PreprocessConfig> {
        Ok(PreprocessConfig {
            icon_size: IconSize::new(self.icon_width, self.icon_height)?,
            light_threshold: self.light_threshold,
            edge_band: self.edge_band,
            min_light_edges: self.min_light_edges,
            min_content_fraction: self.min_content_fraction,
            max_content_fraction: self.max_content_fraction,
            crop_padding: self.crop_padding,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct OrbConfigJson {
    max_features: usize,
    fast_threshold: u8,
    n_levels: usize,
    scale_factor: f32,
    patch_size: usize,
}

impl Default for OrbConfigJson {
    fn default() -> Self {
        let cfg = OrbConfig::default();
        Self {
            max_features: cfg.max_features,
            fast_threshold: cfg.fast_threshold,
            n_levels: cfg.n_levels,
            scale_factor: cfg.scale_factor,
            patch_size: cfg.patch_size,
        }
    }
}

impl From<&OrbConfigJson> for OrbConfig {
    fn from(value: &OrbConfigJson) -> Self {
        Self {
            max_features: value.max_features,
            fast_threshold: value.fast_threshold,
            n_levels: value.n_levels,
            scale_factor: value.scale_factor,
            patch_size: value.patch_size,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct SiftConfigJson {
    max_features: usize,
    n_octaves: usize,
    n_layers: usize,
    sigma: f32,
    contrast_threshold: f32,
    edge_threshold: f32,
}

impl Default for SiftConfigJson {
    fn default() -> Self {
        let cfg = SiftConfig::default();
        Self {
            max_features: cfg.max_features,
            n_octaves: cfg.n_octaves,
            n_layers: cfg.n_layers,
            sigma: cfg.sigma,
            contrast_threshold: cfg.contrast_threshold,
            edge_threshold: cfg.edge_threshold,
        }
    }
}

impl From<&SiftConfigJson> for SiftConfig {
    fn from(value: &SiftConfigJson) -> Self {
        Self {
            max_features: value.max_features,
            n_octaves: value.n_octaves,
            n_layers: value.n_layers,
            sigma: value.sigma,
            contrast_threshold: value.contrast_threshold,
            edge_threshold: value.edge_threshold,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct FeatureConfigJson {
    orb: OrbConfigJson,
    sift_enabled: bool,
    sift: SiftConfigJson,
}

impl Default for FeatureConfigJson {
    fn default() -> Self {
        Self {
            orb: OrbConfigJson::default(),
            sift_enabled: true,
            sift: SiftConfigJson::default(),
        }
    }
}

impl From<&FeatureConfigJson> for FeatureConfig {
    fn from(value: &FeatureConfigJson) -> Self {
        Self {
            orb: (&value.orb).into(),
            sift: value.sift_enabled.then(|| (&value.sift).into()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ScoreWeightsJson {
    histogram: f32,
    template_ccoeff: f32,
    template_ccorr: f32,
    template_equalized: f32,
    orb_features: f32,
    sift_features: f32,
}

impl Default for ScoreWeightsJson {
    fn default() -> Self {
        let w = ScoreWeights::default();
        Self {
            histogram: w.histogram,
            template_ccoeff: w.template_ccoeff,
            template_ccorr: w.template_ccorr,
            template_equalized: w.template_equalized,
            orb_features: w.orb_features,
            sift_features: w.sift_features,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ScoreConfigJson {
    weights: ScoreWeightsJson,
    histogram_floor: f32,
    orb_max_distance: f32,
    sift_max_distance: f32,
    min_match_denominator: usize,
    match_denominator_fraction: f32,
}

impl Default for ScoreConfigJson {
    fn default() -> Self {
        let cfg = ScoreConfig::default();
        Self {
            weights: ScoreWeightsJson::default(),
            histogram_floor: cfg.histogram_floor,
            orb_max_distance: cfg.orb_max_distance,
            sift_max_distance: cfg.sift_max_distance,
            min_match_denominator: cfg.min_match_denominator,
            match_denominator_fraction: cfg.match_denominator_fraction,
        }
    }
}

impl From<&ScoreConfigJson> for ScoreConfig {
    fn from(value: &ScoreConfigJson) -> Self {
        let w = &value.weights;
        Self {
            weights: ScoreWeights {
                histogram: w.histogram,
                template_ccoeff: w.template_ccoeff,
                template_ccorr: w.template_ccorr,
                template_equalized: w.template_equalized,
                orb_features: w.orb_features,
                sift_features: w.sift_features,
            },
            histogram_floor: value.histogram_floor,
            orb_max_distance: value.orb_max_distance,
            sift_max_distance: value.sift_max_distance,
            min_match_denominator: value.min_match_denominator,
            match_denominator_fraction: value.match_denominator_fraction,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct MatchConfigJson {
    high_threshold: f32,
    low_threshold: f32,
    adaptive_k: usize,
}

impl Default for MatchConfigJson {
    fn default() -> Self {
        let cfg = MatchConfig::default();
        Self {
            high_threshold: cfg.high_threshold,
            low_threshold: cfg.low_threshold,
            adaptive_k: cfg.adaptive_k,
        }
    }
}

impl From<&MatchConfigJson> for MatchConfig {
    fn from(value: &MatchConfigJson) -> Self {
        Self {
            high_threshold: value.high_threshold,
            low_threshold: value.low_threshold,
            adaptive_k: value.adaptive_k,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct Config {
    library_dir: String,
    queries: Vec<String>,
    mode: Mode,
    topk: usize,
    output_path: Option<String>,
    parallel: bool,
    preprocess: PreprocessConfigJson,
    features: FeatureConfigJson,
    score: ScoreConfigJson,
    #[serde(rename = "match")]
    match_cfg: MatchConfigJson,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            library_dir: String::new(),
            queries: Vec::new(),
            mode: Mode::default(),
            topk: 3,
            output_path: None,
            parallel: true,
            preprocess: PreprocessConfigJson::default(),
            features: FeatureConfigJson::default(),
            score: ScoreConfigJson::default(),
            match_cfg: MatchConfigJson::default(),
        }
    }
}

#[derive(Debug, Serialize)]
struct MatchRecord {
    item_id: String,
    confidence: f32,
    breakdown: BTreeMap<&'static str, f32>,
}

impl From<MatchResult> for MatchRecord {
    fn from(value: MatchResult) -> Self {
        Self {
            item_id: value.item_id,
            confidence: value.confidence,
            breakdown: value.breakdown.to_map(),
        }
    }
}

#[derive(Debug, Serialize)]
struct QueryRecord {
    query: String,
    expected: String,
    status: &'static str,
    item_id: Option<String>,
    confidence: f32,
    breakdown: Option<BTreeMap<&'static str, f32>>,
    alternatives: Vec<MatchRecord>,
    rank1_correct: bool,
}

impl QueryRecord {
    fn new(query: &Path, expected: String) -> Self {
        Self {
            query: query.display().to_string(),
            expected,
            status: "failed",
            item_id: None,
            confidence: 0.0,
            breakdown: None,
            alternatives: Vec::new(),
            rank1_correct: false,
        }
    }

    fn fill_best(&mut self, best: Option<MatchResult>) {
        if let Some(best) = best {
            self.status = "matched";
            self.confidence = best.confidence;
            self.breakdown = Some(best.breakdown.to_map());
            self.item_id = Some(best.item_id);
        }
    }

    fn fill_adaptive(&mut self, result: AdaptiveMatch) {
        self.status = result.status.as_str();
        self.item_id = result.item_id;
        self.confidence = result.confidence;
        self.breakdown = result.breakdown.as_ref().map(ScoreBreakdown::to_map);
        self.alternatives = result.alternatives.into_iter().map(MatchRecord::from).collect();
    }
}

#[derive(Debug, Serialize)]
struct Summary {
    queries: usize,
    rank1_correct: usize,
    accuracy: f32,
}

#[derive(Debug, Serialize)]
struct Output {
    library_size: usize,
    skipped_references: usize,
    results: Vec<QueryRecord>,
    summary: Summary,
}

/// Lowercases and maps `_`/`-` to spaces so file stems compare with item ids.
fn normalize_id(id: &str) -> String {
    id.to_lowercase()
        .replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn collect_queries(entries: &[String]) -> std::io::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in entries {
        let path = PathBuf::from(entry);
        if path.is_dir() {
            let mut files: Vec<PathBuf> = fs::read_dir(&path)?
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && is_supported_image(p))
                .collect();
            files.sort();
            out.extend(files);
        } else {
            out.push(path);
        }
    }
    Ok(out)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env().add_directive("iconmatch=info".parse()?))
            .with_target(false)
            .init();
    }

    if cli.print_example {
        println!("{EXAMPLE_JSON}");
        return Ok(());
    }

    let config_text = fs::read_to_string(&cli.config)?;
    let config: Config = serde_json::from_str(&config_text)?;
    if config.library_dir.is_empty() || config.queries.is_empty() {
        return Err("library_dir and queries must be set in the config".into());
    }
    if config.topk == 0 {
        return Err("topk must be at least 1".into());
    }

    let library_cfg = LibraryConfig {
        preprocess: config.preprocess.to_config()?,
        features: (&config.features).into(),
        parallel: config.parallel,
    };
    let mut library = ReferenceLibrary::new(library_cfg)?;
    let report = library.load(&config.library_dir)?;
    tracing::info!(
        loaded = report.loaded,
        skipped = report.skipped.len(),
        resized = report.resized,
        "reference library ready"
    );

    let matcher = Matcher::new(Arc::new(library))
        .with_config((&config.match_cfg).into())?
        .with_score_config((&config.score).into())?;

    let mut results = Vec::new();
    for path in collect_queries(&config.queries)? {
        let expected = path
            .file_stem()
            .map(|s| normalize_id(&s.to_string_lossy()))
            .unwrap_or_default();
        let mut record = QueryRecord::new(&path, expected);

        let image = match load_color_image(&path) {
            Ok(image) => image,
            Err(err) => {
                tracing::warn!("skipping query {}: {err}", path.display());
                results.push(record);
                continue;
            }
        };

        let rank1 = match config.mode {
            Mode::Top => {
                let top = matcher.top_matches(&image, config.topk);
                let rank1 = top.first().map(|m| m.item_id.clone());
                let mut top = top.into_iter();
                record.fill_best(top.next());
                record.status = if record.item_id.is_some() { "ranked" } else { "failed" };
                record.alternatives = top.map(MatchRecord::from).collect();
                rank1
            }
            Mode::Recognize => {
                record.fill_best(matcher.recognize_with_score(&image));
                record.item_id.clone()
            }
            Mode::Adaptive => {
                record.fill_adaptive(matcher.recognize_adaptive(&image));
                record.item_id.clone()
            }
        };
        record.rank1_correct = rank1
            .map(|id| normalize_id(&id) == record.expected)
            .unwrap_or(false);
        results.push(record);
    }

    let queries = results.len();
    let rank1_correct = results.iter().filter(|r| r.rank1_correct).count();
    let output = Output {
        library_size: matcher.library().count(),
        skipped_references: report.skipped.len(),
        results,
        summary: Summary {
            queries,
            rank1_correct,
            accuracy: if queries == 0 {
                0.0
            } else {
                rank1_correct as f32 / queries as f32
            },
        },
    };
    let json = serde_json::to_string_pretty(&output)?;

    match config.output_path {
        Some(path) => fs::write(path, json)?,
        None => println!("{json}"),
    }

    Ok(())
}
