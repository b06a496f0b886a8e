//! nima-report: NIMA score extraction and reporting
//!
//! This library turns the free-text log of an image quality assessment tool
//! into per-image score distributions, persists them, and renders visual
//! reports with summary statistics.

pub mod config;
pub mod error;
pub mod parser;
pub mod pipeline;
pub mod report;
pub mod stats;
pub mod store;
pub mod tool;

pub use error::{Error, Result};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

/// Number of ranks in a NIMA score distribution (1 = worst, 10 = best)
pub const RANKS: usize = 10;

/// One of the two independent quality dimensions scored for an image
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelVariant {
    Aesthetic,
    Technical,
}

impl ModelVariant {
    pub const ALL: [ModelVariant; 2] = [ModelVariant::Aesthetic, ModelVariant::Technical];

    /// Lower-case name as used in tool output, file names and records
    pub fn as_str(self) -> &'static str {
        match self {
            ModelVariant::Aesthetic => "aesthetic",
            ModelVariant::Technical => "technical",
        }
    }

    /// Capitalized label for report titles
    pub fn label(self) -> &'static str {
        match self {
            ModelVariant::Aesthetic => "Aesthetic",
            ModelVariant::Technical => "Technical",
        }
    }
}

impl std::fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelVariant {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aesthetic" => Ok(ModelVariant::Aesthetic),
            "technical" => Ok(ModelVariant::Technical),
            other => Err(format!("unknown model variant: {}", other)),
        }
    }
}

/// Model variant selector: a single variant, or both (no filtering)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum VariantFilter {
    Aesthetic,
    Technical,
    #[default]
    Both,
}

impl VariantFilter {
    /// Whether records of `variant` pass this filter
    pub fn matches(self, variant: ModelVariant) -> bool {
        match self {
            VariantFilter::Both => true,
            VariantFilter::Aesthetic => variant == ModelVariant::Aesthetic,
            VariantFilter::Technical => variant == ModelVariant::Technical,
        }
    }

    /// The single variant selected, if any
    pub fn variant(self) -> Option<ModelVariant> {
        match self {
            VariantFilter::Aesthetic => Some(ModelVariant::Aesthetic),
            VariantFilter::Technical => Some(ModelVariant::Technical),
            VariantFilter::Both => None,
        }
    }
}

impl std::fmt::Display for VariantFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VariantFilter::Aesthetic => write!(f, "aesthetic"),
            VariantFilter::Technical => write!(f, "technical"),
            VariantFilter::Both => write!(f, "both"),
        }
    }
}

/// Probability mass over ranks 1..=10.
///
/// Values are finite and non-negative but need not sum to 1; they are treated
/// as relative weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct ScoreDistribution([f64; RANKS]);

impl ScoreDistribution {
    /// Build a distribution, validating the length and value invariants
    pub fn new(values: &[f64]) -> Result<Self> {
        if values.len() != RANKS {
            return Err(Error::InvalidDistribution(format!(
                "expected {} values, got {}",
                RANKS,
                values.len()
            )));
        }
        let mut buckets = [0.0; RANKS];
        for (i, &v) in values.iter().enumerate() {
            if !v.is_finite() || v < 0.0 {
                return Err(Error::InvalidDistribution(format!(
                    "rank {} has invalid mass {}",
                    i + 1,
                    v
                )));
            }
            buckets[i] = v;
        }
        Ok(Self(buckets))
    }

    /// Uniform mass of 0.1 per rank
    pub fn uniform() -> Self {
        Self([0.1; RANKS])
    }

    pub fn values(&self) -> &[f64; RANKS] {
        &self.0
    }

    /// Mass at a 1-based rank; `None` outside 1..=10
    pub fn mass(&self, rank: usize) -> Option<f64> {
        rank.checked_sub(1).and_then(|i| self.0.get(i).copied())
    }

    /// Iterate `(rank, mass)` pairs with 1-based ranks
    pub fn ranked(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.0.iter().enumerate().map(|(i, &m)| (i + 1, m))
    }
}

impl TryFrom<Vec<f64>> for ScoreDistribution {
    type Error = Error;

    fn try_from(values: Vec<f64>) -> Result<Self> {
        Self::new(&values)
    }
}

impl From<ScoreDistribution> for Vec<f64> {
    fn from(d: ScoreDistribution) -> Self {
        d.0.to_vec()
    }
}

/// Distributions for one image, keyed by model variant
pub type ImageScores = BTreeMap<ModelVariant, ScoreDistribution>;

/// Distributions for many images, keyed by image identifier
pub type ScoreTable = BTreeMap<String, ImageScores>;

/// One (image, model variant) distribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRecord {
    /// Base file name of the image, without extension
    pub image_identifier: String,
    pub model_variant: ModelVariant,
    pub distribution: ScoreDistribution,
}

impl ScoreRecord {
    pub fn new(
        image_identifier: impl Into<String>,
        model_variant: ModelVariant,
        distribution: ScoreDistribution,
    ) -> Self {
        Self {
            image_identifier: image_identifier.into(),
            model_variant,
            distribution,
        }
    }
}

/// Insert a record into a table; an existing entry for the same key is replaced
pub fn insert_record(table: &mut ScoreTable, record: ScoreRecord) {
    table
        .entry(record.image_identifier)
        .or_default()
        .insert(record.model_variant, record.distribution);
}

/// Image identifier for a file name or path: its stem
pub fn image_identifier(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| name.to_string())
}

/// Kind of recoverable event raised while extracting, loading or rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WarningKind {
    MalformedDistribution,
    OrphanDistribution,
    UnknownVariant,
    CorruptRecord,
    NoScoresAvailable,
    MissingSourceImage,
    RenderFailed,
    NoMatchingRecords,
    PredictionFailed,
}

impl std::fmt::Display for WarningKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WarningKind::MalformedDistribution => "malformed-distribution",
            WarningKind::OrphanDistribution => "orphan-distribution",
            WarningKind::UnknownVariant => "unknown-variant",
            WarningKind::CorruptRecord => "corrupt-record",
            WarningKind::NoScoresAvailable => "no-scores-available",
            WarningKind::MissingSourceImage => "missing-source-image",
            WarningKind::RenderFailed => "render-failed",
            WarningKind::NoMatchingRecords => "no-matching-records",
            WarningKind::PredictionFailed => "prediction-failed",
        };
        f.write_str(s)
    }
}

/// A skipped item: what was skipped and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Warning {
    pub kind: WarningKind,
    /// Line, file or image the warning is about
    pub subject: String,
    pub message: String,
}

impl Warning {
    pub fn new(kind: WarningKind, subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            subject: subject.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.subject, self.message)
    }
}
