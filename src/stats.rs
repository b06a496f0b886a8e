//! Summary statistics over score distributions.
//!
//! Distributions are not normalized before computing: a distribution whose
//! mass does not sum to 1 yields a mean and dispersion scaled by that mass.

use serde::Serialize;

use crate::{ImageScores, ModelVariant, ScoreDistribution};

/// Probability-weighted average rank: `Σ r · d[r]`
pub fn mean(d: &ScoreDistribution) -> f64 {
    d.ranked().map(|(rank, mass)| rank as f64 * mass).sum()
}

/// Weighted standard deviation around [`mean`]: `sqrt(Σ d[r] · (r − mean)²)`
pub fn dispersion(d: &ScoreDistribution) -> f64 {
    let m = mean(d);
    let variance: f64 = d
        .ranked()
        .map(|(rank, mass)| {
            let diff = rank as f64 - m;
            mass * diff * diff
        })
        .sum();
    variance.max(0.0).sqrt()
}

/// Average of the variant means present for an image; `None` if none are
pub fn overall_score(scores: &ImageScores) -> Option<f64> {
    if scores.is_empty() {
        return None;
    }
    let total: f64 = scores.values().map(mean).sum();
    Some(total / scores.len() as f64)
}

/// Mean and dispersion of one distribution
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportStatistics {
    pub mean: f64,
    pub dispersion: f64,
}

impl ReportStatistics {
    pub fn of(d: &ScoreDistribution) -> Self {
        Self {
            mean: mean(d),
            dispersion: dispersion(d),
        }
    }
}

/// Statistics for every variant of one image plus the combined score
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSummary {
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aesthetic: Option<ReportStatistics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technical: Option<ReportStatistics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall: Option<f64>,
}

impl ImageSummary {
    pub fn new(image: &str, scores: &ImageScores) -> Self {
        let stats_for = |v: ModelVariant| scores.get(&v).map(ReportStatistics::of);
        Self {
            image: image.to_string(),
            aesthetic: stats_for(ModelVariant::Aesthetic),
            technical: stats_for(ModelVariant::Technical),
            overall: overall_score(scores),
        }
    }

    pub fn get(&self, variant: ModelVariant) -> Option<ReportStatistics> {
        match variant {
            ModelVariant::Aesthetic => self.aesthetic,
            ModelVariant::Technical => self.technical,
        }
    }
}
