//! JSON reporter for machine-readable output

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::stats::ImageSummary;
use crate::{ScoreTable, Warning};

/// Reporter for JSON output
pub struct JsonReporter {
    /// Whether to pretty-print JSON
    pretty: bool,
}

impl JsonReporter {
    pub fn new() -> Self {
        Self { pretty: false }
    }

    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }

    /// Per-image statistics with a summary, stamped with the current time
    pub fn report(&self, table: &ScoreTable) -> String {
        self.report_at(table, Utc::now())
    }

    pub fn report_at(&self, table: &ScoreTable, generated_at: DateTime<Utc>) -> String {
        let images: Vec<ImageSummary> = table
            .iter()
            .map(|(image, scores)| ImageSummary::new(image, scores))
            .collect();
        let overall: Vec<f64> = images.iter().filter_map(|s| s.overall).collect();
        let output = JsonOutput {
            generated_at: generated_at.to_rfc3339(),
            summary: JsonSummary {
                images_scored: images.len(),
                average_score: (!overall.is_empty())
                    .then(|| overall.iter().sum::<f64>() / overall.len() as f64),
            },
            images,
        };
        self.serialize(&output, "{}")
    }

    /// Raw distributions as extracted, with any warnings raised on the way
    pub fn report_extraction(&self, table: &ScoreTable, warnings: &[Warning]) -> String {
        let output = ExtractionOutput {
            scores: table,
            warnings,
        };
        self.serialize(&output, "{}")
    }

    fn serialize<T: Serialize>(&self, value: &T, fallback: &str) -> String {
        let result = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        result.unwrap_or_else(|_| fallback.to_string())
    }
}

impl Default for JsonReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonOutput {
    generated_at: String,
    images: Vec<ImageSummary>,
    summary: JsonSummary,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonSummary {
    images_scored: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    average_score: Option<f64>,
}

#[derive(Serialize)]
struct ExtractionOutput<'a> {
    scores: &'a ScoreTable,
    warnings: &'a [Warning],
}
