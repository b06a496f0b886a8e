//! On-disk record schemas.
//!
//! Two layouts exist side by side in a results directory:
//!
//! - [`BatchDocument`] (`<image>_scores.json`): every variant of one image,
//!   written by the batch pipeline.
//! - [`SingleDocument`] (`<image>_<variant>_results.json`): one variant of one
//!   image with its mean, written by single-image evaluation.
//!
//! Both normalize into [`ScoreRecord`]s when read.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::{image_identifier, ModelVariant, ScoreDistribution, ScoreRecord};

pub const BATCH_SUFFIX: &str = "_scores.json";
pub const SINGLE_SUFFIX: &str = "_results.json";

/// Variant name → distribution for one image
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchDocument {
    pub variants: BTreeMap<ModelVariant, ScoreDistribution>,
}

impl BatchDocument {
    pub fn into_records(self, identifier: &str) -> Vec<ScoreRecord> {
        self.variants
            .into_iter()
            .map(|(variant, dist)| ScoreRecord::new(identifier, variant, dist))
            .collect()
    }
}

/// One prediction for one image and variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleDocument {
    /// Image file name (with extension)
    pub image: String,
    pub model_type: ModelVariant,
    pub mean_score: f64,
    pub scores: ScoreDistribution,
}

impl SingleDocument {
    pub fn into_record(self) -> ScoreRecord {
        ScoreRecord::new(image_identifier(&self.image), self.model_type, self.scores)
    }
}

/// Either layout, as found on disk
#[derive(Debug, Clone, PartialEq)]
pub enum StoredDocument {
    Batch(BatchDocument),
    Single(SingleDocument),
}

impl StoredDocument {
    /// Decode a JSON document, choosing the layout by the presence of `model_type`
    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(content)?;
        let is_single = value
            .as_object()
            .map(|obj| obj.contains_key("model_type"))
            .unwrap_or(false);
        if is_single {
            serde_json::from_value(value).map(StoredDocument::Single)
        } else {
            serde_json::from_value(value).map(StoredDocument::Batch)
        }
    }

    /// Normalize into records; `identifier` names batch documents, which do not
    /// carry the image name themselves
    pub fn into_records(self, identifier: &str) -> Vec<ScoreRecord> {
        match self {
            StoredDocument::Batch(doc) => doc.into_records(identifier),
            StoredDocument::Single(doc) => vec![doc.into_record()],
        }
    }
}

/// Image identifier implied by a record file name
pub fn identifier_from_file_name(file_name: &str) -> String {
    if let Some(id) = file_name.strip_suffix(BATCH_SUFFIX) {
        return id.to_string();
    }
    if let Some(rest) = file_name.strip_suffix(SINGLE_SUFFIX) {
        for variant in ModelVariant::ALL {
            if let Some(id) = rest.strip_suffix(&format!("_{}", variant)) {
                return id.to_string();
            }
        }
        return rest.to_string();
    }
    image_identifier(file_name)
}
