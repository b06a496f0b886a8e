//! Result store - persist score records as JSON files, one per image
//! (batch layout) or one per image and variant (single layout).

pub mod schema;

pub use schema::{BatchDocument, SingleDocument, StoredDocument};

use std::fs;
use std::path::{Path, PathBuf};

use crate::stats;
use crate::{
    image_identifier, insert_record, Error, ImageScores, ModelVariant, Result, ScoreDistribution,
    ScoreRecord, ScoreTable, VariantFilter, Warning, WarningKind,
};

/// Records loaded from a results directory
#[derive(Debug, Default)]
pub struct LoadOutcome {
    pub table: ScoreTable,
    /// Files that were skipped because they could not be decoded
    pub warnings: Vec<Warning>,
    /// Number of record files successfully decoded
    pub files_read: usize,
}

/// Results directory holding JSON score records
#[derive(Debug, Clone)]
pub struct ResultStore {
    dir: PathBuf,
}

impl ResultStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the batch record for an image
    pub fn batch_path(&self, identifier: &str) -> PathBuf {
        self.dir
            .join(format!("{}{}", identifier, schema::BATCH_SUFFIX))
    }

    /// Path of the single-variant record for an image
    pub fn single_path(&self, identifier: &str, variant: ModelVariant) -> PathBuf {
        self.dir
            .join(format!("{}_{}{}", identifier, variant, schema::SINGLE_SUFFIX))
    }

    /// Write every variant of one image to its batch record, replacing any
    /// previous record for that image
    pub fn write(&self, identifier: &str, scores: &ImageScores) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let doc = BatchDocument {
            variants: scores.clone(),
        };
        let path = self.batch_path(identifier);
        write_json(&path, &doc)?;
        Ok(path)
    }

    /// Write one prediction with its mean to a single-variant record.
    ///
    /// `image_name` is the image file name; its stem is the record identifier.
    pub fn write_single(
        &self,
        image_name: &str,
        variant: ModelVariant,
        distribution: &ScoreDistribution,
    ) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let doc = SingleDocument {
            image: image_name.to_string(),
            model_type: variant,
            mean_score: stats::mean(distribution),
            scores: *distribution,
        };
        let path = self.single_path(&image_identifier(image_name), variant);
        write_json(&path, &doc)?;
        Ok(path)
    }

    /// Write a batch record for every image in the table
    pub fn write_table(&self, table: &ScoreTable) -> Result<Vec<PathBuf>> {
        table
            .iter()
            .map(|(identifier, scores)| self.write(identifier, scores))
            .collect()
    }

    /// Decode one record file
    pub fn read_record(path: &Path) -> Result<Vec<ScoreRecord>> {
        let corrupt = |reason: String| Error::CorruptRecord {
            path: path.to_path_buf(),
            reason,
        };
        let content = fs::read_to_string(path).map_err(|e| corrupt(e.to_string()))?;
        let doc = StoredDocument::from_json(&content).map_err(|e| corrupt(e.to_string()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let identifier = schema::identifier_from_file_name(&file_name);
        Ok(doc.into_records(&identifier))
    }

    /// Load every record in the directory whose variant passes `filter`.
    ///
    /// Files are read in sorted order; when two files hold the same key the
    /// later one wins. Undecodable files are skipped with a warning.
    pub fn read_all(&self, filter: VariantFilter) -> Result<LoadOutcome> {
        let mut outcome = LoadOutcome::default();
        if !self.dir.is_dir() {
            return Ok(outcome);
        }

        for path in self.record_files()? {
            match Self::read_record(&path) {
                Ok(records) => {
                    outcome.files_read += 1;
                    for record in records {
                        if filter.matches(record.model_variant) {
                            insert_record(&mut outcome.table, record);
                        }
                    }
                }
                Err(e) => outcome.warnings.push(Warning::new(
                    WarningKind::CorruptRecord,
                    path.display().to_string(),
                    e.to_string(),
                )),
            }
        }

        Ok(outcome)
    }

    /// Whether any record file exists
    pub fn has_any_results(&self) -> bool {
        self.record_files()
            .map(|files| !files.is_empty())
            .unwrap_or(false)
    }

    /// Sorted `*.json` files directly inside the directory, dotfiles excluded
    fn record_files(&self) -> Result<Vec<PathBuf>> {
        let pattern = format!(
            "{}/*.json",
            glob::Pattern::escape(&self.dir.to_string_lossy())
        );
        let options = glob::MatchOptions {
            require_literal_leading_dot: true,
            ..Default::default()
        };
        let entries = glob::glob_with(&pattern, options).map_err(|e| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                e.to_string(),
            ))
        })?;
        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .filter(|p| p.is_file())
            .collect();
        files.sort();
        Ok(files)
    }
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut content = serde_json::to_string_pretty(value)?;
    content.push('\n');
    fs::write(path, content)?;
    Ok(())
}
