//! Pipeline coordinator: tool → parse → store → render.
//!
//! Only a failed tool and an empty result set stop a run. Everything else
//! (malformed lines, corrupt records, missing source images, images that
//! cannot be rendered) is collected as warnings while the rest proceeds.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::parser::{self, ParseOutcome};
use crate::report::ReportRenderer;
use crate::store::ResultStore;
use crate::tool::{AssessmentTool, Predictor};
use crate::{image_identifier, Error, ModelVariant, Result, VariantFilter, Warning, WarningKind};

/// Image file extensions recognized as source images
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif", "tif", "tiff", "webp"];

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Directory holding the source images
    pub image_dir: PathBuf,
    pub results_dir: PathBuf,
    pub report_dir: PathBuf,
    /// Variants to load and render
    pub filter: VariantFilter,
    /// Stop after persisting records
    pub skip_render: bool,
}

/// Outcome of rendering stored records
#[derive(Debug, Default)]
pub struct RenderReport {
    pub rendered: Vec<PathBuf>,
    pub warnings: Vec<Warning>,
}

/// Outcome of scoring a directory with a predictor
#[derive(Debug, Default)]
pub struct EvaluateReport {
    /// Record files written
    pub written: Vec<PathBuf>,
    /// Images the predictor could not score
    pub warnings: Vec<Warning>,
}

/// Outcome of a full run
#[derive(Debug, Default)]
pub struct PipelineReport {
    pub parsed: ParseOutcome,
    /// Record files written
    pub written: Vec<PathBuf>,
    /// `None` when rendering was skipped
    pub render: Option<RenderReport>,
}

impl PipelineReport {
    /// Parse and render warnings together
    pub fn warnings(&self) -> impl Iterator<Item = &Warning> {
        self.parsed
            .warnings
            .iter()
            .chain(self.render.iter().flat_map(|r| r.warnings.iter()))
    }
}

pub struct Pipeline {
    options: PipelineOptions,
    store: ResultStore,
    renderer: ReportRenderer,
}

impl Pipeline {
    pub fn new(options: PipelineOptions) -> Self {
        let store = ResultStore::new(&options.results_dir);
        let renderer = ReportRenderer::new(&options.report_dir);
        Self {
            options,
            store,
            renderer,
        }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    /// Run the tool, persist what it reported, then render
    pub fn run(&self, tool: &dyn AssessmentTool) -> Result<PipelineReport> {
        self.run_with(tool, &mut |_| {})
    }

    /// As [`Pipeline::run`], passing each streamed tool line to `on_line`
    pub fn run_with(
        &self,
        tool: &dyn AssessmentTool,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<PipelineReport> {
        let text = tool.capture(on_line)?;
        let parsed = parser::parse_output(&text);
        if parsed.is_empty() {
            return Err(Error::NoResults);
        }

        let written = self.store.write_table(&parsed.table)?;
        let render = if self.options.skip_render {
            None
        } else {
            Some(self.render_stored()?)
        };

        Ok(PipelineReport {
            parsed,
            written,
            render,
        })
    }

    /// Render a report for every image with stored records.
    ///
    /// Fails with [`Error::NoResults`] only when the results directory holds
    /// no record files. Files that are all corrupt or filtered out give an
    /// empty report with a `no-matching-records` warning.
    pub fn render_stored(&self) -> Result<RenderReport> {
        if !self.store.has_any_results() {
            return Err(Error::NoResults);
        }

        let loaded = self.store.read_all(self.options.filter)?;
        let mut report = RenderReport {
            rendered: Vec::new(),
            warnings: loaded.warnings,
        };
        if loaded.table.is_empty() {
            report.warnings.push(Warning::new(
                WarningKind::NoMatchingRecords,
                self.options.results_dir.display().to_string(),
                format!("no stored records match model type `{}`", self.options.filter),
            ));
            return Ok(report);
        }

        let images = index_source_images(&self.options.image_dir);
        for (identifier, scores) in &loaded.table {
            let Some(image_path) = images.get(identifier) else {
                let err = Error::MissingSourceImage {
                    identifier: identifier.clone(),
                    dir: self.options.image_dir.clone(),
                };
                report.warnings.push(Warning::new(
                    WarningKind::MissingSourceImage,
                    identifier.clone(),
                    err.to_string(),
                ));
                continue;
            };

            match self.renderer.render(image_path, identifier, scores) {
                Ok(path) => report.rendered.push(path),
                Err(e) => {
                    let kind = match e {
                        Error::NoScoresAvailable(_) => WarningKind::NoScoresAvailable,
                        _ => WarningKind::RenderFailed,
                    };
                    report
                        .warnings
                        .push(Warning::new(kind, identifier.clone(), e.to_string()));
                }
            }
        }

        Ok(report)
    }

    /// Score one image with `predictor` and store it as a single-variant record
    pub fn evaluate_single(
        &self,
        image_path: &Path,
        variant: ModelVariant,
        predictor: &dyn Predictor,
    ) -> Result<PathBuf> {
        let file_name = image_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if !image_path.is_file() {
            return Err(Error::MissingSourceImage {
                identifier: image_identifier(&file_name),
                dir: image_path
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_default(),
            });
        }

        let distribution = predictor.predict(image_path, variant)?;
        self.store.write_single(&file_name, variant, &distribution)
    }

    /// Score every image in `dir`.
    ///
    /// An image the predictor fails on is skipped with a warning. A predictor
    /// that cannot be started at all aborts the whole directory.
    pub fn evaluate_dir(
        &self,
        dir: &Path,
        variant: ModelVariant,
        predictor: &dyn Predictor,
    ) -> Result<EvaluateReport> {
        let mut report = EvaluateReport::default();
        for image in source_images(dir) {
            match self.evaluate_single(&image, variant, predictor) {
                Ok(path) => report.written.push(path),
                Err(e @ Error::ToolNotFound { .. }) => return Err(e),
                Err(e) => report.warnings.push(Warning::new(
                    WarningKind::PredictionFailed,
                    image.display().to_string(),
                    e.to_string(),
                )),
            }
        }
        Ok(report)
    }
}

fn is_image_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
}

/// Image files directly inside `dir`, sorted by name
pub fn source_images(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| is_image_file(p))
        .collect()
}

/// Source images in `dir` keyed by stem; the first in sorted order wins
pub fn index_source_images(dir: &Path) -> BTreeMap<String, PathBuf> {
    let mut index = BTreeMap::new();
    for path in source_images(dir) {
        if let Some(stem) = path.file_stem() {
            index
                .entry(stem.to_string_lossy().to_string())
                .or_insert(path);
        }
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::CapturedOutput;
    use std::fs;
    use tempfile::TempDir;

    const UNIFORM: &str = "[0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1]";

    fn options(root: &Path) -> PipelineOptions {
        PipelineOptions {
            image_dir: root.join("images"),
            results_dir: root.join("results"),
            report_dir: root.join("reports"),
            filter: VariantFilter::Both,
            skip_render: true,
        }
    }

    #[test]
    fn index_prefers_sorted_first_match() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("photo1.png"), b"x").unwrap();
        fs::write(dir.path().join("photo1.jpg"), b"x").unwrap();
        fs::write(dir.path().join("photo1.txt"), b"x").unwrap();
        let index = index_source_images(dir.path());
        assert_eq!(index.len(), 1);
        assert!(index["photo1"].ends_with("photo1.jpg"));
        assert!(!index.contains_key("photo2"));
    }

    #[test]
    fn extensions_match_case_insensitively() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("IMG_01.JPG"), b"x").unwrap();
        assert_eq!(source_images(dir.path()).len(), 1);
    }

    #[test]
    fn missing_image_dir_has_no_images() {
        let dir = TempDir::new().unwrap();
        assert!(source_images(&dir.path().join("absent")).is_empty());
    }

    #[test]
    fn run_persists_and_skips_render() {
        let dir = TempDir::new().unwrap();
        let pipeline = Pipeline::new(options(dir.path()));
        let text = format!(
            "===== Evaluating aesthetic quality =====\nEvaluating: photo1.jpg\nPredicted score distribution: {}\n",
            UNIFORM
        );
        let report = pipeline.run(&CapturedOutput(text)).unwrap();
        assert_eq!(report.parsed.record_count(), 1);
        assert_eq!(report.written.len(), 1);
        assert!(report.render.is_none());
        assert!(pipeline.store().has_any_results());
    }

    #[test]
    fn run_with_nothing_parsed_is_fatal() {
        let dir = TempDir::new().unwrap();
        let pipeline = Pipeline::new(options(dir.path()));
        let err = pipeline
            .run(&CapturedOutput("no scores here\n".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::NoResults));
        assert!(!pipeline.store().has_any_results());
    }

    #[test]
    fn render_with_empty_store_is_fatal() {
        let dir = TempDir::new().unwrap();
        let pipeline = Pipeline::new(options(dir.path()));
        fs::create_dir_all(dir.path().join("results")).unwrap();
        assert!(matches!(pipeline.render_stored(), Err(Error::NoResults)));
    }

    #[test]
    fn render_with_only_corrupt_records_warns() {
        let dir = TempDir::new().unwrap();
        let results = dir.path().join("results");
        fs::create_dir_all(&results).unwrap();
        fs::write(results.join("photo1_scores.json"), "{ truncated").unwrap();
        let pipeline = Pipeline::new(options(dir.path()));

        let report = pipeline.render_stored().unwrap();
        assert!(report.rendered.is_empty());
        let kinds: Vec<_> = report.warnings.iter().map(|w| w.kind).collect();
        assert_eq!(
            kinds,
            vec![WarningKind::CorruptRecord, WarningKind::NoMatchingRecords]
        );
    }

    #[test]
    fn evaluate_missing_image_fails_without_predicting() {
        struct Unreachable;
        impl Predictor for Unreachable {
            fn predict(&self, _: &Path, _: ModelVariant) -> Result<crate::ScoreDistribution> {
                panic!("predictor must not run");
            }
        }
        let dir = TempDir::new().unwrap();
        let pipeline = Pipeline::new(options(dir.path()));
        let err = pipeline
            .evaluate_single(&dir.path().join("nope.jpg"), ModelVariant::Aesthetic, &Unreachable)
            .unwrap_err();
        assert!(matches!(err, Error::MissingSourceImage { .. }));
    }
}
