//! End-to-end pipeline tests through the public library API.
//! Tools and predictors are in-process fakes; images are generated on the fly.

use image::{Rgb, RgbImage};
use nima_report::pipeline::{Pipeline, PipelineOptions};
use nima_report::stats::{mean, overall_score};
use nima_report::tool::{AssessmentTool, Predictor};
use nima_report::{
    Error, ModelVariant, Result, ScoreDistribution, VariantFilter, WarningKind,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const UNIFORM: &str = "[0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1]";
const HIGH: &str = "[0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0]";

struct FakeTool(String);

impl AssessmentTool for FakeTool {
    fn capture(&self, on_line: &mut dyn FnMut(&str)) -> Result<String> {
        for line in self.0.lines() {
            on_line(line);
        }
        Ok(self.0.clone())
    }
}

struct FailingTool;

impl AssessmentTool for FailingTool {
    fn capture(&self, _on_line: &mut dyn FnMut(&str)) -> Result<String> {
        Err(Error::ToolInvocationFailed {
            command: "./assess_images.sh".to_string(),
            status: "exit status: 1".to_string(),
            stderr: "model weights missing".to_string(),
        })
    }
}

struct FixedPredictor(ScoreDistribution);

impl Predictor for FixedPredictor {
    fn predict(&self, _image: &Path, _variant: ModelVariant) -> Result<ScoreDistribution> {
        Ok(self.0)
    }
}

/// Fails on images whose file name contains "blurry"
struct PickyPredictor;

impl Predictor for PickyPredictor {
    fn predict(&self, image: &Path, _variant: ModelVariant) -> Result<ScoreDistribution> {
        if image.to_string_lossy().contains("blurry") {
            return Err(Error::ToolInvocationFailed {
                command: "predict".to_string(),
                status: "exit status: 1".to_string(),
                stderr: "cannot score".to_string(),
            });
        }
        Ok(ScoreDistribution::uniform())
    }
}

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("images")).unwrap();
        Self { dir }
    }

    fn image_dir(&self) -> PathBuf {
        self.dir.path().join("images")
    }

    fn add_image(&self, name: &str) -> PathBuf {
        let path = self.image_dir().join(name);
        RgbImage::from_pixel(32, 24, Rgb([90, 140, 200]))
            .save(&path)
            .unwrap();
        path
    }

    fn pipeline(&self, filter: VariantFilter, skip_render: bool) -> Pipeline {
        Pipeline::new(PipelineOptions {
            image_dir: self.image_dir(),
            results_dir: self.dir.path().join("results"),
            report_dir: self.dir.path().join("reports"),
            filter,
            skip_render,
        })
    }
}

fn section(variant: &str, images: &[(&str, &str)]) -> String {
    let mut out = format!("===== Evaluating {} quality =====\n", variant);
    for (image, payload) in images {
        out.push_str(&format!("Evaluating: {}\n", image));
        out.push_str("Loading model weights...\n");
        out.push_str(&format!("Predicted score distribution: {}\n", payload));
    }
    out
}

#[test]
fn single_aesthetic_record_is_extracted_and_persisted() {
    let ws = Workspace::new();
    let pipeline = ws.pipeline(VariantFilter::Both, true);
    let tool = FakeTool(section("aesthetic", &[("photo1.jpg", UNIFORM)]));

    let report = pipeline.run(&tool).unwrap();
    assert_eq!(report.parsed.record_count(), 1);
    let d = report.parsed.table["photo1"][&ModelVariant::Aesthetic];
    assert!((mean(&d) - 5.5).abs() < 1e-9);

    let loaded = pipeline.store().read_all(VariantFilter::Both).unwrap();
    assert_eq!(loaded.table.len(), 1);
    assert!(loaded.table["photo1"].contains_key(&ModelVariant::Aesthetic));
}

#[test]
fn both_sections_give_overall_as_average_of_means() {
    let ws = Workspace::new();
    let pipeline = ws.pipeline(VariantFilter::Both, true);
    let text = section("aesthetic", &[("photo1.jpg", UNIFORM)])
        + &section("technical", &[("photo1.jpg", HIGH)]);

    let report = pipeline.run(&FakeTool(text)).unwrap();
    let scores = &report.parsed.table["photo1"];
    assert_eq!(scores.len(), 2);
    let overall = overall_score(scores).unwrap();
    assert!((overall - (5.5 + 10.0) / 2.0).abs() < 1e-9);
}

#[test]
fn orphan_distribution_yields_no_results() {
    let ws = Workspace::new();
    let pipeline = ws.pipeline(VariantFilter::Both, true);
    let text = format!("Predicted score distribution: {}\n", UNIFORM);

    let err = pipeline.run(&FakeTool(text)).unwrap_err();
    assert!(matches!(err, Error::NoResults));
    assert!(err.is_fatal());
    assert!(!pipeline.store().has_any_results());
}

#[test]
fn missing_source_image_is_skipped_with_warning() {
    let ws = Workspace::new();
    ws.add_image("photo1.png");
    let pipeline = ws.pipeline(VariantFilter::Both, false);
    let text = section(
        "aesthetic",
        &[("photo1.jpg", UNIFORM), ("photo2.jpg", HIGH)],
    );

    let report = pipeline.run(&FakeTool(text)).unwrap();
    let render = report.render.as_ref().unwrap();
    assert_eq!(render.rendered.len(), 1);
    assert!(render.rendered[0].ends_with("photo1_scores.png"));
    assert!(!ws.dir.path().join("reports/photo2_scores.png").exists());

    let missing: Vec<_> = render
        .warnings
        .iter()
        .filter(|w| w.kind == WarningKind::MissingSourceImage)
        .collect();
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].subject, "photo2");
}

#[test]
fn malformed_line_does_not_stop_the_run() {
    let ws = Workspace::new();
    let pipeline = ws.pipeline(VariantFilter::Both, true);
    let text = section(
        "technical",
        &[("bad.jpg", "[0.5, 0.5]"), ("good.jpg", UNIFORM)],
    );

    let report = pipeline.run(&FakeTool(text)).unwrap();
    assert_eq!(report.parsed.record_count(), 1);
    assert!(report.parsed.table.contains_key("good"));
    assert!(report
        .warnings()
        .any(|w| w.kind == WarningKind::MalformedDistribution));
}

#[test]
fn tool_failure_aborts_before_anything_is_written() {
    let ws = Workspace::new();
    let pipeline = ws.pipeline(VariantFilter::Both, false);
    let err = pipeline.run(&FailingTool).unwrap_err();
    assert!(err.is_fatal());
    assert!(err.to_string().contains("model weights missing"));
    assert!(!ws.dir.path().join("results").exists());
}

#[test]
fn filtered_render_omits_other_variant() {
    let ws = Workspace::new();
    ws.add_image("photo1.jpg");
    let text = section("aesthetic", &[("photo1.jpg", UNIFORM)])
        + &section("technical", &[("photo1.jpg", HIGH)]);
    ws.pipeline(VariantFilter::Both, true)
        .run(&FakeTool(text))
        .unwrap();

    let technical_only = ws.pipeline(VariantFilter::Technical, false);
    let render = technical_only.render_stored().unwrap();
    assert_eq!(render.rendered.len(), 1);
    let loaded = technical_only
        .store()
        .read_all(VariantFilter::Technical)
        .unwrap();
    assert!(!loaded.table["photo1"].contains_key(&ModelVariant::Aesthetic));
}

#[test]
fn rerun_replaces_previous_batch_record() {
    let ws = Workspace::new();
    let pipeline = ws.pipeline(VariantFilter::Both, true);
    pipeline
        .run(&FakeTool(section("aesthetic", &[("photo1.jpg", UNIFORM)])))
        .unwrap();
    pipeline
        .run(&FakeTool(section("aesthetic", &[("photo1.jpg", HIGH)])))
        .unwrap();

    let loaded = pipeline.store().read_all(VariantFilter::Both).unwrap();
    let d = loaded.table["photo1"][&ModelVariant::Aesthetic];
    assert_eq!(mean(&d), 10.0);
}

#[test]
fn streamed_lines_reach_the_callback() {
    let ws = Workspace::new();
    let pipeline = ws.pipeline(VariantFilter::Both, true);
    let text = section("aesthetic", &[("photo1.jpg", UNIFORM)]);
    let mut seen = 0;
    pipeline
        .run_with(&FakeTool(text.clone()), &mut |_| seen += 1)
        .unwrap();
    assert_eq!(seen, text.lines().count());
}

#[test]
fn single_image_evaluation_feeds_rendering() {
    let ws = Workspace::new();
    let image = ws.add_image("portrait.png");
    let pipeline = ws.pipeline(VariantFilter::Both, false);

    let path = pipeline
        .evaluate_single(
            &image,
            ModelVariant::Technical,
            &FixedPredictor(ScoreDistribution::uniform()),
        )
        .unwrap();
    assert!(path.ends_with("portrait_technical_results.json"));

    let render = pipeline.render_stored().unwrap();
    assert_eq!(render.rendered.len(), 1);
    assert!(render.warnings.is_empty());
}

#[test]
fn directory_evaluation_scores_every_image() {
    let ws = Workspace::new();
    ws.add_image("a.png");
    ws.add_image("b.png");
    fs::write(ws.image_dir().join("notes.txt"), "not an image").unwrap();
    let pipeline = ws.pipeline(VariantFilter::Both, true);

    let report = pipeline
        .evaluate_dir(
            &ws.image_dir(),
            ModelVariant::Aesthetic,
            &FixedPredictor(ScoreDistribution::uniform()),
        )
        .unwrap();
    assert_eq!(report.written.len(), 2);
    assert!(report.warnings.is_empty());
    let loaded = pipeline.store().read_all(VariantFilter::Aesthetic).unwrap();
    assert_eq!(
        loaded.table.keys().cloned().collect::<Vec<_>>(),
        vec!["a", "b"]
    );
}

#[test]
fn directory_evaluation_skips_failing_images() {
    let ws = Workspace::new();
    ws.add_image("a.png");
    ws.add_image("blurry.png");
    ws.add_image("c.png");
    let pipeline = ws.pipeline(VariantFilter::Both, true);

    let report = pipeline
        .evaluate_dir(&ws.image_dir(), ModelVariant::Technical, &PickyPredictor)
        .unwrap();
    assert_eq!(report.written.len(), 2);
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].kind, WarningKind::PredictionFailed);
    assert!(report.warnings[0].subject.ends_with("blurry.png"));

    let loaded = pipeline.store().read_all(VariantFilter::Both).unwrap();
    assert_eq!(
        loaded.table.keys().cloned().collect::<Vec<_>>(),
        vec!["a", "c"]
    );
}

#[test]
fn run_filtered_to_absent_variant_still_succeeds() {
    let ws = Workspace::new();
    ws.add_image("photo1.jpg");
    let pipeline = ws.pipeline(VariantFilter::Technical, false);
    let text = section("aesthetic", &[("photo1.jpg", UNIFORM)]);

    let report = pipeline.run(&FakeTool(text)).unwrap();
    assert_eq!(report.written.len(), 1);
    assert!(pipeline.store().has_any_results());
    let render = report.render.as_ref().unwrap();
    assert!(render.rendered.is_empty());
    assert!(render
        .warnings
        .iter()
        .any(|w| w.kind == WarningKind::NoMatchingRecords));
}

#[test]
fn render_without_record_files_is_fatal_but_corrupt_files_are_not() {
    let ws = Workspace::new();
    let pipeline = ws.pipeline(VariantFilter::Both, false);
    let results = ws.dir.path().join("results");
    fs::create_dir_all(&results).unwrap();
    assert!(matches!(pipeline.render_stored(), Err(Error::NoResults)));

    fs::write(results.join("photo1_scores.json"), "{ not json").unwrap();
    let render = pipeline.render_stored().unwrap();
    assert!(render
        .warnings
        .iter()
        .any(|w| w.kind == WarningKind::CorruptRecord));
}
