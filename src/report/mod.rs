//! Report rendering and score summaries.
//!
//! [`ReportRenderer`] composes one PNG per image with `plotters`: the source
//! image on the left, a bar chart per model variant on the right, and a score
//! overlay under the image. [`ConsoleReporter`] and [`JsonReporter`] print
//! the same statistics as text.

pub mod console;
pub mod json;

pub use console::ConsoleReporter;
pub use json::JsonReporter;

use image::imageops::{self, FilterType};
use image::RgbImage;
use plotters::coord::Shift;
use plotters::element::BitMapElement;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::fs;
use std::path::{Path, PathBuf};

use crate::stats::{self, ReportStatistics};
use crate::{Error, ImageScores, ModelVariant, Result, ScoreDistribution, RANKS};

pub const REPORT_WIDTH: u32 = 1200;
pub const REPORT_HEIGHT: u32 = 800;
pub const REPORT_SUFFIX: &str = "_scores.png";

/// Width of the image panel: the left two-thirds of the report
pub const IMAGE_PANEL_WIDTH: u32 = REPORT_WIDTH * 2 / 3;

const MARGIN: i32 = 20;
const OVERLAY_HEIGHT: i32 = 70;
const FONT: &str = "sans-serif";
const LIGHT_GRAY: RGBColor = RGBColor(235, 235, 235);
/// Half the bar width, in rank units
const BAR_HALF_WIDTH: f64 = 0.35;
const MEAN_DASHES: usize = 20;

type Area<'a> = DrawingArea<BitMapBackend<'a>, Shift>;
type DrawResult<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// Bar color for a variant
pub fn variant_color(variant: ModelVariant) -> RGBColor {
    match variant {
        ModelVariant::Aesthetic => BLUE,
        ModelVariant::Technical => GREEN,
    }
}

/// Text of the overlay under the source image
pub fn overlay_text(scores: &ImageScores) -> Option<String> {
    match scores.len() {
        0 => None,
        1 => scores
            .iter()
            .next()
            .map(|(variant, d)| format!("{} Score: {:.2}/10", variant.label(), stats::mean(d))),
        _ => stats::overall_score(scores).map(|s| format!("Overall Score: {:.2}/10", s)),
    }
}

/// Chart caption: variant title with mean and dispersion
pub fn plot_caption(variant: ModelVariant, stats: &ReportStatistics) -> String {
    format!(
        "{} Scores (Mean: {:.2}, Std: {:.2})",
        variant.label(),
        stats.mean,
        stats.dispersion
    )
}

/// Renders `<identifier>_scores.png` reports into one directory
#[derive(Debug, Clone)]
pub struct ReportRenderer {
    report_dir: PathBuf,
}

impl ReportRenderer {
    pub fn new(report_dir: impl Into<PathBuf>) -> Self {
        Self {
            report_dir: report_dir.into(),
        }
    }

    pub fn report_dir(&self) -> &Path {
        &self.report_dir
    }

    pub fn report_path(&self, identifier: &str) -> PathBuf {
        self.report_dir
            .join(format!("{}{}", identifier, REPORT_SUFFIX))
    }

    /// Render the report for one image and return the written path.
    ///
    /// Fails with [`Error::NoScoresAvailable`] when `scores` is empty, and
    /// with [`Error::Image`] when the source image cannot be decoded. No file
    /// is written in either case.
    pub fn render(&self, image_path: &Path, identifier: &str, scores: &ImageScores) -> Result<PathBuf> {
        if scores.is_empty() {
            return Err(Error::NoScoresAvailable(identifier.to_string()));
        }
        let source = image::open(image_path)?.to_rgb8();
        let title = image_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| identifier.to_string());

        fs::create_dir_all(&self.report_dir)?;
        let path = self.report_path(identifier);
        draw_report(&path, &source, &title, scores).map_err(|e| Error::Plot(e.to_string()))?;
        Ok(path)
    }
}

fn draw_report(path: &Path, source: &RgbImage, title: &str, scores: &ImageScores) -> DrawResult<()> {
    let root = BitMapBackend::new(path, (REPORT_WIDTH, REPORT_HEIGHT)).into_drawing_area();
    root.fill(&WHITE)?;

    let (image_panel, plot_panel) = root.split_horizontally(IMAGE_PANEL_WIDTH as i32);
    draw_image_panel(&image_panel, source, title, scores)?;

    let plots = plot_panel
        .margin(MARGIN, MARGIN, 0, MARGIN)
        .split_evenly((scores.len(), 1));
    for (area, (variant, distribution)) in plots.iter().zip(scores) {
        draw_plot(area, *variant, distribution)?;
    }

    root.present()?;
    Ok(())
}

fn draw_image_panel(area: &Area, source: &RgbImage, title: &str, scores: &ImageScores) -> DrawResult<()> {
    let area = area
        .margin(MARGIN, MARGIN, MARGIN, MARGIN)
        .titled(title, (FONT, 24))?;
    let (_, height) = area.dim_in_pixel();
    let (image_area, overlay_area) = area.split_vertically(height as i32 - OVERLAY_HEIGHT);
    draw_fitted(&image_area, source)?;

    if let Some(text) = overlay_text(scores) {
        let overlay = overlay_area.margin(MARGIN / 2, 0, 0, 0);
        overlay.fill(&LIGHT_GRAY)?;
        let (w, h) = overlay.dim_in_pixel();
        let style = (FONT, 30)
            .into_font()
            .color(&BLACK)
            .pos(Pos::new(HPos::Center, VPos::Center));
        overlay.draw_text(&text, &style, (w as i32 / 2, h as i32 / 2))?;
    }
    Ok(())
}

/// Draw `source` scaled to fit `area`, centered, aspect ratio kept
fn draw_fitted(area: &Area, source: &RgbImage) -> DrawResult<()> {
    let (w, h) = area.dim_in_pixel();
    let (sw, sh) = source.dimensions();
    if w == 0 || h == 0 || sw == 0 || sh == 0 {
        return Ok(());
    }

    let scale = f64::min(w as f64 / sw as f64, h as f64 / sh as f64);
    let fw = ((sw as f64 * scale) as u32).clamp(1, w);
    let fh = ((sh as f64 * scale) as u32).clamp(1, h);
    let resized = imageops::resize(source, fw, fh, FilterType::Triangle);
    let pos = (((w - fw) / 2) as i32, ((h - fh) / 2) as i32);

    let element: Option<BitMapElement<'_, (i32, i32)>> =
        BitMapElement::with_owned_buffer(pos, (fw, fh), resized.into_raw());
    if let Some(element) = element {
        area.draw(&element)?;
    }
    Ok(())
}

/// Vertical spans of a dashed marker from 0 to `top`
fn dash_spans(top: f64) -> impl Iterator<Item = (f64, f64)> {
    let step = top / MEAN_DASHES as f64;
    (0..MEAN_DASHES).map(move |i| {
        let lo = i as f64 * step;
        (lo, lo + step * 0.6)
    })
}

/// Bar chart of one distribution with a dashed marker at the mean
fn draw_plot(area: &Area, variant: ModelVariant, d: &ScoreDistribution) -> DrawResult<()> {
    let stats = ReportStatistics::of(d);
    let peak = d.values().iter().cloned().fold(0.0f64, f64::max);
    let y_max = if peak > 0.0 { peak * 1.1 } else { 1.0 };
    let x_range = 0.5f64..(RANKS as f64 + 0.5);

    let mut chart = ChartBuilder::on(area)
        .caption(plot_caption(variant, &stats), (FONT, 20))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range.clone(), 0.0f64..y_max)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(RANKS)
        .x_label_formatter(&|x: &f64| format!("{:.0}", x))
        .y_label_formatter(&|y: &f64| format!("{:.2}", y))
        .x_desc("Score")
        .y_desc("Probability")
        .draw()?;

    let color = variant_color(variant);
    chart.draw_series(d.ranked().map(|(rank, mass)| {
        let r = rank as f64;
        Rectangle::new(
            [(r - BAR_HALF_WIDTH, 0.0), (r + BAR_HALF_WIDTH, mass)],
            color.filled(),
        )
    }))?;

    let mean = stats.mean.clamp(x_range.start, x_range.end);
    chart.draw_series(
        dash_spans(y_max).map(|(lo, hi)| PathElement::new(vec![(mean, lo), (mean, hi)], RED.stroke_width(2))),
    )?;
    Ok(())
}
