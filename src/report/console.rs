//! Console reporter with colored score tables

use colored::Colorize;

use crate::stats::{ImageSummary, ReportStatistics};
use crate::{ModelVariant, ScoreTable};

/// Reporter for terminal output
pub struct ConsoleReporter {
    /// Whether to use colors
    use_colors: bool,
    /// Whether to list the raw distribution under each variant
    verbose: bool,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self {
            use_colors: true,
            verbose: false,
        }
    }

    pub fn without_colors(mut self) -> Self {
        self.use_colors = false;
        self
    }

    pub fn verbose(mut self) -> Self {
        self.verbose = true;
        self
    }

    /// Print the score table followed by a summary
    pub fn report(&self, table: &ScoreTable) {
        print!("{}", self.render(table));
    }

    /// Score table as text, one block per image
    pub fn render(&self, table: &ScoreTable) -> String {
        let mut out = String::new();
        let mut overall = Vec::new();

        for (image, scores) in table {
            let summary = ImageSummary::new(image, scores);
            out.push_str(&format!("{}\n", self.bold(image)));
            for variant in ModelVariant::ALL {
                let Some(stats) = summary.get(variant) else {
                    continue;
                };
                out.push_str(&self.variant_line(variant, stats));
                if self.verbose {
                    if let Some(d) = scores.get(&variant) {
                        let values: Vec<String> =
                            d.values().iter().map(|v| format!("{:.3}", v)).collect();
                        out.push_str(&format!("      [{}]\n", values.join(", ")));
                    }
                }
            }
            if let Some(score) = summary.overall {
                overall.push(score);
                out.push_str(&format!(
                    "   {:<10} {}/10\n",
                    "Overall",
                    self.colorize_score(score, format!("{:.2}", score))
                ));
            }
            out.push('\n');
        }

        out.push_str(&self.summary(table.len(), &overall));
        out
    }

    fn variant_line(&self, variant: ModelVariant, stats: ReportStatistics) -> String {
        format!(
            "   {:<10} {} {} ± {:.2}\n",
            variant.label(),
            self.create_score_bar(stats.mean),
            self.colorize_score(stats.mean, format!("{:.2}", stats.mean)),
            stats.dispersion
        )
    }

    fn summary(&self, images: usize, overall: &[f64]) -> String {
        let mut out = format!("{}\n", "═".repeat(40));
        out.push_str(&format!("   Images scored: {}\n", images));
        if !overall.is_empty() {
            let average = overall.iter().sum::<f64>() / overall.len() as f64;
            out.push_str(&format!(
                "   Average score: {}/10\n",
                self.colorize_score(average, format!("{:.2}", average))
            ));
        }
        out
    }

    fn bold(&self, s: &str) -> String {
        if self.use_colors {
            s.bold().to_string()
        } else {
            s.to_string()
        }
    }

    fn colorize_score(&self, score: f64, text: String) -> String {
        if !self.use_colors {
            return text;
        }
        if score >= 7.0 {
            text.green().to_string()
        } else if score >= 5.0 {
            text.yellow().to_string()
        } else {
            text.red().to_string()
        }
    }

    /// Ten-cell bar for a score on the 1-10 scale
    fn create_score_bar(&self, score: f64) -> String {
        let filled = score.round().clamp(0.0, 10.0) as usize;
        format!("[{}{}]", "▓".repeat(filled), "░".repeat(10 - filled))
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ImageScores, ScoreDistribution};

    fn table() -> ScoreTable {
        let mut scores = ImageScores::new();
        scores.insert(ModelVariant::Aesthetic, ScoreDistribution::uniform());
        let mut table = ScoreTable::new();
        table.insert("photo1".to_string(), scores);
        table
    }

    #[test]
    fn renders_present_variants_and_overall() {
        let out = ConsoleReporter::new().without_colors().render(&table());
        assert!(out.contains("photo1"));
        assert!(out.contains("Aesthetic"));
        assert!(!out.contains("Technical"));
        assert!(out.contains("5.50 ± 2.87"));
        assert!(out.contains("Overall    5.50/10"));
        assert!(out.contains("Images scored: 1"));
    }

    #[test]
    fn verbose_lists_distribution() {
        let out = ConsoleReporter::new()
            .without_colors()
            .verbose()
            .render(&table());
        assert!(out.contains("[0.100, 0.100"));
    }

    #[test]
    fn empty_table_has_no_average() {
        let out = ConsoleReporter::new()
            .without_colors()
            .render(&ScoreTable::new());
        assert!(out.contains("Images scored: 0"));
        assert!(!out.contains("Average score"));
    }

    #[test]
    fn score_bar_is_clamped() {
        let reporter = ConsoleReporter::new();
        assert_eq!(reporter.create_score_bar(0.0), format!("[{}]", "░".repeat(10)));
        assert_eq!(reporter.create_score_bar(12.0), format!("[{}]", "▓".repeat(10)));
    }
}
