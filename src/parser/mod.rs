//! Output parser: turns assessment tool log text into score distributions.
//!
//! The parser is a two-register state machine. A section header sets the
//! active model variant, an image announcement sets the active image, and a
//! distribution line is attributed to whatever both registers hold at that
//! point. Registers persist across lines until overwritten.

pub mod patterns;

pub use patterns::{global_patterns, parse_payload, LinePatterns};

use crate::{
    image_identifier, insert_record, Error, ModelVariant, Result, ScoreDistribution, ScoreRecord,
    ScoreTable, Warning, WarningKind,
};

/// What a single line did to the parser
#[derive(Debug, Clone, PartialEq)]
pub enum LineEvent {
    /// Section header naming a known variant
    Header(ModelVariant),
    /// Section header naming something that is not a known variant
    UnknownHeader(String),
    /// Image announcement; holds the image identifier
    Image(String),
    /// Well-formed distribution attributed to the active image and variant
    Distribution(ScoreRecord),
    /// Distribution payload that did not parse
    Malformed { reason: String },
    /// Distribution line seen before an image or variant was announced
    Orphan,
    /// No structured information
    Ignored,
}

/// Registers carried from one line to the next
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParserState {
    pub current_model: Option<ModelVariant>,
    pub current_image: Option<String>,
}

impl ParserState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the state machine by one line. First matching pattern wins.
    pub fn step(&mut self, line: &str) -> LineEvent {
        let patterns = global_patterns();

        if let Some(word) = patterns.header_word(line) {
            let word = word.to_lowercase();
            return match word.parse::<ModelVariant>() {
                Ok(variant) => {
                    self.current_model = Some(variant);
                    LineEvent::Header(variant)
                }
                Err(_) => {
                    self.current_model = None;
                    LineEvent::UnknownHeader(word)
                }
            };
        }

        if let Some(name) = patterns.image_name(line) {
            let id = image_identifier(name);
            self.current_image = Some(id.clone());
            return LineEvent::Image(id);
        }

        if let Some(payload) = patterns.distribution_payload(line) {
            let (Some(image), Some(variant)) = (self.current_image.as_ref(), self.current_model)
            else {
                return LineEvent::Orphan;
            };
            return match parse_payload(payload) {
                Ok(distribution) => {
                    LineEvent::Distribution(ScoreRecord::new(image.clone(), variant, distribution))
                }
                Err(reason) => LineEvent::Malformed { reason },
            };
        }

        LineEvent::Ignored
    }
}

/// Result of parsing a whole capture
#[derive(Debug, Default)]
pub struct ParseOutcome {
    /// Extracted distributions; later lines overwrite earlier ones for the same key
    pub table: ScoreTable,
    /// Lines that were dropped, with the reason
    pub warnings: Vec<Warning>,
    /// Distribution lines seen before any image/variant was announced
    pub orphans: usize,
}

impl ParseOutcome {
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Number of (image, variant) records extracted
    pub fn record_count(&self) -> usize {
        self.table.values().map(|scores| scores.len()).sum()
    }

    fn apply(&mut self, line_no: usize, event: LineEvent) {
        match event {
            LineEvent::Distribution(record) => insert_record(&mut self.table, record),
            LineEvent::Malformed { reason } => {
                let err = Error::MalformedDistribution {
                    line: line_no,
                    reason,
                };
                self.warnings.push(Warning::new(
                    WarningKind::MalformedDistribution,
                    format!("line {}", line_no),
                    err.to_string(),
                ));
            }
            LineEvent::Orphan => {
                self.orphans += 1;
                self.warnings.push(Warning::new(
                    WarningKind::OrphanDistribution,
                    format!("line {}", line_no),
                    "distribution appears before any image and model header; dropped",
                ));
            }
            LineEvent::UnknownHeader(word) => {
                self.warnings.push(Warning::new(
                    WarningKind::UnknownVariant,
                    format!("line {}", line_no),
                    format!("unknown model variant `{}`", word),
                ));
            }
            LineEvent::Header(_) | LineEvent::Image(_) | LineEvent::Ignored => {}
        }
    }
}

/// Parse complete tool output
pub fn parse_output(text: &str) -> ParseOutcome {
    parse_lines(text.lines())
}

/// Parse an ordered sequence of lines
pub fn parse_lines<I, S>(lines: I) -> ParseOutcome
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut state = ParserState::new();
    let mut outcome = ParseOutcome::default();
    for (idx, line) in lines.into_iter().enumerate() {
        let event = state.step(line.as_ref());
        outcome.apply(idx + 1, event);
    }
    outcome
}

/// First distribution line in `text`, regardless of headers.
///
/// Used for predictor output, which reports exactly one image and variant.
/// Returns `Ok(None)` when no distribution line is present.
pub fn extract_distribution(text: &str) -> Result<Option<ScoreDistribution>> {
    let patterns = global_patterns();
    for (idx, line) in text.lines().enumerate() {
        if let Some(payload) = patterns.distribution_payload(line) {
            return parse_payload(payload)
                .map(Some)
                .map_err(|reason| Error::MalformedDistribution {
                    line: idx + 1,
                    reason,
                });
        }
    }
    Ok(None)
}
