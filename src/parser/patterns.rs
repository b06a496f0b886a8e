//! Line patterns recognized in assessment tool output

use regex::Regex;
use std::sync::OnceLock;

use crate::{ScoreDistribution, RANKS};

/// Compiled patterns for the three kinds of structured lines
pub struct LinePatterns {
    /// `===== Evaluating aesthetic quality` section header
    pub header: Regex,
    /// `Evaluating: photo1.jpg` image announcement
    pub image: Regex,
    /// `Predicted score distribution: [0.1, ...]` payload
    pub distribution: Regex,
}

impl LinePatterns {
    pub fn new() -> Self {
        Self {
            header: Regex::new(r"===== Evaluating (\w+) quality").unwrap(),
            image: Regex::new(r"Evaluating: ([\w.\-]+)").unwrap(),
            distribution: Regex::new(r"Predicted score distribution: \[([^\]]*)\]").unwrap(),
        }
    }

    /// Captured variant word of a header line
    pub fn header_word<'a>(&self, line: &'a str) -> Option<&'a str> {
        self.header
            .captures(line)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
    }

    /// Captured file name of an image announcement
    pub fn image_name<'a>(&self, line: &'a str) -> Option<&'a str> {
        self.image
            .captures(line)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
    }

    /// Text between the brackets of a distribution line
    pub fn distribution_payload<'a>(&self, line: &'a str) -> Option<&'a str> {
        self.distribution
            .captures(line)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
    }
}

impl Default for LinePatterns {
    fn default() -> Self {
        Self::new()
    }
}

/// Global pattern set (compile once per process).
pub fn global_patterns() -> &'static LinePatterns {
    static PATTERNS: OnceLock<LinePatterns> = OnceLock::new();
    PATTERNS.get_or_init(LinePatterns::new)
}

/// Parse a comma-separated payload into a distribution.
///
/// Every token must be numeric and there must be exactly ten of them;
/// the error string says which condition failed.
pub fn parse_payload(payload: &str) -> Result<ScoreDistribution, String> {
    let payload = payload.trim();
    let mut values = Vec::with_capacity(RANKS);
    if !payload.is_empty() {
        for token in payload.split(',') {
            let token = token.trim();
            let value: f64 = token
                .parse()
                .map_err(|_| format!("token `{}` is not numeric", token))?;
            values.push(value);
        }
    }
    if values.len() != RANKS {
        return Err(format!("expected {} values, got {}", RANKS, values.len()));
    }
    ScoreDistribution::new(&values).map_err(|e| e.to_string())
}
