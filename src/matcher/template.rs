// SPDX-License-Identifier: Apache-2.0

use regex::{Captures, Regex};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Group(usize),
}

/// Output template with `\0` to `\9` placeholders for capture groups.
///
/// A backslash followed by anything other than a digit is kept literally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTemplate {
    segments: Vec<Segment>,
}

impl OutputTemplate {
    pub fn parse(template: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '\\' {
                if let Some(digit) = chars.peek().and_then(|d| d.to_digit(10)) {
                    chars.next();
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Group(digit as usize));
                    continue;
                }
            }
            literal.push(c);
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Self { segments }
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Expand against a match. Groups that did not participate, or do not
    /// exist in the pattern, expand to nothing.
    pub fn expand(&self, caps: &Captures<'_>) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Group(i) => {
                    if let Some(m) = caps.get(*i) {
                        out.push_str(m.as_str());
                    }
                }
            }
        }
        out
    }
}

/// Optional extraction step applied to selected lines.
#[derive(Debug, Clone)]
pub struct ExtractionSpec {
    regex: Regex,
    template: Option<OutputTemplate>,
}

impl ExtractionSpec {
    pub fn new(pattern: &str, template: Option<&str>) -> Result<Self> {
        let regex = Regex::new(pattern)
            .map_err(|e| Error::Regex(format!("invalid extract pattern {:?}: {}", pattern, e)))?;
        let template = template
            .map(OutputTemplate::parse)
            .filter(|t| !t.is_empty());
        Ok(Self { regex, template })
    }

    /// The value for `line`, or `None` when the pattern does not match.
    pub fn extract(&self, line: &str) -> Option<String> {
        let caps = self.regex.captures(line)?;
        Some(match &self.template {
            Some(template) => template.expand(&caps),
            None => line.to_string(),
        })
    }
}
