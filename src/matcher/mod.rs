// SPDX-License-Identifier: Apache-2.0

//! Line selection and value extraction.
//!
//! Rules are evaluated in order against each decoded line. When at least one
//! include rule exists, a line is dropped unless some include rule picks it;
//! otherwise every line is kept unless an exclude rule rejects it.

mod rule;
mod template;

pub use rule::{Disposition, MatchRule, RuleAction};
pub use template::{ExtractionSpec, OutputTemplate};

#[derive(Debug, Clone, Default)]
pub struct Matcher {
    rules: Vec<MatchRule>,
    extraction: Option<ExtractionSpec>,
    has_include: bool,
}

impl Matcher {
    pub fn new(rules: Vec<MatchRule>, extraction: Option<ExtractionSpec>) -> Self {
        let has_include = rules.iter().any(|r| r.disposition().includes());
        Self {
            rules,
            extraction,
            has_include,
        }
    }

    /// Matcher that keeps every line unchanged.
    pub fn pass_all() -> Self {
        Self::default()
    }

    /// Value to emit for `line`, or `None` when the line is dropped.
    pub fn apply(&self, line: &str) -> Option<String> {
        if !self.selects(line) {
            return None;
        }
        match &self.extraction {
            Some(extraction) => extraction.extract(line),
            None => Some(line.to_string()),
        }
    }

    fn selects(&self, line: &str) -> bool {
        let mut selected = !self.has_include;
        for rule in &self.rules {
            if !rule.is_match(line) {
                continue;
            }
            let disposition = rule.disposition();
            if disposition.stops() {
                return disposition.includes();
            }
            selected = disposition.includes();
        }
        selected
    }
}
