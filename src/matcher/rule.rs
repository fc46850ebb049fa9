// SPDX-License-Identifier: Apache-2.0

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Whether a matching rule selects or rejects the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    #[default]
    Include,
    Exclude,
}

/// What happens to a line when a rule's pattern matches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    IncludeAndStop,
    IncludeAndContinue,
    ExcludeAndStop,
    ExcludeAndContinue,
}

impl Disposition {
    pub fn new(action: RuleAction, stop: bool) -> Self {
        match (action, stop) {
            (RuleAction::Include, true) => Disposition::IncludeAndStop,
            (RuleAction::Include, false) => Disposition::IncludeAndContinue,
            (RuleAction::Exclude, true) => Disposition::ExcludeAndStop,
            (RuleAction::Exclude, false) => Disposition::ExcludeAndContinue,
        }
    }

    pub fn includes(&self) -> bool {
        matches!(
            self,
            Disposition::IncludeAndStop | Disposition::IncludeAndContinue
        )
    }

    pub fn stops(&self) -> bool {
        matches!(
            self,
            Disposition::IncludeAndStop | Disposition::ExcludeAndStop
        )
    }
}

/// A compiled pattern with its disposition.
#[derive(Debug, Clone)]
pub struct MatchRule {
    regex: Regex,
    disposition: Disposition,
}

impl MatchRule {
    pub fn new(pattern: &str, disposition: Disposition, case_sensitive: bool) -> Result<Self> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(!case_sensitive)
            .build()
            .map_err(|e| Error::Regex(format!("invalid rule pattern {:?}: {}", pattern, e)))?;
        Ok(Self { regex, disposition })
    }

    pub fn disposition(&self) -> Disposition {
        self.disposition
    }

    pub fn is_match(&self, line: &str) -> bool {
        self.regex.is_match(line)
    }
}
