// SPDX-License-Identifier: Apache-2.0

//! Settings of one monitored item.

use serde::Deserialize;
use std::time::Duration;

use crate::budget::{Budget, DEFAULT_MAX_LINES_PER_SECOND, MAX_LINES_PER_SECOND_LIMIT};
use crate::encoding::EncodingSpec;
use crate::error::{Error, Result};
use crate::input::PatternSyntax;
use crate::matcher::{Disposition, ExtractionSpec, MatchRule, Matcher, RuleAction};
use crate::source::{DEFAULT_MAX_LINE_LEN, LogSource, MIN_MAX_LINE_LEN};

/// One line-selection rule.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RuleConfig {
    /// Regular expression tested against each line
    pub pattern: String,

    #[serde(default)]
    pub action: RuleAction,

    /// Stop evaluating further rules when this one matches
    #[serde(default = "default_true")]
    pub stop: bool,

    #[serde(default = "default_true")]
    pub case_sensitive: bool,
}

impl RuleConfig {
    pub fn include(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            action: RuleAction::Include,
            stop: true,
            case_sensitive: true,
        }
    }

    pub fn exclude(pattern: impl Into<String>) -> Self {
        Self {
            action: RuleAction::Exclude,
            ..Self::include(pattern)
        }
    }
}

/// Configuration of a monitored log item
#[derive(Debug, Clone, Deserialize)]
pub struct LogSourceConfig {
    /// Character encoding of the files, empty for detection from the
    /// byte-order mark
    #[serde(default)]
    pub encoding: String,

    /// Ordered line-selection rules
    #[serde(default)]
    pub rules: Vec<RuleConfig>,

    /// Pattern applied to selected lines to extract the value
    #[serde(default)]
    pub extract_pattern: Option<String>,

    /// Value template with \0 to \9 back-references
    #[serde(default)]
    pub output_template: Option<String>,

    /// Maximum line length in bytes, longer lines are truncated
    #[serde(default = "default_max_line_len")]
    pub max_line_len: usize,

    /// Values sent per second
    #[serde(default = "default_max_lines_per_second")]
    pub max_lines_per_second: u32,

    /// Seconds between two polls of the item
    #[serde(default = "default_refresh_seconds")]
    pub refresh_seconds: u64,

    /// Syntax of the rotation pattern's file name
    #[serde(default)]
    pub pattern_syntax: PatternSyntax,

    /// Ignore data present before the first poll
    #[serde(default)]
    pub skip_old_data: bool,
}

fn default_true() -> bool {
    true
}

fn default_max_line_len() -> usize {
    DEFAULT_MAX_LINE_LEN
}

fn default_max_lines_per_second() -> u32 {
    DEFAULT_MAX_LINES_PER_SECOND
}

fn default_refresh_seconds() -> u64 {
    1
}

impl Default for LogSourceConfig {
    fn default() -> Self {
        Self {
            encoding: String::new(),
            rules: Vec::new(),
            extract_pattern: None,
            output_template: None,
            max_line_len: default_max_line_len(),
            max_lines_per_second: default_max_lines_per_second(),
            refresh_seconds: default_refresh_seconds(),
            pattern_syntax: PatternSyntax::default(),
            skip_old_data: false,
        }
    }
}

impl LogSourceConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_seconds)
    }

    /// Work limit of one poll.
    pub fn budget(&self) -> Budget {
        Budget::per_cycle(self.max_lines_per_second, self.refresh_seconds)
    }

    /// Validate the configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.max_line_len < MIN_MAX_LINE_LEN {
            return Err(format!(
                "max_line_len must be at least {} bytes",
                MIN_MAX_LINE_LEN
            ));
        }

        if !(1..=MAX_LINES_PER_SECOND_LIMIT).contains(&self.max_lines_per_second) {
            return Err(format!(
                "max_lines_per_second must be between 1 and {}",
                MAX_LINES_PER_SECOND_LIMIT
            ));
        }

        if self.refresh_seconds == 0 {
            return Err("refresh_seconds must be positive".to_string());
        }

        if self.output_template.is_some() && self.extract_pattern.is_none() {
            return Err("output_template requires extract_pattern".to_string());
        }

        if self.rules.iter().any(|r| r.pattern.is_empty()) {
            return Err("rule patterns cannot be empty".to_string());
        }

        Ok(())
    }

    /// Validate and compile into the settings used by the engine.
    pub fn build(&self) -> Result<LogSource> {
        self.validate().map_err(Error::Config)?;

        let encoding = EncodingSpec::from_name(&self.encoding)?;
        let rules = self
            .rules
            .iter()
            .map(|r| {
                MatchRule::new(
                    &r.pattern,
                    Disposition::new(r.action, r.stop),
                    r.case_sensitive,
                )
            })
            .collect::<Result<Vec<_>>>()?;
        let extraction = self
            .extract_pattern
            .as_deref()
            .map(|p| ExtractionSpec::new(p, self.output_template.as_deref()))
            .transpose()?;

        Ok(LogSource::new(encoding, Matcher::new(rules, extraction))
            .with_max_line_len(self.max_line_len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::Encoding;

    #[test]
    fn test_config_defaults() {
        let config: LogSourceConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.max_line_len, 256 * 1024);
        assert_eq!(config.max_lines_per_second, 100);
        assert_eq!(config.refresh_seconds, 1);
        assert_eq!(config.pattern_syntax, PatternSyntax::Glob);
        assert_eq!(config.budget(), Budget::new(400, 100));
    }

    #[test]
    fn test_config_validation() {
        let mut config = LogSourceConfig::default();
        assert!(config.validate().is_ok());

        config.max_line_len = 8;
        assert!(config.validate().is_err());

        config.max_line_len = 1024;
        config.max_lines_per_second = 0;
        assert!(config.validate().is_err());
        config.max_lines_per_second = 1001;
        assert!(config.validate().is_err());

        config.max_lines_per_second = 1000;
        config.output_template = Some(r"\1".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_rules() {
        let config: LogSourceConfig = serde_json::from_str(
            r#"{
                "encoding": "UTF-16",
                "rules": [
                    {"pattern": "DEBUG", "action": "exclude"},
                    {"pattern": "error", "case_sensitive": false}
                ],
                "extract_pattern": "code=(\\d+)",
                "output_template": "\\1",
                "pattern_syntax": "regex"
            }"#,
        )
        .unwrap();
        assert_eq!(config.rules[0], RuleConfig::exclude("DEBUG"));
        assert!(!config.rules[1].case_sensitive);
        assert_eq!(config.rules[1].action, RuleAction::Include);

        let source = config.build().unwrap();
        assert_eq!(source.encoding(), EncodingSpec::Fixed(Encoding::Utf16Le));
        assert_eq!(source.matcher().apply("ERROR code=7").as_deref(), Some("7"));
        assert_eq!(source.matcher().apply("DEBUG error code=7"), None);
    }

    #[test]
    fn test_build_rejects_bad_encoding() {
        let config = LogSourceConfig {
            encoding: "no-such-charset".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.build(), Err(Error::UnsupportedEncoding(_))));
    }

    #[test]
    fn test_build_rejects_bad_rule() {
        let config = LogSourceConfig {
            rules: vec![RuleConfig::include("(")],
            ..Default::default()
        };
        assert!(matches!(config.build(), Err(Error::Regex(_))));
    }
}
