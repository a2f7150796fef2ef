//! # Config Spec Parsing
//!
//! This module turns config spec text into an ordered list of [`Rule`]s.
//!
//! ## Format
//!
//! The format is line oriented. Blank lines and lines whose first
//! non-whitespace character is `#` are ignored. Every other line is a rule:
//!
//! ```text
//! [element] <pattern> <QUALIFIER> [<value>] [EXCLUDE]
//! ```
//!
//! - `element` is the optional ClearCase scope keyword.
//! - `<pattern>` is a path pattern (see [`crate::path`]). Patterns containing
//!   spaces are written in double quotes.
//! - `<QUALIFIER>` is one of `BRANCH <name>`, `TAG <name>`, `REVISION <id>`,
//!   `LATEST` or `ASOF <timestamp>`. Keywords are case-insensitive.
//! - A trailing `EXCLUDE` turns the rule into an exclusion. The qualifier is
//!   still validated but has no effect. `<pattern> EXCLUDE` with no qualifier
//!   is accepted as shorthand.
//!
//! Parsing is pure and fails closed: any malformed line rejects the whole
//! spec, and the error names the offending line.
//!
//! ## Example
//!
//! ```
//! use configspec::spec::{self, Action, VersionQualifier};
//!
//! let rules = spec::parse(
//!     "# release docs\n/docs/** TAG release-1\n/docs/internal/** EXCLUDE\n",
//! )
//! .unwrap();
//!
//! assert_eq!(rules.len(), 2);
//! assert_eq!(rules[0].qualifier, VersionQualifier::Tag("release-1".into()));
//! assert_eq!(rules[1].action, Action::Exclude);
//! assert_eq!(rules[1].source_line, 3);
//! ```

use std::fmt;
use std::path::Path;
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use log::debug;
use regex::Regex;
use thiserror::Error;

use crate::error::Result;
use crate::inventory::RevisionId;
use crate::path::{PathPattern, PatternError};

/// Errors produced while parsing a config spec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("line {line}: unknown qualifier keyword '{keyword}'")]
    UnknownQualifier { line: usize, keyword: String },

    #[error("line {line}: {keyword} requires a value")]
    MissingValue { line: usize, keyword: String },

    #[error("line {line}: expected a qualifier after pattern '{pattern}'")]
    MissingQualifier { line: usize, pattern: String },

    #[error("line {line}: unrecognized action '{token}' (only EXCLUDE is allowed)")]
    UnknownAction { line: usize, token: String },

    #[error("line {line}: invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        line: usize,
        pattern: String,
        source: PatternError,
    },

    #[error("line {line}: unterminated quote in '{text}'")]
    UnterminatedQuote { line: usize, text: String },

    #[error("line {line}: unexpected quote in pattern '{pattern}'")]
    StrayQuote { line: usize, pattern: String },

    #[error("line {line}: invalid timestamp '{value}'")]
    InvalidTimestamp { line: usize, value: String },
}

impl ParseError {
    /// The 1-based source line the error refers to.
    pub fn line(&self) -> usize {
        match self {
            ParseError::UnknownQualifier { line, .. }
            | ParseError::MissingValue { line, .. }
            | ParseError::MissingQualifier { line, .. }
            | ParseError::UnknownAction { line, .. }
            | ParseError::InvalidPattern { line, .. }
            | ParseError::UnterminatedQuote { line, .. }
            | ParseError::StrayQuote { line, .. }
            | ParseError::InvalidTimestamp { line, .. } => *line,
        }
    }
}

/// What a matching rule does with a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Select,
    Exclude,
}

/// Which revision a rule designates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionQualifier {
    Branch(String),
    Tag(String),
    Revision(RevisionId),
    Latest,
    AsOf(DateTime<Utc>),
}

impl fmt::Display for VersionQualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionQualifier::Branch(name) => write!(f, "BRANCH {}", name),
            VersionQualifier::Tag(name) => write!(f, "TAG {}", name),
            VersionQualifier::Revision(id) => write!(f, "REVISION {}", id),
            VersionQualifier::Latest => f.write_str("LATEST"),
            VersionQualifier::AsOf(at) => write!(f, "ASOF {}", at.to_rfc3339()),
        }
    }
}

/// One parsed config spec rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub pattern: PathPattern,
    pub qualifier: VersionQualifier,
    pub action: Action,
    /// 1-based line in the spec text.
    pub source_line: usize,
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.pattern, self.qualifier)?;
        if self.action == Action::Exclude {
            f.write_str(" EXCLUDE")?;
        }
        Ok(())
    }
}

fn comment_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(#.*)?$").expect("valid comment regex"))
}

fn rule_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?x)^\s*
               (?i:element\s+)?
               (?P<pattern>"[^"]*"|\S+)
               (?:\s+(?P<rest>.*?))?
               \s*$"#,
        )
        .expect("valid rule regex")
    })
}

/// Parse config spec text into rules, preserving authored order.
pub fn parse(text: &str) -> std::result::Result<Vec<Rule>, ParseError> {
    let mut rules = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        if comment_regex().is_match(line) {
            continue;
        }
        let rule = parse_line(line, line_no)?;
        debug!("line {}: {}", line_no, rule);
        rules.push(rule);
    }

    Ok(rules)
}

/// Read and parse a config spec file.
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Vec<Rule>> {
    let text = std::fs::read_to_string(path)?;
    Ok(parse(&text)?)
}

fn parse_line(line: &str, line_no: usize) -> std::result::Result<Rule, ParseError> {
    let captures = match rule_regex().captures(line) {
        Some(captures) => captures,
        None => {
            return Err(ParseError::MissingQualifier {
                line: line_no,
                pattern: line.trim().to_string(),
            })
        }
    };

    let raw_pattern = &captures["pattern"];
    if raw_pattern.starts_with('"') && (raw_pattern.len() < 2 || !raw_pattern.ends_with('"')) {
        return Err(ParseError::UnterminatedQuote {
            line: line_no,
            text: line.trim().to_string(),
        });
    }
    let raw_pattern = match raw_pattern.strip_prefix('"') {
        Some(quoted) => quoted.strip_suffix('"').unwrap_or(quoted),
        None if raw_pattern.contains('"') => {
            return Err(ParseError::StrayQuote {
                line: line_no,
                pattern: raw_pattern.to_string(),
            })
        }
        None => raw_pattern,
    };

    let pattern = PathPattern::parse(raw_pattern).map_err(|source| ParseError::InvalidPattern {
        line: line_no,
        pattern: raw_pattern.to_string(),
        source,
    })?;

    let rest = captures.name("rest").map(|m| m.as_str()).unwrap_or("");
    let mut tokens = rest.split_whitespace();

    let keyword = tokens.next().ok_or_else(|| ParseError::MissingQualifier {
        line: line_no,
        pattern: raw_pattern.to_string(),
    })?;

    let qualifier = match keyword.to_ascii_uppercase().as_str() {
        "EXCLUDE" => {
            // `<pattern> EXCLUDE` shorthand
            if let Some(extra) = tokens.next() {
                return Err(ParseError::UnknownAction {
                    line: line_no,
                    token: extra.to_string(),
                });
            }
            return Ok(Rule {
                pattern,
                qualifier: VersionQualifier::Latest,
                action: Action::Exclude,
                source_line: line_no,
            });
        }
        "LATEST" => VersionQualifier::Latest,
        "BRANCH" => VersionQualifier::Branch(value(&mut tokens, keyword, line_no)?.to_string()),
        "TAG" => VersionQualifier::Tag(value(&mut tokens, keyword, line_no)?.to_string()),
        "REVISION" => {
            VersionQualifier::Revision(RevisionId::new(value(&mut tokens, keyword, line_no)?))
        }
        "ASOF" => {
            let raw = value(&mut tokens, keyword, line_no)?;
            VersionQualifier::AsOf(parse_timestamp(raw).ok_or_else(|| {
                ParseError::InvalidTimestamp {
                    line: line_no,
                    value: raw.to_string(),
                }
            })?)
        }
        _ => {
            return Err(ParseError::UnknownQualifier {
                line: line_no,
                keyword: keyword.to_string(),
            })
        }
    };

    let action = match tokens.next() {
        None => Action::Select,
        Some(token) if token.eq_ignore_ascii_case("EXCLUDE") => Action::Exclude,
        Some(token) => {
            return Err(ParseError::UnknownAction {
                line: line_no,
                token: token.to_string(),
            })
        }
    };

    if let Some(extra) = tokens.next() {
        return Err(ParseError::UnknownAction {
            line: line_no,
            token: extra.to_string(),
        });
    }

    Ok(Rule {
        pattern,
        qualifier,
        action,
        source_line: line_no,
    })
}

fn value<'a>(
    tokens: &mut impl Iterator<Item = &'a str>,
    keyword: &str,
    line_no: usize,
) -> std::result::Result<&'a str, ParseError> {
    match tokens.next() {
        Some(token) if !token.eq_ignore_ascii_case("EXCLUDE") => Ok(token),
        _ => Err(ParseError::MissingValue {
            line: line_no,
            keyword: keyword.to_ascii_uppercase(),
        }),
    }
}

/// Parse an `ASOF` timestamp.
///
/// Accepts RFC 3339 (`2024-05-01T12:00:00Z`, any offset), a naive date-time
/// taken as UTC (`2024-05-01T12:00:00`), or a bare date, which stands for the
/// last second of that day in UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(23, 59, 59))
        .map(|naive| Utc.from_utc_datetime(&naive))
}
