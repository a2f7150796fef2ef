//! Path patterns and path normalization for config spec rules
//!
//! Every path handled by the resolver is a *logical* path: rooted at `/`,
//! separated by `/`, with no empty or `.` segments. Patterns are normalized
//! the same way before they are compiled.
//!
//! A pattern matches a path when it matches the path itself or any of its
//! ancestor directories. This gives every pattern "directory and everything
//! beneath it" semantics: `/src`, `/src/` and `/src/**` all cover
//! `/src/a/b.rs`, and `/src/*` covers everything below each direct child of
//! `/src`. Precedence between overlapping patterns is not decided here.

use glob::{MatchOptions, Pattern};
use thiserror::Error;

/// Why a pattern was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("pattern is empty")]
    Empty,

    #[error("pattern escapes the repository root")]
    EscapesRoot,

    #[error("{0}")]
    InvalidGlob(String),
}

#[derive(Debug, Clone)]
enum PatternKind {
    /// `*` or `**` on its own: every path.
    Everything,
    /// A literal path; also covers descendants.
    Literal(String),
    /// Wildcard pattern, matched segment by segment.
    Glob(Pattern),
}

/// A compiled, normalized path pattern.
#[derive(Debug, Clone)]
pub struct PathPattern {
    normalized: String,
    kind: PatternKind,
}

impl PathPattern {
    /// Compile a raw pattern as written in a config spec.
    ///
    /// Relative patterns are anchored at the repository root. Trailing `/`
    /// and a trailing `/**` segment are dropped, since directory semantics
    /// already apply to every pattern. Any `..` segment is rejected.
    pub fn parse(raw: &str) -> Result<Self, PatternError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(PatternError::Empty);
        }

        let unified = trimmed.replace('\\', "/");
        if unified.split('/').any(|segment| segment == "..") {
            return Err(PatternError::EscapesRoot);
        }

        let mut normalized = normalize(&unified);
        while normalized.len() > 1 && normalized.ends_with("/**") {
            normalized.truncate(normalized.len() - 3);
            if normalized.is_empty() {
                normalized.push('/');
            }
        }

        let kind = if normalized == "/" || normalized == "/*" || normalized == "/**" {
            PatternKind::Everything
        } else if has_wildcard(&normalized) {
            let pattern =
                Pattern::new(&normalized).map_err(|e| PatternError::InvalidGlob(e.to_string()))?;
            PatternKind::Glob(pattern)
        } else {
            PatternKind::Literal(normalized.clone())
        };

        Ok(Self { normalized, kind })
    }

    /// The normalized text of this pattern.
    pub fn as_str(&self) -> &str {
        &self.normalized
    }

    /// Whether this pattern covers every path.
    pub fn is_universal(&self) -> bool {
        matches!(self.kind, PatternKind::Everything)
    }

    /// Test a path against this pattern.
    ///
    /// The path is normalized first, so `src\\lib.rs`, `/src//lib.rs` and
    /// `/src/lib.rs` all behave the same.
    pub fn matches(&self, path: &str, case_sensitive: bool) -> bool {
        if let PatternKind::Everything = self.kind {
            return true;
        }

        let path = normalize(path);
        let found = ancestors_and_self(&path).any(|node| self.matches_node(node, case_sensitive));
        found
    }

    fn matches_node(&self, node: &str, case_sensitive: bool) -> bool {
        match &self.kind {
            PatternKind::Everything => true,
            PatternKind::Literal(literal) => {
                if case_sensitive {
                    literal == node
                } else {
                    literal.to_lowercase() == node.to_lowercase()
                }
            }
            PatternKind::Glob(pattern) => {
                let options = MatchOptions {
                    case_sensitive,
                    require_literal_separator: true,
                    require_literal_leading_dot: false,
                };
                pattern.matches_with(node, options)
            }
        }
    }
}

impl PartialEq for PathPattern {
    fn eq(&self, other: &Self) -> bool {
        self.normalized == other.normalized
    }
}

impl Eq for PathPattern {}

impl std::fmt::Display for PathPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.normalized)
    }
}

/// Case-sensitive match of a path against a pattern.
pub fn matches(pattern: &PathPattern, path: &str) -> bool {
    pattern.matches(path, true)
}

/// Normalize a path to its logical form.
///
/// Backslashes become `/`, empty and `.` segments are dropped, and the
/// result always starts with `/`. The root itself normalizes to `/`.
pub fn normalize(path: &str) -> String {
    let unified = path.replace('\\', "/");
    let segments: Vec<&str> = unified
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect();

    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

/// Join a logical root (e.g. `/libs/core`) and a path relative to it.
pub fn join(root: &str, relative: &str) -> String {
    normalize(&format!("{}/{}", root, relative))
}

/// Number of segments in a normalized path (`/` has depth 0).
pub fn depth(path: &str) -> usize {
    path.split('/').filter(|segment| !segment.is_empty()).count()
}

/// Whether `path` is `prefix` or lies beneath it. Both must be normalized.
pub fn is_within(path: &str, prefix: &str) -> bool {
    if prefix == "/" {
        return true;
    }
    path == prefix
        || (path.starts_with(prefix) && path.as_bytes().get(prefix.len()) == Some(&b'/'))
}

fn has_wildcard(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

/// Yields `/a/b/c`, `/a/b`, `/a` for `/a/b/c`.
fn ancestors_and_self(path: &str) -> impl Iterator<Item = &str> {
    let mut current = Some(path);
    std::iter::from_fn(move || {
        let node = current?;
        current = match node.rfind('/') {
            Some(0) | None => None,
            Some(idx) => Some(&node[..idx]),
        };
        if node == "/" {
            None
        } else {
            Some(node)
        }
    })
}
