//! Route pattern matching.
//!
//! # Responsibilities
//! - Parse route patterns with bracket-delimited dynamic segments (`[id]`)
//! - Match request paths segment by segment and capture parameters
//! - Order patterns so literal segments beat dynamic ones
//!
//! # Design Decisions
//! - Matching is exact on segment count (no catch-all segments)
//! - Literal matching is case-sensitive
//! - Trailing slashes and empty segments are ignored
//! - Dot segments (`.`, `..`, and percent-encoded spellings) never match a capture
//! - No regex, so matching is linear in the number of segments

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

/// One segment of a route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Dynamic(String),
}

/// Error raised when a pattern cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    #[error("invalid dynamic segment {0:?}")]
    InvalidSegment(String),

    #[error("duplicate parameter {0:?}")]
    DuplicateParam(String),
}

/// A parsed route pattern such as `/api/news/[id]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    segments: Vec<Segment>,
}

impl RoutePattern {
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        let mut segments = Vec::new();
        let mut names: Vec<&str> = Vec::new();

        for raw in split_path(pattern) {
            let segment = if let Some(inner) = raw.strip_prefix('[') {
                let name = inner
                    .strip_suffix(']')
                    .filter(|name| is_param_name(name))
                    .ok_or_else(|| PatternError::InvalidSegment(raw.to_string()))?;
                if names.contains(&name) {
                    return Err(PatternError::DuplicateParam(name.to_string()));
                }
                names.push(name);
                Segment::Dynamic(name.to_string())
            } else if raw.contains('[') || raw.contains(']') {
                return Err(PatternError::InvalidSegment(raw.to_string()));
            } else {
                Segment::Literal(raw.to_string())
            };
            segments.push(segment);
        }

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Match a request path, returning captured parameters.
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let mut params = HashMap::new();
        let mut parts = split_path(path);

        for segment in &self.segments {
            let part = parts.next()?;
            match segment {
                Segment::Literal(literal) if literal == part => {}
                Segment::Literal(_) => return None,
                Segment::Dynamic(_) if is_dot_segment(part) => return None,
                Segment::Dynamic(name) => {
                    params.insert(name.clone(), part.to_string());
                }
            }
        }

        if parts.next().is_some() {
            return None;
        }
        Some(params)
    }

    /// Lookup order: longer patterns first, then literal-before-dynamic at
    /// the first differing position, then lexical for determinism.
    pub fn specificity_cmp(&self, other: &Self) -> Ordering {
        other
            .segments
            .len()
            .cmp(&self.segments.len())
            .then_with(|| {
                for (a, b) in self.segments.iter().zip(&other.segments) {
                    match (a, b) {
                        (Segment::Literal(_), Segment::Dynamic(_)) => return Ordering::Less,
                        (Segment::Dynamic(_), Segment::Literal(_)) => return Ordering::Greater,
                        _ => {}
                    }
                }
                Ordering::Equal
            })
            .then_with(|| self.to_string().cmp(&other.to_string()))
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            match segment {
                Segment::Literal(s) => write!(f, "/{s}")?,
                Segment::Dynamic(s) => write!(f, "/[{s}]")?,
            }
        }
        Ok(())
    }
}

/// `.` or `..`, including percent-encoded spellings such as `%2e%2E`.
pub fn is_dot_segment(segment: &str) -> bool {
    let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
    decoded == "." || decoded == ".."
}

/// True when any segment of `path` is a dot segment.
pub fn has_dot_segment(path: &str) -> bool {
    path.split('/').any(is_dot_segment)
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn is_param_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
