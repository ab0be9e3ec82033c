//! Segment-wise path pattern matching.
//!
//! A pattern such as `/user/:userId/post/:postId` is split on `/` into literal and
//! parameter segments. A path matches when it has the same number of segments, every
//! literal segment is equal (case-sensitive), and every parameter segment binds the
//! corresponding path text verbatim. There is no prefix matching, no wildcard and no
//! trailing-slash normalisation: `/a/` and `/a` are different shapes.

use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

/// Sigil that marks a parameter segment in a pattern.
pub const PARAM_SIGIL: char = ':';

/// Maximum number of path parameters before heap allocation.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Path parameters extracted by a match, in pattern order.
///
/// Names are `Arc<str>` because they come from the registered pattern and are cloned
/// on every match; values are per-request text.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// One `/`-separated piece of a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Must equal the path segment exactly. May be empty (`//double//slash`).
    Literal(String),
    /// Binds the path segment under this name, whatever its contents.
    Param(Arc<str>),
}

/// A parsed route pattern. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    raw: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    /// Split `pattern` on `/` into segments.
    #[must_use]
    pub fn parse(pattern: &str) -> Self {
        let segments = pattern
            .split('/')
            .map(|part| match part.strip_prefix(PARAM_SIGIL) {
                Some(name) => Segment::Param(Arc::from(name)),
                None => Segment::Literal(part.to_string()),
            })
            .collect();
        Self {
            raw: pattern.to_string(),
            segments,
        }
    }

    /// The pattern text as registered.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Names of the parameter segments, in order.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(name) => Some(name.as_ref()),
            Segment::Literal(_) => None,
        })
    }

    /// Match a concrete path, returning the bound parameters on success.
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<ParamVec> {
        // Count first so a length mismatch costs no allocation
        if path.split('/').count() != self.segments.len() {
            return None;
        }

        let mut params = ParamVec::new();
        for (segment, part) in self.segments.iter().zip(path.split('/')) {
            match segment {
                Segment::Param(name) => params.push((Arc::clone(name), part.to_string())),
                Segment::Literal(literal) => {
                    if literal != part {
                        return None;
                    }
                }
            }
        }
        Some(params)
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<&str> for RoutePattern {
    fn from(pattern: &str) -> Self {
        Self::parse(pattern)
    }
}

/// Outcome of matching one pattern against one path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchResult {
    pub matched: bool,
    pub params: ParamVec,
}

impl MatchResult {
    /// Look up a bound parameter. Duplicate names resolve to the last occurrence.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Match an unparsed pattern against a path.
#[must_use]
pub fn match_pattern(pattern: &str, path: &str) -> MatchResult {
    match RoutePattern::parse(pattern).match_path(path) {
        Some(params) => MatchResult {
            matched: true,
            params,
        },
        None => MatchResult::default(),
    }
}
