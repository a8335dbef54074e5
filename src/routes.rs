//! Route templates and path matching.
//!
//! Route ids are file-system style templates such as `/project/[id]`.
//! Supported segment forms:
//! - `chat`: static segment, matched literally
//! - `[id]`: exactly one dynamic segment
//! - `[...rest]`: catch-all, one or more segments
//! - `[[...rest]]`: optional catch-all, zero or more segments
//! - `(group)`: route group, does not appear in the URL

use std::collections::HashMap;
use std::fmt;

use crate::error::{CacheError, CacheResult};

const EMPTY_PARAM: &str = "empty parameter name";

/// One parsed segment of a route template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Static(String),
    Dynamic(String),
    CatchAll(String),
    OptionalCatchAll(String),
}

/// A compiled route template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    template: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    /// Parse a template like `/project/[id]`.
    pub fn parse(template: &str) -> CacheResult<Self> {
        let invalid = |reason: &str| CacheError::InvalidRoutePattern {
            pattern: template.to_string(),
            reason: reason.to_string(),
        };

        if !template.starts_with('/') {
            return Err(invalid("must start with '/'"));
        }

        let mut segments = Vec::new();
        for raw in template.split('/').filter(|s| !s.is_empty()) {
            if raw.starts_with('(') && raw.ends_with(')') {
                continue;
            }
            let segment = if let Some(inner) = raw
                .strip_prefix("[[...")
                .and_then(|s| s.strip_suffix("]]"))
            {
                Segment::OptionalCatchAll(param_name(inner).ok_or_else(|| invalid(EMPTY_PARAM))?)
            } else if let Some(inner) = raw.strip_prefix("[...").and_then(|s| s.strip_suffix(']')) {
                Segment::CatchAll(param_name(inner).ok_or_else(|| invalid(EMPTY_PARAM))?)
            } else if let Some(inner) = raw.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
                Segment::Dynamic(param_name(inner).ok_or_else(|| invalid(EMPTY_PARAM))?)
            } else if raw.contains(['[', ']']) {
                return Err(invalid("unbalanced brackets"));
            } else {
                Segment::Static(raw.to_string())
            };

            if matches!(
                segments.last(),
                Some(Segment::CatchAll(_)) | Some(Segment::OptionalCatchAll(_))
            ) {
                return Err(invalid("catch-all segment must be last"));
            }
            segments.push(segment);
        }

        Ok(Self {
            template: template.to_string(),
            segments,
        })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Whether `path` is served by this route.
    ///
    /// Query strings, fragments and trailing slashes are ignored.
    pub fn test(&self, path: &str) -> bool {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        let mut i = 0;
        for segment in &self.segments {
            match segment {
                Segment::Static(expected) => {
                    if parts.get(i) != Some(&expected.as_str()) {
                        return false;
                    }
                    i += 1;
                }
                Segment::Dynamic(_) => {
                    if i >= parts.len() {
                        return false;
                    }
                    i += 1;
                }
                Segment::CatchAll(_) => return i < parts.len(),
                Segment::OptionalCatchAll(_) => return true,
            }
        }
        i == parts.len()
    }
}

fn param_name(inner: &str) -> Option<String> {
    let name = inner.trim();
    if name.is_empty() || name.contains(['[', ']', '/']) {
        None
    } else {
        Some(name.to_string())
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.template)
    }
}

/// Maps a route id to the pattern that decides whether it is still current.
pub trait RouteResolver: Send + Sync {
    fn pattern_of(&self, route_id: &str) -> Option<RoutePattern>;
}

/// Explicitly registered patterns, falling back to parsing the route id
/// itself as a template.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    patterns: HashMap<String, RoutePattern>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from a list of templates, each registered under its own
    /// text as the route id.
    pub fn from_templates<I, S>(templates: I) -> CacheResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut table = Self::new();
        for template in templates {
            let template = template.as_ref();
            table.insert(template, RoutePattern::parse(template)?);
        }
        Ok(table)
    }

    /// Register `pattern` for `route_id`, replacing any previous entry.
    pub fn insert(&mut self, route_id: impl Into<String>, pattern: RoutePattern) {
        self.patterns.insert(route_id.into(), pattern);
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl RouteResolver for RouteTable {
    fn pattern_of(&self, route_id: &str) -> Option<RoutePattern> {
        if let Some(pattern) = self.patterns.get(route_id) {
            return Some(pattern.clone());
        }
        RoutePattern::parse(route_id).ok()
    }
}
