//! Path pattern matching.
//!
//! # Responsibilities
//! - Parse route path patterns once at startup
//! - Match request paths segment by segment
//! - Decide whether one pattern covers another (shadow detection)
//! - Spot dot segments and encoded separators in request paths
//!
//! # Design Decisions
//! - `*` matches exactly one non-empty segment
//! - A trailing `**` matches zero or more remaining segments
//! - Empty segments are ignored, so `/a//b/` and `/a/b` are the same path
//! - Path matching is case-sensitive
//! - No regex, matching is a single pass over the segments

use thiserror::Error;

/// Errors produced while parsing a path pattern.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("pattern is empty")]
    Empty,

    #[error("pattern '{0}' must start with '/'")]
    MissingLeadingSlash(String),

    #[error("pattern '{0}' uses '**' before the last segment")]
    MisplacedRest(String),

    #[error("pattern '{0}' mixes a wildcard with literal text in one segment")]
    PartialWildcard(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// `*`
    One,
    /// trailing `**`
    Rest,
}

/// A compiled path pattern such as `/api/products/**` or `/api/users/*/orders`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Parse a pattern.
    pub fn parse(raw: &str) -> Result<Self, PatternError> {
        if raw.is_empty() {
            return Err(PatternError::Empty);
        }
        if !raw.starts_with('/') {
            return Err(PatternError::MissingLeadingSlash(raw.to_string()));
        }

        let parts: Vec<&str> = raw.split('/').filter(|s| !s.is_empty()).collect();
        let mut segments = Vec::with_capacity(parts.len());

        for (i, part) in parts.iter().enumerate() {
            let segment = match *part {
                "**" if i + 1 == parts.len() => Segment::Rest,
                "**" => return Err(PatternError::MisplacedRest(raw.to_string())),
                "*" => Segment::One,
                p if p.contains('*') => return Err(PatternError::PartialWildcard(raw.to_string())),
                p => Segment::Literal(p.to_string()),
            };
            segments.push(segment);
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// The pattern as written in configuration.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns true if `path` matches this pattern.
    pub fn matches(&self, path: &str) -> bool {
        let mut parts = path.split('/').filter(|s| !s.is_empty());

        for segment in &self.segments {
            match segment {
                Segment::Rest => return true,
                Segment::One => {
                    if parts.next().is_none() {
                        return false;
                    }
                }
                Segment::Literal(expected) => match parts.next() {
                    Some(actual) if actual == expected => {}
                    _ => return false,
                },
            }
        }

        parts.next().is_none()
    }

    /// Returns true if every path matched by `other` is also matched by `self`.
    pub fn covers(&self, other: &PathPattern) -> bool {
        for (i, segment) in self.segments.iter().enumerate() {
            let theirs = other.segments.get(i);
            match (segment, theirs) {
                (Segment::Rest, _) => return true,
                (Segment::One, Some(Segment::One | Segment::Literal(_))) => {}
                (Segment::Literal(a), Some(Segment::Literal(b))) if a == b => {}
                _ => return false,
            }
        }

        other.segments.len() == self.segments.len()
    }
}

/// Returns true if any segment of `path` could be resolved as `.`/`..` or split
/// further by a backend, including percent-encoded forms.
pub fn has_unsafe_segment(path: &str) -> bool {
    path.split('/').any(|segment| {
        let lowered = segment.to_ascii_lowercase();
        if lowered.contains("%2f") || lowered.contains("%5c") || lowered.contains('\\') {
            return true;
        }
        matches!(lowered.replace("%2e", ".").as_str(), "." | "..")
    })
}

impl std::fmt::Display for PathPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(raw: &str) -> PathPattern {
        PathPattern::parse(raw).unwrap()
    }

    #[test]
    fn test_unsafe_segments() {
        assert!(has_unsafe_segment("/api/products/../admin/reports"));
        assert!(has_unsafe_segment("/api/products/./5"));
        assert!(has_unsafe_segment("/api/products/%2e%2E/admin"));
        assert!(has_unsafe_segment("/api/products/.%2e/admin"));
        assert!(has_unsafe_segment("/api/products/..%2Fadmin/reports"));
        assert!(has_unsafe_segment("/api/products/..%5cadmin"));

        assert!(!has_unsafe_segment("/api/products/5"));
        assert!(!has_unsafe_segment("/api/products/v1.2/..info"));
        assert!(!has_unsafe_segment("/"));
    }

    #[test]
    fn test_literal_pattern() {
        let pattern = p("/api/auth/login");
        assert!(pattern.matches("/api/auth/login"));
        assert!(pattern.matches("/api/auth/login/"));
        assert!(!pattern.matches("/api/auth/login/extra"));
        assert!(!pattern.matches("/api/auth"));
        assert!(!pattern.matches("/API/auth/login"));
    }

    #[test]
    fn test_single_segment_wildcard() {
        let pattern = p("/api/users/*");
        assert!(pattern.matches("/api/users/7"));
        assert!(!pattern.matches("/api/users"));
        assert!(!pattern.matches("/api/users/7/orders"));

        let middle = p("/api/users/*/orders");
        assert!(middle.matches("/api/users/7/orders"));
        assert!(!middle.matches("/api/users/orders"));
    }

    #[test]
    fn test_trailing_rest_wildcard() {
        let pattern = p("/api/products/**");
        assert!(pattern.matches("/api/products"));
        assert!(pattern.matches("/api/products/5"));
        assert!(pattern.matches("/api/products/5/reviews/2"));
        assert!(!pattern.matches("/api/productsx"));
        assert!(!pattern.matches("/api/carts/1"));

        assert!(p("/**").matches("/"));
        assert!(p("/**").matches("/anything/at/all"));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(PathPattern::parse(""), Err(PatternError::Empty));
        assert!(matches!(
            PathPattern::parse("api/x"),
            Err(PatternError::MissingLeadingSlash(_))
        ));
        assert!(matches!(
            PathPattern::parse("/api/**/x"),
            Err(PatternError::MisplacedRest(_))
        ));
        assert!(matches!(
            PathPattern::parse("/api/prod*"),
            Err(PatternError::PartialWildcard(_))
        ));
    }

    #[test]
    fn test_covers() {
        assert!(p("/api/carts/**").covers(&p("/api/carts/current")));
        assert!(p("/api/carts/**").covers(&p("/api/carts/**")));
        assert!(p("/api/carts/*").covers(&p("/api/carts/current")));
        assert!(p("/api/carts/**").covers(&p("/api/carts")));

        assert!(!p("/api/carts/current").covers(&p("/api/carts/**")));
        assert!(!p("/api/carts/*").covers(&p("/api/carts/**")));
        assert!(!p("/api/carts").covers(&p("/api/carts/current")));
        assert!(!p("/api/orders/**").covers(&p("/api/carts/current")));
    }
}
