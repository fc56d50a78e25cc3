//! Path prefix normalization and matching.
//!
//! # Responsibilities
//! - Canonicalize caller-supplied prefixes (leading `/`, no trailing `/`)
//! - Enumerate the prefixes a request path could match, longest first
//! - Strip a matched prefix from a request path
//!
//! # Design Decisions
//! - Matching is by whole segments; empty segments are ignored on both sides
//! - Path matching is case-sensitive
//! - No string `starts_with` checks: `/user` must not match `/username`

/// Non-empty `/`-separated segments of a path.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Canonical form of a prefix: `/a/b`. The root normalizes to `/`.
pub fn normalize_prefix(raw: &str) -> String {
    let mut normalized = String::with_capacity(raw.len() + 1);
    for segment in segments(raw) {
        normalized.push('/');
        normalized.push_str(segment);
    }
    if normalized.is_empty() {
        normalized.push('/');
    }
    normalized
}

/// True for the implicit default prefix.
pub fn is_root(prefix: &str) -> bool {
    prefix == "/"
}

/// Number of segments in a normalized prefix.
pub fn depth(prefix: &str) -> usize {
    segments(prefix).count()
}

/// Remove the first `count` segments from `path`.
///
/// The remainder always starts with `/`.
pub fn strip_segments(path: &str, count: usize) -> String {
    let mut rest = path;
    for _ in 0..count {
        rest = rest.trim_start_matches('/');
        let end = rest.find('/').unwrap_or(rest.len());
        rest = &rest[end..];
    }
    if rest.starts_with('/') {
        rest.to_string()
    } else {
        format!("/{}", rest)
    }
}

/// Candidate prefixes for a request path, most specific first.
///
/// `/user/alice/tree` yields `/user/alice/tree`, `/user/alice`, `/user`.
/// The root is never yielded.
pub fn candidates(path: &str) -> Candidates {
    let normalized = normalize_prefix(path);
    Candidates {
        current: (!is_root(&normalized)).then_some(normalized),
    }
}

/// Iterator returned by [`candidates`].
#[derive(Debug)]
pub struct Candidates {
    current: Option<String>,
}

impl Iterator for Candidates {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let current = self.current.take()?;
        self.current = match current.rfind('/') {
            Some(idx) if idx > 0 => Some(current[..idx].to_string()),
            _ => None,
        };
        Some(current)
    }
}
