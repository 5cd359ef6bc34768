//! Route pattern compilation.
//!
//! # Responsibilities
//! - Turn a relative source path into route segments
//! - Compile segments into a matcher with one capture per slug
//! - Extract slug values from a concrete request path
//!
//! # Design Decisions
//! - `#name` segments are dynamic; everything else is matched literally
//! - Matcher anchored at the end only, so overlapping prefixes are possible
//! - Compilation is pure: same segments, same pattern

use regex::Regex;
use std::path::{Component, Path};

/// Prefix marking a dynamic segment.
pub const SLUG_SIGIL: char = '#';

/// Error type for pattern compilation.
#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    #[error("segment `{0}` declares a slug without a name")]
    EmptySlug(String),

    #[error("slug `{0}` appears more than once in the same path")]
    DuplicateSlug(String),

    #[error("path `{0}` has no usable segments")]
    InvalidPath(String),

    #[error("failed to compile route matcher: {0}")]
    Regex(#[from] regex::Error),
}

/// A compiled route.
#[derive(Debug, Clone)]
pub struct RoutePattern {
    /// Segment names with extensions stripped; used for grouping and docs.
    logical_segments: Vec<String>,
    /// End-anchored matcher, one capture group per slug.
    matcher: Regex,
    /// Slug names in capture order.
    slug_names: Vec<String>,
    /// Unique key derived from the relative source path.
    source_key: String,
}

impl RoutePattern {
    /// Compile an ordered list of raw segments.
    ///
    /// An empty list compiles to a matcher for the root path.
    pub fn compile<S: AsRef<str>>(segments: &[S]) -> Result<Self, PatternError> {
        let mut expr = String::new();
        let mut logical_segments = Vec::with_capacity(segments.len());
        let mut slug_names: Vec<String> = Vec::new();

        for raw in segments {
            let name = segment_name(raw.as_ref());

            if let Some(slug) = name.strip_prefix(SLUG_SIGIL) {
                if slug.is_empty() {
                    return Err(PatternError::EmptySlug(raw.as_ref().to_string()));
                }
                if slug_names.iter().any(|s| s == slug) {
                    return Err(PatternError::DuplicateSlug(slug.to_string()));
                }
                expr.push_str("/(.*?)");
                slug_names.push(slug.to_string());
            } else {
                expr.push('/');
                expr.push_str(&regex::escape(name));
            }

            logical_segments.push(name.to_string());
        }

        let expr = if logical_segments.is_empty() {
            "^/?$".to_string()
        } else {
            format!("{expr}$")
        };

        let source_key = segments
            .iter()
            .map(|s| s.as_ref())
            .collect::<Vec<_>>()
            .join("/");

        Ok(Self {
            logical_segments,
            matcher: Regex::new(&expr)?,
            slug_names,
            source_key,
        })
    }

    /// Compile from a path relative to the watched root.
    pub fn from_relative_path(path: &Path) -> Result<Self, PatternError> {
        let segments = path_segments(path);
        if segments.is_empty() {
            return Err(PatternError::InvalidPath(path.display().to_string()));
        }
        Self::compile(&segments)
    }

    /// Replace the source key. Used for built-in endpoints that have no file.
    pub fn with_source_key(mut self, key: impl Into<String>) -> Self {
        self.source_key = key.into();
        self
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.matcher.is_match(path)
    }

    /// Captured slug values in slug order, or `None` if the path does not match.
    pub fn captures(&self, path: &str) -> Option<Vec<String>> {
        let caps = self.matcher.captures(path)?;
        Some(
            caps.iter()
                .skip(1)
                .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
                .collect(),
        )
    }

    pub fn logical_segments(&self) -> &[String] {
        &self.logical_segments
    }

    pub fn slug_names(&self) -> &[String] {
        &self.slug_names
    }

    pub fn source_key(&self) -> &str {
        &self.source_key
    }

    /// Source path without extensions, used to look up handler factories.
    pub fn unit_key(&self) -> String {
        self.logical_segments.join("/")
    }

    /// Human-facing route, e.g. `/users/#id`.
    pub fn display_path(&self) -> String {
        format!("/{}", self.logical_segments.join("/"))
    }

    /// Route in OpenAPI template form, e.g. `/users/{id}`.
    pub fn template_path(&self) -> String {
        let parts: Vec<String> = self
            .logical_segments
            .iter()
            .map(|s| match s.strip_prefix(SLUG_SIGIL) {
                Some(slug) => format!("{{{slug}}}"),
                None => s.clone(),
            })
            .collect();
        format!("/{}", parts.join("/"))
    }

    /// Number of capture groups in the compiled matcher.
    pub fn capture_count(&self) -> usize {
        self.matcher.captures_len() - 1
    }
}

/// Strip the last extension from a segment, keeping dot-files intact.
fn segment_name(raw: &str) -> &str {
    match raw.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => raw,
    }
}

/// Split a relative path into its normal components.
pub fn path_segments(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_slug_extraction() {
        let pattern = RoutePattern::compile(&["users", "#id", "posts", "#postId"]).unwrap();

        assert_eq!(pattern.slug_names(), &["id", "postId"]);
        assert_eq!(pattern.capture_count(), 2);
        assert_eq!(
            pattern.captures("/users/42/posts/7"),
            Some(vec!["42".to_string(), "7".to_string()])
        );
    }

    #[test]
    fn test_literal_segments() {
        let pattern = RoutePattern::compile(&["api", "health"]).unwrap();

        assert!(pattern.is_match("/api/health"));
        assert!(!pattern.is_match("/api/health/extra"));
        assert!(!pattern.is_match("/api"));
        assert_eq!(pattern.captures("/api/health"), Some(vec![]));
    }

    #[test]
    fn test_not_anchored_at_start() {
        let pattern = RoutePattern::compile(&["hello"]).unwrap();

        assert!(pattern.is_match("/hello"));
        assert!(pattern.is_match("/prefix/hello"));
        assert!(!pattern.is_match("/hello/"));
    }

    #[test]
    fn test_literal_is_escaped() {
        let pattern = RoutePattern::compile(&["a+b"]).unwrap();

        assert!(pattern.is_match("/a+b"));
        assert!(!pattern.is_match("/aab"));
    }

    #[test]
    fn test_extension_stripped() {
        let pattern = RoutePattern::from_relative_path(&PathBuf::from("users/#id.toml")).unwrap();

        assert_eq!(pattern.logical_segments(), &["users", "#id"]);
        assert_eq!(pattern.source_key(), "users/#id.toml");
        assert_eq!(pattern.unit_key(), "users/#id");
        assert_eq!(pattern.display_path(), "/users/#id");
        assert_eq!(pattern.template_path(), "/users/{id}");
        assert_eq!(pattern.captures("/users/abc"), Some(vec!["abc".to_string()]));
    }

    #[test]
    fn test_only_last_extension_stripped() {
        assert_eq!(segment_name("a.b.c"), "a.b");
        assert_eq!(segment_name(".hidden"), ".hidden");
        assert_eq!(segment_name("plain"), "plain");
    }

    #[test]
    fn test_empty_segments_match_root() {
        let pattern = RoutePattern::compile::<&str>(&[]).unwrap();

        assert!(pattern.is_match("/"));
        assert!(pattern.is_match(""));
        assert!(!pattern.is_match("/anything"));
        assert!(pattern.slug_names().is_empty());
    }

    #[test]
    fn test_compile_is_idempotent() {
        let segments = ["shop", "#category", "items", "#item"];
        let first = RoutePattern::compile(&segments).unwrap();
        let second = RoutePattern::compile(&segments).unwrap();

        let probes = [
            "/shop/books/items/1",
            "/shop//items/",
            "/x/shop/a/items/b",
            "/shop/books/items",
            "/shop/items/1",
            "/",
        ];
        for probe in probes {
            assert_eq!(first.is_match(probe), second.is_match(probe), "{probe}");
            assert_eq!(first.captures(probe), second.captures(probe), "{probe}");
        }
        assert_eq!(first.source_key(), second.source_key());
    }

    #[test]
    fn test_slug_may_be_empty_or_span_segments() {
        let pattern = RoutePattern::compile(&["files", "#rest"]).unwrap();

        assert_eq!(pattern.captures("/files/"), Some(vec![String::new()]));
        assert_eq!(pattern.captures("/files/a/b"), Some(vec!["a/b".to_string()]));
    }

    #[test]
    fn test_invalid_slugs_rejected() {
        assert!(matches!(
            RoutePattern::compile(&["#"]),
            Err(PatternError::EmptySlug(_))
        ));
        assert!(matches!(
            RoutePattern::compile(&["#id", "x", "#id"]),
            Err(PatternError::DuplicateSlug(s)) if s == "id"
        ));
        assert!(matches!(
            RoutePattern::from_relative_path(&PathBuf::from("")),
            Err(PatternError::InvalidPath(_))
        ));
    }
}
