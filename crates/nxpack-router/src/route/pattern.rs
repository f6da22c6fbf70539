//! Pattern parsing for Next.js route segments
//!
//! Pure functional parsing of manifest route patterns (`/posts/[id]`,
//! `/docs/[...slug]`, `/[[...path]]`) into typed segments.
//! All functions are **pure**: same input → same output, no side effects.

/// Represents the different kinds of route pattern segments
///
/// Dynamic variants carry the parameter name and whatever text follows the
/// closing bracket inside the same segment (data routes end in `.json`).
///
/// # Examples
///
/// ```
/// use nxpack_router::route::pattern::{classify_segment, PatternSegmentType};
///
/// assert!(matches!(classify_segment("about"), PatternSegmentType::Static(_)));
/// assert!(matches!(classify_segment("[id]"), PatternSegmentType::Dynamic { .. }));
/// assert!(matches!(classify_segment("[...slug]"), PatternSegmentType::CatchAll { .. }));
/// assert!(matches!(
///     classify_segment("[[...slug]].json"),
///     PatternSegmentType::OptionalCatchAll { .. }
/// ));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternSegmentType {
    /// Optional catch-all segment: `[[...slug]]`
    OptionalCatchAll { name: String, suffix: String },
    /// Catch-all segment: `[...slug]`
    CatchAll { name: String, suffix: String },
    /// Named parameter: `[id]`
    Dynamic { name: String, suffix: String },
    /// Static text segment
    Static(String),
}

impl PatternSegmentType {
    /// Whether the segment matches a variable part of the URL
    pub fn is_dynamic(&self) -> bool {
        !matches!(self, PatternSegmentType::Static(_))
    }
}

/// Classifies a single segment (pure function)
///
/// # Parsing Rules (evaluated in order)
///
/// 1. **Optional catch-all**: `[[...name]]` followed by an optional suffix
/// 2. **Catch-all**: `[...name]` followed by an optional suffix
/// 3. **Named parameter**: `[name]` followed by an optional suffix
/// 4. **Static**: any other text, including unbalanced brackets
pub fn classify_segment(segment: &str) -> PatternSegmentType {
    if let Some(rest) = segment.strip_prefix("[[...") {
        if let Some((name, suffix)) = rest.split_once("]]") {
            return PatternSegmentType::OptionalCatchAll {
                name: name.to_string(),
                suffix: suffix.to_string(),
            };
        }
    }

    match segment
        .strip_prefix('[')
        .and_then(|inner| inner.split_once(']'))
    {
        Some((inner, suffix)) => match inner.strip_prefix("...") {
            Some(name) => PatternSegmentType::CatchAll {
                name: name.to_string(),
                suffix: suffix.to_string(),
            },
            None => PatternSegmentType::Dynamic {
                name: inner.to_string(),
                suffix: suffix.to_string(),
            },
        },
        None => PatternSegmentType::Static(segment.to_string()),
    }
}

/// Whether any segment of `pattern` is dynamic
///
/// ```
/// use nxpack_router::route::pattern::is_dynamic_pattern;
///
/// assert!(is_dynamic_pattern("/posts/[id]"));
/// assert!(!is_dynamic_pattern("/posts/first"));
/// ```
pub fn is_dynamic_pattern(pattern: &str) -> bool {
    pattern
        .split('/')
        .filter(|s| !s.is_empty())
        .any(|s| classify_segment(s).is_dynamic())
}
