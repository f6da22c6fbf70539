//! Regex dialect translation
//!
//! Next.js emits JavaScript regexes (lookahead, named groups, optional
//! locale prefixes written in a fixed shape). The platform's edge matcher
//! runs a simpler engine: no lookahead, positional captures only. These
//! helpers bridge the two.

pub mod ast;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

pub use ast::{Node, ParseError};

static NAMED_GROUP_OPENER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(\?P?<[A-Za-z_$][A-Za-z0-9_$]*>").expect("static regex"));

/// Mandatory → optional locale prefix, one pair per manifest generation
///
/// Next.js writes the `/<locale>` prefix of localized routes as a
/// mandatory group; edge matchers must also match the unprefixed default
/// locale, so the group gets a trailing `?`.
pub const LOCALE_SEGMENT_GENERATIONS: [(&str, &str); 2] = [
    // Next.js 13.1
    (
        r"(?:\/(_next\/data\/[^/]{1,}))?(?:\/([^/.]{1,}))",
        r"(?:\/(_next\/data\/[^/]{1,}))?(?:\/([^/.]{1,}))?",
    ),
    // Next.js 13.3
    (
        r"(?:\/(_next\/data\/[^/]{1,}))?(?:\/((?!_next\/)[^/.]{1,}))",
        r"(?:\/(_next\/data\/[^/]{1,}))?(?:\/((?!_next\/)[^/.]{1,}))?",
    ),
];

/// Removes every lookahead assertion from a regex
///
/// Returns the input unchanged (and logs a warning) when it cannot be
/// parsed; the platform may still accept it verbatim.
///
/// ```
/// use nxpack_router::dialect::strip_lookahead_assertions;
///
/// assert_eq!(
///     strip_lookahead_assertions(r"^/(?!_next)([^/]+)$"),
///     r"^/([^/]+)$"
/// );
/// assert_eq!(strip_lookahead_assertions("(unbalanced"), "(unbalanced");
/// ```
pub fn strip_lookahead_assertions(regex: &str) -> String {
    match Node::parse(regex) {
        Ok(node) if node.has_lookahead() => node.without_lookahead().to_string(),
        Ok(_) => regex.to_string(),
        Err(error) => {
            warn!(%regex, %error, "could not parse regex, leaving lookahead in place");
            regex.to_string()
        }
    }
}

/// Turns the first named capture group into a plain capture group
///
/// ```
/// use nxpack_router::dialect::rewrite_named_capture_groups;
///
/// assert_eq!(rewrite_named_capture_groups(r"^/(?<path>.*)$"), r"^/(.*)$");
/// assert_eq!(rewrite_named_capture_groups(r"(?<=a)b"), r"(?<=a)b");
/// ```
pub fn rewrite_named_capture_groups(regex: &str) -> String {
    NAMED_GROUP_OPENER.replacen(regex, 1, "(").into_owned()
}

/// Makes a localized route regex also match the unprefixed path
///
/// Applies each generation's substitution to its first occurrence. An
/// occurrence that is already optional is left alone.
///
/// ```
/// use nxpack_router::dialect::{make_locale_segment_optional, LOCALE_SEGMENT_GENERATIONS};
///
/// let (mandatory, optional) = LOCALE_SEGMENT_GENERATIONS[0];
/// let regex = format!("^{}\\/about$", mandatory);
/// assert_eq!(make_locale_segment_optional(&regex), format!("^{}\\/about$", optional));
/// ```
pub fn make_locale_segment_optional(regex: &str) -> String {
    LOCALE_SEGMENT_GENERATIONS
        .iter()
        .fold(regex.to_string(), |acc, (mandatory, optional)| {
            replace_first_mandatory(&acc, mandatory, optional)
        })
}

fn replace_first_mandatory(haystack: &str, mandatory: &str, optional: &str) -> String {
    let found = haystack
        .match_indices(mandatory)
        .map(|(start, _)| start)
        .find(|start| !haystack[start + mandatory.len()..].starts_with('?'));

    match found {
        Some(start) => {
            let mut out = String::with_capacity(haystack.len() + 1);
            out.push_str(&haystack[..start]);
            out.push_str(optional);
            out.push_str(&haystack[start + mandatory.len()..]);
            out
        }
        None => haystack.to_string(),
    }
}
