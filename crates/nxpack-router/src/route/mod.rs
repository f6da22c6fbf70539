//! Route pattern parsing and translation
//!
//! Pure functional components:
//! - `pattern`: Next.js segment classification
//! - `translate`: Next.js pattern → platform rewrite pattern

pub mod pattern;
pub mod translate;

pub use pattern::{classify_segment, is_dynamic_pattern, PatternSegmentType};
pub use translate::{function_name_for_page, translate_dynamic_segments};
