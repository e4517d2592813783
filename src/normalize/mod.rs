//! Pure text normalizers for the three free-form feed fields.
//!
//! Every function here is deterministic and holds no state, so the batch job
//! and the on-demand route can call them concurrently.

pub mod menu;
pub mod nutrition;
pub mod origin;

use lazy_static::lazy_static;
use regex::Regex;

pub use menu::split_dishes;
pub use nutrition::normalize_nutrition;
pub use origin::normalize_origin;

lazy_static! {
    static ref LINE_BREAK_RE: Regex = Regex::new(r"(?i)<br\s*/?>|\r\n|\r|\\n").unwrap();
}

/// Replaces the feed's `<br/>` markers (and stray CR / escaped newlines) with `\n`.
pub(crate) fn normalize_breaks(raw: &str) -> String {
    LINE_BREAK_RE.replace_all(raw, "\n").into_owned()
}

/// Normalized, trimmed, non-empty lines.
pub(crate) fn lines(raw: &str) -> Vec<String> {
    normalize_breaks(raw)
        .split('\n')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}
