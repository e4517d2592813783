use lazy_static::lazy_static;
use regex::Regex;

use super::normalize_breaks;

lazy_static! {
    // allergy codes and other annotations live inside any bracket pair; innermost first
    static ref BRACKETS_RE: Regex =
        Regex::new(r"\([^()]*\)|\[[^\[\]]*\]|\{[^{}]*\}|<[^<>]*>").unwrap();
    static ref UNIT_SUFFIX_RE: Regex = Regex::new(r"(?i)(?:[-.]\s*u|(^|[^a-z])u)$").unwrap();
    static ref COUNTER_SUFFIX_RE: Regex = Regex::new(r"[-~]\d+$").unwrap();
}

/// Cleans one dish name: drops bracketed annotations, then strips unit and
/// counter artifacts from every `/`-separated part.
pub fn clean_menu_item(raw: &str) -> String {
    let stripped = strip_brackets(raw);

    stripped
        .split('/')
        .map(clean_part)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Peels bracket pairs from the inside out until none are left.
fn strip_brackets(raw: &str) -> String {
    let mut text = raw.to_string();
    loop {
        let next = BRACKETS_RE.replace_all(&text, "").into_owned();
        if next == text {
            return text;
        }
        text = next;
    }
}

fn clean_part(part: &str) -> String {
    let part = part.trim();
    let part = UNIT_SUFFIX_RE.replace(part, "$1");
    let part = COUNTER_SUFFIX_RE.replace(part.trim_end(), "");
    part.trim().to_string()
}

/// Splits raw feed dish text on its line-break markers and cleans each dish,
/// dropping the ones that clean down to nothing.
pub fn split_dishes(raw: &str) -> Vec<String> {
    // breaks go first: they are angle-bracketed and would be eaten by the cleaner
    normalize_breaks(raw)
        .split('\n')
        .map(clean_menu_item)
        .filter(|d| !d.is_empty())
        .collect()
}
