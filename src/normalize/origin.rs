//! Origin-note normalization.
//!
//! Raw notes look like `쌀 : 국내산<br/>고춧가루 : 중국<br/>쇠고기(종류) : 국내산(한우)`.
//! The output groups ingredients by origin, one line per origin:
//!
//! ```text
//! 국내산 : 쇠고기, 쌀
//! 중국 : 고춧가루
//! ```

use std::collections::{BTreeMap, BTreeSet};

use lazy_static::lazy_static;
use regex::Regex;

use super::normalize_breaks;

/// Group label for domestic produce; always emitted first.
pub const DOMESTIC: &str = "국내산";
/// Header used when nothing could be grouped.
pub const FALLBACK_HEADER: &str = "원산지";

const DOMESTIC_LABELS: [&str; 2] = [DOMESTIC, "국산"];
const REMARKS: &str = "비고";
const PROCESSED_MARKERS: [&str; 2] = ["수산가공품", "식육가공품"];
const GENERIC_IMPORTED: [&str; 2] = ["수입산", "외국산"];
const FILLER_WORDS: [&str; 3] = ["등", "외", "기타"];
const PROCESSED_SUFFIXES: [&str; 2] = ["가공품", "가공"];

const BEEF: &str = "쇠고기";
const BEEF_TYPED: &str = "쇠고기(종류)";
const PREMIUM_BEEF: &str = "한우";
const TYPE_MARKER: &str = "(종류)";
const MEAT: &str = "고기";

const SEPARATOR: &str = " : ";
const EMPTY_LITERALS: [&str; 5] = ["[]", "()", "{}", "null", "\"\""];

lazy_static! {
    static ref PAREN_RE: Regex = Regex::new(r"\(([^)]*)\)").unwrap();
    static ref PAREN_TAIL_RE: Regex = Regex::new(r"\s*\(.*$").unwrap();
    // the ` : origin` tail closing one pair inside an unbroken blob
    static ref PAIR_END_RE: Regex = Regex::new(r"\s:\s[^\s(:]+(?:\([^)]*\))?").unwrap();
    // a domestic label standing on its own, so 외국산/중국산 do not count
    static ref DOMESTIC_LABEL_RE: Regex = Regex::new(&format!(
        r"(?:^|[^가-힣])(?:{})",
        DOMESTIC_LABELS.join("|")
    ))
    .unwrap();
}

#[derive(Debug, Default)]
struct OriginGroups {
    domestic: BTreeSet<String>,
    by_origin: BTreeMap<String, BTreeSet<String>>,
}

impl OriginGroups {
    fn add_domestic(&mut self, ingredient: &str) {
        let ingredient = ingredient.trim();
        if !ingredient.is_empty() {
            self.domestic.insert(ingredient.to_string());
        }
    }

    fn add(&mut self, origin: &str, ingredient: &str) {
        let (origin, ingredient) = (origin.trim(), ingredient.trim());
        if origin.is_empty() || ingredient.is_empty() {
            return;
        }
        self.by_origin
            .entry(origin.to_string())
            .or_default()
            .insert(ingredient.to_string());
    }

    fn is_empty(&self) -> bool {
        self.domestic.is_empty() && self.by_origin.values().all(BTreeSet::is_empty)
    }

    // BTree order is code-point order, which for precomposed Hangul is dictionary order.
    fn render(&self) -> String {
        let mut out = Vec::with_capacity(self.by_origin.len() + 1);
        if !self.domestic.is_empty() {
            out.push(render_group(DOMESTIC, &self.domestic));
        }
        for (origin, ingredients) in &self.by_origin {
            if !ingredients.is_empty() {
                out.push(render_group(origin, ingredients));
            }
        }
        out.join("\n").trim_end().to_string()
    }
}

fn render_group(origin: &str, ingredients: &BTreeSet<String>) -> String {
    let list = ingredients.iter().map(String::as_str).collect::<Vec<_>>();
    format!("{origin}{SEPARATOR}{}", list.join(", "))
}

/// Normalizes raw origin notes. Returns `None` when the input carries nothing
/// (blank, an empty array/bracket literal, or only remark, processed-food and
/// unpaired lines).
pub fn normalize_origin(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || EMPTY_LITERALS.contains(&trimmed) {
        return None;
    }

    let original: Vec<String> = split_lines(trimmed);
    if original.is_empty() {
        return None;
    }

    let filtered: Vec<&String> = original.iter().filter(|l| is_usable(l)).collect();

    let mut groups = OriginGroups::default();

    if original.iter().any(|l| mentions_domestic_beef(l)) {
        groups.add_domestic(BEEF);
    }

    for line in filtered.iter().filter(|l| !mentions_domestic_beef(l)) {
        if let Some((ingredient, origin)) = line.split_once(SEPARATOR) {
            classify(&mut groups, ingredient.trim(), origin.trim());
        }
    }

    if !groups.is_empty() {
        return Some(groups.render());
    }
    if filtered.is_empty() {
        return None;
    }

    // Nothing grouped: keep the usable lines as the feed wrote them.
    let verbatim: Vec<&str> = filtered.iter().map(|l| l.as_str()).collect();
    Some(format!("{FALLBACK_HEADER}\n{}", verbatim.join("\n")))
}

fn split_lines(raw: &str) -> Vec<String> {
    let text = normalize_breaks(raw);
    let text = if !text.contains('\n') && text.matches(SEPARATOR).count() > 1 {
        split_blob(&text)
    } else {
        text
    };
    text.split('\n')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Re-inserts line breaks into a note that arrived as a single line.
///
/// Origins are single words (optionally with a parenthetical), so each pair
/// ends right after its origin and the next ingredient, spaces included,
/// runs up to the following ` : `.
fn split_blob(text: &str) -> String {
    let mut pairs = Vec::new();
    let mut start = 0;
    for m in PAIR_END_RE.find_iter(text) {
        pairs.push(text[start..m.end()].trim());
        start = m.end();
    }
    let rest = text[start..].trim();
    if !rest.is_empty() {
        pairs.push(rest);
    }
    if pairs.len() > 1 {
        pairs.join("\n")
    } else {
        text.to_string()
    }
}

fn is_usable(line: &str) -> bool {
    !line.is_empty()
        && !line.starts_with(REMARKS)
        && !PROCESSED_MARKERS.iter().any(|m| line.contains(m))
        && line.contains(SEPARATOR)
}

fn mentions_domestic_beef(line: &str) -> bool {
    line.contains(PREMIUM_BEEF)
        || line.contains(BEEF_TYPED)
        || (line.contains(BEEF) && DOMESTIC_LABEL_RE.is_match(line))
}

fn classify(groups: &mut OriginGroups, ingredient: &str, origin: &str) {
    if DOMESTIC_LABELS.contains(&origin) {
        groups.add_domestic(ingredient);
        return;
    }

    if let Some(caps) = PAREN_RE.captures(origin) {
        let countries = country_tokens(&caps[1]);
        if !countries.is_empty() {
            for country in countries {
                groups.add(&country, ingredient);
            }
            return;
        }
    }

    let origin = PAREN_TAIL_RE.replace(origin, "");
    let origin = origin.trim();
    if origin.is_empty() || GENERIC_IMPORTED.contains(&origin) {
        return;
    }

    let ingredient = strip_processed(ingredient);
    if let Some(base) = ingredient.strip_suffix(TYPE_MARKER).map(str::trim) {
        if base == BEEF || ingredient.contains(PREMIUM_BEEF) {
            groups.add_domestic(BEEF);
        } else {
            groups.add(origin, base);
        }
        return;
    }
    groups.add(origin, &ingredient);
}

/// Country names inside a parenthetical, minus trailing "etc." fillers.
fn country_tokens(inner: &str) -> Vec<String> {
    inner
        .split(',')
        .map(strip_filler)
        .filter(|t| !t.is_empty())
        .collect()
}

fn strip_filler(token: &str) -> String {
    let mut words: Vec<&str> = token.split_whitespace().collect();
    while let Some(&last) = words.last() {
        if FILLER_WORDS.contains(&last) {
            words.pop();
        } else if let Some(stem) = FILLER_WORDS
            .iter()
            .find_map(|f| last.strip_suffix(f).filter(|s| s.chars().count() > 1))
        {
            // "호주등" written without a space
            let n = words.len();
            words[n - 1] = stem;
            break;
        } else {
            break;
        }
    }
    words.join(" ")
}

fn strip_processed(ingredient: &str) -> String {
    let mut out = ingredient.trim().to_string();
    for suffix in PROCESSED_SUFFIXES {
        if let Some(stem) = out.strip_suffix(suffix) {
            out = stem.trim_end().to_string();
            break;
        }
    }
    let doubled = MEAT.repeat(2);
    while out.ends_with(&doubled) {
        out.truncate(out.len() - MEAT.len());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_inputs_yield_none() {
        assert_eq!(normalize_origin(""), None);
        assert_eq!(normalize_origin("   "), None);
        assert_eq!(normalize_origin("[]"), None);
        assert_eq!(normalize_origin("()"), None);
        assert_eq!(normalize_origin("<br/>"), None);
    }

    #[test]
    fn domestic_first_and_typed_beef_folded() {
        let raw = "쇠고기(종류) : 국내산(한우)\n고춧가루 : 중국";
        assert_eq!(
            normalize_origin(raw).as_deref(),
            Some("국내산 : 쇠고기\n중국 : 고춧가루")
        );
    }

    #[test]
    fn groups_and_sorts_ingredients() {
        let raw = "쌀 : 국내산<br/>배추 : 국산<br/>고춧가루 : 중국<br/>낙지 : 중국<br/>오징어 : 페루<br/>고춧가루 : 중국";
        assert_eq!(
            normalize_origin(raw).as_deref(),
            Some("국내산 : 배추, 쌀\n중국 : 고춧가루, 낙지\n페루 : 오징어")
        );
    }

    #[test]
    fn processed_and_remark_lines_are_skipped() {
        let raw = "쌀 : 국내산<br/>수산가공품 : 어묵 : 국내산<br/>식육가공품(돼지고기) : 독일<br/>비고 : 원산지 변경 가능";
        assert_eq!(normalize_origin(raw).as_deref(), Some("국내산 : 쌀"));
    }

    #[test]
    fn parenthesized_countries_fan_out() {
        let raw = "돼지고기 : 수입산(미국, 캐나다 등)<br/>새우 : 수입산(베트남)";
        assert_eq!(
            normalize_origin(raw).as_deref(),
            Some("미국 : 돼지고기\n베트남 : 새우\n캐나다 : 돼지고기")
        );
    }

    #[test]
    fn generic_imported_labels_are_dropped() {
        let raw = "쌀 : 국내산<br/>옥수수 : 수입산<br/>밀 : 외국산()";
        assert_eq!(normalize_origin(raw).as_deref(), Some("국내산 : 쌀"));
    }

    #[test]
    fn processed_suffix_and_meat_repetition_are_stripped() {
        let raw = "돼지고기가공품 : 스페인<br/>오리고기고기 : 프랑스";
        assert_eq!(
            normalize_origin(raw).as_deref(),
            Some("스페인 : 돼지고기\n프랑스 : 오리고기")
        );
    }

    #[test]
    fn beef_with_domestic_label_forces_domestic_group() {
        let raw = "쇠고기 : 국내산(육우)<br/>쇠고기 : 호주산";
        // both lines mention beef; only the domestic one is special-cased
        assert_eq!(
            normalize_origin(raw).as_deref(),
            Some("국내산 : 쇠고기\n호주산 : 쇠고기")
        );
    }

    #[test]
    fn single_line_blob_is_split() {
        let raw = "쌀 : 국내산 김치류 : 국내산 고춧가루(김치류) : 중국";
        assert_eq!(
            normalize_origin(raw).as_deref(),
            Some("국내산 : 김치류, 쌀\n중국 : 고춧가루(김치류)")
        );
    }

    #[test]
    fn ungroupable_input_falls_back_to_verbatim_lines() {
        let raw = "옥수수 : 수입산<br/>밀 : 외국산<br/>어묵(수산가공품) : 국내산";
        assert_eq!(
            normalize_origin(raw).as_deref(),
            Some("원산지\n옥수수 : 수입산\n밀 : 외국산")
        );
    }

    #[test]
    fn excluded_lines_never_come_back_through_the_fallback() {
        assert_eq!(normalize_origin("어묵(수산가공품) : 국내산"), None);
        assert_eq!(normalize_origin("햄(식육가공품) : 국내산"), None);
        assert_eq!(normalize_origin("비고 : 해당 없음"), None);
        assert_eq!(normalize_origin("비고 : 해당 없음<br/>어묵(수산가공품) : 국내산"), None);
    }

    #[test]
    fn both_domestic_labels_fold_beef_the_same_way() {
        let long = normalize_origin("쇠고기 : 국내산(육우)<br/>고춧가루 : 중국");
        let short = normalize_origin("쇠고기 : 국산(육우)<br/>고춧가루 : 중국");
        assert_eq!(long.as_deref(), Some("국내산 : 쇠고기\n중국 : 고춧가루"));
        assert_eq!(short, long);
    }

    #[test]
    fn foreign_labels_containing_domestic_syllables_are_not_domestic() {
        assert_eq!(
            normalize_origin("쇠고기 : 외국산(호주)").as_deref(),
            Some("호주 : 쇠고기")
        );
        assert_eq!(
            normalize_origin("쇠고기 : 중국산").as_deref(),
            Some("중국산 : 쇠고기")
        );
    }

    #[test]
    fn blob_keeps_multi_word_ingredients() {
        let raw = "돼지 등뼈 : 국내산 쌀 : 국내산 낙지 : 수입산(중국)";
        assert_eq!(
            normalize_origin(raw).as_deref(),
            Some("국내산 : 돼지 등뼈, 쌀\n중국 : 낙지")
        );
    }

    #[test]
    fn filler_words_are_stripped_from_country_tokens() {
        assert_eq!(country_tokens("미국, 호주 등"), vec!["미국", "호주"]);
        assert_eq!(country_tokens("칠레, 노르웨이외"), vec!["칠레", "노르웨이"]);
        assert!(country_tokens("기타").is_empty());
    }
}
