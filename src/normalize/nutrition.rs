use std::cmp::Ordering;

use lazy_static::lazy_static;
use regex::Regex;

use super::lines;

/// Macros that always lead the output, in this order.
const HEADLINE: [&str; 3] = ["탄수화물", "단백질", "지방"];

lazy_static! {
    static ref UNIT_RE: Regex = Regex::new(r"^(.*?)\s*\(([^)]*)\)\s*$").unwrap();
    static ref NUMBER_RE: Regex = Regex::new(r"^[+-]?\d+(?:\.\d+)?").unwrap();
}

#[derive(Debug, Clone, PartialEq)]
struct NutrientEntry {
    name: String,
    value: f64,
    unit: Option<String>,
    headline: Option<usize>,
}

impl NutrientEntry {
    fn parse(line: &str) -> Option<Self> {
        let (label, value) = line.split_once(" : ")?;
        let label = label.trim();

        let (name, unit) = match UNIT_RE.captures(label) {
            Some(caps) => {
                let unit = caps[2].trim();
                (
                    caps[1].trim().to_string(),
                    (!unit.is_empty()).then(|| unit.to_string()),
                )
            }
            None => (label.to_string(), None),
        };
        if name.is_empty() {
            return None;
        }

        let headline = HEADLINE.iter().position(|h| *h == name);
        Some(Self {
            name,
            value: leading_number(value),
            unit,
            headline,
        })
    }

    fn render(&self) -> String {
        match &self.unit {
            Some(unit) => format!("{} : {}({})", self.name, self.value, unit),
            None => format!("{} : {}", self.name, self.value),
        }
    }
}

fn leading_number(raw: &str) -> f64 {
    let cleaned = raw.trim().replace(',', "");
    NUMBER_RE
        .find(&cleaned)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .unwrap_or(0.0)
}

/// Normalizes nutrient notes into `name : value(unit)` lines.
///
/// Carbohydrate, protein and fat come first in that fixed order (only the ones
/// present in the input are emitted), then a blank line, then every other
/// nutrient by descending value. Lines without a ` : ` separator are dropped.
pub fn normalize_nutrition(raw: &str) -> String {
    let entries: Vec<NutrientEntry> = lines(raw)
        .iter()
        .filter_map(|l| NutrientEntry::parse(l))
        .collect();

    let (mut headline, mut other): (Vec<_>, Vec<_>) =
        entries.into_iter().partition(|e| e.headline.is_some());

    headline.sort_by_key(|e| e.headline);
    // stable sort keeps input order between equal values
    other.sort_by(|a, b| b.value.partial_cmp(&a.value).unwrap_or(Ordering::Equal));

    let head_block = render_block(&headline);
    let other_block = render_block(&other);

    let out = match (head_block.is_empty(), other_block.is_empty()) {
        (false, false) => format!("{head_block}\n\n{other_block}"),
        (false, true) => head_block,
        (true, _) => other_block,
    };
    out.trim_end().to_string()
}

fn render_block(entries: &[NutrientEntry]) -> String {
    entries
        .iter()
        .map(NutrientEntry::render)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headline_first_then_blank_line_then_others() {
        let raw = "탄수화물(g) : 73.6\n단백질(g) : 10.2\n칼슘(mg) : 45";
        assert_eq!(
            normalize_nutrition(raw),
            "탄수화물 : 73.6(g)\n단백질 : 10.2(g)\n\n칼슘 : 45(mg)"
        );
    }

    #[test]
    fn headline_order_is_fixed_not_input_order() {
        let raw = "지방(g) : 12.1<br/>칼슘(mg) : 45<br/>단백질(g) : 10.2<br/>탄수화물(g) : 73.6";
        assert_eq!(
            normalize_nutrition(raw),
            "탄수화물 : 73.6(g)\n단백질 : 10.2(g)\n지방 : 12.1(g)\n\n칼슘 : 45(mg)"
        );
    }

    #[test]
    fn missing_macros_are_not_fabricated() {
        let out = normalize_nutrition("단백질(g) : 10.2");
        assert_eq!(out, "단백질 : 10.2(g)");
        assert!(!out.contains("지방"));
    }

    #[test]
    fn others_sorted_by_descending_value() {
        let raw = "비타민C(mg) : 8.1<br/>칼슘(mg) : 245.3<br/>철분(mg) : 2.4<br/>비타민A(R.E) : 103.7";
        assert_eq!(
            normalize_nutrition(raw),
            "칼슘 : 245.3(mg)\n비타민A : 103.7(R.E)\n비타민C : 8.1(mg)\n철분 : 2.4(mg)"
        );
    }

    #[test]
    fn unparsable_value_defaults_to_zero_and_unit_is_optional() {
        let raw = "티아민 : 없음\n나트륨(mg) : 1,024.5mg";
        assert_eq!(normalize_nutrition(raw), "나트륨 : 1024.5(mg)\n티아민 : 0");
    }

    #[test]
    fn lines_without_separator_are_dropped() {
        assert_eq!(normalize_nutrition("영양정보\n탄수화물(g) : 50"), "탄수화물 : 50(g)");
        assert_eq!(normalize_nutrition(""), "");
    }
}
