use serde::Deserialize;
use time::{macros::format_description, Date};

use super::repo_types::MealSlot;

/// Query string for `GET /meals/:school_code`.
#[derive(Debug, Deserialize)]
pub struct MealQuery {
    pub office_code: String,
    pub date: String, // YYYY-MM-DD
    #[serde(default)]
    pub slot: Option<String>,
    #[serde(default)]
    pub refresh: bool,
}

impl MealQuery {
    pub fn parsed_date(&self) -> Result<Date, String> {
        parse_date(&self.date)
    }

    pub fn parsed_slot(&self) -> Result<MealSlot, String> {
        match self.slot.as_deref() {
            None | Some("") => Ok(MealSlot::Lunch),
            Some(s) => s.parse(),
        }
    }
}

pub fn parse_date(raw: &str) -> Result<Date, String> {
    Date::parse(raw.trim(), format_description!("[year]-[month]-[day]"))
        .map_err(|e| format!("invalid date {raw:?}: {e}"))
}
