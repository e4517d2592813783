use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

/// Menu marker stored on days the feed had nothing for the slot.
pub const NO_DATA_MARKER: &str = "급식 정보가 없습니다";
/// Calorie value stored alongside [`NO_DATA_MARKER`].
pub const ZERO_KCAL: &str = "0 kcal";

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// Breakfast, lunch or dinner. The feed encodes these as "1", "2", "3".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "meal_slot", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MealSlot {
    Breakfast,
    Lunch,
    Dinner,
}

impl MealSlot {
    pub const ALL: [Self; 3] = [Self::Breakfast, Self::Lunch, Self::Dinner];

    pub fn from_feed_code(code: &str) -> Option<Self> {
        let code = code.trim();
        Self::ALL.into_iter().find(|slot| slot.feed_code() == code)
    }

    pub fn feed_code(self) -> &'static str {
        match self {
            Self::Breakfast => "1",
            Self::Lunch => "2",
            Self::Dinner => "3",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Breakfast => "breakfast",
            Self::Lunch => "lunch",
            Self::Dinner => "dinner",
        }
    }
}

impl fmt::Display for MealSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MealSlot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "breakfast" | "조식" | "1" => Ok(Self::Breakfast),
            "lunch" | "중식" | "2" => Ok(Self::Lunch),
            "dinner" | "석식" | "3" => Ok(Self::Dinner),
            other => Err(format!("unknown meal slot: {other}")),
        }
    }
}

/// Natural key of a meal row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MealKey {
    pub school_code: String,
    pub meal_date: Date,
    pub meal_slot: MealSlot,
}

/// One canonical meal row per (school, date, slot).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct MealRecord {
    pub id: Uuid,                       // stable once dependents exist
    pub school_code: String,
    pub office_code: String,
    #[serde(with = "iso_date")]
    pub meal_date: Date,
    pub meal_slot: MealSlot,
    pub menu_items: Vec<String>,
    pub kcal: String,                   // free-form, e.g. "650.3 Kcal"
    pub origin_info: Option<String>,
    pub nutrition_info: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl MealRecord {
    #[cfg(test)]
    pub fn key(&self) -> MealKey {
        MealKey {
            school_code: self.school_code.clone(),
            meal_date: self.meal_date,
            meal_slot: self.meal_slot,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.menu_items.len() == 1 && self.menu_items[0] == NO_DATA_MARKER
    }
}

/// Field values for a write; the store assigns `id` and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct MealDraft {
    pub key: MealKey,
    pub office_code: String,
    pub menu_items: Vec<String>,
    pub kcal: String,
    pub origin_info: Option<String>,
    pub nutrition_info: String,
}

impl MealDraft {
    /// "No data" row. Keeps whatever origin/nutrition text a previous record had.
    pub fn sentinel(key: MealKey, office_code: &str, previous: Option<&MealRecord>) -> Self {
        Self {
            key,
            office_code: office_code.to_string(),
            menu_items: vec![NO_DATA_MARKER.to_string()],
            kcal: ZERO_KCAL.to_string(),
            origin_info: previous.and_then(|p| p.origin_info.clone()),
            nutrition_info: previous
                .map(|p| p.nutrition_info.clone())
                .unwrap_or_default(),
        }
    }
}

/// A school the batch job walks over.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct School {
    pub school_code: String,
    pub office_code: String,
}
