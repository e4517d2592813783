//! Upstream school-meal feed (NEIS `mealServiceDietInfo`).

mod client;
mod envelope;

use async_trait::async_trait;
use serde::Deserialize;
use time::Date;

use crate::errors::FeedError;
use crate::meals::repo_types::MealSlot;

pub use client::NeisClient;
pub use envelope::decode_envelope;

/// One feed request: a school on a date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedQuery {
    pub school_code: String,
    pub office_code: String,
    pub date: Date,
}

/// Raw per-slot entry as the feed returns it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FeedRow {
    #[serde(rename = "MMEAL_SC_CODE", default)]
    pub slot_code: String,
    #[serde(rename = "MLSV_YMD", default)]
    pub served_on: String,
    #[serde(rename = "DDISH_NM", default)]
    pub dishes: String,
    #[serde(rename = "CAL_INFO", default)]
    pub calories: String,
    #[serde(rename = "NTR_INFO", default)]
    pub nutrients: String,
    #[serde(rename = "ORPLC_INFO", default)]
    pub origins: String,
}

impl FeedRow {
    pub fn slot(&self) -> Option<MealSlot> {
        MealSlot::from_feed_code(&self.slot_code)
    }
}

/// Source of raw meal rows. An empty vec means "no meals that day".
#[async_trait]
pub trait MealFeed: Send + Sync {
    async fn fetch(&self, query: &FeedQuery) -> Result<Vec<FeedRow>, FeedError>;
}
