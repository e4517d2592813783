use std::sync::Arc;

use time::{Date, OffsetDateTime};
use tracing::{debug, info, instrument, warn};

use super::repo::MealStore;
use super::repo_types::{MealDraft, MealKey, MealRecord, MealSlot, ZERO_KCAL};
use crate::config::IngestConfig;
use crate::errors::PersistenceError;
use crate::feed::{FeedQuery, FeedRow, MealFeed};
use crate::normalize::{normalize_nutrition, normalize_origin, split_dishes};

/// One ingestion call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestRequest {
    pub school_code: String,
    pub office_code: String,
    pub date: Date,
    pub slot: MealSlot,
    pub force_refresh: bool,
}

impl IngestRequest {
    pub fn lunch(school_code: &str, office_code: &str, date: Date) -> Self {
        Self {
            school_code: school_code.to_string(),
            office_code: office_code.to_string(),
            date,
            slot: MealSlot::Lunch,
            force_refresh: false,
        }
    }

    fn key(&self) -> MealKey {
        MealKey {
            school_code: self.school_code.clone(),
            meal_date: self.date,
            meal_slot: self.slot,
        }
    }
}

/// How a record was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Stored row returned without calling the feed.
    Cached,
    /// Feed had a row for the slot; normalized and written.
    Fetched,
    /// Feed answered but had nothing for the slot; sentinel written.
    NoData,
    /// Feed call failed; cached row returned or sentinel written.
    Degraded,
}

#[derive(Debug, Clone)]
pub struct Ingested {
    pub record: MealRecord,
    pub outcome: Outcome,
}

/// Fetch, normalize and persist one meal row.
///
/// Never fails because of the feed; the only error a caller sees is a
/// [`PersistenceError`].
pub struct IngestionCoordinator {
    feed: Arc<dyn MealFeed>,
    store: Arc<dyn MealStore>,
    config: IngestConfig,
}

impl IngestionCoordinator {
    pub fn new(feed: Arc<dyn MealFeed>, store: Arc<dyn MealStore>, config: IngestConfig) -> Self {
        Self {
            feed,
            store,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn MealStore> {
        &self.store
    }

    /// Lunch for a school on a date.
    pub async fn ingest(
        &self,
        school_code: &str,
        office_code: &str,
        date: Date,
    ) -> Result<MealRecord, PersistenceError> {
        self.ingest_slot(&IngestRequest::lunch(school_code, office_code, date))
            .await
    }

    pub async fn ingest_slot(&self, req: &IngestRequest) -> Result<MealRecord, PersistenceError> {
        Ok(self.run(req).await?.record)
    }

    #[instrument(
        skip(self),
        fields(school_code = %req.school_code, date = %req.date, slot = %req.slot)
    )]
    pub async fn run(&self, req: &IngestRequest) -> Result<Ingested, PersistenceError> {
        let key = req.key();
        let existing = self.store.find_by_key(&key).await?;

        if let Some(rec) = &existing {
            if !req.force_refresh && self.is_fresh(rec) {
                debug!(meal_id = %rec.id, "returning stored meal");
                return Ok(Ingested {
                    record: rec.clone(),
                    outcome: Outcome::Cached,
                });
            }
        }

        let query = FeedQuery {
            school_code: req.school_code.clone(),
            office_code: req.office_code.clone(),
            date: req.date,
        };

        let (draft, outcome) = match self.feed.fetch(&query).await {
            Ok(rows) => match rows.iter().find(|r| r.slot() == Some(req.slot)) {
                Some(row) => {
                    debug!(served_on = %row.served_on, "feed row selected");
                    let draft = draft_from_row(key.clone(), &req.office_code, row);
                    if draft.menu_items.is_empty() {
                        warn!("feed row had no usable dishes");
                        (MealDraft::sentinel(key, &req.office_code, existing.as_ref()), Outcome::NoData)
                    } else {
                        (draft, Outcome::Fetched)
                    }
                }
                None => {
                    debug!(rows = rows.len(), "no feed row for slot");
                    (MealDraft::sentinel(key, &req.office_code, existing.as_ref()), Outcome::NoData)
                }
            },
            Err(e) => {
                warn!(error = %e, "feed fetch failed");
                if let Some(rec) = existing {
                    return Ok(Ingested {
                        record: rec,
                        outcome: Outcome::Degraded,
                    });
                }
                (MealDraft::sentinel(key, &req.office_code, None), Outcome::Degraded)
            }
        };

        let record = self.persist(&draft).await?;
        info!(meal_id = %record.id, outcome = ?outcome, "meal ingested");
        Ok(Ingested { record, outcome })
    }

    /// Sentinels expire so a day that later gets a menu is picked up again.
    fn is_fresh(&self, rec: &MealRecord) -> bool {
        !rec.is_sentinel() || OffsetDateTime::now_utc() - rec.updated_at < self.config.sentinel_ttl()
    }

    async fn persist(&self, draft: &MealDraft) -> Result<MealRecord, PersistenceError> {
        // re-read: the feed call may have taken a while and another caller may have written
        if let Some(current) = self.store.find_by_key(&draft.key).await? {
            if self.store.has_dependents(current.id).await? {
                if let Some(updated) = self.store.update_in_place(current.id, draft).await? {
                    return Ok(updated);
                }
                warn!(meal_id = %current.id, "referenced meal vanished during update; upserting");
            }
        }
        self.store.upsert(draft).await
    }
}

fn draft_from_row(key: MealKey, office_code: &str, row: &FeedRow) -> MealDraft {
    let kcal = row.calories.trim();
    MealDraft {
        key,
        office_code: office_code.to_string(),
        menu_items: split_dishes(&row.dishes),
        kcal: if kcal.is_empty() { ZERO_KCAL.to_string() } else { kcal.to_string() },
        origin_info: normalize_origin(&row.origins),
        nutrition_info: normalize_nutrition(&row.nutrients),
    }
}
