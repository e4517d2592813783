use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{MealDraft, MealKey, MealRecord, School};
use crate::errors::PersistenceError;

const MEAL_COLUMNS: &str = "id, school_code, office_code, meal_date, meal_slot, menu_items, \
                            kcal, origin_info, nutrition_info, created_at, updated_at";

/// Backing store for meal rows.
#[async_trait]
pub trait MealStore: Send + Sync {
    async fn find_by_key(&self, key: &MealKey) -> Result<Option<MealRecord>, PersistenceError>;

    /// Whether a photo, rating or quiz points at this meal.
    async fn has_dependents(&self, meal_id: Uuid) -> Result<bool, PersistenceError>;

    /// Overwrites every field of the row with this id. `None` if the row is gone.
    async fn update_in_place(
        &self,
        id: Uuid,
        draft: &MealDraft,
    ) -> Result<Option<MealRecord>, PersistenceError>;

    /// Single conflict-resolving write on (school_code, meal_date, meal_slot).
    async fn upsert(&self, draft: &MealDraft) -> Result<MealRecord, PersistenceError>;

    async fn list_schools(&self) -> Result<Vec<School>, PersistenceError>;
}

#[derive(Clone)]
pub struct PgMealStore {
    db: PgPool,
    timeout: Duration,
}

impl PgMealStore {
    pub fn new(db: PgPool, timeout: Duration) -> Self {
        Self { db, timeout }
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, PersistenceError>
    where
        F: Future<Output = Result<T, sqlx::Error>> + Send,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(res) => res.map_err(PersistenceError::from),
            Err(_) => Err(PersistenceError::Timeout(self.timeout.as_secs())),
        }
    }
}

#[async_trait]
impl MealStore for PgMealStore {
    async fn find_by_key(&self, key: &MealKey) -> Result<Option<MealRecord>, PersistenceError> {
        let sql = format!(
            "SELECT {MEAL_COLUMNS} FROM meals \
             WHERE school_code = $1 AND meal_date = $2 AND meal_slot = $3"
        );
        self.bounded(
            sqlx::query_as::<_, MealRecord>(&sql)
                .bind(&key.school_code)
                .bind(key.meal_date)
                .bind(key.meal_slot)
                .fetch_optional(&self.db),
        )
        .await
    }

    async fn has_dependents(&self, meal_id: Uuid) -> Result<bool, PersistenceError> {
        self.bounded(
            sqlx::query_scalar::<_, bool>(
                r#"
                SELECT EXISTS (SELECT 1 FROM meal_photos  WHERE meal_id = $1)
                    OR EXISTS (SELECT 1 FROM meal_ratings WHERE meal_id = $1)
                    OR EXISTS (SELECT 1 FROM meal_quizzes WHERE meal_id = $1)
                "#,
            )
            .bind(meal_id)
            .fetch_one(&self.db),
        )
        .await
    }

    async fn update_in_place(
        &self,
        id: Uuid,
        draft: &MealDraft,
    ) -> Result<Option<MealRecord>, PersistenceError> {
        let sql = format!(
            "UPDATE meals \
                SET office_code = $2, menu_items = $3, kcal = $4, \
                    origin_info = $5, nutrition_info = $6, updated_at = now() \
              WHERE id = $1 \
             RETURNING {MEAL_COLUMNS}"
        );
        self.bounded(
            sqlx::query_as::<_, MealRecord>(&sql)
                .bind(id)
                .bind(&draft.office_code)
                .bind(&draft.menu_items)
                .bind(&draft.kcal)
                .bind(&draft.origin_info)
                .bind(&draft.nutrition_info)
                .fetch_optional(&self.db),
        )
        .await
    }

    async fn upsert(&self, draft: &MealDraft) -> Result<MealRecord, PersistenceError> {
        let sql = format!(
            "INSERT INTO meals (school_code, meal_date, meal_slot, office_code, \
                                menu_items, kcal, origin_info, nutrition_info) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (school_code, meal_date, meal_slot) DO UPDATE \
                SET office_code = EXCLUDED.office_code, \
                    menu_items = EXCLUDED.menu_items, \
                    kcal = EXCLUDED.kcal, \
                    origin_info = EXCLUDED.origin_info, \
                    nutrition_info = EXCLUDED.nutrition_info, \
                    updated_at = now() \
             RETURNING {MEAL_COLUMNS}"
        );
        self.bounded(
            sqlx::query_as::<_, MealRecord>(&sql)
                .bind(&draft.key.school_code)
                .bind(draft.key.meal_date)
                .bind(draft.key.meal_slot)
                .bind(&draft.office_code)
                .bind(&draft.menu_items)
                .bind(&draft.kcal)
                .bind(&draft.origin_info)
                .bind(&draft.nutrition_info)
                .fetch_optional(&self.db),
        )
        .await?
        .ok_or_else(|| PersistenceError::MalformedResponse("upsert returned no row".into()))
    }

    async fn list_schools(&self) -> Result<Vec<School>, PersistenceError> {
        self.bounded(
            sqlx::query_as::<_, School>(
                r#"
                SELECT school_code, office_code
                  FROM schools
                 ORDER BY school_code
                "#,
            )
            .fetch_all(&self.db),
        )
        .await
    }
}
