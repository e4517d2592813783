use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{error, instrument};

use super::dto::MealQuery;
use super::repo_types::{MealRecord, MealSlot};
use super::services::IngestRequest;
use crate::state::AppState;

pub fn read_routes() -> Router<AppState> {
    Router::new().route("/meals/:school_code", get(get_meal))
}

/// GET /meals/:school_code?office_code=B10&date=2024-03-15[&slot=lunch][&refresh=true]
#[instrument(skip(state))]
pub async fn get_meal(
    State(state): State<AppState>,
    Path(school_code): Path<String>,
    Query(q): Query<MealQuery>,
) -> Result<Json<MealRecord>, (StatusCode, String)> {
    let date = q.parsed_date().map_err(bad_request)?;
    let slot = q.parsed_slot().map_err(bad_request)?;

    let coordinator = &state.coordinator;
    let result = if slot == MealSlot::Lunch && !q.refresh {
        coordinator.ingest(&school_code, &q.office_code, date).await
    } else {
        let req = IngestRequest {
            slot,
            force_refresh: q.refresh,
            ..IngestRequest::lunch(&school_code, &q.office_code, date)
        };
        coordinator.ingest_slot(&req).await
    };

    match result {
        Ok(record) => Ok(Json(record)),
        Err(e) => {
            error!(error = %e, school_code = %school_code, "ingest failed");
            Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

fn bad_request(msg: String) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, msg)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::app::build_app;
    use crate::meals::services::tests::{lunch_row, Script};
    use crate::state::AppState;

    async fn call(state: AppState, uri: &str) -> (StatusCode, String) {
        let res = build_app(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn returns_normalized_record() {
        let state = AppState::fake(vec![Script::Rows(vec![lunch_row("쌀밥(5)")])]);
        let (status, body) =
            call(state, "/api/v1/meals/7010057?office_code=B10&date=2024-03-15").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["menu_items"][0], "쌀밥");
        assert_eq!(json["meal_date"], "2024-03-15");
        assert_eq!(json["meal_slot"], "lunch");
    }

    #[tokio::test]
    async fn rejects_bad_date_and_slot() {
        let state = AppState::fake(vec![]);
        let (status, _) =
            call(state.clone(), "/api/v1/meals/7010057?office_code=B10&date=15-03-2024").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(
            state,
            "/api/v1/meals/7010057?office_code=B10&date=2024-03-15&slot=brunch",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("brunch"));
    }

    #[tokio::test]
    async fn refresh_bypasses_the_stored_lunch() {
        let state = AppState::fake(vec![
            Script::Rows(vec![lunch_row("쌀밥")]),
            Script::Rows(vec![lunch_row("잡곡밥")]),
        ]);
        let base = "/api/v1/meals/7010057?office_code=B10&date=2024-03-15";

        let (_, body) = call(state.clone(), base).await;
        let first: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(first["menu_items"][0], "쌀밥");

        let (_, body) = call(state.clone(), base).await;
        let cached: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(cached["id"], first["id"]);

        let (status, body) = call(state, &format!("{base}&refresh=true")).await;
        assert_eq!(status, StatusCode::OK);
        let refreshed: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(refreshed["menu_items"][0], "잡곡밥");
    }

    #[tokio::test]
    async fn health_is_ok() {
        let (status, body) = call(AppState::fake(vec![]), "/api/v1/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }
}
