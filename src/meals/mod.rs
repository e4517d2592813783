mod dto;
pub mod handlers;
pub mod repo;
pub mod repo_types;
pub mod services;

use crate::state::AppState;
use axum::Router;

pub use dto::parse_date;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::read_routes())
}
