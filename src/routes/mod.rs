pub mod participants;
pub mod trips;

use axum::Router;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::{error::AppError, state::AppState};

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(trips::router())
        .merge(participants::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn parse_id(name: &str, raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| AppError::bad_request(format!("{name} is not a valid uuid")))
}
