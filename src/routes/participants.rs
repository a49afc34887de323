use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Router,
};

use super::parse_id;
use crate::{error::AppError, state::AppState};

pub fn router() -> Router<AppState> {
    // GET serves the emailed link; both verbs run the same confirmation.
    Router::new().route(
        "/participants/:participant_id/confirm",
        get(confirm_participant).patch(confirm_participant),
    )
}

async fn confirm_participant(
    State(state): State<AppState>,
    Path(participant_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_id("participantId", &participant_id)?;
    state
        .planner
        .confirm_participant(id)
        .await
        .map_err(|err| {
            err.conceal(
                "/participants/{participantId}/confirm",
                &participant_id,
                "unable to confirm participant",
            )
        })?;
    Ok(StatusCode::NO_CONTENT)
}
