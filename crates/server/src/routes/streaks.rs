//! Streak route: read-only view of the user's completion momentum.

use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::get,
};
use db::models::user_streak::UserStreak;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

/// GET /sessions/{user_id}/streak
/// The streak record, created zeroed on the first read.
pub async fn get_streak(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<UserStreak>>, ApiError> {
    state.session(user_id).await?;
    let streak = state.streaks.get_or_create(user_id).await?;
    Ok(ResponseJson(ApiResponse::success(streak)))
}

/// Routes relative to `/sessions/{user_id}`; nested by the caller.
pub fn router() -> Router<AppState> {
    Router::new().route("/streak", get(get_streak))
}
