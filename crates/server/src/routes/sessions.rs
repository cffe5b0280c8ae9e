//! Session lifecycle: the authentication layer in front of this service hands
//! over the signed-in identity; a task container lives for the session.

use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{delete, post},
};
use db::models::task::Task;
use serde::Deserialize;
use services::services::task_list::{SessionContext, TaskListError};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

/// Identity handed over by the authentication layer.
#[derive(Debug, Clone, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct BeginSession {
    pub user_id: Uuid,
    pub display_name: Option<String>,
    pub email: String,
}

/// POST /api/sessions
/// Start a session and return the initial task list.
pub async fn begin_session(
    State(state): State<AppState>,
    axum::Json(payload): axum::Json<BeginSession>,
) -> Result<ResponseJson<ApiResponse<Vec<Task>>>, ApiError> {
    if !utils::email::is_valid_email(&payload.email) {
        return Err(TaskListError::Validation(format!(
            "invalid email address: {}",
            payload.email
        ))
        .into());
    }

    let container = state
        .begin_session(SessionContext {
            user_id: payload.user_id,
            display_name: payload.display_name,
            email: payload.email,
        })
        .await;

    Ok(ResponseJson(ApiResponse::success(container.tasks().await)))
}

/// DELETE /api/sessions/{user_id}
/// Sign out, tearing the session's container down.
pub async fn end_session(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<bool>>, ApiError> {
    let existed = state.end_session(user_id).await;
    Ok(ResponseJson(ApiResponse::success(existed)))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sessions", post(begin_session))
        .route("/sessions/{user_id}", delete(end_session))
}
