//! Task routes: thin JSON plumbing over the session's task container.

use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, post, put},
};
use chrono::NaiveDate;
use db::models::task::{Task, UpdateTask};
use serde::Deserialize;
use services::services::task_list::{NewTask, ShareOutcome, ToggleOutcome};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ListTasksQuery {
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct StakesPayload {
    pub stakes: String,
}

#[derive(Debug, Deserialize)]
pub struct SharePayload {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct SelectedDatePayload {
    pub date: NaiveDate,
}

/// GET /sessions/{user_id}/tasks
/// The user's tasks, optionally restricted to one day.
pub async fn list_tasks(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<ListTasksQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Task>>>, ApiError> {
    let container = state.session(user_id).await?;
    let tasks = match query.date {
        Some(date) => container.tasks_for_date(date).await,
        None => container.tasks().await,
    };
    Ok(ResponseJson(ApiResponse::success(tasks)))
}

/// GET /sessions/{user_id}/tasks/selected
/// The selected day's tasks.
pub async fn list_selected_tasks(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<Task>>>, ApiError> {
    let container = state.session(user_id).await?;
    Ok(ResponseJson(ApiResponse::success(
        container.tasks_for_selected_date().await,
    )))
}

/// PUT /sessions/{user_id}/selected-date
/// Move the calendar and return that day's tasks.
pub async fn set_selected_date(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    axum::Json(payload): axum::Json<SelectedDatePayload>,
) -> Result<ResponseJson<ApiResponse<Vec<Task>>>, ApiError> {
    let container = state.session(user_id).await?;
    container.set_selected_date(payload.date).await;
    Ok(ResponseJson(ApiResponse::success(
        container.tasks_for_selected_date().await,
    )))
}

/// POST /sessions/{user_id}/tasks
/// Create a task.
pub async fn create_task(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    axum::Json(payload): axum::Json<NewTask>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let container = state.session(user_id).await?;
    let task = container.add_task(payload).await?;
    Ok(ResponseJson(ApiResponse::success_with_message(
        task,
        "Task added",
    )))
}

/// PUT /sessions/{user_id}/tasks/{task_id}
/// Partial update; absent fields stay untouched.
pub async fn update_task(
    State(state): State<AppState>,
    Path((user_id, task_id)): Path<(Uuid, Uuid)>,
    axum::Json(payload): axum::Json<UpdateTask>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let container = state.session(user_id).await?;
    let task = container.update_task(task_id, payload).await?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

/// POST /sessions/{user_id}/tasks/{task_id}/toggle
/// Flip completion.
pub async fn toggle_completion(
    State(state): State<AppState>,
    Path((user_id, task_id)): Path<(Uuid, Uuid)>,
) -> Result<ResponseJson<ApiResponse<ToggleOutcome>>, ApiError> {
    let container = state.session(user_id).await?;
    let outcome = container.toggle_completion(task_id).await?;
    Ok(ResponseJson(ApiResponse::success(outcome)))
}

/// DELETE /sessions/{user_id}/tasks/{task_id}
pub async fn delete_task(
    State(state): State<AppState>,
    Path((user_id, task_id)): Path<(Uuid, Uuid)>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let container = state.session(user_id).await?;
    container.delete_task(task_id).await?;
    Ok(ResponseJson(ApiResponse::success_with_message(
        (),
        "Task deleted",
    )))
}

/// PUT /sessions/{user_id}/tasks/{task_id}/stakes
/// Set the stakes text.
pub async fn add_stakes(
    State(state): State<AppState>,
    Path((user_id, task_id)): Path<(Uuid, Uuid)>,
    axum::Json(payload): axum::Json<StakesPayload>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let container = state.session(user_id).await?;
    let task = container.add_stakes(task_id, &payload.stakes).await?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

/// DELETE /sessions/{user_id}/tasks/{task_id}/stakes
pub async fn remove_stakes(
    State(state): State<AppState>,
    Path((user_id, task_id)): Path<(Uuid, Uuid)>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let container = state.session(user_id).await?;
    let task = container.remove_stakes(task_id).await?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

/// POST /sessions/{user_id}/tasks/{task_id}/share
/// Add an accountability partner email.
pub async fn share_task(
    State(state): State<AppState>,
    Path((user_id, task_id)): Path<(Uuid, Uuid)>,
    axum::Json(payload): axum::Json<SharePayload>,
) -> Result<ResponseJson<ApiResponse<ShareOutcome>>, ApiError> {
    let container = state.session(user_id).await?;
    let outcome = container.share_task(task_id, &payload.email).await?;
    Ok(ResponseJson(ApiResponse::success(outcome)))
}

/// DELETE /sessions/{user_id}/tasks/{task_id}/share
/// Remove an accountability partner email.
pub async fn unshare_task(
    State(state): State<AppState>,
    Path((user_id, task_id)): Path<(Uuid, Uuid)>,
    axum::Json(payload): axum::Json<SharePayload>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let container = state.session(user_id).await?;
    let task = container.unshare_task(task_id, &payload.email).await?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

/// Routes relative to `/sessions/{user_id}`; nested by the caller.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tasks", get(list_tasks).post(create_task))
        .route("/tasks/selected", get(list_selected_tasks))
        .route("/selected-date", put(set_selected_date))
        .route("/tasks/{task_id}", put(update_task).delete(delete_task))
        .route("/tasks/{task_id}/toggle", post(toggle_completion))
        .route("/tasks/{task_id}/stakes", put(add_stakes).delete(remove_stakes))
        .route("/tasks/{task_id}/share", post(share_task).delete(unshare_task))
}
