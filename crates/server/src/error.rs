use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use services::services::{
    mailer::NotificationError, streak::StreakError, task_list::TaskListError,
    task_store::TaskStoreError,
};
use thiserror::Error;
use tracing::{error, warn};
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("no active session for this user")]
    AuthRequired,
    #[error(transparent)]
    TaskList(#[from] TaskListError),
    #[error(transparent)]
    Streak(#[from] StreakError),
    #[error(transparent)]
    Notification(#[from] NotificationError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::AuthRequired => StatusCode::UNAUTHORIZED,
            Self::TaskList(TaskListError::Validation(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::TaskList(TaskListError::TaskNotFound(_))
            | Self::TaskList(TaskListError::Store(TaskStoreError::TaskNotFound(_))) => {
                StatusCode::NOT_FOUND
            }
            Self::Notification(NotificationError::NotConfigured) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        } else {
            warn!(error = %self, "request rejected");
        }
        (status, Json(ApiResponse::<()>::error(self.to_string()))).into_response()
    }
}
