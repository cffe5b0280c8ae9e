//! Mail configuration self-test.

use axum::{Router, extract::State, response::Json as ResponseJson, routing::post};
use serde::Deserialize;
use services::services::task_list::TaskListError;
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestEmailPayload {
    pub recipient_email: String,
}

/// POST /api/email/test
/// Send a throwaway message to verify the mail setup.
pub async fn send_test_email(
    State(state): State<AppState>,
    axum::Json(payload): axum::Json<TestEmailPayload>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    if !utils::email::is_valid_email(&payload.recipient_email) {
        return Err(TaskListError::Validation(format!(
            "invalid email address: {}",
            payload.recipient_email
        ))
        .into());
    }
    state.mailer.send_test(&payload.recipient_email).await?;
    Ok(ResponseJson(ApiResponse::success_with_message(
        (),
        "Test email sent",
    )))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/email/test", post(send_test_email))
}
