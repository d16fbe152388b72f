use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use taskmill_errors::SchedulerError;

/// API错误类型
///
/// 错误响应体统一为纯文本。
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("调度器错误: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Scheduler(SchedulerError::TaskNotFound { .. }) => {
                (StatusCode::NOT_FOUND, "Task not found".to_string())
            }
            ApiError::Scheduler(SchedulerError::ValidationError(msg)) => {
                (StatusCode::BAD_REQUEST, msg.clone())
            }
            ApiError::Scheduler(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        (status, message).into_response()
    }
}

/// API结果类型
pub type ApiResult<T> = Result<T, ApiError>;
