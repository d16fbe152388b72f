use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use tracing::warn;

use crate::{error::ApiError, routes::AppState, ApiResult};

/// 取回某任务的全部执行日志
///
/// 路径变量原样用作键前缀段：客户端传入的值必须与上传时使用的
/// 一致（即作业名）。
pub async fn get_task_logs(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let prefix = format!("logs/{task_id}/");

    let keys = state
        .log_store
        .list(&prefix)
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to retrieve logs: {e}")))?;

    if keys.is_empty() {
        return Err(ApiError::NotFound(
            "No logs found for this task".to_string(),
        ));
    }

    let mut sections = Vec::new();
    for key in keys {
        match state.log_store.fetch(&key).await {
            Ok(content) => {
                let content = String::from_utf8_lossy(&content).into_owned();
                sections.push(format!("Log from {key}:\n{content}"));
            }
            Err(e) => {
                // 单个对象读不到不影响其余日志的返回
                warn!("读取日志对象失败: {}, error={}", key, e);
            }
        }
    }

    Ok(sections.join("\n\n"))
}

/// 列出本地兜底目录中的日志文件名
pub async fn get_failed_logs(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let files = state
        .log_store
        .list_spilled()
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to read local logs: {e}")))?;
    Ok(Json(files))
}
