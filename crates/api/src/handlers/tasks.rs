use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::{error::ApiError, routes::AppState, ApiResult};
use taskmill_domain::entities::NewTask;

/// 任务创建请求
#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub job_name: String,
    pub command: String,
    pub interval_seconds: i64,
}

/// 创建任务
pub async fn create_task(
    State(state): State<AppState>,
    Json(request): Json<CreateTaskRequest>,
) -> ApiResult<impl IntoResponse> {
    let task_id = state
        .task_repo
        .insert(&NewTask {
            job_name: request.job_name,
            command: request.command,
            interval_seconds: request.interval_seconds,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "task_id": task_id,
            "message": "Task created successfully",
        })),
    ))
}

/// 获取任务列表
pub async fn list_tasks(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let tasks = state.task_repo.list().await?;
    Ok(Json(tasks))
}

/// 按 id 获取单个任务
pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    match state.task_repo.get(id).await? {
        Some(task) => Ok(Json(task)),
        None => Err(ApiError::NotFound("Task not found".to_string())),
    }
}

/// 按 id 删除任务，幂等
pub async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    state.task_repo.delete(id).await?;
    Ok(Json(json!({ "message": "Task deleted successfully" })))
}

/// 按状态聚合的任务计数
pub async fn get_stats(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let counts = state.task_repo.count_by_status().await?;
    let stats: serde_json::Map<String, serde_json::Value> = counts
        .into_iter()
        .map(|c| (c.status, json!(c.count)))
        .collect();
    Ok(Json(serde_json::Value::Object(stats)))
}
