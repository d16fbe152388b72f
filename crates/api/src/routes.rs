use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::handlers::{
    logs::{get_failed_logs, get_task_logs},
    tasks::{create_task, delete_task, get_stats, get_task, list_tasks},
};
use taskmill_domain::ports::LogStore;
use taskmill_domain::repositories::TaskRepository;

#[derive(Clone)]
pub struct AppState {
    pub task_repo: Arc<dyn TaskRepository>,
    pub log_store: Arc<dyn LogStore>,
}

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/tasks", post(create_task).get(list_tasks))
        .route("/tasks/{id}", get(get_task).delete(delete_task))
        .route("/logs/{task_id}", get(get_task_logs))
        .route("/failed_logs", get(get_failed_logs))
        .route("/stats", get(get_stats))
        .with_state(state)
}
