//! Builders for domain entities used across tests.

use chrono::Utc;
use taskmill_domain::entities::{Task, TaskStatus};

/// Fluent builder for `Task` fixtures.
pub struct TaskBuilder {
    task: Task,
}

impl TaskBuilder {
    pub fn new(job_name: &str) -> Self {
        Self {
            task: Task {
                id: 1,
                job_name: job_name.to_string(),
                command: "echo hi".to_string(),
                interval_seconds: 60,
                status: TaskStatus::Pending,
                created_at: Utc::now(),
                start_time: None,
                end_time: None,
            },
        }
    }

    pub fn id(mut self, id: i64) -> Self {
        self.task.id = id;
        self
    }

    pub fn command(mut self, command: &str) -> Self {
        self.task.command = command.to_string();
        self
    }

    pub fn interval_seconds(mut self, interval_seconds: i64) -> Self {
        self.task.interval_seconds = interval_seconds;
        self
    }

    pub fn status(mut self, status: TaskStatus) -> Self {
        self.task.status = status;
        self
    }

    pub fn build(self) -> Task {
        self.task
    }
}
