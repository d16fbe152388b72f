//! 任务仓储抽象
//!
//! 数据访问的窄接口：无缓存，不向调用方暴露长生命周期游标。

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::entities::{
    HostMetricSample, NewTask, ProcessMetricSample, StatusCount, Task, TaskMetricRecord,
    TaskStatus,
};
use taskmill_errors::SchedulerResult;

#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// 插入新任务，状态初始化为 `pending`，返回新 id
    async fn insert(&self, task: &NewTask) -> SchedulerResult<i64>;

    async fn list(&self) -> SchedulerResult<Vec<Task>>;

    async fn get(&self, id: i64) -> SchedulerResult<Option<Task>>;

    /// 按 id 删除，幂等
    async fn delete(&self, id: i64) -> SchedulerResult<()>;

    /// 取回所有 `pending` / `running` 的任务；顺序不作保证，
    /// 连续调用可能返回重复的 id
    async fn fetch_pending(&self) -> SchedulerResult<Vec<Task>>;

    /// 写入状态并刷新 updated_at
    async fn update_status(&self, id: i64, status: TaskStatus) -> SchedulerResult<()>;

    /// 原子写入起止时间与状态
    async fn update_execution(
        &self,
        id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        status: TaskStatus,
    ) -> SchedulerResult<()>;

    async fn insert_host_metric(
        &self,
        task_id: i64,
        sample: &HostMetricSample,
    ) -> SchedulerResult<()>;

    async fn insert_process_metric(
        &self,
        task_id: i64,
        sample: &ProcessMetricSample,
    ) -> SchedulerResult<()>;

    /// 读回某任务的全部指标行
    async fn fetch_metrics(&self, task_id: i64) -> SchedulerResult<Vec<TaskMetricRecord>>;

    /// 按状态聚合任务数
    async fn count_by_status(&self) -> SchedulerResult<Vec<StatusCount>>;
}
