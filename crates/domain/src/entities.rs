use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use taskmill_errors::SchedulerError;

/// 任务定义
///
/// 一条持久化的工作项记录：以 `/bin/sh -c` 执行的命令及其调度元数据。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    /// 人类可读的作业名，不要求唯一
    pub job_name: String,
    /// 原样交给 `/bin/sh -c` 的命令串
    pub command: String,
    /// 期望的重复周期（秒）；0 或负数表示无固定周期，轮询节奏即时钟
    pub interval_seconds: i64,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    /// 首次完成前为空
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl Task {
    /// 检查任务是否可被调度器拾取
    pub fn is_eligible(&self) -> bool {
        matches!(self.status, TaskStatus::Pending | TaskStatus::Running)
    }
}

/// 任务状态
///
/// 引擎只写入终态 `completed` / `failed`，以及重试期间的 `running` 心跳；
/// 外部写入方可以把记录改回 `pending` / `running` 以重新入队。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "running" => Ok(TaskStatus::Running),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(SchedulerError::validation_error(format!(
                "未知的任务状态: {other}"
            ))),
        }
    }
}

/// 任务创建载荷
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    pub job_name: String,
    pub command: String,
    pub interval_seconds: i64,
}

/// 整机资源快照
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostMetricSample {
    pub cpu_pct: f64,
    pub ram_pct: f64,
    pub disk_pct: f64,
    /// 1 分钟负载
    pub load1: f64,
    /// GPU 监控尚未接入，恒为 0
    pub gpu_pct: f64,
    pub recorded_at: DateTime<Utc>,
}

/// 单进程资源快照
///
/// 进程粒度的磁盘占用无法从指标源取得，恒为 0。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessMetricSample {
    pub cpu_pct: f64,
    pub ram_pct: f64,
    pub disk_pct: f64,
    pub recorded_at: DateTime<Utc>,
}

/// 已落库的指标行
///
/// 宿主机样本与进程样本共用一张表；进程行的 `load_average` 与
/// `gpu_usage` 为 NULL。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskMetricRecord {
    pub task_id: i64,
    pub cpu_usage: f64,
    pub ram_usage: f64,
    pub disk_usage: f64,
    pub load_average: Option<f64>,
    pub gpu_usage: Option<f64>,
    pub recorded_at: DateTime<Utc>,
}

/// 按状态聚合的任务计数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}
