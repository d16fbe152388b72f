//! 引擎对外部协作者的能力抽象

use async_trait::async_trait;

use crate::entities::{HostMetricSample, ProcessMetricSample, Task};
use taskmill_errors::SchedulerResult;

/// 日志存储能力
///
/// 远端对象存储加本地兜底目录的组合。键是不透明字符串，
/// 存储层不解释其中的层级。
#[async_trait]
pub trait LogStore: Send + Sync {
    /// 持久化一个日志对象
    ///
    /// 全函数：要么远端确认，要么写入本地兜底目录，调用方观察不到
    /// 上传失败。只有兜底写入也失败时才返回错误。
    async fn upload(&self, key: &str, content: &[u8]) -> SchedulerResult<()>;

    /// 枚举指定前缀下的键
    async fn list(&self, prefix: &str) -> SchedulerResult<Vec<String>>;

    /// 取回单个对象的内容
    async fn fetch(&self, key: &str) -> SchedulerResult<Vec<u8>>;

    /// 枚举本地兜底目录中的文件名
    async fn list_spilled(&self) -> SchedulerResult<Vec<String>>;
}

/// 指标采集能力
///
/// 同步、无任务状态，可被多个 worker 并发调用。所有子读取都以 0 值
/// 容忍失败，永不让调用方失败。
pub trait MetricsSource: Send + Sync {
    /// 整机快照：CPU、内存、根分区磁盘占用与 1 分钟负载
    fn sample_host(&self) -> HostMetricSample;

    /// 进程快照；PID 已消失时返回带时间戳的零值样本
    fn sample_process(&self, pid: u32) -> ProcessMetricSample;
}

/// 一次命令执行的完整报告
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    /// stdout 与 stderr 的合并输出，按 UTF-8 宽松解码
    pub output: String,
    /// 执行期间按 1 Hz 采集的进程指标
    pub samples: Vec<ProcessMetricSample>,
    pub exit_code: Option<i32>,
    /// 为空表示命令以 0 退出
    pub error: Option<String>,
}

impl ExecutionReport {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// 启动即失败的报告：无输出、无样本
    pub fn spawn_failure(message: String) -> Self {
        Self {
            output: String::new(),
            samples: Vec::new(),
            exit_code: None,
            error: Some(message),
        }
    }
}

/// 命令执行能力
///
/// 一次调用对应一次尝试；返回前内部采样协程必须已经汇合，
/// 不向调用方泄漏采样任务。生成后的进程不可中断，取消语义在上层。
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, task: &Task) -> SchedulerResult<ExecutionReport>;
}
