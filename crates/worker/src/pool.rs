use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{error, info, warn};

use taskmill_domain::entities::{Task, TaskStatus};
use taskmill_domain::ports::{CommandRunner, ExecutionReport, LogStore, MetricsSource};
use taskmill_domain::repositories::TaskRepository;
use taskmill_errors::{SchedulerError, SchedulerResult};

/// 工作池参数
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    pub worker_count: usize,
    /// 每个任务的最大尝试次数
    pub retry_limit: u32,
    /// 失败重试之间的固定等待
    pub retry_delay: Duration,
    pub queue_capacity: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            worker_count: 5,
            retry_limit: 3,
            retry_delay: Duration::from_secs(2),
            queue_capacity: 100,
        }
    }
}

/// 工作池共享的能力句柄
struct WorkerContext {
    repo: Arc<dyn TaskRepository>,
    log_store: Arc<dyn LogStore>,
    metrics: Arc<dyn MetricsSource>,
    runner: Arc<dyn CommandRunner>,
    retry_limit: u32,
    retry_delay: Duration,
}

/// 有界工作池
///
/// 单生产者（调度器轮询循环）、多消费者的有界队列。队列满时
/// `add_task` 阻塞，向调度器施加背压；`stop` 关闭队列并等待所有
/// worker 把已入队的任务消费完毕。
pub struct WorkerPool {
    config: WorkerPoolConfig,
    context: Arc<WorkerContext>,
    sender: Mutex<Option<mpsc::Sender<Task>>>,
    receiver: Mutex<Option<mpsc::Receiver<Task>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    pub fn new(
        config: WorkerPoolConfig,
        repo: Arc<dyn TaskRepository>,
        log_store: Arc<dyn LogStore>,
        metrics: Arc<dyn MetricsSource>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        // tokio 的有界通道不允许容量为 0
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let context = Arc::new(WorkerContext {
            repo,
            log_store,
            metrics,
            runner,
            retry_limit: config.retry_limit,
            retry_delay: config.retry_delay,
        });

        Self {
            config,
            context,
            sender: Mutex::new(Some(sender)),
            receiver: Mutex::new(Some(receiver)),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// 入队一个任务引用；队列满时挂起直到有空位
    pub async fn add_task(&self, task: Task) -> SchedulerResult<()> {
        let sender = {
            let guard = self.sender.lock().await;
            guard.clone().ok_or(SchedulerError::QueueClosed)?
        };

        let job_name = task.job_name.clone();
        sender
            .send(task)
            .await
            .map_err(|_| SchedulerError::QueueClosed)?;
        info!("任务已入队: {}", job_name);
        Ok(())
    }

    /// 启动 worker 协程
    pub async fn start(&self) {
        let receiver = match self.receiver.lock().await.take() {
            Some(receiver) => Arc::new(Mutex::new(receiver)),
            None => {
                warn!("工作池已经启动过，忽略重复启动");
                return;
            }
        };

        info!("启动 {} 个 worker", self.config.worker_count);

        let mut workers = self.workers.lock().await;
        for worker_id in 0..self.config.worker_count {
            let receiver = Arc::clone(&receiver);
            let context = Arc::clone(&self.context);

            workers.push(tokio::spawn(async move {
                loop {
                    // 锁只覆盖出队本身，执行期间其余 worker 可继续取任务
                    let task = {
                        let mut guard = receiver.lock().await;
                        guard.recv().await
                    };
                    match task {
                        Some(task) => process_task(&context, worker_id, task).await,
                        None => break,
                    }
                }
                info!("Worker {} 退出", worker_id);
            }));
        }
    }

    /// 关闭队列并等待所有 worker 排空退出
    pub async fn stop(&self) {
        self.sender.lock().await.take();

        let workers = {
            let mut guard = self.workers.lock().await;
            std::mem::take(&mut *guard)
        };
        for handle in workers {
            if let Err(e) = handle.await {
                error!("等待 worker 退出失败: {}", e);
            }
        }
        info!("所有 worker 已完成并退出");
    }
}

/// 单个任务的完整执行协议
///
/// 出队后的任务保证写入唯一终态：成功路径写 `completed`，
/// 重试耗尽路径写 `failed`。指标与状态写入失败只记录日志，
/// 不中断协议（下次轮询会看到旧状态）。
async fn process_task(ctx: &WorkerContext, worker_id: usize, task: Task) {
    info!("Worker {} 开始执行任务: {}", worker_id, task.job_name);

    let start = Utc::now();
    let pre = ctx.metrics.sample_host();
    record_host_metric(ctx, task.id, &pre).await;

    let mut last_output = String::new();

    for attempt in 1..=ctx.retry_limit {
        info!("第 {} 次尝试执行任务: {}", attempt, task.job_name);

        let report = match ctx.runner.run(&task).await {
            Ok(report) => report,
            Err(e) => ExecutionReport::spawn_failure(e.to_string()),
        };
        last_output = report.output.clone();

        let post_attempt = ctx.metrics.sample_host();
        record_host_metric(ctx, task.id, &post_attempt).await;
        // 心跳：让外部观察到任务仍在被处理，终态稍后覆盖
        record_execution(ctx, task.id, start, TaskStatus::Running).await;

        if report.is_success() {
            for sample in &report.samples {
                if let Err(e) = ctx.repo.insert_process_metric(task.id, sample).await {
                    warn!("写入进程指标失败: task_id={}, error={}", task.id, e);
                }
            }
            let post = ctx.metrics.sample_host();
            record_host_metric(ctx, task.id, &post).await;
            record_execution(ctx, task.id, start, TaskStatus::Completed).await;

            info!("任务执行成功: {}", task.job_name);
            upload_output(ctx, &task.job_name, report.output.as_bytes()).await;
            return;
        }

        let error_message = report.error.unwrap_or_else(|| "未知错误".to_string());
        warn!(
            "任务第 {} 次尝试失败: {}, error={}",
            attempt, task.job_name, error_message
        );
        record_failure_blob(ctx, &task, attempt, &error_message).await;
        sleep(ctx.retry_delay).await;
    }

    // 重试耗尽
    let post_failure = ctx.metrics.sample_host();
    record_host_metric(ctx, task.id, &post_failure).await;
    record_execution(ctx, task.id, start, TaskStatus::Failed).await;

    warn!("任务重试耗尽，标记失败: {}", task.job_name);
    let content = format!("Task failed: {last_output}");
    upload_output(ctx, &task.job_name, content.as_bytes()).await;
}

/// 成功与终败输出共用的键格式：`logs/<job_name>/<时间戳>.log`
fn output_key(job_name: &str) -> String {
    let timestamp = Utc::now().format("%Y-%m-%d_%H-%M-%S");
    format!("logs/{job_name}/{timestamp}.log")
}

async fn upload_output(ctx: &WorkerContext, job_name: &str, content: &[u8]) {
    let key = output_key(job_name);
    if let Err(e) = ctx.log_store.upload(&key, content).await {
        error!("归档任务输出失败: {}, error={}", key, e);
    }
}

/// 单次失败记录：`failed_tasks/<job_name>_<attempt>.log`
async fn record_failure_blob(ctx: &WorkerContext, task: &Task, attempt: u32, error: &str) {
    let content = format!(
        "Task: {}\nAttempt: {}\nError: {}\nTimestamp: {}\n\n",
        task.job_name,
        attempt,
        error,
        Utc::now().to_rfc3339()
    );
    let key = format!("failed_tasks/{}_{}.log", task.job_name, attempt);
    if let Err(e) = ctx.log_store.upload(&key, content.as_bytes()).await {
        error!("归档失败记录失败: {}, error={}", key, e);
    }
}

async fn record_host_metric(
    ctx: &WorkerContext,
    task_id: i64,
    sample: &taskmill_domain::entities::HostMetricSample,
) {
    if let Err(e) = ctx.repo.insert_host_metric(task_id, sample).await {
        warn!("写入主机指标失败: task_id={}, error={}", task_id, e);
    }
}

async fn record_execution(
    ctx: &WorkerContext,
    task_id: i64,
    start: chrono::DateTime<Utc>,
    status: TaskStatus,
) {
    if let Err(e) = ctx
        .repo
        .update_execution(task_id, start, Utc::now(), status)
        .await
    {
        warn!(
            "更新任务执行记录失败: task_id={}, status={}, error={}",
            task_id, status, e
        );
    }
}
