use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info};

use taskmill_domain::repositories::TaskRepository;
use taskmill_worker::WorkerPool;

/// 轮询调度器
///
/// 唯一的队列生产者。轮询循环不做去重：同一任务 id 在连续两次轮询
/// 中都处于可拾取状态时会被入队两次并执行两次，幂等性由命令作者
/// 负责。队列满时入队阻塞，轮询节奏被工作池的消化速度自然限流。
pub struct Scheduler {
    repo: Arc<dyn TaskRepository>,
    pool: Arc<WorkerPool>,
    poll_interval: Duration,
    shutdown_tx: Mutex<Option<broadcast::Sender<()>>>,
    poll_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(repo: Arc<dyn TaskRepository>, pool: WorkerPool, poll_interval: Duration) -> Self {
        Self {
            repo,
            pool: Arc::new(pool),
            poll_interval,
            shutdown_tx: Mutex::new(None),
            poll_handle: Mutex::new(None),
        }
    }

    /// 启动工作池与轮询循环
    pub async fn start(&self) {
        let mut handle_guard = self.poll_handle.lock().await;
        if handle_guard.is_some() {
            info!("调度器已经在运行，忽略重复启动");
            return;
        }

        info!("启动调度器，轮询间隔 {:?}", self.poll_interval);
        self.pool.start().await;

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        *self.shutdown_tx.lock().await = Some(shutdown_tx);

        let repo = Arc::clone(&self.repo);
        let pool = Arc::clone(&self.pool);
        let poll_interval = self.poll_interval;

        *handle_guard = Some(tokio::spawn(async move {
            run_poll_loop(repo, pool, poll_interval, shutdown_rx).await;
        }));
    }

    /// 停止轮询循环，然后排空并停止工作池
    ///
    /// 返回时所有已出队任务的执行协议均已完成。
    pub async fn stop(&self) {
        info!("停止调度器");

        if let Some(shutdown_tx) = self.shutdown_tx.lock().await.take() {
            let _ = shutdown_tx.send(());
        }
        if let Some(handle) = self.poll_handle.lock().await.take() {
            if let Err(e) = handle.await {
                error!("等待轮询循环退出失败: {}", e);
            }
        }

        self.pool.stop().await;
        info!("调度器已停止");
    }
}

/// 轮询循环：拉取 → 入队 → 休眠
///
/// 拉取失败只记录日志，下一轮继续；入队阻塞期间收到关闭信号则
/// 放弃本条（任务仍留在存储中，状态未变）。
async fn run_poll_loop(
    repo: Arc<dyn TaskRepository>,
    pool: Arc<WorkerPool>,
    poll_interval: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        match repo.fetch_pending().await {
            Ok(tasks) => {
                debug!("轮询到 {} 个待执行任务", tasks.len());
                for task in tasks {
                    tokio::select! {
                        result = pool.add_task(task) => {
                            if let Err(e) = result {
                                error!("任务入队失败: {}", e);
                                return;
                            }
                        }
                        _ = shutdown_rx.recv() => {
                            info!("轮询循环收到关闭信号");
                            return;
                        }
                    }
                }
            }
            Err(e) => {
                error!("拉取待执行任务失败: {}", e);
            }
        }

        tokio::select! {
            _ = sleep(poll_interval) => {}
            _ = shutdown_rx.recv() => {
                info!("轮询循环收到关闭信号");
                return;
            }
        }
    }
}
