use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, sync::broadcast};
use tracing::{error, info};

use taskmill_api::{create_routes, AppState};
use taskmill_config::AppConfig;
use taskmill_dispatcher::Scheduler;
use taskmill_domain::ports::{LogStore, MetricsSource};
use taskmill_domain::repositories::TaskRepository;
use taskmill_infrastructure::{HttpObjectStore, LogShipper, SqliteTaskRepository, SystemMonitor};
use taskmill_worker::{ShellRunner, WorkerPool, WorkerPoolConfig};

/// 主应用程序
///
/// 装配执行引擎与管理接口：数据库连接与对象存储凭据在此处建立，
/// 失败即中止启动；之后的运行期错误都留在各组件内部。
pub struct Application {
    config: AppConfig,
    scheduler: Arc<Scheduler>,
    api_state: AppState,
}

impl Application {
    /// 创建应用实例并完成全部装配
    pub async fn new(config: AppConfig) -> Result<Self> {
        info!("初始化执行引擎");

        let repo: Arc<dyn TaskRepository> = Arc::new(
            SqliteTaskRepository::new_with_pool_options(
                &config.database.url,
                config.database.max_connections,
                config.database.min_connections,
                Duration::from_secs(config.database.connection_timeout_seconds),
            )
            .await
            .with_context(|| format!("连接数据库失败: {}", config.database.url))?,
        );

        let remote = HttpObjectStore::new(&config.log_store.endpoint, &config.log_store.bucket)
            .context("初始化对象存储客户端失败")?;
        let log_store: Arc<dyn LogStore> = Arc::new(
            LogShipper::new(Arc::new(remote), config.log_store.spill_dir.clone())
                .with_retry_policy(
                    config.log_store.max_retries,
                    Duration::from_secs(config.log_store.retry_base_seconds),
                ),
        );

        let metrics: Arc<dyn MetricsSource> = Arc::new(SystemMonitor::new());
        let runner = Arc::new(ShellRunner::new(Arc::clone(&metrics)));

        let pool = WorkerPool::new(
            WorkerPoolConfig {
                worker_count: config.scheduler.worker_count,
                retry_limit: config.scheduler.retry_limit,
                retry_delay: Duration::from_secs(config.scheduler.retry_delay_seconds),
                queue_capacity: config.scheduler.queue_capacity,
            },
            Arc::clone(&repo),
            Arc::clone(&log_store),
            Arc::clone(&metrics),
            runner,
        );

        let scheduler = Arc::new(Scheduler::new(
            Arc::clone(&repo),
            pool,
            Duration::from_secs(config.scheduler.poll_interval_seconds),
        ));

        let api_state = AppState {
            task_repo: repo,
            log_store,
        };

        Ok(Self {
            config,
            scheduler,
            api_state,
        })
    }

    /// 运行应用直至收到关闭信号
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        self.scheduler.start().await;

        let server_handle = if self.config.api.enabled {
            let app = create_routes(self.api_state.clone());
            let bind_address = self.config.api.bind_address.clone();

            let listener = TcpListener::bind(&bind_address)
                .await
                .with_context(|| format!("绑定地址失败: {bind_address}"))?;
            info!("管理接口启动在 http://{}", bind_address);

            Some(tokio::spawn(async move {
                if let Err(e) = axum::serve(listener, app).await {
                    error!("管理接口运行失败: {}", e);
                }
            }))
        } else {
            None
        };

        let _ = shutdown_rx.recv().await;
        info!("应用收到关闭信号");

        // 先停调度器：排空队列并等待在途任务的协议完成
        self.scheduler.stop().await;

        if let Some(handle) = server_handle {
            handle.abort();
        }

        info!("应用已停止");
        Ok(())
    }
}
