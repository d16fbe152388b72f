use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::oneshot;
use tokio::time::sleep;
use tracing::{debug, warn};

use taskmill_domain::entities::Task;
use taskmill_domain::ports::{CommandRunner, ExecutionReport, MetricsSource};
use taskmill_errors::{SchedulerError, SchedulerResult};

/// Shell 命令执行器
///
/// 以 `/bin/sh -c` 启动任务命令；进程存活期间由一个短命采样协程
/// 按固定间隔读取其 CPU / 内存占用，采样协程在 `run` 返回前汇合。
pub struct ShellRunner {
    metrics: Arc<dyn MetricsSource>,
    sample_interval: Duration,
}

impl ShellRunner {
    pub fn new(metrics: Arc<dyn MetricsSource>) -> Self {
        Self {
            metrics,
            sample_interval: Duration::from_secs(1),
        }
    }

    /// 覆盖采样间隔
    pub fn with_sample_interval(mut self, sample_interval: Duration) -> Self {
        self.sample_interval = sample_interval;
        self
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, task: &Task) -> SchedulerResult<ExecutionReport> {
        let mut child = Command::new("/bin/sh")
            .arg("-c")
            .arg(&task.command)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                SchedulerError::CommandSpawn(format!("任务 {} 启动失败: {e}", task.job_name))
            })?;

        let pid = child.id();
        debug!("任务已启动: job={}, pid={:?}", task.job_name, pid);

        // 进程存活期间的采样协程；stop 信号到达或通道关闭即退出
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let sampler = pid.map(|pid| {
            let metrics = Arc::clone(&self.metrics);
            let interval = self.sample_interval;
            tokio::spawn(async move {
                let mut samples = Vec::new();
                loop {
                    samples.push(metrics.sample_process(pid));
                    tokio::select! {
                        _ = &mut stop_rx => break,
                        _ = sleep(interval) => {}
                    }
                }
                samples
            })
        });

        let mut stdout = child.stdout.take();
        let mut stderr = child.stderr.take();

        // 先排空两路管道再等待退出，避免大输出把管道写满
        let read_stdout = async {
            let mut buf = Vec::new();
            if let Some(ref mut pipe) = stdout {
                let _ = pipe.read_to_end(&mut buf).await;
            }
            buf
        };
        let read_stderr = async {
            let mut buf = Vec::new();
            if let Some(ref mut pipe) = stderr {
                let _ = pipe.read_to_end(&mut buf).await;
            }
            buf
        };
        let (out_buf, err_buf) = tokio::join!(read_stdout, read_stderr);

        let wait_result = child.wait().await;

        // 采样协程必须在返回之前汇合
        let _ = stop_tx.send(());
        let samples = match sampler {
            Some(handle) => handle.await.unwrap_or_default(),
            None => Vec::new(),
        };

        let mut output = String::from_utf8_lossy(&out_buf).into_owned();
        output.push_str(&String::from_utf8_lossy(&err_buf));

        let (exit_code, error) = match wait_result {
            Ok(status) if status.success() => (status.code(), None),
            Ok(status) => {
                let message = match status.code() {
                    Some(code) => format!("命令以非零状态退出: {code}"),
                    None => "命令被信号终止".to_string(),
                };
                (status.code(), Some(message))
            }
            Err(e) => {
                warn!("等待进程退出失败: job={}, error={}", task.job_name, e);
                (None, Some(format!("等待进程退出失败: {e}")))
            }
        };

        Ok(ExecutionReport {
            output,
            samples,
            exit_code,
            error,
        })
    }
}
