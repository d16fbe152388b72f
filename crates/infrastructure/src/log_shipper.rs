use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::object_store::ObjectStoreClient;
use taskmill_domain::ports::LogStore;
use taskmill_errors::{SchedulerError, SchedulerResult};

/// 一次上传的最终去向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    /// 远端确认接收
    Remote,
    /// 重试耗尽，写入本地兜底目录
    Spilled,
}

/// 日志归档器
///
/// 上传走远端对象存储，按指数退避重试；重试耗尽后落盘到本地兜底
/// 目录并向调用方报告成功。列举与读取直接委托远端。
pub struct LogShipper {
    remote: Arc<dyn ObjectStoreClient>,
    spill_dir: PathBuf,
    max_retries: u32,
    retry_base: Duration,
}

impl LogShipper {
    pub fn new(remote: Arc<dyn ObjectStoreClient>, spill_dir: impl Into<PathBuf>) -> Self {
        Self {
            remote,
            spill_dir: spill_dir.into(),
            max_retries: 3,
            retry_base: Duration::from_secs(1),
        }
    }

    /// 覆盖重试策略；`retry_base` 是退避基数，第 i 次失败后等待 base * 2^i
    pub fn with_retry_policy(mut self, max_retries: u32, retry_base: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_base = retry_base;
        self
    }

    /// 执行上传并返回实际去向
    pub async fn upload_with_outcome(
        &self,
        key: &str,
        content: &[u8],
    ) -> SchedulerResult<UploadOutcome> {
        for attempt in 1..=self.max_retries {
            match self.remote.put_object(key, content).await {
                Ok(()) => {
                    info!("日志已上传: {}", key);
                    return Ok(UploadOutcome::Remote);
                }
                Err(e) => {
                    let wait = self.retry_base.saturating_mul(2u32.saturating_pow(attempt));
                    warn!(
                        "上传失败 (第{}次): {}: {}，{:?} 后重试",
                        attempt, key, e, wait
                    );
                    sleep(wait).await;
                }
            }
        }

        warn!("上传重试 {} 次后仍失败，落盘本地: {}", self.max_retries, key);
        self.spill(key, content).await?;
        Ok(UploadOutcome::Spilled)
    }

    /// 写入本地兜底目录，按需创建中间目录
    async fn spill(&self, key: &str, content: &[u8]) -> SchedulerResult<()> {
        let path = self.spill_dir.join(key);
        if let Some(parent) = path.parent() {
            // 并发创建同一目录不报错
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                SchedulerError::log_store_error(format!("创建本地日志目录失败: {e}"))
            })?;
        }

        tokio::fs::write(&path, content).await.map_err(|e| {
            SchedulerError::log_store_error(format!("写入本地日志失败 {}: {e}", path.display()))
        })?;

        info!("日志已落盘: {}", path.display());
        Ok(())
    }

    fn collect_spilled(dir: &Path, base: &Path, out: &mut Vec<String>) -> std::io::Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                Self::collect_spilled(&path, base, out)?;
            } else if let Ok(rel) = path.strip_prefix(base) {
                out.push(rel.to_string_lossy().replace('\\', "/"));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl LogStore for LogShipper {
    async fn upload(&self, key: &str, content: &[u8]) -> SchedulerResult<()> {
        self.upload_with_outcome(key, content).await.map(|_| ())
    }

    async fn list(&self, prefix: &str) -> SchedulerResult<Vec<String>> {
        self.remote.list_objects(prefix).await
    }

    async fn fetch(&self, key: &str) -> SchedulerResult<Vec<u8>> {
        self.remote.get_object(key).await
    }

    async fn list_spilled(&self) -> SchedulerResult<Vec<String>> {
        if !self.spill_dir.exists() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        Self::collect_spilled(&self.spill_dir, &self.spill_dir, &mut files)
            .map_err(|e| SchedulerError::log_store_error(format!("读取本地日志目录失败: {e}")))?;
        files.sort();
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// 前 N 次失败、之后成功的模拟远端
    struct FlakyStore {
        fail_first: u32,
        calls: AtomicU32,
    }

    impl FlakyStore {
        fn failing_times(n: u32) -> Self {
            Self {
                fail_first: n,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl ObjectStoreClient for FlakyStore {
        async fn put_object(&self, _key: &str, _content: &[u8]) -> SchedulerResult<()> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                Err(SchedulerError::Network("connection refused".to_string()))
            } else {
                Ok(())
            }
        }

        async fn list_objects(&self, _prefix: &str) -> SchedulerResult<Vec<String>> {
            Ok(Vec::new())
        }

        async fn get_object(&self, key: &str) -> SchedulerResult<Vec<u8>> {
            Err(SchedulerError::log_store_error(format!("no such key: {key}")))
        }
    }

    fn shipper(remote: FlakyStore, dir: impl Into<PathBuf>) -> LogShipper {
        LogShipper::new(Arc::new(remote), dir)
            .with_retry_policy(3, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_upload_reaches_remote_first_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let shipper = shipper(FlakyStore::failing_times(0), dir.path());

        let outcome = shipper
            .upload_with_outcome("logs/echo/a.log", b"hi\n")
            .await
            .unwrap();
        assert_eq!(outcome, UploadOutcome::Remote);
        assert!(!dir.path().join("logs/echo/a.log").exists());
    }

    #[tokio::test]
    async fn test_upload_retries_then_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let shipper = shipper(FlakyStore::failing_times(2), dir.path());

        let outcome = shipper
            .upload_with_outcome("logs/echo/b.log", b"hi\n")
            .await
            .unwrap();
        assert_eq!(outcome, UploadOutcome::Remote);
    }

    #[tokio::test]
    async fn test_upload_spills_after_exhaustion() {
        let dir = tempfile::tempdir().unwrap();
        let shipper = shipper(FlakyStore::failing_times(u32::MAX), dir.path());

        let outcome = shipper
            .upload_with_outcome("logs/echo/c.log", b"hi\n")
            .await
            .unwrap();
        assert_eq!(outcome, UploadOutcome::Spilled);

        // 落盘内容逐字节一致，中间目录已创建
        let spilled = std::fs::read(dir.path().join("logs/echo/c.log")).unwrap();
        assert_eq!(spilled, b"hi\n");
    }

    #[tokio::test]
    async fn test_caller_never_observes_upload_error() {
        let dir = tempfile::tempdir().unwrap();
        let shipper = shipper(FlakyStore::failing_times(u32::MAX), dir.path());
        let store: &dyn LogStore = &shipper;
        assert!(store.upload("failed_tasks/x_1.log", b"boom").await.is_ok());
    }

    #[tokio::test]
    async fn test_list_spilled_walks_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        let shipper = shipper(FlakyStore::failing_times(u32::MAX), dir.path());

        shipper.upload("logs/echo/a.log", b"1").await.unwrap();
        shipper.upload("failed_tasks/echo_1.log", b"2").await.unwrap();

        let files = shipper.list_spilled().await.unwrap();
        assert_eq!(files, vec!["failed_tasks/echo_1.log", "logs/echo/a.log"]);
    }

    #[tokio::test]
    async fn test_list_spilled_empty_when_no_spill_yet() {
        let dir = tempfile::tempdir().unwrap();
        let shipper = shipper(FlakyStore::failing_times(0), dir.path().join("missing"));
        assert!(shipper.list_spilled().await.unwrap().is_empty());
    }
}
