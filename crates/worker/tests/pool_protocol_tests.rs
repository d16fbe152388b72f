//! 工作池单任务协议的集成测试
//!
//! 用脚本化执行器驱动重试路径，校验终态、指标行数与日志对象键。

use std::sync::Arc;
use std::time::{Duration, Instant};

use taskmill_domain::entities::TaskStatus;
use taskmill_domain::ports::{CommandRunner, LogStore};
use taskmill_domain::repositories::TaskRepository;
use taskmill_testing_utils::{
    InMemoryLogStore, MockMetricsSource, MockTaskRepository, ScriptedRunner, TaskBuilder,
};
use taskmill_worker::{WorkerPool, WorkerPoolConfig};

struct Harness {
    repo: Arc<MockTaskRepository>,
    log_store: Arc<InMemoryLogStore>,
    runner: Arc<ScriptedRunner>,
    pool: WorkerPool,
}

fn harness(config: WorkerPoolConfig, runner: ScriptedRunner) -> Harness {
    let repo = Arc::new(MockTaskRepository::new());
    let log_store = Arc::new(InMemoryLogStore::new());
    let runner = Arc::new(runner);
    let pool = WorkerPool::new(
        config,
        Arc::clone(&repo) as Arc<dyn TaskRepository>,
        Arc::clone(&log_store) as Arc<dyn LogStore>,
        Arc::new(MockMetricsSource::new()),
        Arc::clone(&runner) as Arc<dyn CommandRunner>,
    );
    Harness {
        repo,
        log_store,
        runner,
        pool,
    }
}

fn quick_config() -> WorkerPoolConfig {
    WorkerPoolConfig {
        worker_count: 1,
        retry_limit: 3,
        retry_delay: Duration::from_millis(10),
        queue_capacity: 100,
    }
}

#[tokio::test]
async fn test_success_writes_terminal_status_and_metrics() {
    let runner = ScriptedRunner::new();
    runner.push_success("hi\n");
    let h = harness(quick_config(), runner);

    let task = TaskBuilder::new("echo").id(7).build();
    h.repo.seed(task.clone());

    h.pool.start().await;
    h.pool.add_task(task).await.unwrap();
    h.pool.stop().await;

    assert_eq!(h.repo.task_status(7), Some(TaskStatus::Completed));
    // 起止时间已写入
    let stored = h.repo.get(7).await.unwrap().unwrap();
    assert!(stored.start_time.is_some());
    assert!(stored.end_time.is_some());

    // 前置、尝试后、成功后共三份主机样本，外加一份进程样本
    let rows = h.repo.metric_rows(7);
    let host_rows = rows.iter().filter(|r| r.load_average.is_some()).count();
    let process_rows = rows.iter().filter(|r| r.load_average.is_none()).count();
    assert_eq!(host_rows, 3);
    assert_eq!(process_rows, 1);

    // 成功输出归档在 logs/<job_name>/ 之下
    let keys = h.log_store.keys();
    assert_eq!(keys.len(), 1);
    assert!(keys[0].starts_with("logs/echo/"));
    assert!(keys[0].ends_with(".log"));
    assert_eq!(h.log_store.object(&keys[0]).unwrap(), b"hi\n");
}

#[tokio::test]
async fn test_success_on_attempt_k_leaves_k_minus_one_failure_blobs() {
    let runner = ScriptedRunner::new();
    runner.push_failure("boom 1");
    runner.push_failure("boom 2");
    runner.push_success("ok\n");
    let h = harness(quick_config(), runner);

    let task = TaskBuilder::new("flaky").id(3).build();
    h.repo.seed(task.clone());

    h.pool.start().await;
    h.pool.add_task(task).await.unwrap();
    h.pool.stop().await;

    assert_eq!(h.runner.call_count(), 3);
    assert_eq!(h.repo.task_status(3), Some(TaskStatus::Completed));

    let keys = h.log_store.keys();
    let failures: Vec<&String> = keys
        .iter()
        .filter(|k| k.starts_with("failed_tasks/"))
        .collect();
    assert_eq!(failures.len(), 2);
    assert!(keys.contains(&"failed_tasks/flaky_1.log".to_string()));
    assert!(keys.contains(&"failed_tasks/flaky_2.log".to_string()));
    assert_eq!(keys.iter().filter(|k| k.starts_with("logs/")).count(), 1);

    // 失败记录包含任务名、尝试序号、错误与 RFC3339 时间戳
    let blob = h.log_store.object("failed_tasks/flaky_1.log").unwrap();
    let text = String::from_utf8(blob).unwrap();
    assert!(text.contains("Task: flaky"));
    assert!(text.contains("Attempt: 1"));
    assert!(text.contains("Error: boom 1"));
    assert!(text.contains("Timestamp: "));
}

#[tokio::test]
async fn test_exhausted_retries_mark_failed_with_final_blob() {
    let runner = ScriptedRunner::new();
    runner.push_failure("always 1");
    runner.push_failure("always 2");
    let h = harness(
        WorkerPoolConfig {
            retry_limit: 2,
            ..quick_config()
        },
        runner,
    );

    let task = TaskBuilder::new("doomed").id(9).build();
    h.repo.seed(task.clone());

    h.pool.start().await;
    h.pool.add_task(task).await.unwrap();
    h.pool.stop().await;

    assert_eq!(h.runner.call_count(), 2);
    assert_eq!(h.repo.task_status(9), Some(TaskStatus::Failed));
    let stored = h.repo.get(9).await.unwrap().unwrap();
    assert!(stored.end_time.is_some());

    let keys = h.log_store.keys();
    assert!(keys.contains(&"failed_tasks/doomed_1.log".to_string()));
    assert!(keys.contains(&"failed_tasks/doomed_2.log".to_string()));

    // 终败输出写在成功键模式下，带 Task failed: 前缀
    let final_key = keys.iter().find(|k| k.starts_with("logs/doomed/")).unwrap();
    let blob = h.log_store.object(final_key).unwrap();
    assert!(String::from_utf8(blob).unwrap().starts_with("Task failed: "));
}

#[tokio::test]
async fn test_spawn_error_is_a_failed_attempt() {
    let runner = ScriptedRunner::new();
    runner.push_spawn_error("no such shell");
    runner.push_success("ok\n");
    let h = harness(quick_config(), runner);

    let task = TaskBuilder::new("spawny").id(2).build();
    h.repo.seed(task.clone());

    h.pool.start().await;
    h.pool.add_task(task).await.unwrap();
    h.pool.stop().await;

    assert_eq!(h.repo.task_status(2), Some(TaskStatus::Completed));
    let blob = h.log_store.object("failed_tasks/spawny_1.log").unwrap();
    assert!(String::from_utf8(blob).unwrap().contains("no such shell"));
}

#[tokio::test]
async fn test_zero_retry_limit_marks_failed_without_attempt() {
    let runner = ScriptedRunner::new();
    let h = harness(
        WorkerPoolConfig {
            retry_limit: 0,
            ..quick_config()
        },
        runner,
    );

    let task = TaskBuilder::new("never").id(5).build();
    h.repo.seed(task.clone());

    h.pool.start().await;
    h.pool.add_task(task).await.unwrap();
    h.pool.stop().await;

    // 一次都没有尝试，但终态仍然写入
    assert_eq!(h.runner.call_count(), 0);
    assert_eq!(h.repo.task_status(5), Some(TaskStatus::Failed));
}

#[tokio::test]
async fn test_add_task_applies_backpressure_when_queue_full() {
    let runner = ScriptedRunner::new().with_delay(Duration::from_millis(200));
    let h = harness(
        WorkerPoolConfig {
            worker_count: 1,
            queue_capacity: 1,
            retry_limit: 1,
            retry_delay: Duration::from_millis(1),
        },
        runner,
    );

    h.pool.start().await;

    let started = Instant::now();
    for i in 0..4 {
        let task = TaskBuilder::new("slow").id(i + 1).build();
        h.repo.seed(task.clone());
        h.pool.add_task(task).await.unwrap();
    }
    // 容量 1 的队列迫使生产者等待 worker 消化
    assert!(started.elapsed() >= Duration::from_millis(300));

    h.pool.stop().await;
    for i in 1..=4 {
        assert_eq!(h.repo.task_status(i), Some(TaskStatus::Completed));
    }
}

#[tokio::test]
async fn test_stop_drains_queued_tasks() {
    let runner = ScriptedRunner::new().with_delay(Duration::from_millis(50));
    let h = harness(
        WorkerPoolConfig {
            worker_count: 2,
            retry_limit: 1,
            retry_delay: Duration::from_millis(1),
            queue_capacity: 100,
        },
        runner,
    );

    h.pool.start().await;
    for i in 0..6 {
        let task = TaskBuilder::new("drain").id(i + 1).build();
        h.repo.seed(task.clone());
        h.pool.add_task(task).await.unwrap();
    }
    h.pool.stop().await;

    // stop 返回时所有已入队任务都已到达终态
    for i in 1..=6 {
        assert_eq!(h.repo.task_status(i), Some(TaskStatus::Completed));
    }
}

#[tokio::test]
async fn test_single_worker_preserves_enqueue_order() {
    let h = harness(
        WorkerPoolConfig {
            worker_count: 1,
            retry_limit: 1,
            retry_delay: Duration::from_millis(1),
            queue_capacity: 100,
        },
        ScriptedRunner::new(),
    );

    h.pool.start().await;
    for id in [3, 1, 7, 2] {
        let task = TaskBuilder::new("fifo").id(id).build();
        h.repo.seed(task.clone());
        h.pool.add_task(task).await.unwrap();
    }
    h.pool.stop().await;

    // 单生产者下出队顺序等于入队顺序
    assert_eq!(h.runner.executed_ids(), vec![3, 1, 7, 2]);
}

#[tokio::test]
async fn test_add_task_after_stop_is_rejected() {
    let h = harness(quick_config(), ScriptedRunner::new());
    h.pool.start().await;
    h.pool.stop().await;

    let task = TaskBuilder::new("late").id(42).build();
    assert!(h.pool.add_task(task).await.is_err());
}
