//! Mock implementations for the domain capability traits
//!
//! These are plain in-memory fakes: no I/O, deterministic, safe for
//! concurrent use from multiple workers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use taskmill_domain::entities::{
    HostMetricSample, NewTask, ProcessMetricSample, StatusCount, Task, TaskMetricRecord,
    TaskStatus,
};
use taskmill_domain::ports::{CommandRunner, ExecutionReport, LogStore, MetricsSource};
use taskmill_domain::repositories::TaskRepository;
use taskmill_errors::{SchedulerError, SchedulerResult};

/// In-memory implementation of `TaskRepository`.
#[derive(Default)]
pub struct MockTaskRepository {
    tasks: Mutex<HashMap<i64, Task>>,
    metrics: Mutex<Vec<TaskMetricRecord>>,
    next_id: Mutex<i64>,
    fail_fetch_pending: AtomicBool,
}

impl MockTaskRepository {
    pub fn new() -> Self {
        Self {
            next_id: Mutex::new(1),
            ..Default::default()
        }
    }

    /// Make every subsequent `fetch_pending` call fail.
    pub fn set_fail_fetch_pending(&self, fail: bool) {
        self.fail_fetch_pending.store(fail, Ordering::SeqCst);
    }

    /// Seed a task directly, bypassing `insert`.
    pub fn seed(&self, task: Task) {
        let mut next_id = self.next_id.lock().unwrap();
        if task.id >= *next_id {
            *next_id = task.id + 1;
        }
        self.tasks.lock().unwrap().insert(task.id, task);
    }

    pub fn task_status(&self, id: i64) -> Option<TaskStatus> {
        self.tasks.lock().unwrap().get(&id).map(|t| t.status)
    }

    pub fn metric_rows(&self, task_id: i64) -> Vec<TaskMetricRecord> {
        self.metrics
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.task_id == task_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl TaskRepository for MockTaskRepository {
    async fn insert(&self, task: &NewTask) -> SchedulerResult<i64> {
        let id = {
            let mut next_id = self.next_id.lock().unwrap();
            let id = *next_id;
            *next_id += 1;
            id
        };
        self.tasks.lock().unwrap().insert(
            id,
            Task {
                id,
                job_name: task.job_name.clone(),
                command: task.command.clone(),
                interval_seconds: task.interval_seconds,
                status: TaskStatus::Pending,
                created_at: Utc::now(),
                start_time: None,
                end_time: None,
            },
        );
        Ok(id)
    }

    async fn list(&self) -> SchedulerResult<Vec<Task>> {
        let mut tasks: Vec<Task> = self.tasks.lock().unwrap().values().cloned().collect();
        tasks.sort_by_key(|t| t.id);
        Ok(tasks)
    }

    async fn get(&self, id: i64) -> SchedulerResult<Option<Task>> {
        Ok(self.tasks.lock().unwrap().get(&id).cloned())
    }

    async fn delete(&self, id: i64) -> SchedulerResult<()> {
        self.tasks.lock().unwrap().remove(&id);
        Ok(())
    }

    async fn fetch_pending(&self) -> SchedulerResult<Vec<Task>> {
        if self.fail_fetch_pending.load(Ordering::SeqCst) {
            return Err(SchedulerError::database_error("fetch_pending failed"));
        }
        let mut tasks: Vec<Task> = self
            .tasks
            .lock()
            .unwrap()
            .values()
            .filter(|t| t.is_eligible())
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.id);
        Ok(tasks)
    }

    async fn update_status(&self, id: i64, status: TaskStatus) -> SchedulerResult<()> {
        if let Some(task) = self.tasks.lock().unwrap().get_mut(&id) {
            task.status = status;
        }
        Ok(())
    }

    async fn update_execution(
        &self,
        id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        status: TaskStatus,
    ) -> SchedulerResult<()> {
        if let Some(task) = self.tasks.lock().unwrap().get_mut(&id) {
            task.start_time = Some(start);
            task.end_time = Some(end);
            task.status = status;
        }
        Ok(())
    }

    async fn insert_host_metric(
        &self,
        task_id: i64,
        sample: &HostMetricSample,
    ) -> SchedulerResult<()> {
        self.metrics.lock().unwrap().push(TaskMetricRecord {
            task_id,
            cpu_usage: sample.cpu_pct,
            ram_usage: sample.ram_pct,
            disk_usage: sample.disk_pct,
            load_average: Some(sample.load1),
            gpu_usage: Some(sample.gpu_pct),
            recorded_at: sample.recorded_at,
        });
        Ok(())
    }

    async fn insert_process_metric(
        &self,
        task_id: i64,
        sample: &ProcessMetricSample,
    ) -> SchedulerResult<()> {
        self.metrics.lock().unwrap().push(TaskMetricRecord {
            task_id,
            cpu_usage: sample.cpu_pct,
            ram_usage: sample.ram_pct,
            disk_usage: sample.disk_pct,
            load_average: None,
            gpu_usage: None,
            recorded_at: sample.recorded_at,
        });
        Ok(())
    }

    async fn fetch_metrics(&self, task_id: i64) -> SchedulerResult<Vec<TaskMetricRecord>> {
        Ok(self.metric_rows(task_id))
    }

    async fn count_by_status(&self) -> SchedulerResult<Vec<StatusCount>> {
        let mut counts: BTreeMap<String, i64> = BTreeMap::new();
        for task in self.tasks.lock().unwrap().values() {
            *counts.entry(task.status.as_str().to_string()).or_insert(0) += 1;
        }
        Ok(counts
            .into_iter()
            .map(|(status, count)| StatusCount { status, count })
            .collect())
    }
}

/// In-memory implementation of `LogStore`.
///
/// Uploads always succeed and land in a sorted map; spilled file names can
/// be seeded for admin-surface tests.
#[derive(Default)]
pub struct InMemoryLogStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    spilled: Mutex<Vec<String>>,
}

impl InMemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn seed_spilled(&self, name: &str) {
        self.spilled.lock().unwrap().push(name.to_string());
    }
}

#[async_trait]
impl LogStore for InMemoryLogStore {
    async fn upload(&self, key: &str, content: &[u8]) -> SchedulerResult<()> {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), content.to_vec());
        Ok(())
    }

    async fn list(&self, prefix: &str) -> SchedulerResult<Vec<String>> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn fetch(&self, key: &str) -> SchedulerResult<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| SchedulerError::log_store_error(format!("no such key: {key}")))
    }

    async fn list_spilled(&self) -> SchedulerResult<Vec<String>> {
        Ok(self.spilled.lock().unwrap().clone())
    }
}

/// Fixed-value implementation of `MetricsSource`.
pub struct MockMetricsSource {
    cpu_pct: f64,
    ram_pct: f64,
}

impl MockMetricsSource {
    pub fn new() -> Self {
        Self {
            cpu_pct: 10.0,
            ram_pct: 25.0,
        }
    }
}

impl Default for MockMetricsSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSource for MockMetricsSource {
    fn sample_host(&self) -> HostMetricSample {
        HostMetricSample {
            cpu_pct: self.cpu_pct,
            ram_pct: self.ram_pct,
            disk_pct: 50.0,
            load1: 0.5,
            gpu_pct: 0.0,
            recorded_at: Utc::now(),
        }
    }

    fn sample_process(&self, _pid: u32) -> ProcessMetricSample {
        ProcessMetricSample {
            cpu_pct: self.cpu_pct,
            ram_pct: self.ram_pct,
            disk_pct: 0.0,
            recorded_at: Utc::now(),
        }
    }
}

/// Scripted implementation of `CommandRunner`.
///
/// Pops one pre-programmed outcome per invocation; once the script is
/// exhausted every further invocation succeeds with `ok\n`. An optional
/// per-invocation delay simulates long-running commands.
pub struct ScriptedRunner {
    outcomes: Mutex<VecDeque<SchedulerResult<ExecutionReport>>>,
    executed: Mutex<Vec<i64>>,
    delay: Duration,
    calls: AtomicU32,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self {
            outcomes: Mutex::new(VecDeque::new()),
            executed: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
            calls: AtomicU32::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Queue a successful run with the given output.
    pub fn push_success(&self, output: &str) {
        self.outcomes.lock().unwrap().push_back(Ok(ExecutionReport {
            output: output.to_string(),
            samples: vec![ProcessMetricSample {
                cpu_pct: 1.0,
                ram_pct: 1.0,
                disk_pct: 0.0,
                recorded_at: Utc::now(),
            }],
            exit_code: Some(0),
            error: None,
        }));
    }

    /// Queue a run that exits non-zero.
    pub fn push_failure(&self, message: &str) {
        self.outcomes.lock().unwrap().push_back(Ok(ExecutionReport {
            output: format!("{message}\n"),
            samples: Vec::new(),
            exit_code: Some(1),
            error: Some(message.to_string()),
        }));
    }

    /// Queue a spawn error.
    pub fn push_spawn_error(&self, message: &str) {
        self.outcomes
            .lock()
            .unwrap()
            .push_back(Err(SchedulerError::CommandSpawn(message.to_string())));
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Task ids in the order the runner saw them.
    pub fn executed_ids(&self) -> Vec<i64> {
        self.executed.lock().unwrap().clone()
    }
}

impl Default for ScriptedRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, task: &Task) -> SchedulerResult<ExecutionReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.executed.lock().unwrap().push(task.id);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let next = self.outcomes.lock().unwrap().pop_front();
        match next {
            Some(outcome) => outcome,
            None => Ok(ExecutionReport {
                output: "ok\n".to_string(),
                samples: Vec::new(),
                exit_code: Some(0),
                error: None,
            }),
        }
    }
}
