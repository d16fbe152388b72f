use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use taskmill_domain::entities::{
    HostMetricSample, NewTask, ProcessMetricSample, StatusCount, Task, TaskMetricRecord,
    TaskStatus,
};
use taskmill_domain::repositories::TaskRepository;
use taskmill_errors::SchedulerResult;

/// SQLite 任务仓储
pub struct SqliteTaskRepository {
    pool: SqlitePool,
}

impl SqliteTaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// 创建嵌入式仓储：建立连接池并初始化表结构
    pub async fn new_embedded(database_url: &str) -> SchedulerResult<Self> {
        Self::new_with_pool_options(database_url, 5, 1, std::time::Duration::from_secs(30)).await
    }

    /// 按给定的连接池参数创建仓储
    pub async fn new_with_pool_options(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout: std::time::Duration,
    ) -> SchedulerResult<Self> {
        use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
        use std::str::FromStr;

        debug!("Creating SQLite task repository at: {}", database_url);

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        // 内存库的每个连接都是独立实例，固定单连接
        let max_connections = if database_url.contains(":memory:") {
            1
        } else {
            max_connections
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections.min(max_connections))
            .acquire_timeout(acquire_timeout)
            .connect_with(connect_options)
            .await?;

        Self::run_migrations(&pool).await?;

        Ok(Self { pool })
    }

    /// 初始化表结构
    async fn run_migrations(pool: &SqlitePool) -> SchedulerResult<()> {
        debug!("Running SQLite database migrations");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                job_name TEXT NOT NULL,
                command TEXT NOT NULL,
                interval_seconds INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'pending',
                created_at DATETIME NOT NULL,
                start_time DATETIME,
                end_time DATETIME,
                updated_at DATETIME NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS task_metrics (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                task_id INTEGER NOT NULL,
                cpu_usage REAL NOT NULL,
                ram_usage REAL NOT NULL,
                disk_usage REAL NOT NULL,
                load_average REAL,
                gpu_usage REAL,
                recorded_at DATETIME NOT NULL,
                FOREIGN KEY (task_id) REFERENCES tasks(id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(pool)
        .await?;

        let indexes = [
            "CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status)",
            "CREATE INDEX IF NOT EXISTS idx_task_metrics_task_id ON task_metrics(task_id)",
        ];
        for index_sql in indexes {
            sqlx::query(index_sql).execute(pool).await?;
        }

        Ok(())
    }

    fn row_to_task(row: &sqlx::sqlite::SqliteRow) -> SchedulerResult<Task> {
        let status: String = row.try_get("status")?;

        Ok(Task {
            id: row.try_get("id")?,
            job_name: row.try_get("job_name")?,
            command: row.try_get("command")?,
            interval_seconds: row.try_get("interval_seconds")?,
            status: status.parse::<TaskStatus>()?,
            created_at: row.try_get("created_at")?,
            start_time: row.try_get("start_time")?,
            end_time: row.try_get("end_time")?,
        })
    }

    fn row_to_metric(row: &sqlx::sqlite::SqliteRow) -> SchedulerResult<TaskMetricRecord> {
        Ok(TaskMetricRecord {
            task_id: row.try_get("task_id")?,
            cpu_usage: row.try_get("cpu_usage")?,
            ram_usage: row.try_get("ram_usage")?,
            disk_usage: row.try_get("disk_usage")?,
            load_average: row.try_get("load_average")?,
            gpu_usage: row.try_get("gpu_usage")?,
            recorded_at: row.try_get("recorded_at")?,
        })
    }
}

#[async_trait]
impl TaskRepository for SqliteTaskRepository {
    async fn insert(&self, task: &NewTask) -> SchedulerResult<i64> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO tasks (job_name, command, interval_seconds, status, created_at, updated_at)
            VALUES (?, ?, ?, 'pending', ?, ?)
            "#,
        )
        .bind(&task.job_name)
        .bind(&task.command)
        .bind(task.interval_seconds)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn list(&self) -> SchedulerResult<Vec<Task>> {
        let rows = sqlx::query(
            r#"
            SELECT id, job_name, command, interval_seconds, status,
                   created_at, start_time, end_time
            FROM tasks
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_task).collect()
    }

    async fn get(&self, id: i64) -> SchedulerResult<Option<Task>> {
        let row = sqlx::query(
            r#"
            SELECT id, job_name, command, interval_seconds, status,
                   created_at, start_time, end_time
            FROM tasks
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_task).transpose()
    }

    async fn delete(&self, id: i64) -> SchedulerResult<()> {
        sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn fetch_pending(&self) -> SchedulerResult<Vec<Task>> {
        let rows = sqlx::query(
            r#"
            SELECT id, job_name, command, interval_seconds, status,
                   created_at, start_time, end_time
            FROM tasks
            WHERE status IN ('pending', 'running')
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_task).collect()
    }

    async fn update_status(&self, id: i64, status: TaskStatus) -> SchedulerResult<()> {
        sqlx::query("UPDATE tasks SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_execution(
        &self,
        id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        status: TaskStatus,
    ) -> SchedulerResult<()> {
        sqlx::query(
            r#"
            UPDATE tasks
            SET start_time = ?, end_time = ?, status = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(start)
        .bind(end)
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_host_metric(
        &self,
        task_id: i64,
        sample: &HostMetricSample,
    ) -> SchedulerResult<()> {
        sqlx::query(
            r#"
            INSERT INTO task_metrics
                (task_id, cpu_usage, ram_usage, disk_usage, load_average, gpu_usage, recorded_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(task_id)
        .bind(sample.cpu_pct)
        .bind(sample.ram_pct)
        .bind(sample.disk_pct)
        .bind(sample.load1)
        .bind(sample.gpu_pct)
        .bind(sample.recorded_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_process_metric(
        &self,
        task_id: i64,
        sample: &ProcessMetricSample,
    ) -> SchedulerResult<()> {
        sqlx::query(
            r#"
            INSERT INTO task_metrics (task_id, cpu_usage, ram_usage, disk_usage, recorded_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(task_id)
        .bind(sample.cpu_pct)
        .bind(sample.ram_pct)
        .bind(sample.disk_pct)
        .bind(sample.recorded_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fetch_metrics(&self, task_id: i64) -> SchedulerResult<Vec<TaskMetricRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT task_id, cpu_usage, ram_usage, disk_usage, load_average, gpu_usage, recorded_at
            FROM task_metrics
            WHERE task_id = ?
            ORDER BY recorded_at
            "#,
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_metric).collect()
    }

    async fn count_by_status(&self) -> SchedulerResult<Vec<StatusCount>> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS count FROM tasks GROUP BY status")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                Ok(StatusCount {
                    status: row.try_get("status")?,
                    count: row.try_get("count")?,
                })
            })
            .collect()
    }
}
