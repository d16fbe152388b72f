//! 基础设施层
//!
//! 领域抽象的具体实现：SQLite 任务仓储、HTTP 对象存储客户端、
//! 带本地兜底的日志归档器，以及基于 sysinfo 的系统指标采集。

pub mod database;
pub mod log_shipper;
pub mod object_store;
pub mod system_monitor;

pub use database::SqliteTaskRepository;
pub use log_shipper::{LogShipper, UploadOutcome};
pub use object_store::{HttpObjectStore, ObjectStoreClient};
pub use system_monitor::SystemMonitor;
