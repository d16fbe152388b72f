//! 领域模型与能力抽象
//!
//! 定义任务实体、指标样本以及数据访问/日志存储/指标采集的抽象接口，
//! 遵循依赖倒置原则：执行引擎只依赖本 crate 的 trait，不依赖具体实现。

pub mod entities;
pub mod ports;
pub mod repositories;

pub use entities::*;
pub use ports::*;
pub use repositories::*;
pub use taskmill_errors::{SchedulerError, SchedulerResult};
