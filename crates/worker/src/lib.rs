//! 任务执行层
//!
//! Shell 命令执行器与有界工作池：执行器负责单次命令调用及其进程
//! 指标采样；工作池消费任务队列，围绕每次调用执行重试、指标落库、
//! 状态更新与日志归档协议。

pub mod pool;
pub mod runner;

pub use pool::{WorkerPool, WorkerPoolConfig};
pub use runner::ShellRunner;
