//! 管理接口
//!
//! 围绕任务仓储与日志存储的薄 CRUD 外壳，不触碰执行引擎的状态。

pub mod error;
pub mod handlers;
pub mod routes;

pub use error::{ApiError, ApiResult};
pub use routes::{create_routes, AppState};
