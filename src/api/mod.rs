// ==========================================
// 仓储决策核心 - API 层
// ==========================================
// 职责: 参数校验、引擎编排、报表组装、操作分发
// 红线: 业务语义在引擎层，API 不复制数量规则
// ==========================================

pub mod dispatch;
pub mod error;
pub mod inventory_api;
pub mod operations_api;

// 重导出核心 API 类型
pub use dispatch::{Dispatcher, EngineRequest};
pub use error::{ApiError, ApiResult};
pub use inventory_api::InventoryApi;
pub use operations_api::OperationsApi;
