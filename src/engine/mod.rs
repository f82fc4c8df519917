// ==========================================
// 仓储决策核心 - 引擎层
// ==========================================
// 红线: 引擎无状态（台账除外，其持连接执行事务）
// 职责: 台账事务 / 仓库图 / 拣选路径 / 上架建议 / 补货计算
// ==========================================

pub mod error;
pub mod graph;
pub mod ledger;
pub mod putaway;
pub mod replenishment;
pub mod route;

// 重导出核心引擎类型
pub use error::{EngineError, EngineResult};
pub use graph::{GraphNode, WarehouseGraph, WarehouseGraphBuilder};
pub use ledger::{
    AdjustOutcome, AllocateOutcome, DeallocateOutcome, ReconcileOutcome, StockLedger,
};
pub use putaway::{PutawayAdvisor, PutawaySuggestion};
pub use route::{PickDemand, PickRoute, PickStep, PickTask, RouteOptimizer};
