// ==========================================
// 仓储决策核心 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 库存台账 + 拣选路径决策引擎（人工最终控制权）
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 装配与入口
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    AuditAction, LocationType, MovementKind, StockStatus, VelocityClass,
};

// 领域实体
pub use domain::{AuditEntry, Location, Product, StockRecord};

// 引擎
pub use engine::{
    EngineError, EngineResult, PutawayAdvisor, RouteOptimizer, StockLedger, WarehouseGraph,
    WarehouseGraphBuilder,
};

// API
pub use api::{ApiError, Dispatcher, EngineRequest, InventoryApi, OperationsApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "仓储决策核心";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
