// ==========================================
// 仓储决策核心 - 领域层
// ==========================================
// 职责: 值类型实体与枚举，无数据访问、无业务流程
// ==========================================

pub mod audit;
pub mod location;
pub mod product;
pub mod stock;
pub mod types;

// 重导出核心实体
pub use audit::{AuditEntry, ENTITY_STOCK_RECORD};
pub use location::Location;
pub use product::Product;
pub use stock::StockRecord;
pub use types::{AuditAction, LocationType, MovementKind, StockStatus, VelocityClass};
