// ==========================================
// 仓储决策核心 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 职责: 提供数据访问接口，屏蔽数据库细节
// 约束: 所有查询使用参数化，防止 SQL 注入
// ==========================================

pub mod audit_repo;
pub mod error;
pub mod location_repo;
pub mod product_repo;
pub mod stock_repo;

// 重导出核心仓储
pub use audit_repo::AuditLogRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use location_repo::LocationRepository;
pub use product_repo::ProductRepository;
pub use stock_repo::StockRepository;
