// ==========================================
// 仓储决策核心 - 应用层
// ==========================================
// 职责: 状态装配与入口支撑
// ==========================================

pub mod state;

pub use state::{get_default_db_path, AppState};
