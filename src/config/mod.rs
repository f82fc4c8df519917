// ==========================================
// 仓储决策核心 - 配置管理层
// ==========================================
// 职责: 配置存取（config_kv 表, global scope）
// ==========================================

pub mod config_manager;

pub use config_manager::{config_keys, ConfigManager};
