// ==========================================
// 仓储决策核心 - 应用状态
// ==========================================
// 职责: 装配共享连接、仓储、引擎、API 与分发器
// 约定: 全部组件共享同一个 Arc<Mutex<Connection>>，
//       写路径经台账事务串行化
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::{Dispatcher, InventoryApi, OperationsApi};
use crate::config::ConfigManager;
use crate::db::{init_schema, open_sqlite_connection, read_schema_version, CURRENT_SCHEMA_VERSION};
use crate::engine::StockLedger;
use crate::repository::{
    AuditLogRepository, LocationRepository, ProductRepository, StockRepository,
};

/// 应用状态
///
/// 持有分发器与主数据仓储（建库/导入场景直接使用）。
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 操作分发器
    pub dispatcher: Arc<Dispatcher>,

    /// 产品主数据仓储（主数据维护用）
    pub product_repo: Arc<ProductRepository>,

    /// 库位主数据仓储（主数据维护用）
    pub location_repo: Arc<LocationRepository>,
}

impl AppState {
    /// 创建新的 AppState 实例
    ///
    /// 流程: 打开连接 -> 初始化 schema -> 装配仓储/引擎/API
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化 AppState, 数据库路径: {}", db_path);

        let conn =
            open_sqlite_connection(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        init_schema(&conn).map_err(|e| format!("无法初始化数据库 schema: {}", e))?;
        match read_schema_version(&conn) {
            Ok(Some(v)) if v != CURRENT_SCHEMA_VERSION => {
                tracing::warn!(
                    "数据库 schema 版本 {} 与期望版本 {} 不一致",
                    v,
                    CURRENT_SCHEMA_VERSION
                );
            }
            Err(e) => tracing::warn!("读取 schema 版本失败: {}", e),
            _ => {}
        }
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 仓储层（共享连接）
        // ==========================================
        let product_repo = Arc::new(ProductRepository::from_connection(Arc::clone(&conn)));
        let location_repo = Arc::new(LocationRepository::from_connection(Arc::clone(&conn)));
        let stock_repo = StockRepository::from_connection(Arc::clone(&conn));

        // ==========================================
        // 引擎与配置
        // ==========================================
        let ledger = StockLedger::from_connection(Arc::clone(&conn));
        let config = ConfigManager::from_connection(Arc::clone(&conn))
            .map_err(|e| format!("无法创建 ConfigManager: {}", e))?;
        let ops_config = ConfigManager::from_connection(Arc::clone(&conn))
            .map_err(|e| format!("无法创建 ConfigManager: {}", e))?;

        // ==========================================
        // API 层与分发器
        // ==========================================
        let inventory_api = InventoryApi::new(
            ledger,
            ProductRepository::from_connection(Arc::clone(&conn)),
            LocationRepository::from_connection(Arc::clone(&conn)),
            StockRepository::from_connection(Arc::clone(&conn)),
            AuditLogRepository::from_connection(Arc::clone(&conn)),
            config,
        );
        let operations_api = OperationsApi::new(
            ProductRepository::from_connection(Arc::clone(&conn)),
            LocationRepository::from_connection(Arc::clone(&conn)),
            stock_repo,
            ops_config,
        );
        let dispatcher = Arc::new(Dispatcher::new(inventory_api, operations_api));

        tracing::info!("AppState 初始化完成");
        Ok(Self {
            db_path,
            dispatcher,
            product_repo,
            location_repo,
        })
    }
}

/// 默认数据库路径: <数据目录>/wms-core/wms.db（目录不存在时退回当前目录）
pub fn get_default_db_path() -> String {
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("wms-core");
        if std::fs::create_dir_all(&dir).is_ok() {
            return dir.join("wms.db").to_string_lossy().to_string();
        }
    }
    "wms.db".to_string()
}
