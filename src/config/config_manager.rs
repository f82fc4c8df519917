// ==========================================
// 仓储决策核心 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope, 当前仅 global)
// 约定: 值非法时回退默认并告警，不让坏配置拖垮引擎
// ==========================================

use crate::db::open_sqlite_connection;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::HashMap;
use std::error::Error;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_config_value(key)
    }

    /// 从 config_kv 表读取配置值，带默认值
    fn get_config_or_default(&self, key: &str, default: &str) -> Result<String, Box<dyn Error>> {
        Ok(self
            .get_config_value(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    /// 写入/覆盖 global scope 配置（UPSERT）
    pub fn set_config(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2",
            params![key, value],
        )?;
        Ok(())
    }

    /// 获取所有配置的快照（JSON格式）
    ///
    /// # 用途
    /// - 诊断与导出；保证现场配置可复现
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt = conn
            .prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let mut config_map: HashMap<String, String> = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        let json_value = json!(config_map);
        Ok(serde_json::to_string(&json_value)?)
    }

    // ===== 仓库标识 =====

    /// 当前仓库编号（默认 WH001）
    pub fn get_warehouse_id(&self) -> Result<String, Box<dyn Error>> {
        self.get_config_or_default(config_keys::WAREHOUSE_ID, "WH001")
    }

    // ===== 路径规划配置 =====

    /// 步行速度（米/秒，默认 2.0）
    pub fn get_walking_speed_mps(&self) -> Result<f64, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::WALKING_SPEED_MPS, "2.0")?;
        Ok(value.parse::<f64>().unwrap_or(2.0))
    }

    /// 单步拣选耗时（秒，默认 30）
    pub fn get_pick_time_seconds(&self) -> Result<f64, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::PICK_TIME_SECONDS, "30")?;
        Ok(value.parse::<f64>().unwrap_or(30.0))
    }

    /// 图构建超时（毫秒）。未配置或配置为 0 表示不限时。
    pub fn get_graph_build_timeout_ms(&self) -> Result<Option<u64>, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::GRAPH_BUILD_TIMEOUT_MS, "0")?;
        let ms = value.parse::<u64>().unwrap_or(0);
        Ok(if ms == 0 { None } else { Some(ms) })
    }

    // ===== 补货计划配置 =====

    /// 安全库存天数（默认 3）
    pub fn get_safety_stock_days(&self) -> Result<i64, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::SAFETY_STOCK_DAYS, "3")?;
        Ok(value.parse::<i64>().unwrap_or(3))
    }

    /// 默认采购提前期（天，默认 7）
    pub fn get_default_lead_time_days(&self) -> Result<i64, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::DEFAULT_LEAD_TIME_DAYS, "7")?;
        Ok(value.parse::<i64>().unwrap_or(7))
    }

    // ===== 冷链阈值配置 =====

    /// 冷藏温度下限（摄氏度，默认 2.0）
    pub fn get_temp_min_celsius(&self) -> Result<f64, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::TEMP_MIN_CELSIUS, "2.0")?;
        Ok(value.parse::<f64>().unwrap_or(2.0))
    }

    /// 冷藏温度上限（摄氏度，默认 8.0）
    pub fn get_temp_max_celsius(&self) -> Result<f64, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::TEMP_MAX_CELSIUS, "8.0")?;
        Ok(value.parse::<f64>().unwrap_or(8.0))
    }

    /// 湿度下限（百分比，默认 30）
    pub fn get_humidity_min_percent(&self) -> Result<f64, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::HUMIDITY_MIN_PERCENT, "30")?;
        Ok(value.parse::<f64>().unwrap_or(30.0))
    }

    /// 湿度上限（百分比，默认 60）
    pub fn get_humidity_max_percent(&self) -> Result<f64, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::HUMIDITY_MAX_PERCENT, "60")?;
        Ok(value.parse::<f64>().unwrap_or(60.0))
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 仓库标识
    pub const WAREHOUSE_ID: &str = "warehouse_id";

    // 路径规划
    pub const WALKING_SPEED_MPS: &str = "walking_speed_mps";
    pub const PICK_TIME_SECONDS: &str = "pick_time_seconds";
    pub const GRAPH_BUILD_TIMEOUT_MS: &str = "graph_build_timeout_ms";

    // 补货计划
    pub const SAFETY_STOCK_DAYS: &str = "safety_stock_days";
    pub const DEFAULT_LEAD_TIME_DAYS: &str = "default_lead_time_days";

    // 冷链阈值
    pub const TEMP_MIN_CELSIUS: &str = "temp_min_celsius";
    pub const TEMP_MAX_CELSIUS: &str = "temp_max_celsius";
    pub const HUMIDITY_MIN_PERCENT: &str = "humidity_min_percent";
    pub const HUMIDITY_MAX_PERCENT: &str = "humidity_max_percent";
}
