// ==========================================
// 仓储决策核心 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为，避免"部分模块外键开启/部分不开启"
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 提供内置 schema 初始化（products/locations/stock_records/audit_log/config_kv）
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
///
/// 说明：版本号用于提示/告警（不做自动迁移），避免静默在旧库上运行导致隐性错误。
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要"每个连接"单独开启
/// - busy_timeout 需要"每个连接"单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 初始化数据库 schema（幂等）
///
/// 表结构:
/// - products: 产品主数据（SKU 唯一）
/// - locations: 库位（code 唯一，current_units 仅由台账维护）
/// - stock_records: 库存记录（product × location × lot 唯一）
/// - audit_log: 审计日志（仅追加）
/// - config_scope / config_kv: 配置存储
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS products (
            id TEXT PRIMARY KEY,
            sku TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            category TEXT NOT NULL DEFAULT '',
            unit_of_measure TEXT NOT NULL DEFAULT 'EACH',
            requires_cold_storage INTEGER NOT NULL DEFAULT 0,
            is_hazmat INTEGER NOT NULL DEFAULT 0,
            is_fragile INTEGER NOT NULL DEFAULT 0,
            shelf_life_days INTEGER,
            reorder_point INTEGER NOT NULL DEFAULT 10,
            reorder_quantity INTEGER NOT NULL DEFAULT 50,
            min_stock_level INTEGER NOT NULL DEFAULT 5,
            max_stock_level INTEGER NOT NULL DEFAULT 500,
            velocity_class TEXT NOT NULL DEFAULT 'C',
            unit_cost REAL NOT NULL DEFAULT 0.0,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS locations (
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL UNIQUE,
            zone TEXT NOT NULL,
            aisle TEXT NOT NULL,
            rack TEXT NOT NULL DEFAULT '',
            shelf TEXT NOT NULL DEFAULT '',
            bin TEXT NOT NULL DEFAULT '',
            location_type TEXT NOT NULL DEFAULT 'storage',
            capacity_units INTEGER NOT NULL DEFAULT 100,
            current_units INTEGER NOT NULL DEFAULT 0,
            x_coordinate REAL NOT NULL DEFAULT 0.0,
            y_coordinate REAL NOT NULL DEFAULT 0.0,
            z_coordinate REAL NOT NULL DEFAULT 0.0,
            is_active INTEGER NOT NULL DEFAULT 1,
            has_temperature_control INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS ix_locations_zone_aisle ON locations(zone, aisle);

        CREATE TABLE IF NOT EXISTS stock_records (
            id TEXT PRIMARY KEY,
            product_id TEXT NOT NULL REFERENCES products(id),
            location_id TEXT NOT NULL REFERENCES locations(id),
            lot_number TEXT,
            quantity_on_hand INTEGER NOT NULL DEFAULT 0,
            quantity_allocated INTEGER NOT NULL DEFAULT 0,
            quantity_available INTEGER NOT NULL DEFAULT 0,
            expiry_date TEXT,
            received_at TEXT NOT NULL,
            last_counted_at TEXT,
            last_moved_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(product_id, location_id, lot_number)
        );
        CREATE INDEX IF NOT EXISTS ix_stock_product_location
            ON stock_records(product_id, location_id);
        CREATE INDEX IF NOT EXISTS ix_stock_expiry ON stock_records(expiry_date);

        CREATE TABLE IF NOT EXISTS audit_log (
            id TEXT PRIMARY KEY,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            action TEXT NOT NULL,
            movement_kind TEXT,
            quantity_before INTEGER,
            quantity_after INTEGER,
            quantity_delta INTEGER,
            reason TEXT,
            reference TEXT,
            performed_by TEXT NOT NULL DEFAULT 'system',
            subsystem TEXT,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS ix_audit_entity ON audit_log(entity_type, entity_id);
        CREATE INDEX IF NOT EXISTS ix_audit_created ON audit_log(created_at);

        CREATE TABLE IF NOT EXISTS config_scope (
            scope_id TEXT PRIMARY KEY,
            scope_type TEXT NOT NULL,
            scope_key TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(scope_type, scope_key)
        );
        INSERT OR IGNORE INTO config_scope (scope_id, scope_type, scope_key)
        VALUES ('global', 'GLOBAL', 'global');

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL REFERENCES config_scope(scope_id) ON DELETE CASCADE,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    Ok(())
}
