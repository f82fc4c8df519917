// ==========================================
// 仓储决策核心 - 库存记录仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 红线: 数量变更不走本仓储，统一经由台账事务（engine::ledger）
// 本仓储只承担读路径：FIFO 候选、到期扫描、按产品/库位列表
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::location::Location;
use crate::domain::stock::StockRecord;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// StockRepository - 库存记录仓储
// ==========================================
pub struct StockRepository {
    conn: Arc<Mutex<Connection>>,
}

impl StockRepository {
    /// 创建新的 StockRepository 实例
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 行映射: stock_records 表 -> StockRecord
    pub(crate) fn map_row(row: &Row<'_>) -> rusqlite::Result<StockRecord> {
        Ok(StockRecord {
            id: row.get(0)?,
            product_id: row.get(1)?,
            location_id: row.get(2)?,
            lot_number: row.get(3)?,
            quantity_on_hand: row.get(4)?,
            quantity_allocated: row.get(5)?,
            quantity_available: row.get(6)?,
            expiry_date: row
                .get::<_, Option<String>>(7)?
                .and_then(|s| s.parse::<DateTime<Utc>>().ok()),
            received_at: row
                .get::<_, String>(8)?
                .parse::<DateTime<Utc>>()
                .unwrap_or_else(|_| Utc::now()),
            last_counted_at: row
                .get::<_, Option<String>>(9)?
                .and_then(|s| s.parse::<DateTime<Utc>>().ok()),
            last_moved_at: row
                .get::<_, Option<String>>(10)?
                .and_then(|s| s.parse::<DateTime<Utc>>().ok()),
            created_at: row
                .get::<_, String>(11)?
                .parse::<DateTime<Utc>>()
                .unwrap_or_else(|_| Utc::now()),
            updated_at: row
                .get::<_, String>(12)?
                .parse::<DateTime<Utc>>()
                .unwrap_or_else(|_| Utc::now()),
        })
    }

    const SELECT_COLUMNS: &'static str = r#"
        s.id, s.product_id, s.location_id, s.lot_number,
        s.quantity_on_hand, s.quantity_allocated, s.quantity_available,
        s.expiry_date, s.received_at, s.last_counted_at, s.last_moved_at,
        s.created_at, s.updated_at
    "#;

    /// 按产品列出库存记录（收货时间升序）
    pub fn list_by_product(&self, product_id: &str) -> RepositoryResult<Vec<StockRecord>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM stock_records s WHERE s.product_id = ?1 ORDER BY s.received_at, s.id",
            Self::SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;

        let rows = stmt.query_map(params![product_id], Self::map_row)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// 按库位列出库存记录
    pub fn list_by_location(&self, location_id: &str) -> RepositoryResult<Vec<StockRecord>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM stock_records s WHERE s.location_id = ?1 ORDER BY s.received_at, s.id",
            Self::SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;

        let rows = stmt.query_map(params![location_id], Self::map_row)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// 按产品列出库存记录（含所在库位）
    ///
    /// 用途: 库存总览的分库位明细、上架合并建议
    pub fn list_by_product_with_location(
        &self,
        product_id: &str,
    ) -> RepositoryResult<Vec<(StockRecord, Location)>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {},
                   l.id, l.code, l.zone, l.aisle, l.rack, l.shelf, l.bin, l.location_type,
                   l.capacity_units, l.current_units,
                   l.x_coordinate, l.y_coordinate, l.z_coordinate,
                   l.is_active, l.has_temperature_control, l.created_at
            FROM stock_records s
            JOIN locations l ON l.id = s.location_id
            WHERE s.product_id = ?1
            ORDER BY s.received_at, l.code
            "#,
            Self::SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;

        let rows = stmt.query_map(params![product_id], |row| {
            let record = Self::map_row(row)?;
            // 库位列从第 13 列开始
            let location = map_location_offset(row, 13)?;
            Ok((record, location))
        })?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// FIFO 拣选候选: 可用量足额的最早收货记录
    ///
    /// 排序: received_at 升序，库位编码升序（并列时保证确定性）
    /// 说明: 不做拆批拣选，单条记录必须足额，否则返回 None
    pub fn find_fifo_candidate(
        &self,
        product_id: &str,
        quantity: i64,
    ) -> RepositoryResult<Option<(StockRecord, Location)>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {},
                   l.id, l.code, l.zone, l.aisle, l.rack, l.shelf, l.bin, l.location_type,
                   l.capacity_units, l.current_units,
                   l.x_coordinate, l.y_coordinate, l.z_coordinate,
                   l.is_active, l.has_temperature_control, l.created_at
            FROM stock_records s
            JOIN locations l ON l.id = s.location_id
            WHERE s.product_id = ?1
              AND s.quantity_on_hand - s.quantity_allocated >= ?2
              AND l.is_active = 1
            ORDER BY s.received_at, l.code
            LIMIT 1
            "#,
            Self::SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;

        let result = stmt.query_row(params![product_id, quantity], |row| {
            let record = Self::map_row(row)?;
            let location = map_location_offset(row, 13)?;
            Ok((record, location))
        });
        match result {
            Ok(pair) => Ok(Some(pair)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 列出到期窗口内的库存记录（在手量 > 0，按到期时间升序）
    pub fn list_expiring(
        &self,
        threshold: DateTime<Utc>,
    ) -> RepositoryResult<Vec<StockRecord>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {}
            FROM stock_records s
            WHERE s.expiry_date IS NOT NULL
              AND s.expiry_date <= ?1
              AND s.quantity_on_hand > 0
            ORDER BY s.expiry_date, s.id
            "#,
            Self::SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;

        let rows = stmt.query_map(params![threshold.to_rfc3339()], Self::map_row)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }
}

/// 从指定列偏移处映射库位（JOIN 查询复用）
fn map_location_offset(row: &Row<'_>, offset: usize) -> rusqlite::Result<Location> {
    Ok(Location {
        id: row.get(offset)?,
        code: row.get(offset + 1)?,
        zone: row.get(offset + 2)?,
        aisle: row.get(offset + 3)?,
        rack: row.get(offset + 4)?,
        shelf: row.get(offset + 5)?,
        bin: row.get(offset + 6)?,
        location_type: row
            .get::<_, String>(offset + 7)?
            .parse()
            .unwrap_or(crate::domain::types::LocationType::Storage),
        capacity_units: row.get(offset + 8)?,
        current_units: row.get(offset + 9)?,
        x_coordinate: row.get(offset + 10)?,
        y_coordinate: row.get(offset + 11)?,
        z_coordinate: row.get(offset + 12)?,
        is_active: row.get(offset + 13)?,
        has_temperature_control: row.get(offset + 14)?,
        created_at: row
            .get::<_, String>(offset + 15)?
            .parse::<DateTime<Utc>>()
            .unwrap_or_else(|_| Utc::now()),
    })
}
