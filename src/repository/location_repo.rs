// ==========================================
// 仓储决策核心 - 库位仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 红线: current_units 不提供独立写接口，仅随台账事务更新
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::location::Location;
use crate::domain::types::LocationType;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// LocationRepository - 库位仓储
// ==========================================
pub struct LocationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl LocationRepository {
    /// 创建新的 LocationRepository 实例
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

    /// 行映射: locations 表 -> Location
    pub(crate) fn map_row(row: &Row<'_>) -> rusqlite::Result<Location> {
        Ok(Location {
            id: row.get(0)?,
            code: row.get(1)?,
            zone: row.get(2)?,
            aisle: row.get(3)?,
            rack: row.get(4)?,
            shelf: row.get(5)?,
            bin: row.get(6)?,
            location_type: row
                .get::<_, String>(7)?
                .parse()
                .unwrap_or(LocationType::Storage),
            capacity_units: row.get(8)?,
            current_units: row.get(9)?,
            x_coordinate: row.get(10)?,
            y_coordinate: row.get(11)?,
            z_coordinate: row.get(12)?,
            is_active: row.get(13)?,
            has_temperature_control: row.get(14)?,
            created_at: row
                .get::<_, String>(15)?
                .parse::<chrono::DateTime<chrono::Utc>>()
                .unwrap_or_else(|_| chrono::Utc::now()),
        })
    }

    const SELECT_COLUMNS: &'static str = r#"
        id, code, zone, aisle, rack, shelf, bin, location_type,
        capacity_units, current_units,
        x_coordinate, y_coordinate, z_coordinate,
        is_active, has_temperature_control, created_at
    "#;

    /// 插入库位（INSERT OR REPLACE 实现 upsert 语义）
    pub fn insert(&self, location: &Location) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO locations (
                id, code, zone, aisle, rack, shelf, bin, location_type,
                capacity_units, current_units,
                x_coordinate, y_coordinate, z_coordinate,
                is_active, has_temperature_control, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            "#,
            params![
                location.id,
                location.code,
                location.zone,
                location.aisle,
                location.rack,
                location.shelf,
                location.bin,
                location.location_type.as_str(),
                location.capacity_units,
                location.current_units,
                location.x_coordinate,
                location.y_coordinate,
                location.z_coordinate,
                location.is_active,
                location.has_temperature_control,
                location.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// 按库位编码查询
    pub fn find_by_code(&self, code: &str) -> RepositoryResult<Option<Location>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM locations WHERE code = ?1", Self::SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;

        let result = stmt.query_row(params![code], Self::map_row);
        match result {
            Ok(location) => Ok(Some(location)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 按内部 id 查询
    pub fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Location>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM locations WHERE id = ?1", Self::SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;

        let result = stmt.query_row(params![id], Self::map_row);
        match result {
            Ok(location) => Ok(Some(location)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询全部启用库位（按编码排序，图构建与路径规划的确定性依据）
    pub fn list_active(&self) -> RepositoryResult<Vec<Location>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM locations WHERE is_active = 1 ORDER BY code",
            Self::SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;

        let rows = stmt.query_map([], Self::map_row)?;
        let mut locations = Vec::new();
        for row in rows {
            locations.push(row?);
        }
        Ok(locations)
    }

    /// 查询上架候选库位
    ///
    /// 过滤条件: 启用、指定类型、剩余容量 >= min_free_units、
    /// 可选要求温控（冷藏上架必需）
    pub fn find_putaway_candidates(
        &self,
        location_type: LocationType,
        min_free_units: i64,
        require_temperature_control: bool,
    ) -> RepositoryResult<Vec<Location>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {}
            FROM locations
            WHERE is_active = 1
              AND location_type = ?1
              AND capacity_units - current_units >= ?2
              AND (?3 = 0 OR has_temperature_control = 1)
            ORDER BY code
            "#,
            Self::SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;

        let rows = stmt.query_map(
            params![location_type.as_str(), min_free_units, require_temperature_control],
            Self::map_row,
        )?;
        let mut locations = Vec::new();
        for row in rows {
            locations.push(row?);
        }
        Ok(locations)
    }
}
