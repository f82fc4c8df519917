// ==========================================
// 仓储决策核心 - 审计日志仓储
// ==========================================
// 红线: 仅追加; 写入必须发生在触发变更的同一事务内
// 提供 insert_in_tx 供台账在事务内调用，查询接口走独立连接
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::audit::AuditEntry;
use crate::domain::types::{AuditAction, MovementKind};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row, Transaction};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

// ==========================================
// AuditLogRepository - 审计日志仓储
// ==========================================
pub struct AuditLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AuditLogRepository {
    /// 创建新的 AuditLogRepository 实例
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

    /// 在指定事务内写入审计条目
    ///
    /// 红线: 台账的每次变更与其审计条目同事务提交，
    /// 事务回滚时审计条目随之消失，不留"幽灵"记录
    pub fn insert_in_tx(tx: &Transaction<'_>, entry: &AuditEntry) -> rusqlite::Result<()> {
        tx.execute(
            r#"
            INSERT INTO audit_log (
                id, entity_type, entity_id, action, movement_kind,
                quantity_before, quantity_after, quantity_delta,
                reason, reference, performed_by, subsystem, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
            params![
                entry.id,
                entry.entity_type,
                entry.entity_id,
                entry.action.as_str(),
                entry.movement_kind.map(|m| m.as_str()),
                entry.quantity_before,
                entry.quantity_after,
                entry.quantity_delta,
                entry.reason,
                entry.reference,
                entry.performed_by,
                entry.subsystem,
                entry.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// 行映射: audit_log 表 -> AuditEntry
    fn map_row(row: &Row<'_>) -> rusqlite::Result<AuditEntry> {
        Ok(AuditEntry {
            id: row.get(0)?,
            entity_type: row.get(1)?,
            entity_id: row.get(2)?,
            action: AuditAction::from_str(&row.get::<_, String>(3)?)
                .unwrap_or(AuditAction::StockUpdate),
            movement_kind: row
                .get::<_, Option<String>>(4)?
                .and_then(|s| MovementKind::from_str(&s).ok()),
            quantity_before: row.get(5)?,
            quantity_after: row.get(6)?,
            quantity_delta: row.get(7)?,
            reason: row.get(8)?,
            reference: row.get(9)?,
            performed_by: row.get(10)?,
            subsystem: row.get(11)?,
            created_at: row
                .get::<_, String>(12)?
                .parse::<DateTime<Utc>>()
                .unwrap_or_else(|_| Utc::now()),
        })
    }

    const SELECT_COLUMNS: &'static str = r#"
        id, entity_type, entity_id, action, movement_kind,
        quantity_before, quantity_after, quantity_delta,
        reason, reference, performed_by, subsystem, created_at
    "#;

    /// 按实体列出审计条目（时间升序）
    pub fn list_for_entity(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> RepositoryResult<Vec<AuditEntry>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {}
            FROM audit_log
            WHERE entity_type = ?1 AND entity_id = ?2
            ORDER BY created_at, id
            "#,
            Self::SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;

        let rows = stmt.query_map(params![entity_type, entity_id], Self::map_row)?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    /// 最近 N 条审计条目（时间降序）
    pub fn list_recent(&self, limit: i64) -> RepositoryResult<Vec<AuditEntry>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM audit_log ORDER BY created_at DESC, id DESC LIMIT ?1",
            Self::SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;

        let rows = stmt.query_map(params![limit], Self::map_row)?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    /// 统计某产品自指定时间以来的拣选出库件数
    ///
    /// 审计按库存记录落账，经 stock_records 关联到产品。
    /// 用途: 补货计算的日均需求估计
    pub fn picked_units_since(
        &self,
        product_id: &str,
        since: DateTime<Utc>,
    ) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let total: i64 = conn.query_row(
            r#"
            SELECT COALESCE(SUM(-a.quantity_delta), 0)
            FROM audit_log a
            JOIN stock_records s ON s.id = a.entity_id
            WHERE a.entity_type = ?1
              AND a.movement_kind = 'pick'
              AND a.created_at >= ?2
              AND s.product_id = ?3
            "#,
            params![
                crate::domain::audit::ENTITY_STOCK_RECORD,
                since.to_rfc3339(),
                product_id
            ],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    /// 实体的审计条目计数（测试与对账用）
    pub fn count_for_entity(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM audit_log WHERE entity_type = ?1 AND entity_id = ?2",
            params![entity_type, entity_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
