// ==========================================
// 仓储决策核心 - 库存台账引擎
// ==========================================
// 红线: 每个操作 = 单个原子事务（库存行 + 库位占用 + 审计条目）
// 红线: check-then-write 在连接锁 + 事务内完成，并发分配不可超卖
// 红线: 事务回滚时不留任何部分变更，审计条目随事务一起提交/回滚
// ==========================================
// 操作: adjust / allocate / deallocate / reconcile
// 粒度: 以 (产品, 库位) 定位库存记录；多批次时按收货时间 FIFO 取最早一条
// ==========================================

use crate::domain::audit::AuditEntry;
use crate::domain::types::{AuditAction, MovementKind};
use crate::engine::error::{EngineError, EngineResult};
use crate::repository::audit_repo::AuditLogRepository;
use crate::repository::error::RepositoryError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};
use uuid::Uuid;

/// 审计条目的发起子系统标记
pub const SUBSYSTEM_LEDGER: &str = "stock_ledger";
pub const SUBSYSTEM_RECONCILIATION: &str = "reconciliation";

// ==========================================
// 操作结果
// ==========================================

/// adjust 结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustOutcome {
    pub sku: String,
    pub location_code: String,
    pub lot_number: Option<String>,
    pub previous_on_hand: i64,
    pub new_on_hand: i64,
    pub delta: i64,
    pub movement_kind: MovementKind,
    pub audit_id: String,
}

/// allocate 结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocateOutcome {
    pub sku: String,
    pub location_code: String,
    pub quantity_allocated: i64,
    pub remaining_available: i64,
    pub order_reference: String,
    pub audit_id: String,
}

/// deallocate 结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeallocateOutcome {
    pub sku: String,
    pub location_code: String,
    pub quantity_deallocated: i64,
    pub new_available: i64,
    pub audit_id: String,
}

/// reconcile 结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileOutcome {
    pub sku: String,
    pub location_code: String,
    pub system_quantity: i64,
    pub counted_quantity: i64,
    pub variance: i64,
    pub adjustment_made: bool,
    pub audit_id: Option<String>,
}

// ==========================================
// 事务内的轻量行视图
// ==========================================

struct ProductRow {
    id: String,
}

struct LocationRow {
    id: String,
    capacity_units: i64,
    current_units: i64,
}

struct StockRow {
    id: String,
    lot_number: Option<String>,
    quantity_on_hand: i64,
    quantity_allocated: i64,
}

// ==========================================
// StockLedger - 库存台账
// ==========================================
/// 所有数量变更的唯一入口。
///
/// 并发模型: 共享连接互斥锁串行化全部写操作，每个操作在单个
/// SQLite 事务内完成"检查 + 库存行更新 + 库位占用更新 + 审计写入"，
/// 等价于行级互斥（SQLite 本身单写者）。
pub struct StockLedger {
    conn: Arc<Mutex<Connection>>,
}

impl StockLedger {
    /// 从已有连接创建台账实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> EngineResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| EngineError::Repository(RepositoryError::LockError(e.to_string())))
    }

    // ==========================================
    // adjust - 数量调整（收货/拣出/移库/报废等）
    // ==========================================

    /// 调整在手量。
    ///
    /// - 记录不存在且 delta > 0 时创建记录（可带批次号）
    /// - 结果在手量为负 -> InsufficientStock
    /// - 库位占用随 delta 同步更新，超容 -> CapacityExceeded
    /// - 成功时写入一条 stock_update 审计（before/after/delta）
    #[allow(clippy::too_many_arguments)]
    pub fn adjust(
        &self,
        sku: &str,
        location_code: &str,
        lot_number: Option<&str>,
        delta: i64,
        movement_kind: MovementKind,
        reason: Option<&str>,
        reference: Option<&str>,
        performed_by: &str,
    ) -> EngineResult<AdjustOutcome> {
        if delta == 0 {
            return Err(EngineError::InvalidInput("delta 不能为 0".to_string()));
        }

        let conn = self.get_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(RepositoryError::from)?;

        let product = fetch_product(&tx, sku)?;
        let location = fetch_location(&tx, location_code)?;

        // 定位库存记录: 精确匹配 (产品, 库位, 批次)
        let existing = fetch_stock_exact(&tx, &product.id, &location.id, lot_number)
            .map_err(RepositoryError::from)?;

        let record = match existing {
            Some(row) => row,
            None => {
                if delta < 0 {
                    return Err(EngineError::InsufficientStock {
                        sku: sku.to_string(),
                        on_hand: 0,
                        requested: -delta,
                    });
                }
                create_stock_row(&tx, &product.id, &location.id, lot_number)
                    .map_err(RepositoryError::from)?
            }
        };

        let previous = record.quantity_on_hand;
        let new_on_hand = previous + delta;
        if new_on_hand < 0 {
            return Err(EngineError::InsufficientStock {
                sku: sku.to_string(),
                on_hand: previous,
                requested: -delta,
            });
        }

        // 库位占用随数量变更同步（同事务）
        apply_location_delta(&tx, location_code, &location, delta)?;

        let now = Utc::now().to_rfc3339();
        tx.execute(
            r#"
            UPDATE stock_records
            SET quantity_on_hand = ?1,
                quantity_available = ?1 - quantity_allocated,
                last_moved_at = ?2,
                updated_at = ?2
            WHERE id = ?3
            "#,
            params![new_on_hand, now, record.id],
        )
        .map_err(RepositoryError::from)?;

        let entry = AuditEntry::for_stock_record(
            &record.id,
            AuditAction::StockUpdate,
            Some(movement_kind),
            previous,
            new_on_hand,
            reason.map(|s| s.to_string()),
            reference.map(|s| s.to_string()),
            performed_by,
            SUBSYSTEM_LEDGER,
        );
        AuditLogRepository::insert_in_tx(&tx, &entry).map_err(RepositoryError::from)?;

        tx.commit().map_err(RepositoryError::from)?;

        info!(
            sku = %sku,
            location = %location_code,
            delta = delta,
            movement = %movement_kind,
            "库存调整完成: {} -> {}",
            previous,
            new_on_hand
        );

        Ok(AdjustOutcome {
            sku: sku.to_string(),
            location_code: location_code.to_string(),
            lot_number: record.lot_number,
            previous_on_hand: previous,
            new_on_hand,
            delta,
            movement_kind,
            audit_id: entry.id,
        })
    }

    // ==========================================
    // allocate - 库存分配（订单预占）
    // ==========================================

    /// 为订单分配（预占）库存。
    ///
    /// 检查与自增在同一事务内完成；两个并发 allocate 的合计量
    /// 超过可用量时，至多一个成功。
    pub fn allocate(
        &self,
        sku: &str,
        location_code: &str,
        quantity: i64,
        order_reference: &str,
        performed_by: &str,
    ) -> EngineResult<AllocateOutcome> {
        if quantity <= 0 {
            return Err(EngineError::InvalidInput("分配数量必须为正".to_string()));
        }

        let conn = self.get_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(RepositoryError::from)?;

        let product = fetch_product(&tx, sku)?;
        // 分配不改变库位占用，查询仅为校验库位存在
        let location_row = fetch_location(&tx, location_code)?;

        // FIFO: 取可用量足额的最早收货记录
        let record = fetch_stock_fifo_available(&tx, &product.id, &location_row.id, quantity)
            .map_err(RepositoryError::from)?;

        let record = match record {
            Some(row) => row,
            None => {
                let available =
                    total_available(&tx, &product.id, &location_row.id)
                        .map_err(RepositoryError::from)?;
                return Err(EngineError::InsufficientAvailable {
                    sku: sku.to_string(),
                    available,
                    requested: quantity,
                });
            }
        };

        let previous_allocated = record.quantity_allocated;
        let new_allocated = previous_allocated + quantity;
        let now = Utc::now().to_rfc3339();
        tx.execute(
            r#"
            UPDATE stock_records
            SET quantity_allocated = ?1,
                quantity_available = quantity_on_hand - ?1,
                updated_at = ?2
            WHERE id = ?3
            "#,
            params![new_allocated, now, record.id],
        )
        .map_err(RepositoryError::from)?;

        let entry = AuditEntry::for_stock_record(
            &record.id,
            AuditAction::Allocation,
            None,
            previous_allocated,
            new_allocated,
            Some(format!("库存分配至订单 {}", order_reference)),
            Some(order_reference.to_string()),
            performed_by,
            SUBSYSTEM_LEDGER,
        );
        AuditLogRepository::insert_in_tx(&tx, &entry).map_err(RepositoryError::from)?;

        tx.commit().map_err(RepositoryError::from)?;

        let remaining = record.quantity_on_hand - new_allocated;
        debug!(
            sku = %sku,
            location = %location_code,
            quantity = quantity,
            order = %order_reference,
            "库存分配完成, 剩余可用 {}",
            remaining
        );

        Ok(AllocateOutcome {
            sku: sku.to_string(),
            location_code: location_code.to_string(),
            quantity_allocated: quantity,
            remaining_available: remaining,
            order_reference: order_reference.to_string(),
            audit_id: entry.id,
        })
    }

    // ==========================================
    // deallocate - 分配释放（订单取消等）
    // ==========================================

    /// 释放先前的分配。请求量超过已分配量 -> OverDeallocation。
    pub fn deallocate(
        &self,
        sku: &str,
        location_code: &str,
        quantity: i64,
        reason: &str,
        performed_by: &str,
    ) -> EngineResult<DeallocateOutcome> {
        if quantity <= 0 {
            return Err(EngineError::InvalidInput("释放数量必须为正".to_string()));
        }

        let conn = self.get_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(RepositoryError::from)?;

        let product = fetch_product(&tx, sku)?;
        let location = fetch_location(&tx, location_code)?;

        // FIFO: 取已分配量足额的最早收货记录
        let record = fetch_stock_fifo_allocated(&tx, &product.id, &location.id, quantity)
            .map_err(RepositoryError::from)?;

        let record = match record {
            Some(row) => row,
            None => {
                let allocated =
                    total_allocated(&tx, &product.id, &location.id).map_err(RepositoryError::from)?;
                return Err(EngineError::OverDeallocation {
                    sku: sku.to_string(),
                    allocated,
                    requested: quantity,
                });
            }
        };

        let previous_allocated = record.quantity_allocated;
        let new_allocated = previous_allocated - quantity;
        let now = Utc::now().to_rfc3339();
        tx.execute(
            r#"
            UPDATE stock_records
            SET quantity_allocated = ?1,
                quantity_available = quantity_on_hand - ?1,
                updated_at = ?2
            WHERE id = ?3
            "#,
            params![new_allocated, now, record.id],
        )
        .map_err(RepositoryError::from)?;

        let entry = AuditEntry::for_stock_record(
            &record.id,
            AuditAction::Deallocation,
            None,
            previous_allocated,
            new_allocated,
            Some(reason.to_string()),
            None,
            performed_by,
            SUBSYSTEM_LEDGER,
        );
        AuditLogRepository::insert_in_tx(&tx, &entry).map_err(RepositoryError::from)?;

        tx.commit().map_err(RepositoryError::from)?;

        Ok(DeallocateOutcome {
            sku: sku.to_string(),
            location_code: location_code.to_string(),
            quantity_deallocated: quantity,
            new_available: record.quantity_on_hand - new_allocated,
            audit_id: entry.id,
        })
    }

    // ==========================================
    // reconcile - 盘点对账
    // ==========================================

    /// 将系统在手量对齐到实际盘点数。
    ///
    /// - 差异为 0: 仅更新盘点时间，不产生审计条目（幂等）
    /// - 盘点数 < 已分配量 -> ReconciliationBelowAllocated（拒绝产生负可用量）
    /// - 差异非 0: 在手量置为盘点数、重算可用量、库位占用按差异同步、
    ///   写入一条携带有符号差异的 reconciliation 审计
    pub fn reconcile(
        &self,
        sku: &str,
        location_code: &str,
        counted_quantity: i64,
        performed_by: &str,
        reason: Option<&str>,
    ) -> EngineResult<ReconcileOutcome> {
        if counted_quantity < 0 {
            return Err(EngineError::InvalidInput("盘点数不能为负".to_string()));
        }

        let conn = self.get_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(RepositoryError::from)?;

        let product = fetch_product(&tx, sku)?;
        let location = fetch_location(&tx, location_code)?;

        // 以 (产品, 库位) 最早收货记录为对账对象；不存在时视为在手 0
        let record = fetch_stock_fifo_any(&tx, &product.id, &location.id)
            .map_err(RepositoryError::from)?;

        let now = Utc::now().to_rfc3339();

        let (record, system_quantity, allocated) = match record {
            Some(row) => (Some(row.id.clone()), row.quantity_on_hand, row.quantity_allocated),
            None => (None, 0, 0),
        };

        let variance = counted_quantity - system_quantity;

        if variance == 0 {
            // 无差异: 仅记录盘点时间
            if let Some(ref record_id) = record {
                tx.execute(
                    "UPDATE stock_records SET last_counted_at = ?1, updated_at = ?1 WHERE id = ?2",
                    params![now, record_id],
                )
                .map_err(RepositoryError::from)?;
            }
            tx.commit().map_err(RepositoryError::from)?;

            return Ok(ReconcileOutcome {
                sku: sku.to_string(),
                location_code: location_code.to_string(),
                system_quantity,
                counted_quantity,
                variance: 0,
                adjustment_made: false,
                audit_id: None,
            });
        }

        // 盘点数低于已分配量会产生负可用量，必须拒绝
        if counted_quantity < allocated {
            return Err(EngineError::ReconciliationBelowAllocated {
                sku: sku.to_string(),
                counted: counted_quantity,
                allocated,
            });
        }

        // 库位占用按差异同步（同事务、同容量校验）
        apply_location_delta(&tx, location_code, &location, variance)?;

        let record_id = match record {
            Some(id) => {
                tx.execute(
                    r#"
                    UPDATE stock_records
                    SET quantity_on_hand = ?1,
                        quantity_available = ?1 - quantity_allocated,
                        last_counted_at = ?2,
                        last_moved_at = ?2,
                        updated_at = ?2
                    WHERE id = ?3
                    "#,
                    params![counted_quantity, now, id],
                )
                .map_err(RepositoryError::from)?;
                id
            }
            None => {
                // 盘点发现账外库存: 创建记录并直接置为盘点数
                let row = create_stock_row(&tx, &product.id, &location.id, None)
                    .map_err(RepositoryError::from)?;
                tx.execute(
                    r#"
                    UPDATE stock_records
                    SET quantity_on_hand = ?1,
                        quantity_available = ?1,
                        last_counted_at = ?2,
                        last_moved_at = ?2,
                        updated_at = ?2
                    WHERE id = ?3
                    "#,
                    params![counted_quantity, now, row.id],
                )
                .map_err(RepositoryError::from)?;
                row.id
            }
        };

        let reason_text = reason
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("盘点对账（操作者: {}）", performed_by));

        let entry = AuditEntry::for_stock_record(
            &record_id,
            AuditAction::Reconciliation,
            Some(MovementKind::Adjustment),
            system_quantity,
            counted_quantity,
            Some(reason_text),
            None,
            performed_by,
            SUBSYSTEM_RECONCILIATION,
        );
        AuditLogRepository::insert_in_tx(&tx, &entry).map_err(RepositoryError::from)?;

        tx.commit().map_err(RepositoryError::from)?;

        info!(
            sku = %sku,
            location = %location_code,
            variance = variance,
            "盘点对账完成: 系统 {} -> 实盘 {}",
            system_quantity,
            counted_quantity
        );

        Ok(ReconcileOutcome {
            sku: sku.to_string(),
            location_code: location_code.to_string(),
            system_quantity,
            counted_quantity,
            variance,
            adjustment_made: true,
            audit_id: Some(entry.id),
        })
    }
}

// ==========================================
// 事务内查询辅助（台账专用，不对外暴露）
// ==========================================

fn fetch_product(tx: &Transaction<'_>, sku: &str) -> EngineResult<ProductRow> {
    let row = tx
        .query_row(
            "SELECT id FROM products WHERE sku = ?1",
            params![sku],
            |row| Ok(ProductRow { id: row.get(0)? }),
        )
        .optional()
        .map_err(RepositoryError::from)?;
    row.ok_or_else(|| EngineError::UnknownProduct(sku.to_string()))
}

fn fetch_location(tx: &Transaction<'_>, code: &str) -> EngineResult<LocationRow> {
    let row = tx
        .query_row(
            "SELECT id, capacity_units, current_units FROM locations WHERE code = ?1",
            params![code],
            |row| {
                Ok(LocationRow {
                    id: row.get(0)?,
                    capacity_units: row.get(1)?,
                    current_units: row.get(2)?,
                })
            },
        )
        .optional()
        .map_err(RepositoryError::from)?;
    row.ok_or_else(|| EngineError::UnknownLocation(code.to_string()))
}

fn map_stock_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StockRow> {
    Ok(StockRow {
        id: row.get(0)?,
        lot_number: row.get(1)?,
        quantity_on_hand: row.get(2)?,
        quantity_allocated: row.get(3)?,
    })
}

const STOCK_ROW_COLUMNS: &str = "id, lot_number, quantity_on_hand, quantity_allocated";

/// 精确定位 (产品, 库位, 批次) 的记录；批次 NULL 用 IS 比较
fn fetch_stock_exact(
    tx: &Transaction<'_>,
    product_id: &str,
    location_id: &str,
    lot_number: Option<&str>,
) -> rusqlite::Result<Option<StockRow>> {
    let sql = format!(
        r#"
        SELECT {}
        FROM stock_records
        WHERE product_id = ?1 AND location_id = ?2 AND lot_number IS ?3
        "#,
        STOCK_ROW_COLUMNS
    );
    tx.query_row(&sql, params![product_id, location_id, lot_number], map_stock_row)
        .optional()
}

/// FIFO: 可用量足额的最早收货记录
fn fetch_stock_fifo_available(
    tx: &Transaction<'_>,
    product_id: &str,
    location_id: &str,
    quantity: i64,
) -> rusqlite::Result<Option<StockRow>> {
    let sql = format!(
        r#"
        SELECT {}
        FROM stock_records
        WHERE product_id = ?1 AND location_id = ?2
          AND quantity_on_hand - quantity_allocated >= ?3
        ORDER BY received_at, id
        LIMIT 1
        "#,
        STOCK_ROW_COLUMNS
    );
    tx.query_row(&sql, params![product_id, location_id, quantity], map_stock_row)
        .optional()
}

/// FIFO: 已分配量足额的最早收货记录
fn fetch_stock_fifo_allocated(
    tx: &Transaction<'_>,
    product_id: &str,
    location_id: &str,
    quantity: i64,
) -> rusqlite::Result<Option<StockRow>> {
    let sql = format!(
        r#"
        SELECT {}
        FROM stock_records
        WHERE product_id = ?1 AND location_id = ?2
          AND quantity_allocated >= ?3
        ORDER BY received_at, id
        LIMIT 1
        "#,
        STOCK_ROW_COLUMNS
    );
    tx.query_row(&sql, params![product_id, location_id, quantity], map_stock_row)
        .optional()
}

/// FIFO: (产品, 库位) 最早收货记录（盘点对象）
fn fetch_stock_fifo_any(
    tx: &Transaction<'_>,
    product_id: &str,
    location_id: &str,
) -> rusqlite::Result<Option<StockRow>> {
    let sql = format!(
        r#"
        SELECT {}
        FROM stock_records
        WHERE product_id = ?1 AND location_id = ?2
        ORDER BY received_at, id
        LIMIT 1
        "#,
        STOCK_ROW_COLUMNS
    );
    tx.query_row(&sql, params![product_id, location_id], map_stock_row)
        .optional()
}

fn total_available(
    tx: &Transaction<'_>,
    product_id: &str,
    location_id: &str,
) -> rusqlite::Result<i64> {
    tx.query_row(
        r#"
        SELECT COALESCE(SUM(quantity_on_hand - quantity_allocated), 0)
        FROM stock_records
        WHERE product_id = ?1 AND location_id = ?2
        "#,
        params![product_id, location_id],
        |row| row.get(0),
    )
}

fn total_allocated(
    tx: &Transaction<'_>,
    product_id: &str,
    location_id: &str,
) -> rusqlite::Result<i64> {
    tx.query_row(
        r#"
        SELECT COALESCE(SUM(quantity_allocated), 0)
        FROM stock_records
        WHERE product_id = ?1 AND location_id = ?2
        "#,
        params![product_id, location_id],
        |row| row.get(0),
    )
}

/// 创建空库存记录（首次收货 / 盘点发现账外库存）
fn create_stock_row(
    tx: &Transaction<'_>,
    product_id: &str,
    location_id: &str,
    lot_number: Option<&str>,
) -> rusqlite::Result<StockRow> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();
    tx.execute(
        r#"
        INSERT INTO stock_records (
            id, product_id, location_id, lot_number,
            quantity_on_hand, quantity_allocated, quantity_available,
            received_at, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, 0, 0, 0, ?5, ?5, ?5)
        "#,
        params![id, product_id, location_id, lot_number, now],
    )?;
    Ok(StockRow {
        id,
        lot_number: lot_number.map(|s| s.to_string()),
        quantity_on_hand: 0,
        quantity_allocated: 0,
    })
}

/// 库位占用变更（容量校验 + 更新，同事务）
fn apply_location_delta(
    tx: &Transaction<'_>,
    code: &str,
    location: &LocationRow,
    delta: i64,
) -> EngineResult<()> {
    let resulting = location.current_units + delta;
    if resulting > location.capacity_units {
        return Err(EngineError::CapacityExceeded {
            code: code.to_string(),
            capacity: location.capacity_units,
            resulting,
        });
    }
    if resulting < 0 {
        // 占用为负意味着台账与库位计数已失配，按内部错误上报
        return Err(EngineError::Repository(RepositoryError::InternalError(
            format!("库位占用将为负: code={}, resulting={}", code, resulting),
        )));
    }

    tx.execute(
        "UPDATE locations SET current_units = ?1 WHERE id = ?2",
        params![resulting, location.id],
    )
    .map_err(RepositoryError::from)?;
    Ok(())
}
