// ==========================================
// 仓储决策核心 - 库存 API
// ==========================================
// 职责: 台账操作编排 + 库存侧报表（总览/分库位/到期/补货/审计）
// 红线: API 只做参数校验与组装，数量语义全部在台账事务内
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::ConfigManager;
use crate::domain::audit::{AuditEntry, ENTITY_STOCK_RECORD};
use crate::domain::types::{MovementKind, StockStatus};
use crate::engine::ledger::{
    AdjustOutcome, AllocateOutcome, DeallocateOutcome, ReconcileOutcome, StockLedger,
};
use crate::engine::replenishment::{
    self, DaysOfCoverAdvice, EoqAdvice, ReorderPointAdvice, DEFAULT_HOLDING_COST_RATE,
    DEFAULT_ORDERING_COST,
};
use crate::repository::{
    AuditLogRepository, LocationRepository, ProductRepository, StockRepository,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

/// 到期扫描的"紧急"窗口（天）
const EXPIRY_CRITICAL_DAYS: i64 = 7;

/// 需求估计回看窗口（天）
const DEMAND_WINDOW_DAYS: i64 = 30;

// ==========================================
// 报表结构
// ==========================================

/// 库存总览中的分库位明细
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockByLocation {
    pub location_code: String,
    pub zone: String,
    pub lot_number: Option<String>,
    pub quantity_on_hand: i64,
    pub quantity_allocated: i64,
    pub quantity_available: i64,
    pub received_at: String,
}

/// 产品库存总览
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockLevelReport {
    pub sku: String,
    pub product_name: String,
    pub status: StockStatus,
    pub total_on_hand: i64,
    pub total_allocated: i64,
    pub total_available: i64,
    pub reorder_point: i64,
    pub min_stock_level: i64,
    pub locations: Vec<StockByLocation>,
}

/// 库位内的单条库存
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationStockItem {
    pub sku: String,
    pub product_name: String,
    pub lot_number: Option<String>,
    pub quantity_on_hand: i64,
    pub quantity_allocated: i64,
    pub quantity_available: i64,
}

/// 库位库存报表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryByLocationReport {
    pub location_code: String,
    pub zone: String,
    pub aisle: String,
    pub location_type: String,
    pub capacity_units: i64,
    pub current_units: i64,
    pub utilization_percent: f64,
    pub items: Vec<LocationStockItem>,
}

/// 到期严重度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpirySeverity {
    /// 已过期
    Expired,
    /// 7 天内到期
    Critical,
    /// 窗口内到期
    Warning,
}

/// 到期扫描条目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpiringItem {
    pub sku: String,
    pub product_name: String,
    pub location_code: String,
    pub lot_number: Option<String>,
    pub quantity_on_hand: i64,
    pub expiry_date: String,
    pub days_until_expiry: i64,
    pub severity: ExpirySeverity,
}

/// 到期扫描报表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpiringItemsReport {
    pub window_days: i64,
    pub expired_count: usize,
    pub items: Vec<ExpiringItem>,
}

/// 补货建议报表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplenishmentReport {
    pub sku: String,
    pub product_name: String,
    pub total_available: i64,
    /// 近 30 天拣选出库估计的日均需求
    pub avg_daily_demand: f64,
    pub reorder_point: ReorderPointAdvice,
    pub days_of_cover: DaysOfCoverAdvice,
    /// 单位成本未维护时为 None
    pub eoq: Option<EoqAdvice>,
    /// 可用量已低于建议再订货点
    pub reorder_recommended: bool,
    pub recommended_order_quantity: i64,
}

// ==========================================
// InventoryApi - 库存 API
// ==========================================
pub struct InventoryApi {
    ledger: StockLedger,
    product_repo: ProductRepository,
    location_repo: LocationRepository,
    stock_repo: StockRepository,
    audit_repo: AuditLogRepository,
    config: ConfigManager,
}

impl InventoryApi {
    pub fn new(
        ledger: StockLedger,
        product_repo: ProductRepository,
        location_repo: LocationRepository,
        stock_repo: StockRepository,
        audit_repo: AuditLogRepository,
        config: ConfigManager,
    ) -> Self {
        Self {
            ledger,
            product_repo,
            location_repo,
            stock_repo,
            audit_repo,
            config,
        }
    }

    // ==========================================
    // 台账操作编排
    // ==========================================

    /// 数量调整
    #[allow(clippy::too_many_arguments)]
    pub fn adjust_stock(
        &self,
        sku: &str,
        location_code: &str,
        lot_number: Option<&str>,
        delta: i64,
        movement_kind: MovementKind,
        reason: Option<&str>,
        reference: Option<&str>,
        performed_by: &str,
    ) -> ApiResult<AdjustOutcome> {
        validate_identity(sku, location_code, performed_by)?;
        let outcome = self.ledger.adjust(
            sku,
            location_code,
            lot_number,
            delta,
            movement_kind,
            reason,
            reference,
            performed_by,
        )?;
        Ok(outcome)
    }

    /// 库存分配
    pub fn allocate_stock(
        &self,
        sku: &str,
        location_code: &str,
        quantity: i64,
        order_reference: &str,
        performed_by: &str,
    ) -> ApiResult<AllocateOutcome> {
        validate_identity(sku, location_code, performed_by)?;
        if order_reference.trim().is_empty() {
            return Err(ApiError::InvalidInput("订单号不能为空".to_string()));
        }
        let outcome =
            self.ledger
                .allocate(sku, location_code, quantity, order_reference, performed_by)?;
        Ok(outcome)
    }

    /// 分配释放
    pub fn deallocate_stock(
        &self,
        sku: &str,
        location_code: &str,
        quantity: i64,
        reason: &str,
        performed_by: &str,
    ) -> ApiResult<DeallocateOutcome> {
        validate_identity(sku, location_code, performed_by)?;
        let outcome = self
            .ledger
            .deallocate(sku, location_code, quantity, reason, performed_by)?;
        Ok(outcome)
    }

    /// 盘点对账
    pub fn reconcile_stock(
        &self,
        sku: &str,
        location_code: &str,
        counted_quantity: i64,
        performed_by: &str,
        reason: Option<&str>,
    ) -> ApiResult<ReconcileOutcome> {
        validate_identity(sku, location_code, performed_by)?;
        let outcome =
            self.ledger
                .reconcile(sku, location_code, counted_quantity, performed_by, reason)?;
        Ok(outcome)
    }

    // ==========================================
    // 库存报表
    // ==========================================

    /// 产品库存总览（总量 + 状态分级 + 分库位明细）
    pub fn stock_level(&self, sku: &str) -> ApiResult<StockLevelReport> {
        let product = self
            .product_repo
            .find_by_sku(sku)?
            .ok_or_else(|| crate::engine::EngineError::UnknownProduct(sku.to_string()))?;

        let records = self.stock_repo.list_by_product_with_location(&product.id)?;

        let mut total_on_hand = 0_i64;
        let mut total_allocated = 0_i64;
        let mut locations = Vec::with_capacity(records.len());
        for (record, location) in &records {
            total_on_hand += record.quantity_on_hand;
            total_allocated += record.quantity_allocated;
            locations.push(StockByLocation {
                location_code: location.code.clone(),
                zone: location.zone.clone(),
                lot_number: record.lot_number.clone(),
                quantity_on_hand: record.quantity_on_hand,
                quantity_allocated: record.quantity_allocated,
                quantity_available: record.quantity_available,
                received_at: record.received_at.to_rfc3339(),
            });
        }
        let total_available = total_on_hand - total_allocated;
        let status = StockStatus::classify(
            total_available,
            product.min_stock_level,
            product.reorder_point,
        );

        Ok(StockLevelReport {
            sku: product.sku,
            product_name: product.name,
            status,
            total_on_hand,
            total_allocated,
            total_available,
            reorder_point: product.reorder_point,
            min_stock_level: product.min_stock_level,
            locations,
        })
    }

    /// 库位库存报表（在库条目 + 利用率）
    pub fn inventory_by_location(&self, location_code: &str) -> ApiResult<InventoryByLocationReport> {
        let location = self
            .location_repo
            .find_by_code(location_code)?
            .ok_or_else(|| {
                crate::engine::EngineError::UnknownLocation(location_code.to_string())
            })?;

        let records = self.stock_repo.list_by_location(&location.id)?;
        let mut items = Vec::with_capacity(records.len());
        for record in &records {
            if record.quantity_on_hand == 0 {
                continue;
            }
            let product = self.product_repo.find_by_id(&record.product_id)?;
            let (sku, name) = match product {
                Some(p) => (p.sku, p.name),
                None => (record.product_id.clone(), String::new()),
            };
            items.push(LocationStockItem {
                sku,
                product_name: name,
                lot_number: record.lot_number.clone(),
                quantity_on_hand: record.quantity_on_hand,
                quantity_allocated: record.quantity_allocated,
                quantity_available: record.quantity_available,
            });
        }

        Ok(InventoryByLocationReport {
            location_code: location.code.clone(),
            zone: location.zone.clone(),
            aisle: location.aisle.clone(),
            location_type: location.location_type.to_string(),
            capacity_units: location.capacity_units,
            current_units: location.current_units,
            utilization_percent: location.utilization_percent(),
            items,
        })
    }

    /// 到期扫描: 窗口内到期与已过期的库存（到期时间升序）
    pub fn expiring_items(&self, window_days: i64) -> ApiResult<ExpiringItemsReport> {
        if window_days < 0 {
            return Err(ApiError::InvalidInput("扫描窗口不能为负".to_string()));
        }

        let now = Utc::now();
        let threshold = now + Duration::days(window_days);
        let records = self.stock_repo.list_expiring(threshold)?;

        let mut items = Vec::with_capacity(records.len());
        let mut expired_count = 0_usize;
        for record in &records {
            let expiry = match record.expiry_date {
                Some(e) => e,
                None => continue,
            };
            let days_until = (expiry - now).num_days();
            let severity = if expiry <= now {
                expired_count += 1;
                ExpirySeverity::Expired
            } else if days_until <= EXPIRY_CRITICAL_DAYS {
                ExpirySeverity::Critical
            } else {
                ExpirySeverity::Warning
            };

            let product = self.product_repo.find_by_id(&record.product_id)?;
            let (sku, name) = match product {
                Some(p) => (p.sku, p.name),
                None => (record.product_id.clone(), String::new()),
            };
            let location_code = self
                .location_repo
                .find_by_id(&record.location_id)?
                .map(|l| l.code)
                .unwrap_or_else(|| record.location_id.clone());

            items.push(ExpiringItem {
                sku,
                product_name: name,
                location_code,
                lot_number: record.lot_number.clone(),
                quantity_on_hand: record.quantity_on_hand,
                expiry_date: expiry.to_rfc3339(),
                days_until_expiry: days_until,
                severity,
            });
        }

        Ok(ExpiringItemsReport {
            window_days,
            expired_count,
            items,
        })
    }

    /// 补货建议（再订货点 / 覆盖天数 / EOQ）
    ///
    /// 日均需求取近 30 天审计中的拣选出库量估计。
    pub fn replenishment_advice(&self, sku: &str) -> ApiResult<ReplenishmentReport> {
        let product = self
            .product_repo
            .find_by_sku(sku)?
            .ok_or_else(|| crate::engine::EngineError::UnknownProduct(sku.to_string()))?;

        let since = Utc::now() - Duration::days(DEMAND_WINDOW_DAYS);
        let picked = self.audit_repo.picked_units_since(&product.id, since)?;
        let avg_daily_demand = picked.max(0) as f64 / DEMAND_WINDOW_DAYS as f64;

        let records = self.stock_repo.list_by_product(&product.id)?;
        let total_available: i64 = records.iter().map(|r| r.quantity_available).sum();

        let lead_time_days = self
            .config
            .get_default_lead_time_days()
            .map_err(|e| ApiError::Config(e.to_string()))?;
        let safety_stock_days = self
            .config
            .get_safety_stock_days()
            .map_err(|e| ApiError::Config(e.to_string()))?;

        let rop = replenishment::reorder_point(avg_daily_demand, lead_time_days, safety_stock_days)?;
        let cover = replenishment::days_of_cover(total_available, avg_daily_demand, lead_time_days);

        let eoq = if product.unit_cost > 0.0 {
            Some(replenishment::economic_order_quantity(
                avg_daily_demand * 365.0,
                DEFAULT_ORDERING_COST,
                product.unit_cost,
                DEFAULT_HOLDING_COST_RATE,
            )?)
        } else {
            None
        };

        let reorder_recommended = total_available <= rop.reorder_point;
        let recommended_order_quantity = if reorder_recommended {
            eoq.as_ref()
                .map(|e| e.economic_order_quantity)
                .filter(|&q| q > 0)
                .unwrap_or(product.reorder_quantity)
        } else {
            0
        };

        if reorder_recommended {
            info!(
                sku = %product.sku,
                available = total_available,
                reorder_point = rop.reorder_point,
                "可用库存低于再订货点, 建议补货 {}",
                recommended_order_quantity
            );
        }

        Ok(ReplenishmentReport {
            sku: product.sku,
            product_name: product.name,
            total_available,
            avg_daily_demand,
            reorder_point: rop,
            days_of_cover: cover,
            eoq,
            reorder_recommended,
            recommended_order_quantity,
        })
    }

    // ==========================================
    // 审计查询
    // ==========================================

    /// 最近 N 条审计记录
    pub fn recent_audit(&self, limit: i64) -> ApiResult<Vec<AuditEntry>> {
        if limit <= 0 {
            return Err(ApiError::InvalidInput("limit 必须为正".to_string()));
        }
        Ok(self.audit_repo.list_recent(limit)?)
    }

    /// 某条库存记录的完整审计轨迹
    pub fn audit_trail(&self, stock_record_id: &str) -> ApiResult<Vec<AuditEntry>> {
        Ok(self
            .audit_repo
            .list_for_entity(ENTITY_STOCK_RECORD, stock_record_id)?)
    }
}

/// 共同的身份参数校验
fn validate_identity(sku: &str, location_code: &str, performed_by: &str) -> ApiResult<()> {
    if sku.trim().is_empty() {
        return Err(ApiError::InvalidInput("SKU 不能为空".to_string()));
    }
    if location_code.trim().is_empty() {
        return Err(ApiError::InvalidInput("库位编码不能为空".to_string()));
    }
    if performed_by.trim().is_empty() {
        return Err(ApiError::InvalidInput("操作者不能为空".to_string()));
    }
    Ok(())
}
