// ==========================================
// 仓储决策核心 - 操作分发边界
// ==========================================
// 协议: 行分隔 JSON。请求 {"op": "...", "payload": {...}}，
//       响应 {"ok": ...} 或 {"error": {"code": "...", "message": "..."}}
// 红线: 错误码稳定，调用方按 code 分支而非解析 message
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::api::inventory_api::InventoryApi;
use crate::api::operations_api::OperationsApi;
use crate::domain::types::MovementKind;
use crate::engine::route::PickDemand;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

fn default_performed_by() -> String {
    "system".to_string()
}

fn default_expiry_window() -> i64 {
    30
}

fn default_audit_limit() -> i64 {
    50
}

// ==========================================
// EngineRequest - 请求形态
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", content = "payload", rename_all = "snake_case")]
pub enum EngineRequest {
    AdjustStock {
        sku: String,
        location_code: String,
        #[serde(default)]
        lot_number: Option<String>,
        delta: i64,
        movement_kind: MovementKind,
        #[serde(default)]
        reason: Option<String>,
        #[serde(default)]
        reference: Option<String>,
        #[serde(default = "default_performed_by")]
        performed_by: String,
    },
    AllocateStock {
        sku: String,
        location_code: String,
        quantity: i64,
        order_reference: String,
        #[serde(default = "default_performed_by")]
        performed_by: String,
    },
    DeallocateStock {
        sku: String,
        location_code: String,
        quantity: i64,
        reason: String,
        #[serde(default = "default_performed_by")]
        performed_by: String,
    },
    ReconcileStock {
        sku: String,
        location_code: String,
        counted_quantity: i64,
        #[serde(default)]
        reason: Option<String>,
        #[serde(default = "default_performed_by")]
        performed_by: String,
    },
    StockLevel {
        sku: String,
    },
    InventoryByLocation {
        location_code: String,
    },
    ExpiringItems {
        #[serde(default = "default_expiry_window")]
        window_days: i64,
    },
    ReplenishmentAdvice {
        sku: String,
    },
    GenerateRoute {
        demands: Vec<PickDemand>,
    },
    SuggestPutaway {
        sku: String,
        quantity: i64,
        #[serde(default)]
        lot_number: Option<String>,
    },
    WarehouseUtilization,
    RouteDistance {
        codes: Vec<String>,
    },
    RecentAudit {
        #[serde(default = "default_audit_limit")]
        limit: i64,
    },
    AuditTrail {
        stock_record_id: String,
    },
}

// ==========================================
// Dispatcher - 分发器
// ==========================================
pub struct Dispatcher {
    inventory: InventoryApi,
    operations: OperationsApi,
}

impl Dispatcher {
    pub fn new(inventory: InventoryApi, operations: OperationsApi) -> Self {
        Self {
            inventory,
            operations,
        }
    }

    /// 分发一个已解析的请求
    pub fn dispatch(&self, request: EngineRequest) -> ApiResult<Value> {
        match request {
            EngineRequest::AdjustStock {
                sku,
                location_code,
                lot_number,
                delta,
                movement_kind,
                reason,
                reference,
                performed_by,
            } => {
                let outcome = self.inventory.adjust_stock(
                    &sku,
                    &location_code,
                    lot_number.as_deref(),
                    delta,
                    movement_kind,
                    reason.as_deref(),
                    reference.as_deref(),
                    &performed_by,
                )?;
                to_value(&outcome)
            }
            EngineRequest::AllocateStock {
                sku,
                location_code,
                quantity,
                order_reference,
                performed_by,
            } => {
                let outcome = self.inventory.allocate_stock(
                    &sku,
                    &location_code,
                    quantity,
                    &order_reference,
                    &performed_by,
                )?;
                to_value(&outcome)
            }
            EngineRequest::DeallocateStock {
                sku,
                location_code,
                quantity,
                reason,
                performed_by,
            } => {
                let outcome = self.inventory.deallocate_stock(
                    &sku,
                    &location_code,
                    quantity,
                    &reason,
                    &performed_by,
                )?;
                to_value(&outcome)
            }
            EngineRequest::ReconcileStock {
                sku,
                location_code,
                counted_quantity,
                reason,
                performed_by,
            } => {
                let outcome = self.inventory.reconcile_stock(
                    &sku,
                    &location_code,
                    counted_quantity,
                    &performed_by,
                    reason.as_deref(),
                )?;
                to_value(&outcome)
            }
            EngineRequest::StockLevel { sku } => to_value(&self.inventory.stock_level(&sku)?),
            EngineRequest::InventoryByLocation { location_code } => {
                to_value(&self.inventory.inventory_by_location(&location_code)?)
            }
            EngineRequest::ExpiringItems { window_days } => {
                to_value(&self.inventory.expiring_items(window_days)?)
            }
            EngineRequest::ReplenishmentAdvice { sku } => {
                to_value(&self.inventory.replenishment_advice(&sku)?)
            }
            EngineRequest::GenerateRoute { demands } => {
                to_value(&self.operations.generate_route(&demands)?)
            }
            EngineRequest::SuggestPutaway {
                sku,
                quantity,
                lot_number,
            } => to_value(
                &self
                    .operations
                    .suggest_putaway(&sku, quantity, lot_number.as_deref())?,
            ),
            EngineRequest::WarehouseUtilization => {
                to_value(&self.operations.warehouse_utilization()?)
            }
            EngineRequest::RouteDistance { codes } => {
                to_value(&self.operations.route_distance(&codes)?)
            }
            EngineRequest::RecentAudit { limit } => to_value(&self.inventory.recent_audit(limit)?),
            EngineRequest::AuditTrail { stock_record_id } => {
                to_value(&self.inventory.audit_trail(&stock_record_id)?)
            }
        }
    }

    /// 分发一行 JSON 请求并返回一行 JSON 响应
    pub fn dispatch_json(&self, line: &str) -> String {
        let request: EngineRequest = match serde_json::from_str(line) {
            Ok(r) => r,
            Err(e) => {
                return json!({
                    "error": { "code": "invalid_request", "message": e.to_string() }
                })
                .to_string();
            }
        };

        match self.dispatch(request) {
            Ok(value) => json!({ "ok": value }).to_string(),
            Err(e) => {
                warn!(code = e.code(), "请求处理失败: {}", e);
                json!({
                    "error": { "code": e.code(), "message": e.to_string() }
                })
                .to_string()
            }
        }
    }
}

fn to_value<T: Serialize>(value: &T) -> ApiResult<Value> {
    serde_json::to_value(value).map_err(|e| ApiError::Repository(e.to_string()))
}
