// ==========================================
// 仓储决策核心 - 上架建议引擎
// ==========================================
// 排名规则（优先级升序，数值小者靠前）:
//   1 = 同产品同批次合并
//   2 = 同产品其他批次合并
//   3 = 流速等级优先区域
//   4 = 剩余容量降序兜底
// 红线: 候选必须容得下全量，不建议拆分上架
// ==========================================

use crate::domain::location::Location;
use crate::domain::product::Product;
use crate::domain::stock::StockRecord;
use crate::domain::types::LocationType;
use crate::engine::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// 建议条数上限
pub const MAX_SUGGESTIONS: usize = 5;

/// 上架建议
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutawaySuggestion {
    pub location_code: String,
    pub zone: String,
    pub aisle: String,
    pub location_type: LocationType,
    pub available_capacity: i64,
    /// 该库位已有的同产品在手量
    pub existing_quantity: i64,
    /// 同产品合并机会
    pub consolidation: bool,
    /// 同批次合并机会
    pub same_lot: bool,
    /// 排名优先级（1 最高）
    pub priority: u8,
    pub reason: String,
}

// ==========================================
// PutawayAdvisor - 上架顾问
// ==========================================
pub struct PutawayAdvisor;

impl PutawayAdvisor {
    /// 产品的存储约束决定候选库位类型
    pub fn required_location_type(product: &Product) -> LocationType {
        if product.requires_cold_storage {
            LocationType::ColdStorage
        } else if product.is_hazmat {
            LocationType::Hazmat
        } else {
            LocationType::Storage
        }
    }

    /// 生成上架建议。
    ///
    /// candidates 已按类型/容量/温控预筛（Repository 查询），
    /// existing_stock 为该产品当前所有库存记录及所在库位。
    /// 无任何可行候选 -> NoSuitableLocation。
    pub fn suggest(
        product: &Product,
        quantity: i64,
        lot_number: Option<&str>,
        candidates: &[Location],
        existing_stock: &[(StockRecord, Location)],
    ) -> EngineResult<Vec<PutawaySuggestion>> {
        if quantity <= 0 {
            return Err(EngineError::InvalidInput("上架数量必须为正".to_string()));
        }

        // 库位 id -> (同产品在手量, 是否存在同批次记录)
        let mut presence: BTreeMap<&str, (i64, bool)> = BTreeMap::new();
        for (record, location) in existing_stock {
            let entry = presence.entry(location.id.as_str()).or_insert((0, false));
            entry.0 += record.quantity_on_hand;
            if lot_number.is_some() && record.lot_number.as_deref() == lot_number {
                entry.1 = true;
            }
        }

        let preferred_zones = product.velocity_class.preferred_zones();

        let mut suggestions: Vec<PutawaySuggestion> = Vec::new();
        for location in candidates {
            if !location.is_active {
                continue;
            }
            let free = location.available_capacity();
            if free < quantity {
                continue;
            }
            if product.requires_cold_storage && !location.has_temperature_control {
                continue;
            }

            let (existing_quantity, has_same_lot) = presence
                .get(location.id.as_str())
                .copied()
                .unwrap_or((0, false));

            let (priority, reason) = if has_same_lot {
                (1, format!("同批次合并: 库位已有批次 {}", lot_number.unwrap_or("-")))
            } else if existing_quantity > 0 {
                (2, format!("同产品合并: 库位已有 {} 件", existing_quantity))
            } else if preferred_zones.contains(&location.zone.as_str()) {
                (
                    3,
                    format!(
                        "流速等级 {} 优先区域 {}",
                        product.velocity_class, location.zone
                    ),
                )
            } else {
                (4, format!("剩余容量 {} 件", free))
            };

            suggestions.push(PutawaySuggestion {
                location_code: location.code.clone(),
                zone: location.zone.clone(),
                aisle: location.aisle.clone(),
                location_type: location.location_type,
                available_capacity: free,
                existing_quantity,
                consolidation: existing_quantity > 0,
                same_lot: has_same_lot,
                priority,
                reason,
            });
        }

        if suggestions.is_empty() {
            return Err(EngineError::NoSuitableLocation(product.sku.clone()));
        }

        // 优先级升序、剩余容量降序、编码升序
        suggestions.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then(b.available_capacity.cmp(&a.available_capacity))
                .then(a.location_code.cmp(&b.location_code))
        });
        suggestions.truncate(MAX_SUGGESTIONS);

        debug!(
            sku = %product.sku,
            quantity = quantity,
            count = suggestions.len(),
            "上架建议生成完成"
        );
        Ok(suggestions)
    }
}
