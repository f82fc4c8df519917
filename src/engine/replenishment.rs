// ==========================================
// 仓储决策核心 - 补货计算引擎
// ==========================================
// 纯计算: 再订货点 / 经济订货量 (Wilson EOQ) / 覆盖天数
// 约定: 日均需求 <= 0 时覆盖天数为"无限"(None)，不做除零
// ==========================================

use crate::engine::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};

/// 安全库存天数默认值
pub const DEFAULT_SAFETY_STOCK_DAYS: i64 = 3;

/// 采购提前期默认值（天）
pub const DEFAULT_LEAD_TIME_DAYS: i64 = 7;

/// EOQ 年持有成本率默认值（占单位成本比例）
pub const DEFAULT_HOLDING_COST_RATE: f64 = 0.25;

/// EOQ 单次订货固定成本默认值
pub const DEFAULT_ORDERING_COST: f64 = 50.0;

// ==========================================
// 计算结果结构
// ==========================================

/// 再订货点计算结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReorderPointAdvice {
    pub avg_daily_demand: f64,
    pub lead_time_days: i64,
    pub safety_stock_days: i64,
    /// 提前期需求量
    pub lead_time_demand: f64,
    /// 安全库存量
    pub safety_stock: f64,
    /// 建议再订货点（向上取整）
    pub reorder_point: i64,
}

/// 经济订货量计算结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EoqAdvice {
    pub annual_demand: f64,
    pub ordering_cost: f64,
    pub holding_cost_per_unit: f64,
    /// 经济订货量（向上取整）
    pub economic_order_quantity: i64,
    pub orders_per_year: f64,
    pub annual_ordering_cost: f64,
    pub annual_holding_cost: f64,
    pub total_annual_cost: f64,
}

/// 覆盖天数分级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverStatus {
    /// 无需求，覆盖无限
    Unlimited,
    /// 覆盖不足提前期
    BelowLeadTime,
    /// 覆盖正常
    Adequate,
    /// 覆盖过剩（> 90 天）
    Excess,
}

/// 覆盖天数计算结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaysOfCoverAdvice {
    pub available_quantity: i64,
    pub avg_daily_demand: f64,
    /// None 表示无需求，覆盖无限
    pub days_of_cover: Option<f64>,
    pub status: CoverStatus,
}

/// 覆盖过剩阈值（天）
const EXCESS_COVER_DAYS: f64 = 90.0;

// ==========================================
// 计算函数
// ==========================================

/// 再订货点 = 提前期需求 + 安全库存。
///
/// 负的日均需求按 0 处理（需求估计噪声），天数为负 -> InvalidInput。
pub fn reorder_point(
    avg_daily_demand: f64,
    lead_time_days: i64,
    safety_stock_days: i64,
) -> EngineResult<ReorderPointAdvice> {
    if lead_time_days < 0 || safety_stock_days < 0 {
        return Err(EngineError::InvalidInput(
            "提前期与安全库存天数不能为负".to_string(),
        ));
    }
    let demand = avg_daily_demand.max(0.0);
    let lead_time_demand = demand * lead_time_days as f64;
    let safety_stock = demand * safety_stock_days as f64;
    let rop = (lead_time_demand + safety_stock).ceil() as i64;

    Ok(ReorderPointAdvice {
        avg_daily_demand: demand,
        lead_time_days,
        safety_stock_days,
        lead_time_demand,
        safety_stock,
        reorder_point: rop,
    })
}

/// Wilson 经济订货量: EOQ = sqrt(2 * D * S / H)。
///
/// H = 单位成本 x 年持有成本率; 单位成本 <= 0 -> InvalidInput。
/// 年需求 <= 0 时 EOQ 为 0（无需订货）。
pub fn economic_order_quantity(
    annual_demand: f64,
    ordering_cost: f64,
    unit_cost: f64,
    holding_cost_rate: f64,
) -> EngineResult<EoqAdvice> {
    if unit_cost <= 0.0 {
        return Err(EngineError::InvalidInput(
            "单位成本必须为正才能计算 EOQ".to_string(),
        ));
    }
    if ordering_cost < 0.0 || holding_cost_rate <= 0.0 {
        return Err(EngineError::InvalidInput(
            "订货成本不能为负且持有成本率必须为正".to_string(),
        ));
    }

    let holding_cost_per_unit = unit_cost * holding_cost_rate;
    if annual_demand <= 0.0 {
        return Ok(EoqAdvice {
            annual_demand: 0.0,
            ordering_cost,
            holding_cost_per_unit,
            economic_order_quantity: 0,
            orders_per_year: 0.0,
            annual_ordering_cost: 0.0,
            annual_holding_cost: 0.0,
            total_annual_cost: 0.0,
        });
    }

    let eoq_raw = (2.0 * annual_demand * ordering_cost / holding_cost_per_unit).sqrt();
    let eoq = eoq_raw.ceil() as i64;
    let orders_per_year = if eoq_raw > 0.0 {
        annual_demand / eoq_raw
    } else {
        0.0
    };
    let annual_ordering_cost = orders_per_year * ordering_cost;
    let annual_holding_cost = eoq_raw / 2.0 * holding_cost_per_unit;

    Ok(EoqAdvice {
        annual_demand,
        ordering_cost,
        holding_cost_per_unit,
        economic_order_quantity: eoq,
        orders_per_year,
        annual_ordering_cost,
        annual_holding_cost,
        total_annual_cost: annual_ordering_cost + annual_holding_cost,
    })
}

/// 覆盖天数 = 可用量 / 日均需求。
///
/// 日均需求 <= 0 时覆盖为无限（None），不产生除零。
pub fn days_of_cover(
    available_quantity: i64,
    avg_daily_demand: f64,
    lead_time_days: i64,
) -> DaysOfCoverAdvice {
    if avg_daily_demand <= 0.0 {
        return DaysOfCoverAdvice {
            available_quantity,
            avg_daily_demand,
            days_of_cover: None,
            status: CoverStatus::Unlimited,
        };
    }

    let days = available_quantity.max(0) as f64 / avg_daily_demand;
    let status = if days < lead_time_days as f64 {
        CoverStatus::BelowLeadTime
    } else if days > EXCESS_COVER_DAYS {
        CoverStatus::Excess
    } else {
        CoverStatus::Adequate
    };

    DaysOfCoverAdvice {
        available_quantity,
        avg_daily_demand,
        days_of_cover: Some(days),
        status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reorder_point_basic() {
        let advice = reorder_point(10.0, 7, 3).unwrap();
        assert_eq!(advice.reorder_point, 100);
        assert!((advice.lead_time_demand - 70.0).abs() < 1e-9);
        assert!((advice.safety_stock - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_reorder_point_negative_demand_clamped() {
        let advice = reorder_point(-4.0, 7, 3).unwrap();
        assert_eq!(advice.reorder_point, 0);
    }

    #[test]
    fn test_reorder_point_negative_days_rejected() {
        assert!(reorder_point(1.0, -1, 3).is_err());
    }

    #[test]
    fn test_eoq_wilson_formula() {
        // D=1000, S=50, H=10*0.25=2.5 -> EOQ = sqrt(40000) = 200
        let advice = economic_order_quantity(1000.0, 50.0, 10.0, 0.25).unwrap();
        assert_eq!(advice.economic_order_quantity, 200);
        assert!((advice.orders_per_year - 5.0).abs() < 1e-9);
        assert!((advice.annual_ordering_cost - 250.0).abs() < 1e-9);
        assert!((advice.annual_holding_cost - 250.0).abs() < 1e-9);
    }

    #[test]
    fn test_eoq_zero_unit_cost_rejected() {
        let err = economic_order_quantity(1000.0, 50.0, 0.0, 0.25).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[test]
    fn test_eoq_zero_demand_means_no_order() {
        let advice = economic_order_quantity(0.0, 50.0, 10.0, 0.25).unwrap();
        assert_eq!(advice.economic_order_quantity, 0);
        assert!((advice.total_annual_cost - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_days_of_cover_zero_demand_is_unlimited() {
        let advice = days_of_cover(100, 0.0, 7);
        assert!(advice.days_of_cover.is_none());
        assert_eq!(advice.status, CoverStatus::Unlimited);
    }

    #[test]
    fn test_days_of_cover_below_lead_time() {
        let advice = days_of_cover(10, 5.0, 7);
        assert!((advice.days_of_cover.unwrap() - 2.0).abs() < 1e-9);
        assert_eq!(advice.status, CoverStatus::BelowLeadTime);
    }

    #[test]
    fn test_days_of_cover_excess() {
        let advice = days_of_cover(1000, 1.0, 7);
        assert_eq!(advice.status, CoverStatus::Excess);
    }
}
