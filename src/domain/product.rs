// ==========================================
// 仓储决策核心 - 产品领域模型
// ==========================================
// 红线: SKU 为不可变身份标识; 台账按 id 引用产品，不复制
// 用途: 主数据管理写入，引擎层只读
// ==========================================

use crate::domain::types::VelocityClass;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==========================================
// Product - 产品主数据
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    // ===== 身份 =====
    pub id: String,  // 内部主键 (uuid)
    pub sku: String, // 产品编码（唯一，不可变）

    // ===== 基础信息 =====
    pub name: String,
    pub category: String,
    pub unit_of_measure: String, // 计量单位（默认 EACH）

    // ===== 存储约束标志 =====
    pub requires_cold_storage: bool, // 需冷藏
    pub is_hazmat: bool,             // 危化品
    pub is_fragile: bool,            // 易碎
    pub shelf_life_days: Option<i64>, // 保质期（天）

    // ===== 计划参数 =====
    pub reorder_point: i64,    // 再订货点
    pub reorder_quantity: i64, // 再订货量
    pub min_stock_level: i64,  // 最低库存
    pub max_stock_level: i64,  // 最高库存
    pub velocity_class: VelocityClass, // 流速等级 A/B/C
    pub unit_cost: f64,        // 单位成本

    // ===== 状态与审计 =====
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// 创建新产品（计划参数取默认值，与建表默认一致）
    pub fn new(sku: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            sku: sku.into(),
            name: name.into(),
            category: String::new(),
            unit_of_measure: "EACH".to_string(),
            requires_cold_storage: false,
            is_hazmat: false,
            is_fragile: false,
            shelf_life_days: None,
            reorder_point: 10,
            reorder_quantity: 50,
            min_stock_level: 5,
            max_stock_level: 500,
            velocity_class: VelocityClass::C,
            unit_cost: 0.0,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}
