// ==========================================
// 仓储决策核心 - 库位领域模型
// ==========================================
// 红线: current_units 仅由台账作为数量变更副作用维护
// 不变量: 0 <= current_units <= capacity_units
// ==========================================

use crate::domain::types::LocationType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==========================================
// Location - 仓库库位
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    // ===== 身份 =====
    pub id: String,   // 内部主键 (uuid)
    pub code: String, // 库位编码（唯一）

    // ===== 物理分组 =====
    pub zone: String,  // 区域
    pub aisle: String, // 巷道
    pub rack: String,  // 货架
    pub shelf: String, // 层
    pub bin: String,   // 格

    // ===== 类型与容量 =====
    pub location_type: LocationType,
    pub capacity_units: i64, // 容量（抽象单位）
    pub current_units: i64,  // 当前占用（台账维护）

    // ===== 三维坐标（米） =====
    pub x_coordinate: f64,
    pub y_coordinate: f64,
    pub z_coordinate: f64,

    // ===== 状态 =====
    pub is_active: bool,
    pub has_temperature_control: bool, // 温控标志（冷藏上架必需）
    pub created_at: DateTime<Utc>,
}

impl Location {
    /// 创建新库位
    pub fn new(
        code: impl Into<String>,
        zone: impl Into<String>,
        aisle: impl Into<String>,
        location_type: LocationType,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            code: code.into(),
            zone: zone.into(),
            aisle: aisle.into(),
            rack: String::new(),
            shelf: String::new(),
            bin: String::new(),
            location_type,
            capacity_units: 100,
            current_units: 0,
            x_coordinate: 0.0,
            y_coordinate: 0.0,
            z_coordinate: 0.0,
            is_active: true,
            has_temperature_control: false,
            created_at: Utc::now(),
        }
    }

    /// 剩余可用容量
    pub fn available_capacity(&self) -> i64 {
        self.capacity_units - self.current_units
    }

    /// 利用率（百分比）；容量为 0 时按 0 处理
    pub fn utilization_percent(&self) -> f64 {
        if self.capacity_units <= 0 {
            return 0.0;
        }
        (self.current_units as f64 / self.capacity_units as f64) * 100.0
    }
}
