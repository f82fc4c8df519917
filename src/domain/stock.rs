// ==========================================
// 仓储决策核心 - 库存记录领域模型
// ==========================================
// 红线: 仅由台账操作变更; 记录只归零不删除
// 不变量: 0 <= quantity_allocated <= quantity_on_hand
//         quantity_available == quantity_on_hand - quantity_allocated
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==========================================
// StockRecord - 库存记录
// ==========================================
// 粒度: 产品 × 库位 × 批次 各一条
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockRecord {
    // ===== 主键与外键 =====
    pub id: String,
    pub product_id: String,  // 关联 products（FK）
    pub location_id: String, // 关联 locations（FK）
    pub lot_number: Option<String>, // 批次号（追溯与 FIFO 依据）

    // ===== 数量三元组 =====
    pub quantity_on_hand: i64,   // 在手量
    pub quantity_allocated: i64, // 已分配量
    pub quantity_available: i64, // 可用量（派生，每次变更重算）

    // ===== 时间信息 =====
    pub expiry_date: Option<DateTime<Utc>>, // 到期时间
    pub received_at: DateTime<Utc>,         // 收货时间（FIFO 排序依据）
    pub last_counted_at: Option<DateTime<Utc>>, // 最近盘点时间
    pub last_moved_at: Option<DateTime<Utc>>,   // 最近移动时间

    // ===== 审计字段 =====
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StockRecord {
    /// 创建空库存记录（首次收货时由台账创建）
    pub fn new(
        product_id: impl Into<String>,
        location_id: impl Into<String>,
        lot_number: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            product_id: product_id.into(),
            location_id: location_id.into(),
            lot_number,
            quantity_on_hand: 0,
            quantity_allocated: 0,
            quantity_available: 0,
            expiry_date: None,
            received_at: now,
            last_counted_at: None,
            last_moved_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 校验数量不变量（调试与测试用）
    pub fn invariants_hold(&self) -> bool {
        self.quantity_on_hand >= 0
            && self.quantity_allocated >= 0
            && self.quantity_allocated <= self.quantity_on_hand
            && self.quantity_available == self.quantity_on_hand - self.quantity_allocated
    }
}
