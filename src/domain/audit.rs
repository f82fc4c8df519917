// ==========================================
// 仓储决策核心 - 审计日志领域模型
// ==========================================
// 红线: 仅追加，不可变更; 与触发变更同事务提交
// 不存在无审计的已提交变更，也不存在无变更的审计记录
// ==========================================

use crate::domain::types::{AuditAction, MovementKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 审计日志的实体类型标记
pub const ENTITY_STOCK_RECORD: &str = "stock_record";

// ==========================================
// AuditEntry - 审计日志条目
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: String,

    // ===== 实体引用 =====
    pub entity_type: String, // 实体类型（stock_record）
    pub entity_id: String,   // 实体主键

    // ===== 变更内容 =====
    pub action: AuditAction,
    pub movement_kind: Option<MovementKind>,
    pub quantity_before: Option<i64>,
    pub quantity_after: Option<i64>,
    pub quantity_delta: Option<i64>,

    // ===== 变更来源 =====
    pub reason: Option<String>,    // 变更原因（自由文本）
    pub reference: Option<String>, // 外部引用（订单号等）
    pub performed_by: String,      // 操作者
    pub subsystem: Option<String>, // 发起子系统

    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    /// 构造一条库存记录变更审计（台账操作内部使用）
    #[allow(clippy::too_many_arguments)]
    pub fn for_stock_record(
        entity_id: impl Into<String>,
        action: AuditAction,
        movement_kind: Option<MovementKind>,
        quantity_before: i64,
        quantity_after: i64,
        reason: Option<String>,
        reference: Option<String>,
        performed_by: impl Into<String>,
        subsystem: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            entity_type: ENTITY_STOCK_RECORD.to_string(),
            entity_id: entity_id.into(),
            action,
            movement_kind,
            quantity_before: Some(quantity_before),
            quantity_after: Some(quantity_after),
            quantity_delta: Some(quantity_after - quantity_before),
            reason,
            reference,
            performed_by: performed_by.into(),
            subsystem: Some(subsystem.into()),
            created_at: Utc::now(),
        }
    }
}
