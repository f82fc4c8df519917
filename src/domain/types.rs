// ==========================================
// 仓储决策核心 - 领域类型定义
// ==========================================
// 序列化格式: snake_case (与数据库存储一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// 库位类型 (Location Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationType {
    Receiving,   // 收货区
    Storage,     // 常规存储
    Picking,     // 拣选区
    Packing,     // 打包区
    Shipping,    // 发货区
    ColdStorage, // 冷库
    Hazmat,      // 危化品库
}

impl LocationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationType::Receiving => "receiving",
            LocationType::Storage => "storage",
            LocationType::Picking => "picking",
            LocationType::Packing => "packing",
            LocationType::Shipping => "shipping",
            LocationType::ColdStorage => "cold_storage",
            LocationType::Hazmat => "hazmat",
        }
    }
}

impl fmt::Display for LocationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LocationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "receiving" => Ok(LocationType::Receiving),
            "storage" => Ok(LocationType::Storage),
            "picking" => Ok(LocationType::Picking),
            "packing" => Ok(LocationType::Packing),
            "shipping" => Ok(LocationType::Shipping),
            "cold_storage" => Ok(LocationType::ColdStorage),
            "hazmat" => Ok(LocationType::Hazmat),
            other => Err(format!("未知库位类型: {}", other)),
        }
    }
}

// ==========================================
// 移库类别 (Movement Kind)
// ==========================================
// 用途: 审计日志中标记每次数量变动的业务类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    Receiving,  // 收货入库
    Putaway,    // 上架
    Pick,       // 拣选出库
    Transfer,   // 移库
    Adjustment, // 盘点调整
    Return,     // 退货
    WriteOff,   // 报废核销
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Receiving => "receiving",
            MovementKind::Putaway => "putaway",
            MovementKind::Pick => "pick",
            MovementKind::Transfer => "transfer",
            MovementKind::Adjustment => "adjustment",
            MovementKind::Return => "return",
            MovementKind::WriteOff => "write_off",
        }
    }
}

impl fmt::Display for MovementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MovementKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "receiving" => Ok(MovementKind::Receiving),
            "putaway" => Ok(MovementKind::Putaway),
            "pick" => Ok(MovementKind::Pick),
            "transfer" => Ok(MovementKind::Transfer),
            "adjustment" => Ok(MovementKind::Adjustment),
            "return" => Ok(MovementKind::Return),
            "write_off" => Ok(MovementKind::WriteOff),
            other => Err(format!("未知移库类别: {}", other)),
        }
    }
}

// ==========================================
// 审计动作 (Audit Action)
// ==========================================
// 红线: 每次台账变更恰好产生一条审计记录（同事务提交）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    StockUpdate,    // 数量调整
    Allocation,     // 库存分配
    Deallocation,   // 分配释放
    Reconciliation, // 盘点对账
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::StockUpdate => "stock_update",
            AuditAction::Allocation => "allocation",
            AuditAction::Deallocation => "deallocation",
            AuditAction::Reconciliation => "reconciliation",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stock_update" => Ok(AuditAction::StockUpdate),
            "allocation" => Ok(AuditAction::Allocation),
            "deallocation" => Ok(AuditAction::Deallocation),
            "reconciliation" => Ok(AuditAction::Reconciliation),
            other => Err(format!("未知审计动作: {}", other)),
        }
    }
}

// ==========================================
// 流速等级 (Velocity Class)
// ==========================================
// A/B/C 需求频次分级，决定上架时的优先区域
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum VelocityClass {
    A, // 高频 - 靠近发货区
    B, // 中频
    C, // 低频 - 远离发货区
}

impl VelocityClass {
    /// 上架优先区域集合（A 类靠近发货区，C 类远端）
    pub fn preferred_zones(&self) -> &'static [&'static str] {
        match self {
            VelocityClass::A => &["A", "B"],
            VelocityClass::B => &["B", "C"],
            VelocityClass::C => &["C", "D", "E"],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VelocityClass::A => "A",
            VelocityClass::B => "B",
            VelocityClass::C => "C",
        }
    }
}

impl fmt::Display for VelocityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for VelocityClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(VelocityClass::A),
            "B" => Ok(VelocityClass::B),
            "C" => Ok(VelocityClass::C),
            other => Err(format!("未知流速等级: {}", other)),
        }
    }
}

// ==========================================
// 库存状态 (Stock Status)
// ==========================================
// 依据可用量相对 min_stock_level / reorder_point 的位置分级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    Ok,         // 正常
    Low,        // 低于再订货点
    Critical,   // 低于最低库存
    OutOfStock, // 无可用库存
}

impl StockStatus {
    /// 依据可用量与产品阈值分级
    pub fn classify(available: i64, min_stock_level: i64, reorder_point: i64) -> Self {
        if available <= 0 {
            StockStatus::OutOfStock
        } else if available < min_stock_level {
            StockStatus::Critical
        } else if available < reorder_point {
            StockStatus::Low
        } else {
            StockStatus::Ok
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StockStatus::Ok => "ok",
            StockStatus::Low => "low",
            StockStatus::Critical => "critical",
            StockStatus::OutOfStock => "out_of_stock",
        }
    }
}

impl fmt::Display for StockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
