// ==========================================
// 仓储决策核心 - 引擎层错误类型
// ==========================================
// 职责: 台账/路径/上架引擎的统一错误分类
// 红线: 错误信息必须包含可解释的上下文（SKU、库位、数量）
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 引擎层错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    // ==========================================
    // 身份解析错误
    // ==========================================
    #[error("产品不存在: sku={0}")]
    UnknownProduct(String),

    #[error("库位不存在: code={0}")]
    UnknownLocation(String),

    // ==========================================
    // 台账业务错误
    // ==========================================
    #[error("库存不足: sku={sku}, 在手={on_hand}, 请求扣减={requested}")]
    InsufficientStock {
        sku: String,
        on_hand: i64,
        requested: i64,
    },

    #[error("可用库存不足: sku={sku}, 可用={available}, 请求分配={requested}")]
    InsufficientAvailable {
        sku: String,
        available: i64,
        requested: i64,
    },

    #[error("超量释放: sku={sku}, 已分配={allocated}, 请求释放={requested}")]
    OverDeallocation {
        sku: String,
        allocated: i64,
        requested: i64,
    },

    #[error("库位容量超限: code={code}, 容量={capacity}, 变更后={resulting}")]
    CapacityExceeded {
        code: String,
        capacity: i64,
        resulting: i64,
    },

    #[error("盘点数低于已分配量: sku={sku}, 盘点={counted}, 已分配={allocated}")]
    ReconciliationBelowAllocated {
        sku: String,
        counted: i64,
        allocated: i64,
    },

    // ==========================================
    // 路径与上架错误
    // ==========================================
    #[error("无合适上架库位: sku={0}")]
    NoSuitableLocation(String),

    #[error("拣选库存不足: sku={0}")]
    InsufficientStockForPick(String),

    #[error("仓库无有效库位")]
    EmptyWarehouse,

    /// 图上两点不连通。路径规划内部以欧氏距离回退处理，
    /// 仅在坐标也无法解析时才会上抛
    #[error("图路径不可达: {from} -> {to}")]
    GraphUnreachable { from: String, to: String },

    /// 图构建超时（可重试错误，不返回部分图）
    #[error("图构建超时: 已耗时 {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl EngineError {
    /// 稳定的错误码（dispatch 边界序列化用）
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::UnknownProduct(_) | EngineError::UnknownLocation(_) => "not_found",
            EngineError::InsufficientStock { .. } => "insufficient_stock",
            EngineError::InsufficientAvailable { .. } => "insufficient_available",
            EngineError::OverDeallocation { .. } => "over_deallocation",
            EngineError::CapacityExceeded { .. } => "capacity_exceeded",
            EngineError::ReconciliationBelowAllocated { .. } => {
                "reconciliation_below_allocated"
            }
            EngineError::NoSuitableLocation(_) => "no_suitable_location",
            EngineError::InsufficientStockForPick(_) => "insufficient_stock_for_pick",
            EngineError::EmptyWarehouse => "empty_warehouse",
            EngineError::GraphUnreachable { .. } => "graph_unreachable",
            EngineError::Timeout { .. } => "timeout",
            EngineError::InvalidInput(_) => "invalid_input",
            EngineError::Repository(_) => "repository_error",
        }
    }
}

/// Result 类型别名
pub type EngineResult<T> = Result<T, EngineError>;
