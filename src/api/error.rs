// ==========================================
// 仓储决策核心 - API 层错误类型
// ==========================================
// 职责: 统一对外错误形态; 引擎/仓储错误透传并保留分类
// ==========================================

use crate::engine::error::EngineError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API 层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("参数错误: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("数据访问错误: {0}")]
    Repository(String),

    #[error("配置错误: {0}")]
    Config(String),
}

impl From<RepositoryError> for ApiError {
    fn from(e: RepositoryError) -> Self {
        ApiError::Repository(e.to_string())
    }
}

impl ApiError {
    /// 稳定的错误码（dispatch 边界序列化用）
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidInput(_) => "invalid_input",
            ApiError::Engine(e) => e.code(),
            ApiError::Repository(_) => "repository_error",
            ApiError::Config(_) => "config_error",
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
