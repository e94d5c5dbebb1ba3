//! 统一错误类型定义
//!
//! 错误分层约定：领域失败用本模块的 `EngineError`，
//! 服务/编排层用 `anyhow::Result` 聚合传播

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("参数错误: {0}")]
    Input(String),

    #[error("实体不存在: {kind} {id}")]
    EntityNotFound { kind: &'static str, id: String },

    #[error("网络错误: {0}")]
    Network(String),

    #[error("请求被限流: {0}")]
    RateLimited(String),

    #[error("交易所响应异常: {0}")]
    BadResponse(String),

    #[error("未知交易对: {0}")]
    MarketUnknown(String),

    #[error("本地订单与远端不一致: market={market} local={local} remote={remote}")]
    ReconciliationMismatch {
        market: String,
        local: usize,
        remote: usize,
    },

    #[error("数据不足: 需要{required}条, 实际{actual}条")]
    InsufficientData { required: usize, actual: usize },

    #[error("交易所处于lockdown状态, 拒绝所有变更操作")]
    Lockdown,

    #[error("触碰保留额度: {currency} 需要{requested}, 可用{available}")]
    ReservationViolation {
        currency: String,
        requested: f64,
        available: f64,
    },

    #[error("乐观锁冲突: {kind} {id} 期望版本{expected}")]
    Conflict {
        kind: &'static str,
        id: String,
        expected: u64,
    },

    #[error("解析错误: {0}")]
    Parse(String),

    #[error("未知错误: {0}")]
    Unknown(String),
}

impl EngineError {
    /// 是否属于可在下一个tick自动恢复的瞬时错误
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EngineError::Network(_)
                | EngineError::RateLimited(_)
                | EngineError::BadResponse(_)
                | EngineError::ReconciliationMismatch { .. }
        )
    }
}
