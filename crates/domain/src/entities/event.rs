//! 事件实体（append-only）

use serde::{Deserialize, Serialize};

/// 事件类型常量
pub mod event_types {
    pub const LIMIT_ORDER_CREATED: &str = "limit_order_created";
    pub const MARKET_ORDER_CREATED: &str = "market_order_created";
    pub const LIMIT_ORDER_CANCELLED: &str = "limit_order_cancelled";
    pub const MARKET_ORDER_CANCELLED: &str = "market_order_cancelled";
    pub const LIMIT_ORDER_FULFILLED: &str = "limit_order_fulfilled";
    pub const MAX_DRAWDOWN_REACHED: &str = "max_drawdown_reached";
}

/// 引擎事件，持久化后用于对外可见的失败与成交记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineEvent {
    pub event_type: String,
    pub payload: serde_json::Value,
    pub exchange_id: String,
    /// 事件时间（毫秒）
    pub timestamp: i64,
}

impl EngineEvent {
    pub fn new(
        event_type: &str,
        payload: serde_json::Value,
        exchange_id: &str,
        timestamp: i64,
    ) -> Self {
        Self {
            event_type: event_type.to_string(),
            payload,
            exchange_id: exchange_id.to_string(),
            timestamp,
        }
    }
}
