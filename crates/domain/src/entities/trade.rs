//! 成交记录实体

use serde::{Deserialize, Serialize};

use crate::enums::OrderSide;

/// 市场公开成交记录
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Trade {
    /// 成交时间（毫秒）
    pub timestamp: i64,
    /// 主动方方向
    pub side: OrderSide,
    /// 成交价
    pub price: f64,
    /// 成交量（基础币种）
    pub amount: f64,
}
