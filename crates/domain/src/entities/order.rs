//! 订单实体
//!
//! 镜像内订单的完整生命周期载体。创建后 id/时间戳/方向/类型/价格/数量不变，
//! 状态字段（status/filled/remaining/timestamp_closed）由镜像在对账时更新

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::enums::{OrderSide, OrderStatus, OrderType};

#[derive(Error, Debug)]
pub enum OrderError {
    #[error("订单数量必须大于0: {0}")]
    InvalidAmount(f64),

    #[error("订单价格必须大于0: {0}")]
    InvalidPrice(f64),

    #[error("交易对格式无效: {0}")]
    InvalidMarket(String),

    #[error("市价单不能设置sticky")]
    StickyMarketOrder,
}

/// 订单实体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// 订单ID（远端分配，模拟盘为16位本地ID）
    pub id: String,

    /// 创建时间（毫秒）
    pub timestamp: i64,

    /// 交易对 "BASE/QUOTE"
    pub market: String,

    /// 订单类型
    pub order_type: OrderType,

    /// 订单方向
    pub side: OrderSide,

    /// 价格
    pub price: f64,

    /// 数量（基础币种）
    pub amount: f64,

    /// 手续费率
    pub fee: f64,

    /// 状态
    pub status: OrderStatus,

    /// 已成交数量
    pub filled: f64,

    /// 未成交数量
    pub remaining: f64,

    /// 关闭时间（进入closed时设置）
    pub timestamp_closed: Option<i64>,

    /// 绝对存活时长（毫秒），超龄自动撤单
    pub auto_cancel: Option<i64>,

    /// 成交比例达到该阈值后自动撤单，(0, 1]
    pub auto_cancel_at_fill_percentage: f64,

    /// 价格水平触发撤单：买单在最优卖价升破该值时撤，卖单在最优买价跌破时撤
    pub auto_cancel_at_price_level: Option<f64>,

    /// sticky标记。None 表示该订单是从远端收编的、缺少本地元数据的僵尸单
    pub sticky: Option<bool>,
}

impl Order {
    /// 创建新订单（参数校验由镜像在下单入口完成后调用）
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: String,
        timestamp: i64,
        market: String,
        order_type: OrderType,
        side: OrderSide,
        price: f64,
        amount: f64,
        fee: f64,
    ) -> Result<Self, OrderError> {
        if amount <= 0.0 || !amount.is_finite() {
            return Err(OrderError::InvalidAmount(amount));
        }
        if price <= 0.0 || !price.is_finite() {
            return Err(OrderError::InvalidPrice(price));
        }
        if !market.contains('/') {
            return Err(OrderError::InvalidMarket(market));
        }

        Ok(Self {
            id,
            timestamp,
            market,
            order_type,
            side,
            price,
            amount,
            fee,
            status: OrderStatus::Open,
            filled: 0.0,
            remaining: amount,
            timestamp_closed: None,
            auto_cancel: None,
            auto_cancel_at_fill_percentage: 1.0,
            auto_cancel_at_price_level: None,
            sticky: Some(false),
        })
    }

    /// 基础币种
    pub fn base(&self) -> &str {
        self.market.split('/').next().unwrap_or(&self.market)
    }

    /// 计价币种
    pub fn quote(&self) -> &str {
        self.market.split('/').nth(1).unwrap_or(&self.market)
    }

    /// 名义价值（计价币种）
    pub fn notional(&self) -> f64 {
        self.price * self.amount
    }

    /// 订单年龄（毫秒）
    pub fn age(&self, now: i64) -> i64 {
        now - self.timestamp
    }

    /// 成交比例
    pub fn fill_ratio(&self) -> f64 {
        if self.amount > 0.0 {
            self.filled / self.amount
        } else {
            0.0
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == OrderStatus::Open
    }

    pub fn is_sticky(&self) -> bool {
        self.sticky == Some(true)
    }

    /// 标记为全部成交
    pub fn mark_fulfilled(&mut self, now: i64) {
        self.filled = self.amount;
        self.remaining = 0.0;
        self.status = OrderStatus::Closed;
        self.timestamp_closed = Some(now);
    }

    /// 标记为关闭（取消时带部分成交的订单也进入closed）
    pub fn mark_closed(&mut self, now: i64) {
        self.status = OrderStatus::Closed;
        self.timestamp_closed = Some(now);
    }

    /// 采纳远端对账结果
    pub fn adopt_remote(&mut self, status: OrderStatus, filled: f64, remaining: f64, fee: f64) {
        self.status = status;
        self.filled = filled;
        self.remaining = remaining;
        self.fee = fee;
    }
}
