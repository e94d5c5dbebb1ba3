//! 交易所客户端端口
//!
//! 对远端现货交易所的窄适配接口。services/execution 依赖本接口，
//! infrastructure 提供具体适配器；线上精度舍入、分页、签名全部由适配器封装

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use spot_maker_common::types::CandleItem;
use spot_maker_common::EngineError;

use crate::entities::{Order, OrderBook, Ticker, Trade};
use crate::enums::{OrderSide, OrderType, Timeframe};

#[derive(Error, Debug)]
pub enum ExchangeClientError {
    #[error("网络错误: {0}")]
    Network(String),

    #[error("请求被限流: {0}")]
    RateLimited(String),

    #[error("交易所响应异常: {0}")]
    BadResponse(String),

    #[error("未知交易对: {0}")]
    MarketUnknown(String),
}

impl From<ExchangeClientError> for EngineError {
    fn from(e: ExchangeClientError) -> Self {
        match e {
            ExchangeClientError::Network(m) => EngineError::Network(m),
            ExchangeClientError::RateLimited(m) => EngineError::RateLimited(m),
            ExchangeClientError::BadResponse(m) => EngineError::BadResponse(m),
            ExchangeClientError::MarketUnknown(m) => EngineError::MarketUnknown(m),
        }
    }
}

/// 远端余额快照
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub free: f64,
    pub used: f64,
}

/// 下单请求
///
/// 适配器必须在提交前把数量与价格舍入到市场原生精度
#[derive(Debug, Clone)]
pub struct CreateOrderRequest {
    pub market: String,
    pub order_type: OrderType,
    pub side: OrderSide,
    pub amount: f64,
    pub price: Option<f64>,
    pub params: serde_json::Value,
}

/// 交易所客户端接口
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// 交易所名称
    fn name(&self) -> &str;

    /// 刷新交易对元数据（调用方每24h重载一次）
    async fn load_markets(&self) -> Result<(), ExchangeClientError>;

    /// 交易对列表，fiat给定时只返回以其计价的市场
    async fn get_markets(&self, fiat: Option<&str>) -> Result<Vec<String>, ExchangeClientError>;

    /// 交易对最小成交量
    async fn get_min_deal_amount(&self, market: &str) -> Result<f64, ExchangeClientError>;

    /// 账户余额
    async fn fetch_balance(
        &self,
    ) -> Result<HashMap<String, BalanceSnapshot>, ExchangeClientError>;

    /// 行情。支持批量的交易所走批量接口，否则适配器并行逐个拉取
    async fn fetch_tickers(
        &self,
        markets: Option<&[String]>,
    ) -> Result<HashMap<String, Ticker>, ExchangeClientError>;

    /// 订单簿
    async fn fetch_order_book(
        &self,
        markets: &[String],
        depth: Option<usize>,
    ) -> Result<HashMap<String, OrderBook>, ExchangeClientError>;

    /// 近期成交
    async fn fetch_trades(
        &self,
        markets: &[String],
        since: Option<i64>,
        limit: Option<usize>,
    ) -> Result<HashMap<String, Vec<Trade>>, ExchangeClientError>;

    /// 全部挂单。适配器必须翻页到底后返回
    async fn fetch_open_orders(
        &self,
        market: Option<&str>,
    ) -> Result<Vec<Order>, ExchangeClientError>;

    /// K线。限流或未知交易对时fail-soft返回None，调用方必须处理None
    async fn fetch_ohlcv(
        &self,
        market: &str,
        timeframe: Timeframe,
        since: Option<i64>,
        limit: Option<usize>,
    ) -> Result<Option<Vec<CandleItem>>, ExchangeClientError>;

    /// 下单，返回远端订单id
    async fn create_order(&self, req: &CreateOrderRequest) -> Result<String, ExchangeClientError>;

    /// 撤单。部分交易所要求 (id, market, side)，由适配器封装
    async fn cancel_order(&self, order: &Order) -> Result<(), ExchangeClientError>;
}
