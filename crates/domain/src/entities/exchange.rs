//! 交易所实体
//!
//! 每个交易账户一份文档：配置 + 本地镜像的实时状态。
//! 实时状态在一次代理运行内由镜像独占，跨运行通过持久化传递

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::entities::{Balance, Order, OrderBook, Ticker, Trade};

/// 同步时间戳键
pub mod sync_kinds {
    pub const BALANCE: &str = "balance";
    pub const TICKERS: &str = "tickers";
    pub const ORDER_BOOK: &str = "order_book";
    pub const TRADES: &str = "trades";
    pub const ORDERS: &str = "orders";
    pub const MARKETS: &str = "markets";
}

/// 镜像实时状态（随实体持久化）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExchangeLiveState {
    /// 挂单中订单（按id）
    pub open_orders: HashMap<String, Order>,
    /// 已关闭订单（按id）
    pub closed_orders: HashMap<String, Order>,
    /// 已取消订单（按id）
    pub cancelled_orders: HashMap<String, Order>,
    /// 各币种余额
    pub balances: HashMap<String, Balance>,
    /// 各交易对行情
    pub tickers: HashMap<String, Ticker>,
    /// 各交易对订单簿
    pub order_books: HashMap<String, OrderBook>,
    /// 各交易对近期成交
    pub recent_trades: HashMap<String, Vec<Trade>>,
    /// 各类数据的最近同步时间
    pub last_sync: HashMap<String, i64>,
}

/// 交易所实体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeEntity {
    pub id: String,

    /// 人类可读名称
    pub name: String,

    /// 凭证（不透明，由适配器解释）
    pub credentials: serde_json::Value,

    /// 组合估值用的计价币种（通常也是加密币，如ETH）
    pub fiat_currency: String,

    /// 手续费率
    pub fee: f64,

    /// 模拟盘标记：订单与余额全部本地记账
    pub simulation: bool,

    /// 熔断开关：开启后所有变更操作快速失败
    pub lockdown: bool,

    /// 强制要求所有订单携带auto_cancel
    pub force_auto_cancel: bool,

    /// 同步数据最大可用年龄（毫秒）
    pub max_sync_age: i64,

    /// 适配器请求间隔（毫秒）
    pub rate_limit: i64,

    /// 各币种保留额度（不可花费）
    pub reserves: HashMap<String, f64>,

    /// 各交易对最小成交量
    pub min_deal_amounts: HashMap<String, f64>,

    /// 日志级别
    pub log_level: String,

    /// 镜像实时状态
    pub state: ExchangeLiveState,

    /// 乐观锁版本
    pub version: u64,
}

impl ExchangeEntity {
    pub fn new(id: &str, name: &str, fiat_currency: &str, fee: f64, simulation: bool) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            credentials: serde_json::Value::Null,
            fiat_currency: fiat_currency.to_string(),
            fee,
            simulation,
            lockdown: false,
            force_auto_cancel: false,
            max_sync_age: 30_000,
            rate_limit: 1_000,
            reserves: HashMap::new(),
            min_deal_amounts: HashMap::new(),
            log_level: "info".to_string(),
            state: ExchangeLiveState::default(),
            version: 0,
        }
    }

    /// 币种保留额度
    pub fn reserve_of(&self, currency: &str) -> f64 {
        self.reserves.get(currency).copied().unwrap_or(0.0)
    }

    /// 交易对最小成交量
    pub fn min_deal_amount(&self, market: &str) -> f64 {
        self.min_deal_amounts.get(market).copied().unwrap_or(0.0)
    }

    /// 某市场的开放订单
    pub fn open_orders_for(&self, market: &str) -> Vec<&Order> {
        self.state
            .open_orders
            .values()
            .filter(|o| o.market == market)
            .collect()
    }
}
