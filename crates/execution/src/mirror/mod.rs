//! 镜像本体：状态持有、余额记账原语、组合估值

pub mod orders;
pub mod reconcile;

pub use orders::CreateOrderOptions;

use std::sync::Arc;

use serde_json::json;
use tracing::warn;

use spot_maker_common::utils::now_mills;
use spot_maker_domain::entities::{
    Balance, EngineEvent, ExchangeEntity, Order, Ticker,
};
use spot_maker_domain::enums::{OrderSide, OrderStatus};
use spot_maker_domain::traits::ExchangeClient;

/// 已关闭/已取消订单的保留时长：7天
pub const ORDER_RETENTION_MS: i64 = 7 * 86_400_000;

/// 市价单滑点
pub const MARKET_ORDER_SLIPPAGE: f64 = 0.01;

/// 交易所状态镜像
///
/// 一次代理运行内独占持有交易所实体；两次运行之间只通过持久化共享
pub struct ExchangeMirror {
    pub(crate) entity: ExchangeEntity,
    pub(crate) client: Arc<dyn ExchangeClient>,
    pub(crate) events: Vec<EngineEvent>,
}

impl ExchangeMirror {
    pub fn new(entity: ExchangeEntity, client: Arc<dyn ExchangeClient>) -> Self {
        Self {
            entity,
            client,
            events: Vec::new(),
        }
    }

    pub fn entity(&self) -> &ExchangeEntity {
        &self.entity
    }

    pub fn client(&self) -> Arc<dyn ExchangeClient> {
        Arc::clone(&self.client)
    }

    pub fn is_simulation(&self) -> bool {
        self.entity.simulation
    }

    pub fn is_lockdown(&self) -> bool {
        self.entity.lockdown
    }

    pub fn set_lockdown(&mut self, lockdown: bool) {
        self.entity.lockdown = lockdown;
    }

    pub fn fee(&self) -> f64 {
        self.entity.fee
    }

    pub fn fiat_currency(&self) -> &str {
        &self.entity.fiat_currency
    }

    /// 回收运行产物
    pub fn into_parts(self) -> (ExchangeEntity, Vec<EngineEvent>) {
        (self.entity, self.events)
    }

    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    pub(crate) fn emit(&mut self, event_type: &str, payload: serde_json::Value) {
        self.events.push(EngineEvent::new(
            event_type,
            payload,
            &self.entity.id,
            now_mills(),
        ));
    }

    pub(crate) fn emit_order_event(&mut self, event_type: &str, order: &Order) {
        self.emit(
            event_type,
            json!({
                "id": order.id,
                "market": order.market,
                "side": order.side.as_str(),
                "type": order.order_type.as_str(),
                "price": order.price,
                "amount": order.amount,
                "filled": order.filled,
            }),
        );
    }

    // ------------------------------------------------------------------
    // 余额记账
    // ------------------------------------------------------------------

    /// 取余额的可变引用；首次引用时惰性创建并带上配置的保留额度
    pub(crate) fn balance_mut(&mut self, currency: &str) -> &mut Balance {
        let locked = self.entity.reserve_of(currency);
        self.entity
            .state
            .balances
            .entry(currency.to_string())
            .or_insert_with(|| Balance::with_locked(locked))
    }

    /// 余额快照（不存在时为空余额）
    pub fn balance(&self, currency: &str) -> Balance {
        self.entity
            .state
            .balances
            .get(currency)
            .copied()
            .unwrap_or_else(|| Balance::with_locked(self.entity.reserve_of(currency)))
    }

    pub(crate) fn deposit(&mut self, currency: &str, delta: f64) {
        self.balance_mut(currency).deposit(delta);
    }

    pub(crate) fn withdraw(&mut self, currency: &str, delta: f64) {
        self.balance_mut(currency).withdraw(delta);
    }

    pub(crate) fn withdraw_from_used(&mut self, currency: &str, delta: f64) {
        self.balance_mut(currency).withdraw_from_used(delta);
    }

    pub(crate) fn reserve(&mut self, currency: &str, delta: f64) -> f64 {
        self.balance_mut(currency).reserve(delta)
    }

    pub(crate) fn release(&mut self, currency: &str, delta: f64) -> f64 {
        self.balance_mut(currency).release(delta)
    }

    // ------------------------------------------------------------------
    // 行情与订单访问
    // ------------------------------------------------------------------

    pub fn ticker(&self, market: &str) -> Option<Ticker> {
        self.entity.state.tickers.get(market).copied()
    }

    pub fn open_orders_for(&self, market: &str) -> Vec<Order> {
        self.entity
            .state
            .open_orders
            .values()
            .filter(|o| o.market == market)
            .cloned()
            .collect()
    }

    pub fn has_open_order(&self, market: &str, side: OrderSide) -> bool {
        self.entity
            .state
            .open_orders
            .values()
            .any(|o| o.market == market && o.side == side)
    }

    pub fn open_order_count(&self, market: &str) -> usize {
        self.entity
            .state
            .open_orders
            .values()
            .filter(|o| o.market == market)
            .count()
    }

    /// 某市场最近关闭的指定方向订单（按关闭时间）
    pub fn last_closed_order(&self, market: &str, side: OrderSide) -> Option<Order> {
        self.entity
            .state
            .closed_orders
            .values()
            .filter(|o| {
                o.market == market && o.side == side && o.status == OrderStatus::Closed
            })
            .max_by_key(|o| o.timestamp_closed.unwrap_or(o.timestamp))
            .cloned()
    }

    // ------------------------------------------------------------------
    // 组合估值
    // ------------------------------------------------------------------

    /// 全账户折算到fiat币种的总额
    ///
    /// 估值优先用 `cur/fiat` 的bid，反向市场 `fiat/cur` 用 1/ask；
    /// 行情缺失且 ignore_missing 为false时返回None
    pub fn get_total_balance(
        &self,
        include_reserve: bool,
        currencies: Option<&[String]>,
        ignore_missing: bool,
    ) -> Option<f64> {
        let fiat = &self.entity.fiat_currency;
        let mut total = 0.0;

        for (currency, balance) in &self.entity.state.balances {
            if let Some(filter) = currencies {
                if !filter.contains(currency) {
                    continue;
                }
            }
            let amount = if include_reserve {
                balance.total_with_reserve()
            } else {
                balance.total()
            };
            if amount <= 0.0 {
                continue;
            }

            if currency == fiat {
                total += amount;
                continue;
            }

            let direct = format!("{}/{}", currency, fiat);
            let reverse = format!("{}/{}", fiat, currency);
            if let Some(ticker) = self.entity.state.tickers.get(&direct) {
                if ticker.bid > 0.0 {
                    total += amount * ticker.bid;
                    continue;
                }
            }
            if let Some(ticker) = self.entity.state.tickers.get(&reverse) {
                if ticker.ask > 0.0 {
                    total += amount / ticker.ask;
                    continue;
                }
            }
            if !ignore_missing {
                warn!("估值缺少行情: {} (fiat={})", currency, fiat);
                return None;
            }
        }

        Some(total)
    }

    /// 把fiat金额折算成市场的基础币种数量
    pub fn convert_to_base(&self, fiat_amount: f64, market: &str) -> Option<f64> {
        let ticker = self.ticker(market)?;
        if ticker.bid > 0.0 {
            Some(fiat_amount / ticker.bid)
        } else {
            None
        }
    }
}
