//! 订单入口：下单、撤单、批量撤单

use futures::future::join_all;
use tracing::{error, info, warn};

use spot_maker_common::utils::{local_order_id, now_mills};
use spot_maker_common::EngineError;
use spot_maker_domain::entities::{event_types, Order};
use spot_maker_domain::enums::{OrderSide, OrderType};
use spot_maker_domain::traits::CreateOrderRequest;

use super::{ExchangeMirror, MARKET_ORDER_SLIPPAGE};

/// 下单选项
#[derive(Debug, Clone)]
pub struct CreateOrderOptions {
    pub market: String,
    pub order_type: OrderType,
    pub side: OrderSide,
    pub amount: f64,
    /// 缺省时取当前行情：买单用bid，卖单用ask
    pub price: Option<f64>,
    pub sticky: bool,
    pub auto_cancel: Option<i64>,
    pub auto_cancel_at_fill_percentage: Option<f64>,
    pub auto_cancel_at_price_level: Option<f64>,
}

impl CreateOrderOptions {
    pub fn limit(market: &str, side: OrderSide, amount: f64, price: f64) -> Self {
        Self {
            market: market.to_string(),
            order_type: OrderType::Limit,
            side,
            amount,
            price: Some(price),
            sticky: false,
            auto_cancel: None,
            auto_cancel_at_fill_percentage: None,
            auto_cancel_at_price_level: None,
        }
    }

    pub fn market(market: &str, side: OrderSide, amount: f64) -> Self {
        Self {
            market: market.to_string(),
            order_type: OrderType::Market,
            side,
            amount,
            price: None,
            sticky: false,
            auto_cancel: None,
            auto_cancel_at_fill_percentage: None,
            auto_cancel_at_price_level: None,
        }
    }

    pub fn sticky(mut self, sticky: bool) -> Self {
        self.sticky = sticky;
        self
    }

    pub fn auto_cancel(mut self, ms: i64) -> Self {
        self.auto_cancel = Some(ms);
        self
    }

    pub fn auto_cancel_at_fill_percentage(mut self, pct: f64) -> Self {
        self.auto_cancel_at_fill_percentage = Some(pct);
        self
    }

    pub fn auto_cancel_at_price_level(mut self, level: f64) -> Self {
        self.auto_cancel_at_price_level = Some(level);
        self
    }
}

impl ExchangeMirror {
    /// 下单
    ///
    /// Err：lockdown / 参数问题；Ok(None)：远端适配器失败（已记录日志，
    /// 调用方按"没有下成"处理）；Ok(Some)：订单已进入镜像
    pub async fn create_order(
        &mut self,
        options: CreateOrderOptions,
    ) -> Result<Option<Order>, EngineError> {
        if self.is_lockdown() {
            return Err(EngineError::Lockdown);
        }
        if self.entity.force_auto_cancel && options.auto_cancel.is_none() {
            return Err(EngineError::Input(
                "该交易所强制要求订单携带auto_cancel".to_string(),
            ));
        }
        if options.amount <= 0.0 || !options.amount.is_finite() {
            return Err(EngineError::Input(format!(
                "订单数量无效: {}",
                options.amount
            )));
        }

        let ticker = self.ticker(&options.market);
        let price = match options.order_type {
            // 市价单始终按对手价成交
            OrderType::Market => match (&ticker, options.side) {
                (Some(t), OrderSide::Buy) => t.ask,
                (Some(t), OrderSide::Sell) => t.bid,
                (None, _) => {
                    return Err(EngineError::Input(format!(
                        "市价单缺少行情: {}",
                        options.market
                    )))
                }
            },
            OrderType::Limit => match options.price {
                Some(p) => p,
                None => match (&ticker, options.side) {
                    (Some(t), OrderSide::Buy) => t.bid,
                    (Some(t), OrderSide::Sell) => t.ask,
                    (None, _) => {
                        return Err(EngineError::Input(format!(
                            "限价单未给价且缺少行情: {}",
                            options.market
                        )))
                    }
                },
            },
        };
        if price <= 0.0 || !price.is_finite() {
            return Err(EngineError::Input(format!("订单价格无效: {}", price)));
        }

        let mut order = Order::new(
            local_order_id(),
            now_mills(),
            options.market.clone(),
            options.order_type,
            options.side,
            price,
            options.amount,
            self.entity.fee,
        )
        .map_err(|e| EngineError::Input(e.to_string()))?;

        // 市价单不能sticky
        order.sticky = Some(options.sticky && options.order_type == OrderType::Limit);
        order.auto_cancel = options.auto_cancel;
        order.auto_cancel_at_fill_percentage =
            options.auto_cancel_at_fill_percentage.unwrap_or(1.0);
        order.auto_cancel_at_price_level = options.auto_cancel_at_price_level;

        // 可用余额截断
        let base = order.base().to_string();
        let quote = order.quote().to_string();
        let capped = match order.side {
            OrderSide::Buy => {
                let quote_free = self.balance(&quote).free();
                (order.price * order.amount).min(quote_free) / order.price
            }
            OrderSide::Sell => {
                let base_free = self.balance(&base).free();
                order.amount.min(base_free)
            }
        };
        if capped <= 0.0 {
            return Err(EngineError::ReservationViolation {
                currency: match order.side {
                    OrderSide::Buy => quote,
                    OrderSide::Sell => base,
                },
                requested: order.amount,
                available: 0.0,
            });
        }
        order.amount = capped;
        order.remaining = capped;

        if self.is_simulation() {
            self.place_simulated(order).map(Some)
        } else {
            self.place_live(order).await
        }
    }

    /// 模拟盘路径：本地记账
    fn place_simulated(&mut self, mut order: Order) -> Result<Order, EngineError> {
        let base = order.base().to_string();
        let quote = order.quote().to_string();

        match order.order_type {
            OrderType::Limit => {
                match order.side {
                    OrderSide::Buy => {
                        self.reserve(&quote, order.amount * order.price);
                    }
                    OrderSide::Sell => {
                        self.reserve(&base, order.amount);
                    }
                }
                self.entity
                    .state
                    .open_orders
                    .insert(order.id.clone(), order.clone());
                self.emit_order_event(event_types::LIMIT_ORDER_CREATED, &order);
            }
            OrderType::Market => {
                let now = now_mills();
                match order.side {
                    OrderSide::Buy => {
                        self.withdraw(&quote, order.amount * order.price);
                        self.deposit(
                            &base,
                            order.amount * (1.0 - order.fee) * (1.0 - MARKET_ORDER_SLIPPAGE),
                        );
                    }
                    OrderSide::Sell => {
                        self.withdraw(&base, order.amount);
                        self.deposit(
                            &quote,
                            order.amount
                                * order.price
                                * (1.0 - order.fee)
                                * (1.0 - MARKET_ORDER_SLIPPAGE),
                        );
                    }
                }
                order.mark_fulfilled(now);
                self.entity
                    .state
                    .closed_orders
                    .insert(order.id.clone(), order.clone());
                self.emit_order_event(event_types::MARKET_ORDER_CREATED, &order);
            }
        }

        info!(
            "模拟下单: {} {} {} {}@{}",
            order.market,
            order.order_type.as_str(),
            order.side.as_str(),
            order.amount,
            order.price
        );
        Ok(order)
    }

    /// 实盘路径：先远端下单，成功后本地入账
    async fn place_live(&mut self, mut order: Order) -> Result<Option<Order>, EngineError> {
        let request = CreateOrderRequest {
            market: order.market.clone(),
            order_type: order.order_type,
            side: order.side,
            amount: order.amount,
            price: Some(order.price),
            params: serde_json::Value::Null,
        };

        let remote_id = match self.client.create_order(&request).await {
            Ok(id) => id,
            Err(e) => {
                error!("远端下单失败: {} {}: {}", order.market, order.side.as_str(), e);
                return Ok(None);
            }
        };
        order.id = remote_id;

        let base = order.base().to_string();
        let quote = order.quote().to_string();
        match order.order_type {
            OrderType::Limit => {
                // 本地先行占用，下一次余额同步以远端为准
                match order.side {
                    OrderSide::Buy => {
                        self.reserve(&quote, order.amount * order.price);
                    }
                    OrderSide::Sell => {
                        self.reserve(&base, order.amount);
                    }
                }
                self.entity
                    .state
                    .open_orders
                    .insert(order.id.clone(), order.clone());
                self.emit_order_event(event_types::LIMIT_ORDER_CREATED, &order);
            }
            OrderType::Market => {
                order.mark_fulfilled(now_mills());
                self.entity
                    .state
                    .closed_orders
                    .insert(order.id.clone(), order.clone());
                self.emit_order_event(event_types::MARKET_ORDER_CREATED, &order);
            }
        }

        info!(
            "实盘下单: {} {} {} {}@{} (id={})",
            order.market,
            order.order_type.as_str(),
            order.side.as_str(),
            order.amount,
            order.price,
            order.id
        );
        Ok(Some(order))
    }

    /// 撤单
    ///
    /// Ok(false)：远端撤单失败（本地状态不动，下个tick重试）
    pub async fn cancel_order(&mut self, order_id: &str) -> Result<bool, EngineError> {
        if self.is_lockdown() {
            return Err(EngineError::Lockdown);
        }
        let order = match self.entity.state.open_orders.get(order_id) {
            Some(o) => o.clone(),
            None => {
                return Err(EngineError::Input(format!(
                    "订单不在挂单列表中: {}",
                    order_id
                )))
            }
        };

        if !self.is_simulation() {
            if let Err(e) = self.client.cancel_order(&order).await {
                // 远端失败时不动本地状态
                error!("远端撤单失败: {}: {}", order.id, e);
                return Ok(false);
            }
        }

        self.finish_cancel_local(order_id);
        Ok(true)
    }

    /// 本地撤单收尾：释放占用、移动列表、发事件
    pub(crate) fn finish_cancel_local(&mut self, order_id: &str) {
        let mut order = match self.entity.state.open_orders.remove(order_id) {
            Some(o) => o,
            None => return,
        };

        let base = order.base().to_string();
        let quote = order.quote().to_string();
        match order.side {
            OrderSide::Buy => {
                self.release(&quote, order.amount * order.price);
            }
            OrderSide::Sell => {
                self.release(&base, order.amount);
            }
        }

        let now = now_mills();
        if order.filled > 0.0 {
            // 部分成交的取消同时记入closed
            let mut closed = order.clone();
            closed.mark_closed(now);
            self.entity
                .state
                .closed_orders
                .insert(closed.id.clone(), closed);
        }
        order.timestamp_closed = Some(now);
        let event_type = match order.order_type {
            OrderType::Limit => event_types::LIMIT_ORDER_CANCELLED,
            OrderType::Market => event_types::MARKET_ORDER_CANCELLED,
        };
        self.emit_order_event(event_type, &order);
        self.entity
            .state
            .cancelled_orders
            .insert(order.id.clone(), order);
    }

    /// 批量撤单：远端撤单并行发出，单笔失败只记录不影响其他
    pub async fn cancel_all_orders(
        &mut self,
        market: Option<&str>,
        side: Option<OrderSide>,
    ) -> Result<usize, EngineError> {
        if self.is_lockdown() {
            return Err(EngineError::Lockdown);
        }

        let targets: Vec<Order> = self
            .entity
            .state
            .open_orders
            .values()
            .filter(|o| market.map(|m| o.market == m).unwrap_or(true))
            .filter(|o| side.map(|s| o.side == s).unwrap_or(true))
            .cloned()
            .collect();

        if targets.is_empty() {
            return Ok(0);
        }

        let mut cancelled = 0usize;
        if self.is_simulation() {
            for order in &targets {
                self.finish_cancel_local(&order.id);
                cancelled += 1;
            }
        } else {
            let client = self.client();
            let results = join_all(targets.iter().map(|order| {
                let client = client.clone();
                async move { (order.id.clone(), client.cancel_order(order).await) }
            }))
            .await;
            for (id, result) in results {
                match result {
                    Ok(()) => {
                        self.finish_cancel_local(&id);
                        cancelled += 1;
                    }
                    Err(e) => warn!("批量撤单失败: {}: {}", id, e),
                }
            }
        }

        Ok(cancelled)
    }
}
