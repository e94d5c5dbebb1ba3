//! 对账循环
//!
//! update(market) 按固定顺序执行：同步订单 → 模拟成交 → 自动撤单 →
//! sticky改价 → 清理过期订单。远端是事实来源，数量对不上时本市场
//! 回滚并在下个tick重试

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::{info, warn};

use spot_maker_common::types::CandleItem;
use spot_maker_common::utils::now_mills;
use spot_maker_domain::entities::{event_types, sync_kinds, Balance, Order};
use spot_maker_domain::enums::{OrderSide, OrderStatus, OrderType, Timeframe};

use super::{CreateOrderOptions, ExchangeMirror, ORDER_RETENTION_MS};

/// 交易对元数据刷新间隔：24小时
const MARKETS_REFRESH_MS: i64 = 86_400_000;

impl ExchangeMirror {
    /// 对账循环。返回false表示本市场的tick应中止
    pub async fn update(&mut self, market: Option<&str>) -> bool {
        if self.is_lockdown() {
            return false;
        }
        if !self.sync_orders(market).await {
            return false;
        }
        if self.is_simulation() {
            self.fulfill_limit_orders(market).await;
        }
        self.auto_cancel_orders(market).await;
        self.update_sticky_orders(market).await;
        self.purge_order_list(market);
        true
    }

    // ------------------------------------------------------------------
    // 订单对账
    // ------------------------------------------------------------------

    /// 与远端对账挂单列表。模拟盘跳过（本地即事实）
    pub async fn sync_orders(&mut self, market: Option<&str>) -> bool {
        if self.is_simulation() {
            return true;
        }

        let remote = match self.client.fetch_open_orders(market).await {
            Ok(orders) => orders,
            Err(e) => {
                warn!("挂单同步失败: {:?}: {}", market, e);
                return false;
            }
        };

        // 数量校验失败时整体回滚本次变更
        let snapshot = (
            self.entity.state.open_orders.clone(),
            self.entity.state.closed_orders.clone(),
            self.entity.state.cancelled_orders.clone(),
        );

        let now = now_mills();
        let remote_by_id: HashMap<&str, &Order> =
            remote.iter().map(|o| (o.id.as_str(), o)).collect();
        let in_scope = |o: &Order| market.map(|m| o.market == m).unwrap_or(true);

        // 1) 本地挂单：远端没有且未被本地取消 → 视为已成交
        let local_ids: Vec<String> = self
            .entity
            .state
            .open_orders
            .values()
            .filter(|o| in_scope(o))
            .map(|o| o.id.clone())
            .collect();
        for id in local_ids {
            if let Some(remote_order) = remote_by_id.get(id.as_str()) {
                if let Some(local) = self.entity.state.open_orders.get_mut(&id) {
                    local.adopt_remote(
                        OrderStatus::Open,
                        remote_order.filled,
                        remote_order.remaining,
                        remote_order.fee,
                    );
                }
            } else if !self.entity.state.cancelled_orders.contains_key(&id) {
                if let Some(mut order) = self.entity.state.open_orders.remove(&id) {
                    order.mark_fulfilled(now);
                    self.emit_order_event(event_types::LIMIT_ORDER_FULFILLED, &order);
                    self.entity
                        .state
                        .closed_orders
                        .insert(order.id.clone(), order);
                }
            }
        }

        // 2) 远端有、本地没有的订单
        let mut deliberately_cancelled = 0usize;
        let local_open: HashSet<String> =
            self.entity.state.open_orders.keys().cloned().collect();
        for remote_order in &remote {
            if local_open.contains(&remote_order.id) {
                continue;
            }
            if let Some(mut restored) =
                self.entity.state.closed_orders.remove(&remote_order.id)
            {
                // 之前误判为成交的订单回到挂单列表
                restored.status = OrderStatus::Open;
                restored.timestamp_closed = None;
                restored.adopt_remote(
                    OrderStatus::Open,
                    remote_order.filled,
                    remote_order.remaining,
                    remote_order.fee,
                );
                self.entity
                    .state
                    .open_orders
                    .insert(restored.id.clone(), restored);
            } else if self.entity.force_auto_cancel {
                match self.client.cancel_order(remote_order).await {
                    Ok(()) => deliberately_cancelled += 1,
                    Err(e) => warn!("强制撤销远端未知订单失败: {}: {}", remote_order.id, e),
                }
            } else {
                let mut adopted = remote_order.clone();
                adopted.sticky = None;
                self.entity
                    .state
                    .open_orders
                    .insert(adopted.id.clone(), adopted);
            }
        }

        // 3) 僵尸清理：缺少本地元数据的挂单一律远端撤销后丢弃
        let zombies: Vec<Order> = self
            .entity
            .state
            .open_orders
            .values()
            .filter(|o| in_scope(o) && o.sticky.is_none())
            .cloned()
            .collect();
        for zombie in zombies {
            match self.client.cancel_order(&zombie).await {
                Ok(()) => {
                    self.entity.state.open_orders.remove(&zombie.id);
                    deliberately_cancelled += 1;
                }
                Err(e) => warn!("僵尸订单撤销失败: {}: {}", zombie.id, e),
            }
        }

        // 4) 数量校验：本地挂单数必须与远端一致（扣除本轮主动撤销的）
        let local_count = self
            .entity
            .state
            .open_orders
            .values()
            .filter(|o| in_scope(o))
            .count();
        let expected = remote.len().saturating_sub(deliberately_cancelled);
        if local_count != expected {
            warn!(
                "订单对账数量不一致: market={:?} local={} remote={}",
                market, local_count, expected
            );
            let (open, closed, cancelled) = snapshot;
            self.entity.state.open_orders = open;
            self.entity.state.closed_orders = closed;
            self.entity.state.cancelled_orders = cancelled;
            return false;
        }

        self.entity
            .state
            .last_sync
            .insert(sync_kinds::ORDERS.to_string(), now);
        true
    }

    // ------------------------------------------------------------------
    // 模拟成交
    // ------------------------------------------------------------------

    /// 模拟盘限价单撮合：用最小周期的最新K线判断穿价
    pub(crate) async fn fulfill_limit_orders(&mut self, market: Option<&str>) {
        let candidates: Vec<Order> = self
            .entity
            .state
            .open_orders
            .values()
            .filter(|o| o.order_type == OrderType::Limit)
            .filter(|o| market.map(|m| o.market == m).unwrap_or(true))
            .cloned()
            .collect();
        if candidates.is_empty() {
            return;
        }

        let mut candle_cache: HashMap<String, Option<CandleItem>> = HashMap::new();
        for order in candidates {
            let candle = match candle_cache.get(&order.market) {
                Some(cached) => *cached,
                None => {
                    let fetched = match self
                        .client
                        .fetch_ohlcv(&order.market, Timeframe::smallest(), None, Some(1))
                        .await
                    {
                        Ok(Some(candles)) => candles.last().copied(),
                        Ok(None) => None,
                        Err(e) => {
                            warn!("模拟撮合取K线失败: {}: {}", order.market, e);
                            None
                        }
                    };
                    candle_cache.insert(order.market.clone(), fetched);
                    fetched
                }
            };
            let Some(candle) = candle else { continue };

            // 只用订单挂出之后、且有成交量的K线判断
            if order.timestamp >= candle.ts() || candle.volume() <= 0.0 {
                continue;
            }
            let crossed = match order.side {
                OrderSide::Buy => candle.low() < order.price,
                OrderSide::Sell => candle.high() > order.price,
            };
            if crossed {
                self.fill_simulated(&order.id);
            }
        }
    }

    /// 模拟成交记账
    fn fill_simulated(&mut self, order_id: &str) {
        let Some(mut order) = self.entity.state.open_orders.remove(order_id) else {
            return;
        };
        let base = order.base().to_string();
        let quote = order.quote().to_string();
        match order.side {
            OrderSide::Buy => {
                self.withdraw_from_used(&quote, order.amount * order.price);
                self.deposit(&base, order.amount * (1.0 - order.fee));
            }
            OrderSide::Sell => {
                self.withdraw_from_used(&base, order.amount);
                self.deposit(&quote, order.amount * order.price * (1.0 - order.fee));
            }
        }
        order.mark_fulfilled(now_mills());
        info!(
            "模拟成交: {} {} {}@{}",
            order.market,
            order.side.as_str(),
            order.amount,
            order.price
        );
        self.emit_order_event(event_types::LIMIT_ORDER_FULFILLED, &order);
        self.entity
            .state
            .closed_orders
            .insert(order.id.clone(), order);
    }

    // ------------------------------------------------------------------
    // 自动撤单
    // ------------------------------------------------------------------

    /// 撤销超龄、超成交比例或穿越价格水平的挂单
    pub(crate) async fn auto_cancel_orders(&mut self, market: Option<&str>) {
        let now = now_mills();
        let mut to_cancel: Vec<String> = Vec::new();

        for order in self
            .entity
            .state
            .open_orders
            .values()
            .filter(|o| market.map(|m| o.market == m).unwrap_or(true))
        {
            let expired = order
                .auto_cancel
                .map(|max_age| order.age(now) > max_age)
                .unwrap_or(false);
            let filled_enough = order.fill_ratio() >= order.auto_cancel_at_fill_percentage;
            let level_crossed = match (order.auto_cancel_at_price_level, self.ticker(&order.market))
            {
                (Some(level), Some(ticker)) => match order.side {
                    OrderSide::Buy => ticker.ask > level,
                    OrderSide::Sell => ticker.bid < level,
                },
                _ => false,
            };
            if expired || filled_enough || level_crossed {
                to_cancel.push(order.id.clone());
            }
        }

        for id in to_cancel {
            match self.cancel_order(&id).await {
                Ok(true) => {}
                Ok(false) => warn!("自动撤单未成功: {}", id),
                Err(e) => warn!("自动撤单失败: {}: {}", id, e),
            }
        }
    }

    // ------------------------------------------------------------------
    // sticky改价
    // ------------------------------------------------------------------

    /// 把sticky挂单维持在簿口：离开口价位时撤掉重挂
    pub(crate) async fn update_sticky_orders(&mut self, market: Option<&str>) {
        let sticky: Vec<Order> = self
            .entity
            .state
            .open_orders
            .values()
            .filter(|o| o.is_sticky())
            .filter(|o| market.map(|m| o.market == m).unwrap_or(true))
            .cloned()
            .collect();
        if sticky.is_empty() {
            return;
        }

        let markets: BTreeSet<String> = sticky.iter().map(|o| o.market.clone()).collect();
        for m in &markets {
            self.sync_order_book(std::slice::from_ref(m)).await;
        }

        for order in sticky {
            let Some(book) = self.entity.state.order_books.get(&order.market) else {
                continue;
            };
            // 自己独占簿口时退到第二档，避免和自己较劲
            let target = match order.side {
                OrderSide::Buy => {
                    let Some((best_price, best_amount)) = book.best_bid() else {
                        continue;
                    };
                    if order.remaining >= best_amount && order.price == best_price {
                        match book.second_best_bid() {
                            Some((price, _)) => price,
                            None => continue,
                        }
                    } else {
                        best_price
                    }
                }
                OrderSide::Sell => {
                    let Some((best_price, best_amount)) = book.best_ask() else {
                        continue;
                    };
                    if order.remaining >= best_amount && order.price == best_price {
                        match book.second_best_ask() {
                            Some((price, _)) => price,
                            None => continue,
                        }
                    } else {
                        best_price
                    }
                }
            };

            if target == order.price {
                continue;
            }

            let replaced = match self.cancel_order(&order.id).await {
                Ok(done) => done,
                Err(e) => {
                    warn!("sticky改价撤单失败: {}: {}", order.id, e);
                    false
                }
            };
            if !replaced {
                continue;
            }
            // 这是改价不是取消，不留取消记录
            self.entity.state.cancelled_orders.remove(&order.id);

            let now = now_mills();
            let remaining_budget = order.auto_cancel.map(|max_age| max_age - order.age(now));
            let budget_ok = remaining_budget.map(|b| b > 0).unwrap_or(true);
            let min_deal = self.entity.min_deal_amount(&order.market);
            if order.remaining > 0.0 && order.remaining >= min_deal && budget_ok {
                let mut options = CreateOrderOptions::limit(
                    &order.market,
                    order.side,
                    order.remaining,
                    target,
                )
                .sticky(true)
                .auto_cancel_at_fill_percentage(order.auto_cancel_at_fill_percentage);
                options.auto_cancel = remaining_budget;
                options.auto_cancel_at_price_level = order.auto_cancel_at_price_level;
                if let Err(e) = self.create_order(options).await {
                    warn!("sticky改价重挂失败: {}: {}", order.market, e);
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // 清理
    // ------------------------------------------------------------------

    /// 删除超过保留期的已关闭/已取消订单
    pub(crate) fn purge_order_list(&mut self, market: Option<&str>) {
        let cutoff = now_mills() - ORDER_RETENTION_MS;
        let retain = |order: &Order| {
            if let Some(m) = market {
                if order.market != m {
                    return true;
                }
            }
            order.timestamp_closed.unwrap_or(order.timestamp) > cutoff
        };
        self.entity.state.closed_orders.retain(|_, o| retain(o));
        self.entity.state.cancelled_orders.retain(|_, o| retain(o));
    }

    // ------------------------------------------------------------------
    // 快照同步（深合并：远端为准，本地独有的键保留）
    // ------------------------------------------------------------------

    pub async fn sync_balance(&mut self) -> bool {
        match self.client.fetch_balance().await {
            Ok(remote) => {
                for (currency, snapshot) in remote {
                    let locked = self.entity.reserve_of(&currency);
                    self.entity
                        .state
                        .balances
                        .entry(currency)
                        .and_modify(|b| b.merge_remote(snapshot.free, snapshot.used))
                        .or_insert_with(|| Balance::new(snapshot.free, snapshot.used, locked));
                }
                self.entity
                    .state
                    .last_sync
                    .insert(sync_kinds::BALANCE.to_string(), now_mills());
                true
            }
            Err(e) => {
                warn!("余额同步失败: {}", e);
                false
            }
        }
    }

    pub async fn sync_tickers(&mut self, markets: Option<&[String]>) -> bool {
        match self.client.fetch_tickers(markets).await {
            Ok(remote) => {
                for (market, ticker) in remote {
                    self.entity.state.tickers.insert(market, ticker);
                }
                self.entity
                    .state
                    .last_sync
                    .insert(sync_kinds::TICKERS.to_string(), now_mills());
                true
            }
            Err(e) => {
                warn!("行情同步失败: {}", e);
                false
            }
        }
    }

    pub async fn sync_order_book(&mut self, markets: &[String]) -> bool {
        match self.client.fetch_order_book(markets, None).await {
            Ok(remote) => {
                for (market, book) in remote {
                    self.entity.state.order_books.insert(market, book);
                }
                self.entity
                    .state
                    .last_sync
                    .insert(sync_kinds::ORDER_BOOK.to_string(), now_mills());
                true
            }
            Err(e) => {
                warn!("订单簿同步失败: {}", e);
                false
            }
        }
    }

    pub async fn sync_trades(&mut self, markets: &[String], since: Option<i64>) -> bool {
        match self.client.fetch_trades(markets, since, None).await {
            Ok(remote) => {
                for (market, trades) in remote {
                    self.entity.state.recent_trades.insert(market, trades);
                }
                self.entity
                    .state
                    .last_sync
                    .insert(sync_kinds::TRADES.to_string(), now_mills());
                true
            }
            Err(e) => {
                warn!("成交记录同步失败: {}", e);
                false
            }
        }
    }

    /// 余额与行情超过max_sync_age时重新同步
    pub async fn ensure_fresh(&mut self, markets: &[String]) -> bool {
        let now = now_mills();
        let max_age = self.entity.max_sync_age;
        let stale = |kind: &str, state: &ExchangeMirror| {
            state
                .entity
                .state
                .last_sync
                .get(kind)
                .map(|ts| now - ts > max_age)
                .unwrap_or(true)
        };

        let mut ok = true;
        if stale(sync_kinds::BALANCE, self) {
            ok &= self.sync_balance().await;
        }
        if stale(sync_kinds::TICKERS, self) {
            ok &= self.sync_tickers(Some(markets)).await;
        }
        ok
    }

    /// 每24小时重载一次交易对元数据
    pub async fn refresh_markets_daily(&mut self) -> bool {
        let now = now_mills();
        let fresh = self
            .entity
            .state
            .last_sync
            .get(sync_kinds::MARKETS)
            .map(|ts| now - ts <= MARKETS_REFRESH_MS)
            .unwrap_or(false);
        if fresh {
            return true;
        }
        match self.client.load_markets().await {
            Ok(()) => {
                self.entity
                    .state
                    .last_sync
                    .insert(sync_kinds::MARKETS.to_string(), now);
                true
            }
            Err(e) => {
                warn!("交易对元数据刷新失败: {}", e);
                false
            }
        }
    }
}
