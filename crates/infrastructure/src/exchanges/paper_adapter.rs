//! 纸面交易所适配器
//!
//! 实现ExchangeClient端口的内存交易所：行情由外部喂入，
//! 订单只记录不撮合。模拟盘与测试都用它充当远端

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::debug;

use spot_maker_common::types::CandleItem;
use spot_maker_common::utils::now_mills;
use spot_maker_domain::entities::{Order, OrderBook, Ticker, Trade};
use spot_maker_domain::enums::Timeframe;
use spot_maker_domain::traits::{
    BalanceSnapshot, CreateOrderRequest, ExchangeClient, ExchangeClientError,
};

pub struct PaperExchangeClient {
    name: String,
    markets: DashMap<String, f64>,
    balances: DashMap<String, BalanceSnapshot>,
    tickers: DashMap<String, Ticker>,
    order_books: DashMap<String, OrderBook>,
    trades: DashMap<String, Vec<Trade>>,
    candles: DashMap<(String, Timeframe), Vec<CandleItem>>,
    open_orders: Mutex<Vec<Order>>,
    /// 模拟限流：开启后fetch_ohlcv走fail-soft路径
    rate_limited: AtomicBool,
    /// 模拟下单/撤单失败
    fail_mutations: AtomicBool,
    next_order_id: AtomicU64,
}

impl PaperExchangeClient {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            markets: DashMap::new(),
            balances: DashMap::new(),
            tickers: DashMap::new(),
            order_books: DashMap::new(),
            trades: DashMap::new(),
            candles: DashMap::new(),
            open_orders: Mutex::new(Vec::new()),
            rate_limited: AtomicBool::new(false),
            fail_mutations: AtomicBool::new(false),
            next_order_id: AtomicU64::new(1),
        }
    }

    // ---- 行情喂入 ----

    pub fn add_market(&self, market: &str, min_deal_amount: f64) {
        self.markets.insert(market.to_string(), min_deal_amount);
    }

    pub fn set_balance(&self, currency: &str, free: f64, used: f64) {
        self.balances
            .insert(currency.to_string(), BalanceSnapshot { free, used });
    }

    pub fn set_ticker(&self, market: &str, ticker: Ticker) {
        self.tickers.insert(market.to_string(), ticker);
    }

    pub fn set_order_book(&self, market: &str, book: OrderBook) {
        self.order_books.insert(market.to_string(), book);
    }

    pub fn set_trades(&self, market: &str, trades: Vec<Trade>) {
        self.trades.insert(market.to_string(), trades);
    }

    pub fn set_candles(&self, market: &str, timeframe: Timeframe, candles: Vec<CandleItem>) {
        self.candles
            .insert((market.to_string(), timeframe), candles);
    }

    pub async fn set_open_orders(&self, orders: Vec<Order>) {
        *self.open_orders.lock().await = orders;
    }

    pub fn set_rate_limited(&self, limited: bool) {
        self.rate_limited.store(limited, Ordering::SeqCst);
    }

    pub fn set_fail_mutations(&self, fail: bool) {
        self.fail_mutations.store(fail, Ordering::SeqCst);
    }

    pub async fn open_order_count(&self) -> usize {
        self.open_orders.lock().await.len()
    }
}

#[async_trait]
impl ExchangeClient for PaperExchangeClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load_markets(&self) -> Result<(), ExchangeClientError> {
        debug!("paper: load_markets ({}个)", self.markets.len());
        Ok(())
    }

    async fn get_markets(&self, fiat: Option<&str>) -> Result<Vec<String>, ExchangeClientError> {
        let mut markets: Vec<String> = self
            .markets
            .iter()
            .map(|m| m.key().clone())
            .filter(|m| match fiat {
                Some(f) => m.ends_with(&format!("/{}", f)),
                None => true,
            })
            .collect();
        markets.sort();
        Ok(markets)
    }

    async fn get_min_deal_amount(&self, market: &str) -> Result<f64, ExchangeClientError> {
        self.markets
            .get(market)
            .map(|m| *m)
            .ok_or_else(|| ExchangeClientError::MarketUnknown(market.to_string()))
    }

    async fn fetch_balance(
        &self,
    ) -> Result<HashMap<String, BalanceSnapshot>, ExchangeClientError> {
        Ok(self
            .balances
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect())
    }

    async fn fetch_tickers(
        &self,
        markets: Option<&[String]>,
    ) -> Result<HashMap<String, Ticker>, ExchangeClientError> {
        Ok(self
            .tickers
            .iter()
            .filter(|e| match markets {
                Some(ms) => ms.contains(e.key()),
                None => true,
            })
            .map(|e| (e.key().clone(), *e.value()))
            .collect())
    }

    async fn fetch_order_book(
        &self,
        markets: &[String],
        _depth: Option<usize>,
    ) -> Result<HashMap<String, OrderBook>, ExchangeClientError> {
        Ok(markets
            .iter()
            .filter_map(|m| self.order_books.get(m).map(|b| (m.clone(), b.clone())))
            .collect())
    }

    async fn fetch_trades(
        &self,
        markets: &[String],
        since: Option<i64>,
        limit: Option<usize>,
    ) -> Result<HashMap<String, Vec<Trade>>, ExchangeClientError> {
        let mut result = HashMap::new();
        for market in markets {
            if let Some(trades) = self.trades.get(market) {
                let mut filtered: Vec<Trade> = trades
                    .iter()
                    .filter(|t| since.map(|s| t.timestamp >= s).unwrap_or(true))
                    .copied()
                    .collect();
                if let Some(limit) = limit {
                    let start = filtered.len().saturating_sub(limit);
                    filtered.drain(..start);
                }
                result.insert(market.clone(), filtered);
            }
        }
        Ok(result)
    }

    async fn fetch_open_orders(
        &self,
        market: Option<&str>,
    ) -> Result<Vec<Order>, ExchangeClientError> {
        Ok(self
            .open_orders
            .lock()
            .await
            .iter()
            .filter(|o| market.map(|m| o.market == m).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn fetch_ohlcv(
        &self,
        market: &str,
        timeframe: Timeframe,
        since: Option<i64>,
        limit: Option<usize>,
    ) -> Result<Option<Vec<CandleItem>>, ExchangeClientError> {
        // fail-soft契约：限流与未知交易对返回None而不是错误
        if self.rate_limited.load(Ordering::SeqCst) {
            return Ok(None);
        }
        let key = (market.to_string(), timeframe);
        match self.candles.get(&key) {
            Some(candles) => {
                let mut result: Vec<CandleItem> = candles
                    .iter()
                    .filter(|c| since.map(|s| c.ts() >= s).unwrap_or(true))
                    .copied()
                    .collect();
                if let Some(limit) = limit {
                    let start = result.len().saturating_sub(limit);
                    result.drain(..start);
                }
                Ok(Some(result))
            }
            None => Ok(None),
        }
    }

    async fn create_order(&self, req: &CreateOrderRequest) -> Result<String, ExchangeClientError> {
        if self.fail_mutations.load(Ordering::SeqCst) {
            return Err(ExchangeClientError::Network("paper: 下单失败".to_string()));
        }
        let id = format!("paper-{}", self.next_order_id.fetch_add(1, Ordering::SeqCst));
        let price = req.price.unwrap_or(0.0);
        if let Ok(mut order) = Order::new(
            id.clone(),
            now_mills(),
            req.market.clone(),
            req.order_type,
            req.side,
            price.max(f64::MIN_POSITIVE),
            req.amount,
            0.0,
        ) {
            order.sticky = None;
            self.open_orders.lock().await.push(order);
        }
        debug!("paper: 下单 {} {:?} {}", req.market, req.side, id);
        Ok(id)
    }

    async fn cancel_order(&self, order: &Order) -> Result<(), ExchangeClientError> {
        if self.fail_mutations.load(Ordering::SeqCst) {
            return Err(ExchangeClientError::Network("paper: 撤单失败".to_string()));
        }
        self.open_orders.lock().await.retain(|o| o.id != order.id);
        debug!("paper: 撤单 {}", order.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticker(bid: f64, ask: f64) -> Ticker {
        Ticker {
            timestamp: 0,
            bid,
            ask,
            last: (bid + ask) / 2.0,
            base_volume: 100.0,
            quote_volume: 1000.0,
        }
    }

    #[tokio::test]
    async fn test_markets_filtered_by_fiat() {
        let client = PaperExchangeClient::new("paper");
        client.add_market("BTC/ETH", 0.01);
        client.add_market("XMR/ETH", 0.1);
        client.add_market("BTC/USDT", 0.01);

        let eth_markets = client.get_markets(Some("ETH")).await.unwrap();
        assert_eq!(eth_markets, vec!["BTC/ETH", "XMR/ETH"]);
        assert_eq!(client.get_markets(None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_min_deal_amount_unknown_market() {
        let client = PaperExchangeClient::new("paper");
        let err = client.get_min_deal_amount("NOPE/ETH").await.unwrap_err();
        assert!(matches!(err, ExchangeClientError::MarketUnknown(_)));
    }

    #[tokio::test]
    async fn test_ohlcv_fail_soft_on_rate_limit() {
        let client = PaperExchangeClient::new("paper");
        client.set_rate_limited(true);
        let result = client
            .fetch_ohlcv("BTC/ETH", Timeframe::M1, None, None)
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_create_and_cancel_order_round_trip() {
        let client = PaperExchangeClient::new("paper");
        client.set_ticker("BTC/ETH", ticker(30.0, 30.1));
        let req = CreateOrderRequest {
            market: "BTC/ETH".to_string(),
            order_type: spot_maker_domain::enums::OrderType::Limit,
            side: spot_maker_domain::enums::OrderSide::Buy,
            amount: 1.0,
            price: Some(30.0),
            params: serde_json::Value::Null,
        };
        let id = client.create_order(&req).await.unwrap();
        assert!(id.starts_with("paper-"));
        assert_eq!(client.open_order_count().await, 1);

        let open = client.fetch_open_orders(Some("BTC/ETH")).await.unwrap();
        client.cancel_order(&open[0]).await.unwrap();
        assert_eq!(client.open_order_count().await, 0);
    }
}
