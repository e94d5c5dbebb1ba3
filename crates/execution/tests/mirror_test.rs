//! 镜像集成测试：以纸面交易所为远端验证订单生命周期与余额记账

use std::sync::Arc;

use float_cmp::approx_eq;

use spot_maker_common::types::CandleItem;
use spot_maker_common::utils::now_mills;
use spot_maker_common::EngineError;
use spot_maker_domain::entities::{Balance, ExchangeEntity, Order, OrderBook, Ticker};
use spot_maker_domain::enums::{OrderSide, OrderStatus, OrderType, Timeframe};
use spot_maker_execution::{CreateOrderOptions, ExchangeMirror};
use spot_maker_infrastructure::PaperExchangeClient;

const MARKET: &str = "BTC/ETH";

fn ticker(bid: f64, ask: f64) -> Ticker {
    Ticker {
        timestamp: now_mills(),
        bid,
        ask,
        last: (bid + ask) / 2.0,
        base_volume: 100.0,
        quote_volume: 1_000.0,
    }
}

fn sim_entity() -> ExchangeEntity {
    let mut entity = ExchangeEntity::new("ex1", "paper", "ETH", 0.001, true);
    entity
        .state
        .tickers
        .insert(MARKET.to_string(), ticker(100.0, 101.0));
    entity
}

fn sim_mirror_with_quote(quote_free: f64) -> (ExchangeMirror, Arc<PaperExchangeClient>) {
    let client = Arc::new(PaperExchangeClient::new("paper"));
    let mut entity = sim_entity();
    entity
        .state
        .balances
        .insert("ETH".to_string(), Balance::new(quote_free, 0.0, 0.0));
    (ExchangeMirror::new(entity, client.clone()), client)
}

fn limit_buy(amount: f64, price: f64) -> CreateOrderOptions {
    CreateOrderOptions::limit(MARKET, OrderSide::Buy, amount, price)
}

// ---------------------------------------------------------------------------
// S1 + P1：限价单创建/取消的余额守恒
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_limit_buy_reserves_quote_and_cancel_releases() {
    let (mut mirror, _client) = sim_mirror_with_quote(200.0);

    let order = mirror
        .create_order(limit_buy(1.0, 100.0))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.amount, 1.0);
    assert_eq!(order.price, 100.0);
    assert_eq!(mirror.open_order_count(MARKET), 1);

    let quote = mirror.balance("ETH");
    assert!(approx_eq!(f64, quote.free(), 100.0, epsilon = 1e-9));
    assert!(approx_eq!(f64, quote.used(), 100.0, epsilon = 1e-9));

    assert!(mirror.cancel_order(&order.id).await.unwrap());
    let quote = mirror.balance("ETH");
    assert!(approx_eq!(f64, quote.free(), 200.0, epsilon = 1e-9));
    assert!(approx_eq!(f64, quote.used(), 0.0, epsilon = 1e-9));

    // 订单集划分：取消后只存在于cancelled（无成交不进closed）
    let entity = mirror.entity();
    assert!(entity.state.cancelled_orders.contains_key(&order.id));
    assert!(!entity.state.closed_orders.contains_key(&order.id));
    assert!(!entity.state.open_orders.contains_key(&order.id));
}

#[tokio::test]
async fn test_balance_conservation_over_create_cancel_sequence() {
    let (mut mirror, _client) = sim_mirror_with_quote(500.0);

    for _ in 0..4 {
        let order = mirror
            .create_order(limit_buy(1.0, 100.0))
            .await
            .unwrap()
            .unwrap();
        let quote = mirror.balance("ETH");
        assert!(approx_eq!(
            f64,
            quote.raw_free() + quote.used(),
            500.0,
            epsilon = 1e-9
        ));
        mirror.cancel_order(&order.id).await.unwrap();
        let quote = mirror.balance("ETH");
        assert!(approx_eq!(
            f64,
            quote.raw_free() + quote.used(),
            500.0,
            epsilon = 1e-9
        ));
    }
}

#[tokio::test]
async fn test_buy_amount_capped_by_quote_budget() {
    let (mut mirror, _client) = sim_mirror_with_quote(150.0);
    let order = mirror
        .create_order(limit_buy(10.0, 100.0))
        .await
        .unwrap()
        .unwrap();
    // 只有150的计价币预算：1.5个
    assert!(approx_eq!(f64, order.amount, 1.5, epsilon = 1e-9));
    let quote = mirror.balance("ETH");
    assert!(approx_eq!(f64, quote.free(), 0.0, epsilon = 1e-9));
    assert!(approx_eq!(f64, quote.used(), 150.0, epsilon = 1e-9));
}

#[tokio::test]
async fn test_reserves_are_not_spendable() {
    let client = Arc::new(PaperExchangeClient::new("paper"));
    let mut entity = sim_entity();
    entity.reserves.insert("ETH".to_string(), 120.0);
    entity
        .state
        .balances
        .insert("ETH".to_string(), Balance::new(200.0, 0.0, 120.0));
    let mut mirror = ExchangeMirror::new(entity, client);

    let order = mirror
        .create_order(limit_buy(2.0, 100.0))
        .await
        .unwrap()
        .unwrap();
    // 保留120，只有80可花
    assert!(approx_eq!(f64, order.amount, 0.8, epsilon = 1e-9));

    // 全部被保留时直接拒绝
    let mut entity = sim_entity();
    entity.reserves.insert("ETH".to_string(), 100.0);
    entity
        .state
        .balances
        .insert("ETH".to_string(), Balance::new(100.0, 0.0, 100.0));
    let client = Arc::new(PaperExchangeClient::new("paper"));
    let mut mirror = ExchangeMirror::new(entity, client);
    let err = mirror.create_order(limit_buy(1.0, 100.0)).await.unwrap_err();
    assert!(matches!(err, EngineError::ReservationViolation { .. }));
}

// ---------------------------------------------------------------------------
// 市价单：滑点与手续费
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_market_buy_applies_fee_and_slippage() {
    let (mut mirror, _client) = sim_mirror_with_quote(1_000.0);
    let order = mirror
        .create_order(CreateOrderOptions::market(MARKET, OrderSide::Buy, 2.0))
        .await
        .unwrap()
        .unwrap();

    // 市价买单按ask成交
    assert_eq!(order.price, 101.0);
    assert_eq!(order.status, OrderStatus::Closed);
    let base = mirror.balance("BTC");
    let expected = 2.0 * (1.0 - 0.001) * (1.0 - 0.01);
    assert!(approx_eq!(f64, base.free(), expected, epsilon = 1e-9));
    let quote = mirror.balance("ETH");
    assert!(approx_eq!(f64, quote.free(), 1_000.0 - 202.0, epsilon = 1e-9));
    // 市价单直接进closed
    assert!(mirror.entity().state.closed_orders.contains_key(&order.id));
}

// ---------------------------------------------------------------------------
// S2：模拟成交
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_simulated_fulfillment_on_crossing_candle() {
    let (mut mirror, client) = sim_mirror_with_quote(200.0);
    let order = mirror
        .create_order(limit_buy(1.0, 100.0))
        .await
        .unwrap()
        .unwrap();

    // 下一根K线下探到99，低于挂单价
    let candle =
        CandleItem::new(now_mills() + 60_000, 100.0, 101.0, 99.0, 100.0, 10.0).unwrap();
    client.set_candles(MARKET, Timeframe::M1, vec![candle]);

    assert!(mirror.update(Some(MARKET)).await);

    let entity = mirror.entity();
    let closed = entity.state.closed_orders.get(&order.id).unwrap();
    assert_eq!(closed.status, OrderStatus::Closed);
    assert_eq!(closed.filled, 1.0);
    assert_eq!(closed.remaining, 0.0);
    assert!(closed.timestamp_closed.is_some());

    let base = mirror.balance("BTC");
    assert!(approx_eq!(f64, base.free(), 1.0 * (1.0 - 0.001), epsilon = 1e-9));
    let quote = mirror.balance("ETH");
    assert!(approx_eq!(f64, quote.used(), 0.0, epsilon = 1e-9));
}

#[tokio::test]
async fn test_no_fill_when_candle_does_not_cross() {
    let (mut mirror, client) = sim_mirror_with_quote(200.0);
    mirror.create_order(limit_buy(1.0, 100.0)).await.unwrap();

    // 低点100.5未穿过100
    let candle =
        CandleItem::new(now_mills() + 60_000, 101.0, 102.0, 100.5, 101.0, 10.0).unwrap();
    client.set_candles(MARKET, Timeframe::M1, vec![candle]);

    mirror.update(Some(MARKET)).await;
    assert_eq!(mirror.open_order_count(MARKET), 1);
}

// ---------------------------------------------------------------------------
// S4：自动撤单
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_auto_cancel_by_age() {
    let client = Arc::new(PaperExchangeClient::new("paper"));
    let mut entity = sim_entity();
    entity
        .state
        .balances
        .insert("ETH".to_string(), Balance::new(100.0, 100.0, 0.0));

    // 61秒前挂出、存活期60秒的订单
    let mut order = Order::new(
        "aged0000order000".to_string(),
        now_mills() - 61_000,
        MARKET.to_string(),
        OrderType::Limit,
        OrderSide::Buy,
        100.0,
        1.0,
        0.001,
    )
    .unwrap();
    order.auto_cancel = Some(60_000);
    entity.state.open_orders.insert(order.id.clone(), order);

    let mut mirror = ExchangeMirror::new(entity, client);
    assert!(mirror.update(Some(MARKET)).await);

    assert_eq!(mirror.open_order_count(MARKET), 0);
    assert!(mirror
        .entity()
        .state
        .cancelled_orders
        .contains_key("aged0000order000"));
    let quote = mirror.balance("ETH");
    assert!(approx_eq!(f64, quote.free(), 200.0, epsilon = 1e-9));
}

#[tokio::test]
async fn test_auto_cancel_by_price_level() {
    let (mut mirror, _client) = sim_mirror_with_quote(200.0);
    let order = mirror
        .create_order(limit_buy(1.0, 100.0).auto_cancel_at_price_level(100.5))
        .await
        .unwrap()
        .unwrap();

    // 最优卖价升破价格水平 → 买单撤销
    mirror.update(Some(MARKET)).await;
    assert!(mirror
        .entity()
        .state
        .cancelled_orders
        .contains_key(&order.id));
}

#[tokio::test]
async fn test_force_auto_cancel_rejects_order_without_budget() {
    let client = Arc::new(PaperExchangeClient::new("paper"));
    let mut entity = sim_entity();
    entity.force_auto_cancel = true;
    entity
        .state
        .balances
        .insert("ETH".to_string(), Balance::new(200.0, 0.0, 0.0));
    let mut mirror = ExchangeMirror::new(entity, client);

    let err = mirror.create_order(limit_buy(1.0, 100.0)).await.unwrap_err();
    assert!(matches!(err, EngineError::Input(_)));

    let ok = mirror
        .create_order(limit_buy(1.0, 100.0).auto_cancel(60_000))
        .await
        .unwrap();
    assert!(ok.is_some());
}

// ---------------------------------------------------------------------------
// S3 + P4：sticky改价与收敛
// ---------------------------------------------------------------------------

fn sell_mirror_with_base(base_free: f64) -> (ExchangeMirror, Arc<PaperExchangeClient>) {
    let client = Arc::new(PaperExchangeClient::new("paper"));
    let mut entity = sim_entity();
    entity
        .state
        .balances
        .insert("BTC".to_string(), Balance::new(base_free, 0.0, 0.0));
    (ExchangeMirror::new(entity, client.clone()), client)
}

#[tokio::test]
async fn test_sticky_sell_steps_back_when_alone_at_best() {
    let (mut mirror, client) = sell_mirror_with_base(1.0);
    let order = mirror
        .create_order(
            CreateOrderOptions::limit(MARKET, OrderSide::Sell, 1.0, 50.0).sticky(true),
        )
        .await
        .unwrap()
        .unwrap();

    // 簿口: 我们独占50，其他人在51
    client.set_order_book(
        MARKET,
        OrderBook {
            bids: vec![],
            asks: vec![(50.0, 1.0), (51.0, 5.0)],
        },
    );
    mirror.update(Some(MARKET)).await;

    let open = mirror.open_orders_for(MARKET);
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].price, 51.0);
    assert_ne!(open[0].id, order.id);
    // 改价不留取消记录
    assert!(!mirror.entity().state.cancelled_orders.contains_key(&order.id));

    // 行情变化：49出现更优卖价 → 跟到49
    client.set_order_book(
        MARKET,
        OrderBook {
            bids: vec![],
            asks: vec![(49.0, 2.0), (51.0, 5.0)],
        },
    );
    mirror.update(Some(MARKET)).await;
    let open = mirror.open_orders_for(MARKET);
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].price, 49.0);
}

#[tokio::test]
async fn test_sticky_converges_on_unchanged_book() {
    let (mut mirror, client) = sell_mirror_with_base(1.0);
    mirror
        .create_order(
            CreateOrderOptions::limit(MARKET, OrderSide::Sell, 1.0, 50.0).sticky(true),
        )
        .await
        .unwrap();

    // 50档还有别人(数量3>我们的1)：我们不是独占，目标=最优价=挂单价
    client.set_order_book(
        MARKET,
        OrderBook {
            bids: vec![],
            asks: vec![(50.0, 3.0), (51.0, 5.0)],
        },
    );

    mirror.update(Some(MARKET)).await;
    let first = mirror.open_orders_for(MARKET);
    mirror.update(Some(MARKET)).await;
    let second = mirror.open_orders_for(MARKET);

    // 簿口不变时重放是幂等的
    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
    assert_eq!(first[0].id, second[0].id);
    assert_eq!(first[0].price, second[0].price);
}

// ---------------------------------------------------------------------------
// P3：过期清理
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_purge_drops_orders_older_than_retention() {
    let client = Arc::new(PaperExchangeClient::new("paper"));
    let mut entity = sim_entity();

    let mut old_order = Order::new(
        "old0000000000000".to_string(),
        now_mills() - 8 * 86_400_000,
        MARKET.to_string(),
        OrderType::Limit,
        OrderSide::Buy,
        100.0,
        1.0,
        0.0,
    )
    .unwrap();
    old_order.mark_fulfilled(now_mills() - 8 * 86_400_000);
    entity
        .state
        .closed_orders
        .insert(old_order.id.clone(), old_order);

    let mut fresh_order = Order::new(
        "new0000000000000".to_string(),
        now_mills() - 3_600_000,
        MARKET.to_string(),
        OrderType::Limit,
        OrderSide::Buy,
        100.0,
        1.0,
        0.0,
    )
    .unwrap();
    fresh_order.mark_fulfilled(now_mills() - 3_600_000);
    entity
        .state
        .closed_orders
        .insert(fresh_order.id.clone(), fresh_order);

    let mut mirror = ExchangeMirror::new(entity, client);
    mirror.update(Some(MARKET)).await;

    let entity = mirror.entity();
    assert!(!entity.state.closed_orders.contains_key("old0000000000000"));
    assert!(entity.state.closed_orders.contains_key("new0000000000000"));
}

// ---------------------------------------------------------------------------
// 实盘对账：P8 幂等、僵尸清理、数量校验
// ---------------------------------------------------------------------------

fn live_mirror() -> (ExchangeMirror, Arc<PaperExchangeClient>) {
    let client = Arc::new(PaperExchangeClient::new("paper"));
    let mut entity = ExchangeEntity::new("ex1", "paper", "ETH", 0.001, false);
    entity
        .state
        .tickers
        .insert(MARKET.to_string(), ticker(100.0, 101.0));
    entity
        .state
        .balances
        .insert("ETH".to_string(), Balance::new(1_000.0, 0.0, 0.0));
    (ExchangeMirror::new(entity, client.clone()), client)
}

#[tokio::test]
async fn test_live_reconciliation_is_idempotent() {
    let (mut mirror, _client) = live_mirror();
    let order = mirror
        .create_order(limit_buy(1.0, 100.0))
        .await
        .unwrap()
        .unwrap();
    assert!(order.id.starts_with("paper-"));

    assert!(mirror.update(Some(MARKET)).await);
    let after_first = mirror.open_orders_for(MARKET);
    assert!(mirror.update(Some(MARKET)).await);
    let after_second = mirror.open_orders_for(MARKET);

    assert_eq!(after_first.len(), 1);
    assert_eq!(after_second.len(), 1);
    assert_eq!(after_first[0].id, after_second[0].id);
    assert_eq!(after_first[0].price, after_second[0].price);
}

#[tokio::test]
async fn test_vanished_remote_order_assumed_fulfilled() {
    let (mut mirror, client) = live_mirror();
    let order = mirror
        .create_order(limit_buy(1.0, 100.0))
        .await
        .unwrap()
        .unwrap();

    // 远端订单消失且本地未取消 → 视为成交
    client.set_open_orders(vec![]).await;
    assert!(mirror.update(Some(MARKET)).await);

    let closed = mirror.entity().state.closed_orders.get(&order.id).unwrap();
    assert_eq!(closed.filled, closed.amount);
    assert_eq!(closed.remaining, 0.0);
}

#[tokio::test]
async fn test_unknown_remote_order_is_zombie_cancelled() {
    let (mut mirror, client) = live_mirror();

    let stray = Order::new(
        "stray00000000000".to_string(),
        now_mills(),
        MARKET.to_string(),
        OrderType::Limit,
        OrderSide::Buy,
        90.0,
        1.0,
        0.0,
    )
    .unwrap();
    client.set_open_orders(vec![stray]).await;

    assert!(mirror.update(Some(MARKET)).await);
    // 僵尸订单被远端撤销且不留在本地
    assert_eq!(mirror.open_order_count(MARKET), 0);
    assert_eq!(client.open_order_count().await, 0);
}

#[tokio::test]
async fn test_lockdown_blocks_mutations() {
    let (mut mirror, _client) = sim_mirror_with_quote(200.0);
    mirror.set_lockdown(true);

    assert!(matches!(
        mirror.create_order(limit_buy(1.0, 100.0)).await,
        Err(EngineError::Lockdown)
    ));
    assert!(matches!(
        mirror.cancel_all_orders(None, None).await,
        Err(EngineError::Lockdown)
    ));
    assert!(!mirror.update(Some(MARKET)).await);
}

// ---------------------------------------------------------------------------
// 估值
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_total_balance_valuation() {
    let client = Arc::new(PaperExchangeClient::new("paper"));
    let mut entity = sim_entity();
    entity
        .state
        .balances
        .insert("ETH".to_string(), Balance::new(10.0, 0.0, 0.0));
    entity
        .state
        .balances
        .insert("BTC".to_string(), Balance::new(2.0, 0.0, 0.0));
    // BTC/ETH bid=100
    let mirror = ExchangeMirror::new(entity, client);

    let total = mirror.get_total_balance(false, None, false).unwrap();
    assert!(approx_eq!(f64, total, 10.0 + 2.0 * 100.0, epsilon = 1e-9));
}

#[tokio::test]
async fn test_partial_fill_cancel_recorded_in_both_lists() {
    let client = Arc::new(PaperExchangeClient::new("paper"));
    let mut entity = sim_entity();
    entity
        .state
        .balances
        .insert("ETH".to_string(), Balance::new(100.0, 100.0, 0.0));

    // 远端已部分成交的挂单
    let mut order = Order::new(
        "partial000000000".to_string(),
        now_mills(),
        MARKET.to_string(),
        OrderType::Limit,
        OrderSide::Buy,
        100.0,
        1.0,
        0.001,
    )
    .unwrap();
    order.filled = 0.4;
    order.remaining = 0.6;
    entity.state.open_orders.insert(order.id.clone(), order);

    let mut mirror = ExchangeMirror::new(entity, client);
    assert!(mirror.cancel_order("partial000000000").await.unwrap());

    // 带部分成交的取消同时进入cancelled与closed
    let entity = mirror.entity();
    assert!(entity.state.cancelled_orders.contains_key("partial000000000"));
    assert!(entity.state.closed_orders.contains_key("partial000000000"));
    assert!(!entity.state.open_orders.contains_key("partial000000000"));
}

#[tokio::test]
async fn test_total_balance_uses_reverse_market() {
    let client = Arc::new(PaperExchangeClient::new("paper"));
    let mut entity = ExchangeEntity::new("ex1", "paper", "ETH", 0.001, true);
    // 只有 ETH/USDT 方向的行情：USDT余额按 1/ask 折算
    entity.state.tickers.insert(
        "ETH/USDT".to_string(),
        ticker(2_000.0, 2_000.0 + 1.0),
    );
    entity
        .state
        .balances
        .insert("USDT".to_string(), Balance::new(4_002.0, 0.0, 0.0));
    let mirror = ExchangeMirror::new(entity, client);

    let total = mirror.get_total_balance(false, None, false).unwrap();
    assert!(approx_eq!(f64, total, 4_002.0 / 2_001.0, epsilon = 1e-9));
}

#[tokio::test]
async fn test_total_balance_missing_ticker() {
    let client = Arc::new(PaperExchangeClient::new("paper"));
    let mut entity = sim_entity();
    entity
        .state
        .balances
        .insert("XMR".to_string(), Balance::new(5.0, 0.0, 0.0));
    let mirror = ExchangeMirror::new(entity, client);

    assert!(mirror.get_total_balance(false, None, false).is_none());
    // ignore_missing时跳过无法估值的币种
    let total = mirror.get_total_balance(false, None, true).unwrap();
    assert!(approx_eq!(f64, total, 0.0, epsilon = 1e-9));
}

#[tokio::test]
async fn test_cancel_all_orders_with_side_filter() {
    let client = Arc::new(PaperExchangeClient::new("paper"));
    let mut entity = sim_entity();
    entity
        .state
        .balances
        .insert("ETH".to_string(), Balance::new(500.0, 0.0, 0.0));
    entity
        .state
        .balances
        .insert("BTC".to_string(), Balance::new(5.0, 0.0, 0.0));
    let mut mirror = ExchangeMirror::new(entity, client);

    mirror.create_order(limit_buy(1.0, 100.0)).await.unwrap();
    mirror.create_order(limit_buy(1.0, 99.0)).await.unwrap();
    mirror
        .create_order(CreateOrderOptions::limit(MARKET, OrderSide::Sell, 1.0, 110.0))
        .await
        .unwrap();

    let cancelled = mirror
        .cancel_all_orders(Some(MARKET), Some(OrderSide::Buy))
        .await
        .unwrap();
    assert_eq!(cancelled, 2);
    let remaining = mirror.open_orders_for(MARKET);
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].side, OrderSide::Sell);
}
