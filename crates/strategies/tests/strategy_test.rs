//! 策略集成测试：入场门控、离场触发与双边做市

use std::sync::Arc;

use spot_maker_common::types::CandleItem;
use spot_maker_common::utils::now_mills;
use spot_maker_domain::entities::{Balance, ExchangeEntity, MarketState, Order, Ticker};
use spot_maker_domain::enums::{AgentState, OrderSide, OrderType};
use spot_maker_execution::ExchangeMirror;
use spot_maker_infrastructure::PaperExchangeClient;
use spot_maker_strategies::context::MarketTick;
use spot_maker_strategies::entry::{entry_possible, run_entry};
use spot_maker_strategies::exit::run_exit;
use spot_maker_strategies::market_maker::run_market_maker;
use spot_maker_strategies::StrategyOptions;

const MARKET: &str = "BTC/ETH";

fn ticker(bid: f64, ask: f64) -> Ticker {
    Ticker {
        timestamp: now_mills(),
        bid,
        ask,
        last: (bid + ask) / 2.0,
        base_volume: 1_000.0,
        quote_volume: 100_000.0,
    }
}

fn candle(o: f64, h: f64, l: f64, c: f64, v: f64, ts: i64) -> CandleItem {
    CandleItem::new(ts, o, h, l, c, v).unwrap()
}

/// 每日上涨2%、带小幅波动的日线，满足收益率与量能门控
fn bullish_day_candles(n: usize) -> Vec<CandleItem> {
    (0..n)
        .map(|i| {
            let close = 100.0 * 1.02f64.powi(i as i32);
            let open = if i == 0 { 100.0 } else { close / 1.02 };
            candle(
                open,
                close * 1.005,
                open.min(close) * 0.995,
                close,
                50.0,
                i as i64 * 86_400_000,
            )
        })
        .collect()
}

/// 缓慢下行的小时线，使快EMA低于中EMA
fn declining_hour_candles(n: usize) -> Vec<CandleItem> {
    (0..n)
        .map(|i| {
            let close = 160.0 - 0.1 * i as f64;
            candle(close + 0.1, close + 0.2, close - 0.2, close, 10.0, i as i64 * 3_600_000)
        })
        .collect()
}

/// 水平盘整的小时线（做市测试用）
fn flat_hour_candles(n: usize, level: f64) -> Vec<CandleItem> {
    (0..n)
        .map(|i| {
            candle(
                level,
                level + 0.1,
                level - 0.1,
                level,
                10.0,
                i as i64 * 3_600_000,
            )
        })
        .collect()
}

fn sim_mirror(
    quote_free: f64,
    base_free: f64,
    tk: Ticker,
) -> (ExchangeMirror, Arc<PaperExchangeClient>) {
    let client = Arc::new(PaperExchangeClient::new("paper"));
    let mut entity = ExchangeEntity::new("ex1", "paper", "ETH", 0.001, true);
    entity.state.tickers.insert(MARKET.to_string(), tk);
    entity
        .state
        .balances
        .insert("ETH".to_string(), Balance::new(quote_free, 0.0, 0.0));
    entity
        .state
        .balances
        .insert("BTC".to_string(), Balance::new(base_free, 0.0, 0.0));
    (ExchangeMirror::new(entity, client.clone()), client)
}

// ---------------------------------------------------------------------------
// 入场门控
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_entry_gate_short_circuits_on_weak_trend() {
    // S5: 趋势不足时直接拒绝，不会触碰后面的K线计算
    let (mut mirror, _client) = sim_mirror(1_000.0, 0.0, ticker(150.0, 150.3));
    let options = StrategyOptions::default();
    let mut state = MarketState::default();
    state.model.trend = Some(0.05);
    state.model.price_level = Some(0.3);

    let tick = MarketTick {
        mirror: &mut mirror,
        market: MARKET,
        options: &options,
        state: &mut state,
        target_balance: 10.0,
        can_enter_more_markets: true,
        day_candles: &[],
        hour_candles: &[],
        now: now_mills(),
    };
    assert!(!entry_possible(&tick, &ticker(150.0, 150.3)));
}

#[tokio::test]
async fn test_entry_gate_passes_on_bullish_retracement() {
    let (mut mirror, _client) = sim_mirror(10_000.0, 0.0, ticker(150.0, 150.3));
    let options = StrategyOptions::default();
    let mut state = MarketState::default();
    state.model.trend = Some(0.5);
    state.model.price_level = Some(0.3);
    let day = bullish_day_candles(40);
    let hour = declining_hour_candles(100);

    let tick = MarketTick {
        mirror: &mut mirror,
        market: MARKET,
        options: &options,
        state: &mut state,
        target_balance: 10.0,
        can_enter_more_markets: true,
        day_candles: &day,
        hour_candles: &hour,
        now: now_mills(),
    };
    assert!(entry_possible(&tick, &ticker(150.0, 150.3)));
    // P6: 同一输入重复判定结果一致
    assert!(entry_possible(&tick, &ticker(150.0, 150.3)));
}

#[tokio::test]
async fn test_entry_places_sticky_buy_and_is_stable() {
    let (mut mirror, _client) = sim_mirror(10_000.0, 0.0, ticker(150.0, 150.3));
    let options = StrategyOptions::default();
    let mut state = MarketState::default();
    state.model.trend = Some(0.5);
    state.model.price_level = Some(0.3);
    state.model.can_trade = true;
    let day = bullish_day_candles(40);
    let hour = declining_hour_candles(100);
    let now = now_mills();

    {
        let mut tick = MarketTick {
            mirror: &mut mirror,
            market: MARKET,
            options: &options,
            state: &mut state,
            target_balance: 10.0,
            can_enter_more_markets: true,
            day_candles: &day,
            hour_candles: &hour,
            now,
        };
        run_entry(&mut tick).await.unwrap();
    }

    assert_eq!(state.agent_state, AgentState::TryingToEnter);
    let open = mirror.open_orders_for(MARKET);
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].side, OrderSide::Buy);
    assert!(open[0].is_sticky());
    assert_eq!(open[0].price, 150.0);
    assert!((open[0].amount - 10.0).abs() < 1e-9);

    // 再跑一遍：sticky买单还在且门控仍通过 → 保持状态不重复下单
    {
        let mut tick = MarketTick {
            mirror: &mut mirror,
            market: MARKET,
            options: &options,
            state: &mut state,
            target_balance: 10.0,
            can_enter_more_markets: true,
            day_candles: &day,
            hour_candles: &hour,
            now,
        };
        run_entry(&mut tick).await.unwrap();
    }
    assert_eq!(state.agent_state, AgentState::TryingToEnter);
    assert_eq!(mirror.open_orders_for(MARKET).len(), 1);
}

#[tokio::test]
async fn test_entry_cancels_when_gate_fails() {
    let (mut mirror, _client) = sim_mirror(10_000.0, 0.0, ticker(150.0, 150.3));
    let options = StrategyOptions::default();
    let mut state = MarketState::default();
    state.model.trend = Some(0.5);
    state.model.price_level = Some(0.3);
    let day = bullish_day_candles(40);
    let hour = declining_hour_candles(100);
    let now = now_mills();

    {
        let mut tick = MarketTick {
            mirror: &mut mirror,
            market: MARKET,
            options: &options,
            state: &mut state,
            target_balance: 10.0,
            can_enter_more_markets: true,
            day_candles: &day,
            hour_candles: &hour,
            now,
        };
        run_entry(&mut tick).await.unwrap();
    }
    assert_eq!(mirror.open_orders_for(MARKET).len(), 1);

    // 趋势转弱后：撤单并回到空仓
    state.model.trend = Some(0.0);
    {
        let mut tick = MarketTick {
            mirror: &mut mirror,
            market: MARKET,
            options: &options,
            state: &mut state,
            target_balance: 10.0,
            can_enter_more_markets: true,
            day_candles: &day,
            hour_candles: &hour,
            now,
        };
        run_entry(&mut tick).await.unwrap();
    }
    assert_eq!(state.agent_state, AgentState::Idle);
    assert!(mirror.open_orders_for(MARKET).is_empty());
}

// ---------------------------------------------------------------------------
// 离场
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_exit_triggers_on_atr_take_profit() {
    // 入场价100，ATR约2，倍数2 → 卖价150远超104触发止盈
    let (mut mirror, _client) = sim_mirror(0.0, 5.0, ticker(149.8, 150.0));
    let options = StrategyOptions::default();
    let mut state = MarketState::default();
    state.agent_state = AgentState::HasPosition;
    state.model.can_trade = true;
    state.entry_price = Some(100.0);
    state.entry_timestamp = Some(now_mills());
    let day: Vec<CandleItem> = (0..40)
        .map(|i| candle(100.0, 101.0, 99.0, 100.0, 10.0, i as i64 * 86_400_000))
        .collect();
    let hour = flat_hour_candles(60, 150.0);

    let exiting = {
        let mut tick = MarketTick {
            mirror: &mut mirror,
            market: MARKET,
            options: &options,
            state: &mut state,
            target_balance: 5.0,
            can_enter_more_markets: true,
            day_candles: &day,
            hour_candles: &hour,
            now: now_mills(),
        };
        run_exit(&mut tick).await.unwrap()
    };

    assert!(exiting);
    assert_eq!(state.agent_state, AgentState::TryingToLeave);
    let open = mirror.open_orders_for(MARKET);
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].side, OrderSide::Sell);
    assert!(open[0].is_sticky());
}

#[tokio::test]
async fn test_exit_completes_when_position_cleared() {
    let (mut mirror, _client) = sim_mirror(100.0, 0.0, ticker(149.8, 150.0));
    let options = StrategyOptions::default();
    let mut state = MarketState::default();
    state.agent_state = AgentState::TryingToLeave;
    state.entry_price = Some(100.0);
    state.entry_timestamp = Some(now_mills());
    let day = bullish_day_candles(40);
    let hour = flat_hour_candles(60, 150.0);

    let exiting = {
        let mut tick = MarketTick {
            mirror: &mut mirror,
            market: MARKET,
            options: &options,
            state: &mut state,
            target_balance: 5.0,
            can_enter_more_markets: true,
            day_candles: &day,
            hour_candles: &hour,
            now: now_mills(),
        };
        run_exit(&mut tick).await.unwrap()
    };

    assert!(!exiting);
    assert_eq!(state.agent_state, AgentState::Idle);
    assert!(state.entry_price.is_none());
    assert!(state.entry_timestamp.is_none());
}

// ---------------------------------------------------------------------------
// 做市核心
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_market_maker_quotes_both_sides() {
    let tk = ticker(100.0, 100.2);
    let mid = tk.average();
    let (mut mirror, _client) = sim_mirror(1_000.0, 8.0, tk);
    let options = StrategyOptions::default();
    let mut state = MarketState::default();
    state.agent_state = AgentState::HasPosition;
    let hour = flat_hour_candles(60, mid);
    let day = bullish_day_candles(40);

    {
        let mut tick = MarketTick {
            mirror: &mut mirror,
            market: MARKET,
            options: &options,
            state: &mut state,
            target_balance: 8.0,
            can_enter_more_markets: true,
            day_candles: &day,
            hour_candles: &hour,
            now: now_mills(),
        };
        run_market_maker(&mut tick).await.unwrap();
    }

    let open = mirror.open_orders_for(MARKET);
    assert_eq!(open.len(), 2);
    let buy = open.iter().find(|o| o.side == OrderSide::Buy).unwrap();
    let sell = open.iter().find(|o| o.side == OrderSide::Sell).unwrap();
    assert!(buy.price < mid, "bid {} must be below mid {}", buy.price, mid);
    assert!(sell.price > mid, "ask {} must be above mid {}", sell.price, mid);
    // deal = min(target/steps, cap·volume) = min(1, 10) = 1
    assert!((buy.amount - 1.0).abs() < 1e-9);
    assert!((sell.amount - 1.0).abs() < 1e-9);

    // 双边已挂：重复运行是no-op
    {
        let mut tick = MarketTick {
            mirror: &mut mirror,
            market: MARKET,
            options: &options,
            state: &mut state,
            target_balance: 8.0,
            can_enter_more_markets: true,
            day_candles: &day,
            hour_candles: &hour,
            now: now_mills(),
        };
        run_market_maker(&mut tick).await.unwrap();
    }
    let after = mirror.open_orders_for(MARKET);
    assert_eq!(after.len(), 2);
}

#[tokio::test]
async fn test_market_maker_sell_only_when_no_quote_budget() {
    // 没有计价币预算 → 只能挂卖单
    let tk = ticker(100.0, 100.2);
    let (mut mirror, _client) = sim_mirror(0.0, 8.0, tk);
    let options = StrategyOptions::default();
    let mut state = MarketState::default();
    state.agent_state = AgentState::HasPosition;
    let hour = flat_hour_candles(60, tk.average());
    let day = bullish_day_candles(40);

    {
        let mut tick = MarketTick {
            mirror: &mut mirror,
            market: MARKET,
            options: &options,
            state: &mut state,
            target_balance: 8.0,
            can_enter_more_markets: true,
            day_candles: &day,
            hour_candles: &hour,
            now: now_mills(),
        };
        run_market_maker(&mut tick).await.unwrap();
    }

    let open = mirror.open_orders_for(MARKET);
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].side, OrderSide::Sell);
}

#[tokio::test]
async fn test_market_maker_cool_off_caps_bid() {
    let tk = ticker(100.0, 100.2);
    let client = Arc::new(PaperExchangeClient::new("paper"));
    let mut entity = ExchangeEntity::new("ex1", "paper", "ETH", 0.001, true);
    entity.state.tickers.insert(MARKET.to_string(), tk);
    entity
        .state
        .balances
        .insert("ETH".to_string(), Balance::new(1_000.0, 0.0, 0.0));
    entity
        .state
        .balances
        .insert("BTC".to_string(), Balance::new(8.0, 0.0, 0.0));

    // 刚刚以95卖出过 → 冷静期内买价被压到95*(1-0.005)之下
    let mut last_sell = Order::new(
        "sell000000000000".to_string(),
        now_mills() - 60_000,
        MARKET.to_string(),
        OrderType::Limit,
        OrderSide::Sell,
        95.0,
        1.0,
        0.001,
    )
    .unwrap();
    last_sell.mark_fulfilled(now_mills() - 60_000);
    entity
        .state
        .closed_orders
        .insert(last_sell.id.clone(), last_sell);

    let mut mirror = ExchangeMirror::new(entity, client);
    let options = StrategyOptions::default();
    let mut state = MarketState::default();
    state.agent_state = AgentState::HasPosition;
    let hour = flat_hour_candles(60, tk.average());
    let day = bullish_day_candles(40);

    {
        let mut tick = MarketTick {
            mirror: &mut mirror,
            market: MARKET,
            options: &options,
            state: &mut state,
            target_balance: 8.0,
            can_enter_more_markets: true,
            day_candles: &day,
            hour_candles: &hour,
            now: now_mills(),
        };
        run_market_maker(&mut tick).await.unwrap();
    }

    let open = mirror.open_orders_for(MARKET);
    let buy = open.iter().find(|o| o.side == OrderSide::Buy).unwrap();
    assert!(
        buy.price <= 95.0 * (1.0 - 0.005) + 1e-9,
        "cool-off cap violated: {}",
        buy.price
    );
}
