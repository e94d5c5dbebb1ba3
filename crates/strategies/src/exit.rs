//! 离场策略
//!
//! 触发条件 = 止盈(RSI/ATR) ∨ 收益率离场；追踪止损按选项可选加入。
//! 触发后撤掉该市场全部挂单，按可用仓位挂sticky卖单

use anyhow::Result;
use tracing::{info, warn};

use spot_maker_common::types::{closes, CandleItem};
use spot_maker_common::utils::period_to_mill;
use spot_maker_domain::entities::Ticker;
use spot_maker_domain::enums::{AgentState, OrderSide};
use spot_maker_execution::CreateOrderOptions;
use spot_maker_indicators::{atr, ema, log_returns, moving_average, rsi, tail};

use crate::context::MarketTick;

/// 追踪止损价：近20日最高收盘价减去ATR倍数
///
/// 默认策略不使用它；只有trailing_stop_enabled打开时才进入触发条件
pub fn compute_stop_price(day_candles: &[CandleItem], volatility_multiplier: f64) -> Option<f64> {
    if day_candles.is_empty() {
        return None;
    }
    let lookback = day_candles.len().min(20);
    let high_water = day_candles[day_candles.len() - lookback..]
        .iter()
        .map(|c| c.close())
        .fold(f64::NEG_INFINITY, f64::max);
    let daily_atr = tail(&atr(day_candles, 14))?;
    Some(high_water - daily_atr * volatility_multiplier)
}

/// RSI止盈：超买且卖价覆盖最小溢价
fn take_profit_rsi_possible(tick: &MarketTick<'_>, ticker: &Ticker, entry_price: f64) -> bool {
    let exit = &tick.options.exit;
    let rsi_tail = tail(&rsi(tick.day_candles, 14)).unwrap_or(0.0);
    rsi_tail >= exit.take_profit_rsi_threshold
        && ticker.ask > entry_price * (1.0 + exit.min_next_quote_difference)
}

/// ATR止盈：价格走出入场价以上的ATR倍数
fn take_profit_atr_possible(tick: &MarketTick<'_>, ticker: &Ticker, entry_price: f64) -> bool {
    let exit = &tick.options.exit;
    let daily_atr = tail(&atr(tick.day_candles, 20)).unwrap_or(0.0);
    daily_atr > 0.0 && ticker.ask >= entry_price + exit.take_profit_atr_multiplier * daily_atr
}

/// 收益率离场：持仓足够久、日收益转弱、且等到盘整企稳
fn return_based_exit_possible(
    tick: &MarketTick<'_>,
    ticker: &Ticker,
    entry_timestamp: i64,
) -> bool {
    let exit = &tick.options.exit;
    let hold_ms = match period_to_mill(&exit.return_based_exit_after) {
        Ok(ms) => ms,
        Err(_) => return false,
    };
    if tick.now < entry_timestamp + hold_ms {
        return false;
    }
    let returns_ma = moving_average(&log_returns(tick.day_candles), exit.ma_period_returns);
    if tail(&returns_ma).unwrap_or(f64::INFINITY) > exit.return_threshold {
        return false;
    }
    // 等待盘整：均价回到慢线上方再走
    let hour_closes = closes(tick.hour_candles);
    let slow = tail(&ema(&hour_closes, exit.ema_period_slow)).unwrap_or(f64::INFINITY);
    ticker.average() > slow
}

/// 离场触发判定
pub fn exit_needed(tick: &MarketTick<'_>, ticker: &Ticker) -> bool {
    let entry_price = tick.state.entry_price.unwrap_or_else(|| ticker.average());
    let entry_timestamp = tick.state.entry_timestamp.unwrap_or(tick.now);

    if take_profit_rsi_possible(tick, ticker, entry_price)
        || take_profit_atr_possible(tick, ticker, entry_price)
        || return_based_exit_possible(tick, ticker, entry_timestamp)
    {
        return true;
    }

    if tick.options.exit.trailing_stop_enabled {
        if let Some(stop) =
            compute_stop_price(tick.day_candles, tick.options.exit.volatility_multiplier)
        {
            return ticker.ask < stop;
        }
    }
    false
}

/// 离场策略主流程。返回true表示市场处于离场中（TryingToLeave）
pub async fn run_exit(tick: &mut MarketTick<'_>) -> Result<bool> {
    let Some(ticker) = tick.mirror.ticker(tick.market) else {
        warn!("离场缺少行情: {}", tick.market);
        return Ok(tick.state.agent_state == AgentState::TryingToLeave);
    };

    let min_deal = tick.effective_min_deal(ticker.ask);
    let base = tick.mirror.balance(tick.base_currency());
    if base.total() <= min_deal {
        // 仓位已清空：回到空仓并清理入场信息
        if tick.state.agent_state == AgentState::TryingToLeave {
            info!("离场完成: {}", tick.market);
            tick.state.agent_state = AgentState::Idle;
            tick.state.entry_price = None;
            tick.state.entry_timestamp = None;
        }
        return Ok(false);
    }

    tick.backfill_entry(&ticker);
    let needed = exit_needed(tick, &ticker);

    let has_sticky_sell = tick
        .mirror
        .open_orders_for(tick.market)
        .iter()
        .any(|o| o.side == OrderSide::Sell && o.is_sticky());
    if has_sticky_sell {
        if !needed && tick.state.model.can_trade {
            // 离场理由消失且市场仍可交易：撤单回到做市
            tick.mirror.cancel_all_orders(Some(tick.market), None).await?;
            tick.state.agent_state = AgentState::HasPosition;
            return Ok(false);
        }
        tick.state.agent_state = AgentState::TryingToLeave;
        return Ok(true);
    }

    if !needed {
        return Ok(false);
    }

    tick.mirror.cancel_all_orders(Some(tick.market), None).await?;
    let amount = tick.mirror.balance(tick.base_currency()).free();
    if amount <= 0.0 {
        return Ok(false);
    }

    let mut options =
        CreateOrderOptions::limit(tick.market, OrderSide::Sell, amount, ticker.ask).sticky(true);
    options.auto_cancel = tick
        .options
        .order_auto_cancel
        .as_deref()
        .and_then(|p| period_to_mill(p).ok());

    match tick.mirror.create_order(options).await? {
        Some(order) => {
            info!("离场挂单: {} {}@{}", tick.market, order.amount, order.price);
            tick.state.agent_state = AgentState::TryingToLeave;
            Ok(true)
        }
        None => {
            warn!("离场下单未成功: {}", tick.market);
            Ok(false)
        }
    }
}
