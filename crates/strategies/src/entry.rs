//! 入场策略
//!
//! 门控顺序与短路：趋势 → 价格水平 → 收益率 → 成交量 → 回撤 →
//! 小时线结构 → 成交买卖平衡。全部通过才在买一价挂sticky买单

use anyhow::Result;
use tracing::{info, warn};

use spot_maker_common::types::{closes, volumes};
use spot_maker_common::utils::period_to_mill;
use spot_maker_domain::entities::Ticker;
use spot_maker_domain::enums::{AgentState, OrderSide};
use spot_maker_execution::CreateOrderOptions;
use spot_maker_indicators::{atr, ema, log_returns, moving_average, tail};

use crate::context::MarketTick;

/// 入场门控，所有条件按文档顺序短路求值
pub fn entry_possible(tick: &MarketTick<'_>, ticker: &Ticker) -> bool {
    let entry = &tick.options.entry;

    let trend = tick.state.model.trend.unwrap_or(0.0);
    if trend < entry.minimum_trend {
        return false;
    }

    let price_level = tick.state.model.price_level.unwrap_or(1.0);
    if price_level > entry.maximum_price_level {
        return false;
    }

    // 收益率门控：剔除未走完的当日K线
    if tick.day_candles.len() < 2 {
        return false;
    }
    let past_days = &tick.day_candles[..tick.day_candles.len() - 1];
    let returns = log_returns(past_days);
    let returns_ma = moving_average(&returns, entry.minimum_returns_period);
    if tail(&returns_ma).unwrap_or(f64::NEG_INFINITY) < entry.minimum_returns {
        return false;
    }

    let lookback = entry.minimum_returns_period.min(returns.len());
    let recent = &returns[returns.len() - lookback..];
    let strong_days = recent
        .iter()
        .filter(|r| **r >= entry.minimum_returns)
        .count();
    if strong_days < entry.minimum_returns_period / 3 {
        return false;
    }

    // 成交量不缩量
    let vols = volumes(past_days);
    let vols_ma = moving_average(&vols, entry.ma_period_volume);
    if tail(&vols).unwrap_or(0.0) < tail(&vols_ma).unwrap_or(f64::INFINITY) {
        return false;
    }

    // 处于回撤中：买价显著低于日线均值
    let day_closes = closes(tick.day_candles);
    let daily_ema = tail(&ema(&day_closes, entry.ema_period_daily_retracement)).unwrap_or(0.0);
    let daily_atr = tail(&atr(tick.day_candles, entry.ema_period_daily)).unwrap_or(0.0);
    if ticker.bid >= daily_ema - daily_atr * entry.atr_retracement_multiplier {
        return false;
    }

    // 小时线结构：快线在中线之下
    let hour_closes = closes(tick.hour_candles);
    let fast = tail(&ema(&hour_closes, entry.ema_period_fast)).unwrap_or(0.0);
    let mid = tail(&ema(&hour_closes, entry.ema_period_mid)).unwrap_or(0.0);
    if fast >= mid {
        return false;
    }

    // 近期成交买卖平衡不为负；无成交视为0（通过）
    volume_balance(tick) >= 0.0
}

/// (买量 − 卖量) / (买量 + 卖量)，窗口内无成交时为0
fn volume_balance(tick: &MarketTick<'_>) -> f64 {
    let window = period_to_mill(&tick.options.entry.volume_balance_period).unwrap_or(3_600_000);
    let since = tick.now - window;

    let trades = match tick.mirror.entity().state.recent_trades.get(tick.market) {
        Some(trades) => trades,
        None => return 0.0,
    };

    let mut buy_volume = 0.0;
    let mut sell_volume = 0.0;
    for trade in trades.iter().filter(|t| t.timestamp >= since) {
        match trade.side {
            OrderSide::Buy => buy_volume += trade.amount,
            OrderSide::Sell => sell_volume += trade.amount,
        }
    }
    let total = buy_volume + sell_volume;
    if total <= 0.0 {
        0.0
    } else {
        (buy_volume - sell_volume) / total
    }
}

/// 入场策略主流程
pub async fn run_entry(tick: &mut MarketTick<'_>) -> Result<()> {
    let Some(ticker) = tick.mirror.ticker(tick.market) else {
        warn!("入场缺少行情: {}", tick.market);
        return Ok(());
    };
    let min_deal = tick.effective_min_deal(ticker.bid);
    let base = tick.mirror.balance(tick.base_currency());

    // 已有sticky买单：门控失效则撤单回到空仓
    let has_sticky_buy = tick
        .mirror
        .open_orders_for(tick.market)
        .iter()
        .any(|o| o.side == OrderSide::Buy && o.is_sticky());
    if has_sticky_buy {
        if entry_possible(tick, &ticker) {
            tick.state.agent_state = AgentState::TryingToEnter;
        } else {
            info!("入场条件失效，撤掉挂单: {}", tick.market);
            tick.mirror.cancel_all_orders(Some(tick.market), None).await?;
            tick.state.agent_state = AgentState::Idle;
        }
        return Ok(());
    }

    // 已经在场内：回填入场信息并转入持仓状态
    if base.total() >= min_deal {
        if tick.state.agent_state != AgentState::HasPosition {
            tick.backfill_entry(&ticker);
            tick.state.agent_state = AgentState::HasPosition;
        }
        return Ok(());
    }

    if tick.target_balance <= 0.0 || !tick.can_enter_more_markets {
        return Ok(());
    }
    if !entry_possible(tick, &ticker) {
        return Ok(());
    }

    // 入场量 = 目标持仓缺口，受计价币预算约束
    let mut amount = (tick.target_balance - base.total()).max(0.0);
    let quote = tick.mirror.balance(tick.quote_currency());
    if ticker.bid > 0.0 {
        amount = amount.min(quote.free() / ticker.bid);
    }
    if amount < min_deal {
        return Ok(());
    }

    tick.mirror.cancel_all_orders(Some(tick.market), None).await?;

    let mut options =
        CreateOrderOptions::limit(tick.market, OrderSide::Buy, amount, ticker.bid).sticky(true);
    options.auto_cancel = tick
        .options
        .order_auto_cancel
        .as_deref()
        .and_then(|p| period_to_mill(p).ok());

    match tick.mirror.create_order(options).await? {
        Some(order) => {
            info!(
                "入场挂单: {} {}@{} (target={})",
                tick.market, order.amount, order.price, tick.target_balance
            );
            tick.state.agent_state = AgentState::TryingToEnter;
        }
        None => warn!("入场下单未成功: {}", tick.market),
    }
    Ok(())
}
