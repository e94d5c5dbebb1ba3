//! 做市核心
//!
//! 库存偏移倾斜的双边报价：固定价差公式为默认，可选切换到
//! Guéant模型报价。两侧允许状态与簿上挂单不一致时整体重挂

use anyhow::Result;
use tracing::{debug, info, warn};

use spot_maker_common::types::closes;
use spot_maker_common::utils::period_to_mill;
use spot_maker_analytics::{compute_quote, IntensityParameters, QuoteInput};
use spot_maker_domain::enums::OrderSide;
use spot_maker_execution::CreateOrderOptions;
use spot_maker_indicators::{ema, tail};

use crate::context::MarketTick;

/// 双边目标报价
#[derive(Debug, Clone, Copy)]
struct QuotePair {
    bid: f64,
    ask: f64,
}

/// 固定价差公式：s = fixed + σ乘数，按库存偏移两侧不对称
fn fixed_spread_quotes(tick: &MarketTick<'_>, mid: f64, sigma: f64, offset: f64) -> QuotePair {
    let mm = &tick.options.market_maker;
    let spread = mm.spread_fixed_term + mm.spread_sigma_multiplier * sigma;
    QuotePair {
        bid: mid - (mid * spread * (1.0 + offset)) / 2.0,
        ask: mid + (mid * spread * (1.0 - offset)) / 2.0,
    }
}

/// Guéant模型报价；参数不全或退化时回退固定价差公式
fn model_quotes(
    tick: &MarketTick<'_>,
    mid: f64,
    sigma: f64,
    mu: f64,
    offset: f64,
    deal: f64,
    balance_offset: f64,
) -> QuotePair {
    let mm = &tick.options.market_maker;
    let model = &tick.state.model;
    let params = match (model.a_buy, model.k_buy, model.a_sell, model.k_sell) {
        (Some(a_buy), Some(k_buy), Some(a_sell), Some(k_sell)) => Some((
            IntensityParameters { a: a_buy, k: k_buy },
            IntensityParameters {
                a: a_sell,
                k: k_sell,
            },
        )),
        _ => None,
    };
    let Some((buy, sell)) = params else {
        return fixed_spread_quotes(tick, mid, sigma, offset);
    };

    let inventory = if deal > 0.0 {
        (balance_offset / deal).round() as i64
    } else {
        0
    };
    let quote = compute_quote(&QuoteInput {
        mid_price: mid,
        inventory,
        sigma,
        mu,
        gamma: model.gamma.unwrap_or(mm.gamma),
        buy,
        sell,
        with_drift: mm.with_drift,
    });
    if quote.bid <= 0.0 || quote.ask <= 0.0 {
        return fixed_spread_quotes(tick, mid, sigma, offset);
    }
    QuotePair {
        bid: quote.bid,
        ask: quote.ask,
    }
}

/// 做市主流程
pub async fn run_market_maker(tick: &mut MarketTick<'_>) -> Result<()> {
    let mm = tick.options.market_maker.clone();
    let Some(ticker) = tick.mirror.ticker(tick.market) else {
        warn!("做市缺少行情: {}", tick.market);
        return Ok(());
    };
    if tick.target_balance <= 0.0 {
        return Ok(());
    }

    let hour_closes = closes(tick.hour_candles);
    let ema_slow = match tail(&ema(&hour_closes, mm.ema_period_slow)) {
        Some(v) if v > 0.0 => v,
        _ => return Ok(()),
    };
    let mid = ticker.average();

    let has_buy = tick.mirror.has_open_order(tick.market, OrderSide::Buy);
    let has_sell = tick.mirror.has_open_order(tick.market, OrderSide::Sell);
    if has_buy && has_sell {
        return Ok(());
    }

    let sigma = tick.state.model.sigma.unwrap_or(mm.sigma);
    let mu = tick.state.model.mu.unwrap_or(mm.mu);
    let base = tick.mirror.balance(tick.base_currency());
    let quote = tick.mirror.balance(tick.quote_currency());

    // 库存偏移：正值代表超配
    let balance_offset = base.total() - tick.target_balance;
    let offset = balance_offset / tick.target_balance;

    let deal_raw = (tick.target_balance / mm.inventory_steps as f64)
        .min(mm.trade_volume_cap * ticker.base_volume);

    let mut quotes = if mm.use_model_quotes {
        model_quotes(tick, mid, sigma, mu, offset, deal_raw, balance_offset)
    } else {
        fixed_spread_quotes(tick, mid, sigma, offset)
    };

    // 风险厌恶修正：超配压低买价，低配抬高卖价
    let rac = (std::f64::consts::LN_2 * offset.abs()).exp() * mm.risk_aversion_correction * sigma;
    if offset > 0.0 {
        quotes.bid *= 1.0 - rac;
    } else {
        quotes.ask *= 1.0 + rac;
    }

    // 冷静期：不穿越刚成交过的价格
    let cool_off_ms = period_to_mill(&mm.cool_off_period).unwrap_or(7_200_000);
    if let Some(last_sell) = tick.mirror.last_closed_order(tick.market, OrderSide::Sell) {
        let closed_at = last_sell.timestamp_closed.unwrap_or(last_sell.timestamp);
        if tick.now - closed_at <= cool_off_ms {
            quotes.bid = quotes
                .bid
                .min(last_sell.price * (1.0 - mm.min_next_quote_difference));
        }
    }
    if let Some(last_buy) = tick.mirror.last_closed_order(tick.market, OrderSide::Buy) {
        let closed_at = last_buy.timestamp_closed.unwrap_or(last_buy.timestamp);
        if tick.now - closed_at <= cool_off_ms {
            quotes.ask = quotes
                .ask
                .max(last_buy.price * (1.0 + mm.min_next_quote_difference));
        }
    }

    // 动态数量：价格相对慢线的位置决定两侧衰减
    let price_level = mid / ema_slow - 1.0;
    let mut buy_amount = if price_level > 0.0 {
        deal_raw * (-price_level * mm.dynamic_amount_dropoff).exp()
    } else {
        deal_raw
    };
    let mut sell_amount = if price_level < 0.0 {
        deal_raw * (price_level * mm.dynamic_amount_dropoff).exp()
    } else {
        deal_raw
    };

    // 最小成交量与预算约束
    let min_buy = mm
        .min_deal_amount
        .max(tick.effective_min_deal(quotes.bid));
    let min_sell = mm
        .min_deal_amount
        .max(tick.effective_min_deal(quotes.ask));
    if quotes.bid > 0.0 {
        buy_amount = buy_amount.min(quote.free() / quotes.bid);
    }
    sell_amount = sell_amount.min(base.free());

    let can_buy = quotes.bid > 0.0 && buy_amount >= min_buy;
    let can_sell = quotes.ask > 0.0 && sell_amount >= min_sell;

    // 簿上状态与允许状态一致则不动
    if has_buy == can_buy && has_sell == can_sell {
        debug!(
            "做市无需动作: {} buy={} sell={}",
            tick.market, can_buy, can_sell
        );
        return Ok(());
    }

    tick.mirror.cancel_all_orders(Some(tick.market), None).await?;

    let auto_cancel = tick
        .options
        .order_auto_cancel
        .as_deref()
        .and_then(|p| period_to_mill(p).ok());

    if can_buy {
        let mut options =
            CreateOrderOptions::limit(tick.market, OrderSide::Buy, buy_amount, quotes.bid)
                .auto_cancel_at_fill_percentage(mm.auto_cancel_at_fill_percentage);
        options.auto_cancel = auto_cancel;
        if let Some(order) = tick.mirror.create_order(options).await? {
            info!(
                "做市买单: {} {}@{} (offset={:.4})",
                tick.market, order.amount, order.price, offset
            );
        }
    }
    if can_sell {
        let mut options =
            CreateOrderOptions::limit(tick.market, OrderSide::Sell, sell_amount, quotes.ask)
                .auto_cancel_at_fill_percentage(mm.auto_cancel_at_fill_percentage);
        options.auto_cancel = auto_cancel;
        if let Some(order) = tick.mirror.create_order(options).await? {
            info!(
                "做市卖单: {} {}@{} (offset={:.4})",
                tick.market, order.amount, order.price, offset
            );
        }
    }

    Ok(())
}
