//! 单市场tick上下文
//!
//! 入场/做市/离场共用的一揽子输入；镜像在tick内独占可变

use spot_maker_common::types::CandleItem;
use spot_maker_domain::entities::{MarketState, Ticker};
use spot_maker_execution::ExchangeMirror;

use crate::options::StrategyOptions;

pub struct MarketTick<'a> {
    pub mirror: &'a mut ExchangeMirror,
    pub market: &'a str,
    /// 该市场解析后的选项（含市场级覆盖）
    pub options: &'a StrategyOptions,
    pub state: &'a mut MarketState,
    /// 目标持仓（基础币种）
    pub target_balance: f64,
    pub can_enter_more_markets: bool,
    pub day_candles: &'a [CandleItem],
    pub hour_candles: &'a [CandleItem],
    pub now: i64,
}

impl<'a> MarketTick<'a> {
    pub fn base_currency(&self) -> &str {
        self.market.split('/').next().unwrap_or(self.market)
    }

    pub fn quote_currency(&self) -> &str {
        self.market.split('/').nth(1).unwrap_or(self.market)
    }

    /// 有效最小成交量：交易所限制与最小名义价值的较大者
    pub fn effective_min_deal(&self, side_price: f64) -> f64 {
        let exchange_min = self.mirror.entity().min_deal_amount(self.market);
        let notional_min = if side_price > 0.0 {
            self.options.market_maker.minimum_notional_value / side_price
        } else {
            0.0
        };
        exchange_min.max(notional_min)
    }

    /// 入场价/入场时间缺失时从最近关闭的买单回填，否则用当前行情
    pub fn backfill_entry(&mut self, ticker: &Ticker) {
        if self.state.entry_price.is_some() && self.state.entry_timestamp.is_some() {
            return;
        }
        match self
            .mirror
            .last_closed_order(self.market, spot_maker_domain::enums::OrderSide::Buy)
        {
            Some(order) => {
                self.state.entry_price = Some(order.price);
                self.state.entry_timestamp =
                    Some(order.timestamp_closed.unwrap_or(order.timestamp));
            }
            None => {
                self.state.entry_price = Some(ticker.average());
                self.state.entry_timestamp = Some(self.now);
            }
        }
    }
}
