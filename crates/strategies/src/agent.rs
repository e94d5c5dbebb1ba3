//! 做市交易代理
//!
//! 每次运行一个实例：维护活跃市场集，逐市场走
//! 对账 → 模型参数 → 目标持仓 → 状态机分派 的完整tick

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

use spot_maker_common::types::CandleItem;
use spot_maker_common::utils::{now_mills, period_to_mill};
use spot_maker_analytics::{
    compute_gbm_parameters, compute_market_dynamics_parameters, GBM_REQUIRED_HOUR_CANDLES,
};
use spot_maker_domain::entities::{ExchangeEntity, TradingAgentEntity};
use spot_maker_domain::enums::{AgentState, Timeframe};
use spot_maker_domain::traits::{ExchangeClient, Strategy, StrategyRunOutcome};
use spot_maker_execution::ExchangeMirror;
use spot_maker_indicators::{rsi, tail, vdx};
use spot_maker_market::CandleService;

use crate::context::MarketTick;
use crate::options::{resolve_options, MarketSettingsDoc};
use crate::{entry, exit, market_maker};

/// 市场池过滤与趋势计算用的日K线数量
const DAY_CANDLES_WANTED: usize = 60;
const DAY_CANDLES_REQUIRED: usize = 30;
const HOUR_CANDLES_WANTED: usize = 100;
const HOUR_CANDLES_REQUIRED: usize = 60;
/// 趋势/价格水平的指标周期
const TREND_VDX_PERIOD: usize = 30;
const PRICE_LEVEL_RSI_PERIOD: usize = 20;
/// 成交强度估计用的15m K线数量
const DYNAMICS_CANDLES_WANTED: usize = 1_000;

pub struct MarketMakingStrategy {
    agent: TradingAgentEntity,
    mirror: ExchangeMirror,
    candles: Arc<CandleService>,
    active_markets: Vec<String>,
    total_balance: f64,
}

impl MarketMakingStrategy {
    pub fn new(
        agent: TradingAgentEntity,
        exchange: ExchangeEntity,
        client: Arc<dyn ExchangeClient>,
        candles: Arc<CandleService>,
    ) -> Self {
        Self {
            mirror: ExchangeMirror::new(exchange, client),
            agent,
            candles,
            active_markets: Vec::new(),
            total_balance: 0.0,
        }
    }

    async fn fetch_candles_min(
        &self,
        market: &str,
        timeframe: Timeframe,
        wanted: usize,
        required: usize,
    ) -> Option<Vec<CandleItem>> {
        match self.candles.fetch_candles(market, timeframe, wanted).await {
            Ok(Some(candles)) if candles.len() >= required => Some(candles),
            Ok(Some(candles)) => {
                warn!(
                    "K线不足: {} {} 需要{}实际{}",
                    market,
                    timeframe.as_str(),
                    required,
                    candles.len()
                );
                None
            }
            Ok(None) => {
                warn!("K线拉取fail-soft: {} {}", market, timeframe.as_str());
                None
            }
            Err(e) => {
                warn!("K线拉取失败: {} {}: {}", market, timeframe.as_str(), e);
                None
            }
        }
    }

    /// 日线VDX趋势与RSI价格水平
    async fn compute_trend_price_level(&self, market: &str) -> Option<(f64, f64)> {
        let day = self
            .fetch_candles_min(
                market,
                Timeframe::D1,
                DAY_CANDLES_WANTED,
                DAY_CANDLES_REQUIRED,
            )
            .await?;
        let trend = tail(&vdx(&day, TREND_VDX_PERIOD))?;
        let window_start = day.len().saturating_sub(TREND_VDX_PERIOD);
        let price_level = tail(&rsi(&day[window_start..], PRICE_LEVEL_RSI_PERIOD))? / 100.0;
        Some((trend, price_level))
    }

    /// 确保市场的GBM参数就绪；K线不足时放弃本市场的tick
    async fn ensure_gbm_parameters(&mut self, market: &str) -> bool {
        let missing = self
            .agent
            .market_state(market)
            .map(|s| s.model.sigma.is_none() || s.model.mu.is_none())
            .unwrap_or(true);
        if !missing {
            return true;
        }
        let Some(hour) = self
            .fetch_candles_min(
                market,
                Timeframe::H1,
                GBM_REQUIRED_HOUR_CANDLES,
                GBM_REQUIRED_HOUR_CANDLES,
            )
            .await
        else {
            return false;
        };
        match compute_gbm_parameters(&hour) {
            Ok(params) => {
                let state = self.agent.market_state_mut(market);
                state.model.sigma = Some(params.sigma);
                state.model.mu = Some(params.mu);
                info!(
                    "GBM参数: {} sigma={:.6} mu={:.6}",
                    market, params.sigma, params.mu
                );
                true
            }
            Err(e) => {
                warn!("GBM估计失败: {}: {}", market, e);
                false
            }
        }
    }

    /// 模型报价需要的成交强度参数；失败时报价回退固定价差公式
    async fn ensure_dynamics_parameters(&mut self, market: &str) {
        let missing = self
            .agent
            .market_state(market)
            .map(|s| s.model.a_buy.is_none() || s.model.a_sell.is_none())
            .unwrap_or(true);
        if !missing {
            return;
        }
        let Some(quarter) = self
            .fetch_candles_min(market, Timeframe::M15, DYNAMICS_CANDLES_WANTED, 16)
            .await
        else {
            return;
        };
        match compute_market_dynamics_parameters(&quarter) {
            Ok(params) => {
                let state = self.agent.market_state_mut(market);
                state.model.a_buy = Some(params.buy.a);
                state.model.k_buy = Some(params.buy.k);
                state.model.a_sell = Some(params.sell.a);
                state.model.k_sell = Some(params.sell.k);
            }
            Err(e) => warn!("成交强度估计失败: {}: {}", market, e),
        }
    }

    /// 当前持有仓位（或正在进出场）的市场数
    fn markets_in_position(&self) -> usize {
        self.agent
            .strategy_state
            .market_states
            .values()
            .filter(|s| s.agent_state != AgentState::Idle)
            .count()
    }
}

#[async_trait]
impl Strategy for MarketMakingStrategy {
    fn name(&self) -> &str {
        crate::factory::MARKET_MAKING_STRATEGY
    }

    async fn before_run(&mut self) -> Result<bool> {
        self.mirror.refresh_markets_daily().await;

        // 候选 = 配置器给过结论的市场 ∪ 已有状态的市场
        let mut candidates: BTreeSet<String> = self
            .agent
            .strategy_state
            .market_states
            .keys()
            .cloned()
            .collect();
        if let Some(settings) = self
            .agent
            .strategy_options
            .get("market_settings")
            .and_then(|v| v.as_object())
        {
            candidates.extend(settings.keys().cloned());
        }
        let markets: Vec<String> = candidates.into_iter().collect();

        if !self.mirror.ensure_fresh(&markets).await {
            warn!("余额/行情同步失败，中止本次运行");
            return Ok(false);
        }

        let mut active: Vec<String> = Vec::new();
        for market in &markets {
            let settings = MarketSettingsDoc::read(&self.agent.strategy_options, market);
            let per_market = resolve_options(&self.agent.strategy_options, Some(market));
            let base_currency = market.split('/').next().unwrap_or(market);

            let min_deal = self.mirror.entity().min_deal_amount(market);
            let base = self.mirror.balance(base_currency);
            let held = base.total() > 0.0 && base.total() >= min_deal;
            let has_open = self.mirror.open_order_count(market) > 0;

            // 成员资格是粘性的：持仓或有挂单的市场始终保持活跃
            if held || has_open {
                let state = self.agent.market_state_mut(market);
                state.model.can_trade = settings.can_trade;
                if state.model.trend.is_none() {
                    state.model.trend = settings.trend;
                }
                if state.model.price_level.is_none() {
                    state.model.price_level = settings.price_level;
                }
                active.push(market.clone());
                continue;
            }

            if !settings.can_trade {
                continue;
            }

            let (trend, price_level) = match (settings.trend, settings.price_level) {
                (Some(trend), Some(price_level)) => (trend, price_level),
                _ => match self.compute_trend_price_level(market).await {
                    Some(v) => v,
                    None => continue,
                },
            };
            if trend >= per_market.entry.minimum_trend
                && price_level < per_market.entry.maximum_price_level
            {
                let state = self.agent.market_state_mut(market);
                state.model.can_trade = true;
                state.model.trend = Some(trend);
                state.model.price_level = Some(price_level);
                if state.model.sigma.is_none() {
                    state.model.sigma = settings.sigma;
                }
                if state.model.mu.is_none() {
                    state.model.mu = settings.mu;
                }
                active.push(market.clone());
            }
        }

        // 估值币种限定在fiat + 活跃市场的基础币，避免无关尘埃阻塞估值
        let mut currencies: Vec<String> = active
            .iter()
            .map(|m| m.split('/').next().unwrap_or(m).to_string())
            .collect();
        currencies.push(self.agent.fiat_currency.clone());
        currencies.dedup();

        self.active_markets = active;
        match self.mirror.get_total_balance(false, Some(&currencies), false) {
            Some(total) => {
                self.total_balance = total;
                info!(
                    "运行准备完成: {}个活跃市场, 总额={:.6} {}",
                    self.active_markets.len(),
                    total,
                    self.agent.fiat_currency
                );
                Ok(true)
            }
            None => {
                warn!("总额估值失败，中止本次运行");
                Ok(false)
            }
        }
    }

    fn active_markets(&self) -> Vec<String> {
        self.active_markets.clone()
    }

    async fn run_for_market(&mut self, market: &str) -> Result<()> {
        let now = now_mills();
        let per_market = resolve_options(&self.agent.strategy_options, Some(market));
        let current_state = self
            .agent
            .market_state(market)
            .map(|s| s.agent_state)
            .unwrap_or_default();

        // 非空仓状态先与远端对账
        if current_state != AgentState::Idle && !self.mirror.update(Some(market)).await {
            warn!("对账失败，跳过市场tick: {}", market);
            return Ok(());
        }

        if !self.ensure_gbm_parameters(market).await {
            return Ok(());
        }
        if per_market.market_maker.use_model_quotes {
            self.ensure_dynamics_parameters(market).await;
        }

        // 目标持仓
        let n_active = self.active_markets.len().max(1);
        let fiat_ratio = per_market.fiat_ratio;
        let ratio = self
            .agent
            .market_state(market)
            .and_then(|s| s.ratio)
            .unwrap_or((1.0 - fiat_ratio) / n_active as f64);
        let Some(converted) = self
            .mirror
            .convert_to_base(self.total_balance * (1.0 - fiat_ratio), market)
        else {
            warn!("目标持仓折算失败: {}", market);
            return Ok(());
        };
        let target_balance = ratio * converted;

        let Some(day_candles) = self
            .fetch_candles_min(
                market,
                Timeframe::D1,
                DAY_CANDLES_WANTED,
                DAY_CANDLES_REQUIRED,
            )
            .await
        else {
            return Ok(());
        };
        let Some(hour_candles) = self
            .fetch_candles_min(
                market,
                Timeframe::H1,
                HOUR_CANDLES_WANTED,
                HOUR_CANDLES_REQUIRED,
            )
            .await
        else {
            return Ok(());
        };

        // 入场门控需要近期成交
        if current_state == AgentState::Idle || current_state == AgentState::TryingToEnter {
            let window =
                period_to_mill(&per_market.entry.volume_balance_period).unwrap_or(3_600_000);
            self.mirror
                .sync_trades(&[market.to_string()], Some(now - window))
                .await;
        }

        let max_positions = per_market.entry.maximum_active_positions;
        let can_enter_more_markets =
            max_positions == 0 || self.markets_in_position() < max_positions;

        let state = self.agent.market_state_mut(market);
        let mut tick = MarketTick {
            mirror: &mut self.mirror,
            market,
            options: &per_market,
            state,
            target_balance,
            can_enter_more_markets,
            day_candles: &day_candles,
            hour_candles: &hour_candles,
            now,
        };

        match tick.state.agent_state {
            AgentState::Idle | AgentState::TryingToEnter => {
                entry::run_entry(&mut tick).await?;
            }
            AgentState::HasPosition => {
                let exiting = exit::run_exit(&mut tick).await?;
                if !exiting && tick.state.agent_state == AgentState::HasPosition {
                    market_maker::run_market_maker(&mut tick).await?;
                }
            }
            AgentState::TryingToLeave => {
                exit::run_exit(&mut tick).await?;
            }
        }

        Ok(())
    }

    fn finish(self: Box<Self>) -> StrategyRunOutcome {
        let strategy = *self;
        let (exchange, events) = strategy.mirror.into_parts();
        StrategyRunOutcome {
            exchange,
            strategy_state: strategy.agent.strategy_state,
            events,
        }
    }
}
