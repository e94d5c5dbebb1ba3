//! 组合配置器
//!
//! 从市场池按成交额、活跃度与模型可估性筛出可交易市场，
//! 把can_trade与趋势/价格水平写进代理的market_settings

use std::sync::Arc;

use anyhow::Result;
use serde_json::json;
use tracing::{info, warn};

use spot_maker_common::types::CandleItem;
use spot_maker_analytics::{compute_gbm_parameters, GBM_REQUIRED_HOUR_CANDLES};
use spot_maker_domain::entities::TradingAgentEntity;
use spot_maker_domain::enums::Timeframe;
use spot_maker_domain::traits::ExchangeClient;
use spot_maker_indicators::{ema, rsi, tail, vdx};
use spot_maker_market::CandleService;
use spot_maker_strategies::options::deep_merge;

/// 日线样本量与趋势指标周期
const DAY_CANDLES_REQUIRED: usize = 30;
const TREND_VDX_PERIOD: usize = 30;
const PRICE_LEVEL_RSI_PERIOD: usize = 20;
/// 日均成交额的EMA周期
const AVERAGE_VOLUME_EMA_PERIOD: usize = 5;

/// 单个市场的筛选结论
#[derive(Debug, Clone)]
pub struct MarketVerdict {
    pub market: String,
    pub can_trade: bool,
    pub trend: Option<f64>,
    pub price_level: Option<f64>,
    pub sigma: Option<f64>,
    pub mu: Option<f64>,
}

pub struct AllocatorService {
    client: Arc<dyn ExchangeClient>,
    candles: Arc<CandleService>,
}

impl AllocatorService {
    pub fn new(client: Arc<dyn ExchangeClient>, candles: Arc<CandleService>) -> Self {
        Self { client, candles }
    }

    /// 扫描市场池并把结论写回代理的strategy_options.market_settings。
    /// 返回本轮可交易的市场列表
    pub async fn allocate(&self, agent: &mut TradingAgentEntity) -> Result<Vec<String>> {
        let universe: Vec<String> = self
            .client
            .get_markets(Some(&agent.fiat_currency))
            .await?
            .into_iter()
            .filter(|m| !agent.blacklist.contains(m))
            .collect();
        info!(
            "组合扫描开始: {}个候选市场 (fiat={})",
            universe.len(),
            agent.fiat_currency
        );

        let tickers = self.client.fetch_tickers(Some(&universe)).await?;

        let mut survivors = Vec::new();
        for market in &universe {
            let verdict = match tickers.get(market) {
                Some(ticker) => {
                    self.evaluate_market(agent, market, ticker.quote_volume, ticker.last)
                        .await
                }
                None => MarketVerdict {
                    market: market.clone(),
                    can_trade: false,
                    trend: None,
                    price_level: None,
                    sigma: None,
                    mu: None,
                },
            };

            if verdict.can_trade {
                survivors.push(market.clone());
            }
            Self::persist_verdict(agent, &verdict);
        }

        info!("组合扫描完成: {}个可交易市场", survivors.len());
        Ok(survivors)
    }

    /// 依次应用过滤器，全部通过才判定可交易
    async fn evaluate_market(
        &self,
        agent: &TradingAgentEntity,
        market: &str,
        day_quote_volume: f64,
        last_price: f64,
    ) -> MarketVerdict {
        let rejected = MarketVerdict {
            market: market.to_string(),
            can_trade: false,
            trend: None,
            price_level: None,
            sigma: None,
            mu: None,
        };

        if day_quote_volume < agent.minimum_volume {
            return rejected;
        }
        if last_price < agent.minimum_fiat_price {
            return rejected;
        }

        // 一周的小时线：检查停滞小时占比并估计GBM参数
        let hour = match self
            .candles
            .fetch_candles(market, Timeframe::H1, GBM_REQUIRED_HOUR_CANDLES)
            .await
        {
            Ok(Some(candles)) if candles.len() >= GBM_REQUIRED_HOUR_CANDLES => candles,
            Ok(_) => return rejected,
            Err(e) => {
                warn!("组合扫描拉取小时线失败: {}: {}", market, e);
                return rejected;
            }
        };
        let idle_hours = hour.iter().filter(|c| c.volume() == 0.0).count();
        if idle_hours as f64 / hour.len() as f64 > agent.max_percentage_hours_no_volume {
            return rejected;
        }
        let gbm = match compute_gbm_parameters(&hour) {
            Ok(params) => params,
            Err(_) => return rejected,
        };

        // 30根日线：日均成交额门槛与趋势/价格水平
        let day = match self
            .candles
            .fetch_candles(market, Timeframe::D1, DAY_CANDLES_REQUIRED * 2)
            .await
        {
            Ok(Some(candles)) if candles.len() >= DAY_CANDLES_REQUIRED => candles,
            Ok(_) => return rejected,
            Err(e) => {
                warn!("组合扫描拉取日线失败: {}: {}", market, e);
                return rejected;
            }
        };
        let quote_volume_estimates: Vec<f64> = day
            .iter()
            .map(CandleItem::quote_volume_estimate)
            .collect();
        let average_volume = tail(&ema(&quote_volume_estimates, AVERAGE_VOLUME_EMA_PERIOD))
            .unwrap_or(0.0);
        if average_volume < agent.minimum_average_volume {
            return rejected;
        }

        let trend = tail(&vdx(&day, TREND_VDX_PERIOD));
        let window_start = day.len().saturating_sub(TREND_VDX_PERIOD);
        let price_level =
            tail(&rsi(&day[window_start..], PRICE_LEVEL_RSI_PERIOD)).map(|v| v / 100.0);

        MarketVerdict {
            market: market.to_string(),
            can_trade: true,
            trend,
            price_level,
            sigma: Some(gbm.sigma),
            mu: Some(gbm.mu),
        }
    }

    /// 结论深合并进market_settings，保留该市场既有的选项覆盖
    fn persist_verdict(agent: &mut TradingAgentEntity, verdict: &MarketVerdict) {
        if !agent.strategy_options.is_object() {
            agent.strategy_options = json!({});
        }
        let entry = json!({
            "can_trade": verdict.can_trade,
            "trend": verdict.trend,
            "price_level": verdict.price_level,
            "sigma": verdict.sigma,
            "mu": verdict.mu,
        });
        let mut settings = serde_json::Map::new();
        settings.insert(verdict.market.clone(), entry);
        let mut patch = serde_json::Map::new();
        patch.insert(
            "market_settings".to_string(),
            serde_json::Value::Object(settings),
        );
        deep_merge(
            &mut agent.strategy_options,
            &serde_json::Value::Object(patch),
        );
    }
}
