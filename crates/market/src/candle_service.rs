//! K线服务
//!
//! 端口的fail-soft语义（限流/未知交易对返回None）原样向上传递，
//! 缓存只在数据足够新、足够长时命中

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use spot_maker_common::types::CandleItem;
use spot_maker_common::utils::now_mills;
use spot_maker_core::config::CandleCacheConfig;
use spot_maker_domain::enums::Timeframe;
use spot_maker_domain::traits::{ExchangeClient, ExchangeClientError};

struct CachedCandles {
    fetched_at: i64,
    candles: Vec<CandleItem>,
}

pub struct CandleService {
    client: Arc<dyn ExchangeClient>,
    cache: DashMap<(String, Timeframe), CachedCandles>,
    staleness: CandleCacheConfig,
}

impl CandleService {
    pub fn new(client: Arc<dyn ExchangeClient>) -> Self {
        Self {
            client,
            cache: DashMap::new(),
            staleness: CandleCacheConfig::from_env(),
        }
    }

    /// 默认新鲜度：周期的1/10，上限1分钟
    fn default_staleness_ms(timeframe: Timeframe) -> i64 {
        (timeframe.duration_ms() / 10).min(60_000)
    }

    /// 拉取最近limit根K线（按时间升序）
    ///
    /// Ok(None) 表示端口fail-soft（限流/未知交易对），调用方必须处理
    pub async fn fetch_candles(
        &self,
        market: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Option<Vec<CandleItem>>, ExchangeClientError> {
        let key = (market.to_string(), timeframe);
        let staleness = self
            .staleness
            .staleness_ms(timeframe.as_str(), Self::default_staleness_ms(timeframe));
        let now = now_mills();

        if let Some(cached) = self.cache.get(&key) {
            if now - cached.fetched_at <= staleness && cached.candles.len() >= limit {
                let tail_start = cached.candles.len() - limit;
                debug!(
                    "K线缓存命中: {} {} ({}根)",
                    market,
                    timeframe.as_str(),
                    limit
                );
                return Ok(Some(cached.candles[tail_start..].to_vec()));
            }
        }

        let fetched = self
            .client
            .fetch_ohlcv(market, timeframe, None, Some(limit))
            .await?;

        match fetched {
            Some(candles) => {
                debug!(
                    "K线拉取成功: {} {} ({}根)",
                    market,
                    timeframe.as_str(),
                    candles.len()
                );
                self.cache.insert(
                    key,
                    CachedCandles {
                        fetched_at: now,
                        candles: candles.clone(),
                    },
                );
                Ok(Some(candles))
            }
            None => {
                debug!("K线拉取fail-soft: {} {}", market, timeframe.as_str());
                Ok(None)
            }
        }
    }

    /// 最小周期的最新一根K线，模拟成交用
    pub async fn latest_candle(
        &self,
        market: &str,
    ) -> Result<Option<CandleItem>, ExchangeClientError> {
        let candles = self
            .fetch_candles(market, Timeframe::smallest(), 1)
            .await?;
        Ok(candles.and_then(|c| c.last().copied()))
    }

    /// 清空缓存（优雅关闭时调用）
    pub fn clear(&self) {
        self.cache.clear();
    }
}
