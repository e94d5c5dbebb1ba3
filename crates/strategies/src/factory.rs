//! 策略工厂
//!
//! 进程级注册表：启动时注册构造器，运行期只读。
//! 每次代理运行通过工厂构造一个全新的策略实例

use std::sync::Arc;

use anyhow::{anyhow, Result};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use tracing::info;

use spot_maker_domain::entities::{ExchangeEntity, TradingAgentEntity};
use spot_maker_domain::traits::{ExchangeClient, Strategy};
use spot_maker_market::CandleService;

use crate::agent::MarketMakingStrategy;

pub const MARKET_MAKING_STRATEGY: &str = "market_making";

/// 策略构造依赖
pub struct StrategyDeps {
    pub agent: TradingAgentEntity,
    pub exchange: ExchangeEntity,
    pub client: Arc<dyn ExchangeClient>,
    pub candle_service: Arc<CandleService>,
}

pub type StrategyCtor = fn(StrategyDeps) -> Box<dyn Strategy>;

static REGISTRY: Lazy<DashMap<String, StrategyCtor>> = Lazy::new(DashMap::new);

/// 策略工厂
pub struct StrategyFactory;

impl StrategyFactory {
    /// 注册策略构造器（仅启动期调用）
    pub fn register(name: &str, ctor: StrategyCtor) {
        REGISTRY.insert(name.to_string(), ctor);
        info!("策略已注册: {}", name);
    }

    /// 注册内置策略
    pub fn register_builtins() {
        Self::register(MARKET_MAKING_STRATEGY, |deps| {
            Box::new(MarketMakingStrategy::new(
                deps.agent,
                deps.exchange,
                deps.client,
                deps.candle_service,
            ))
        });
    }

    /// 按名称构造策略实例
    pub fn create(name: &str, deps: StrategyDeps) -> Result<Box<dyn Strategy>> {
        let ctor = REGISTRY
            .get(name)
            .map(|entry| *entry.value())
            .ok_or_else(|| anyhow!("未注册的策略: {}", name))?;
        Ok(ctor(deps))
    }

    /// 已注册策略名
    pub fn registered() -> Vec<String> {
        REGISTRY.iter().map(|e| e.key().clone()).collect()
    }

    /// 清空注册表（优雅关闭钩子）
    pub fn clear() {
        REGISTRY.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_create() {
        StrategyFactory::register_builtins();
        assert!(StrategyFactory::registered()
            .contains(&MARKET_MAKING_STRATEGY.to_string()));
        assert!(StrategyFactory::create("nope", make_deps()).is_err());
        let strategy = StrategyFactory::create(MARKET_MAKING_STRATEGY, make_deps()).unwrap();
        assert_eq!(strategy.name(), MARKET_MAKING_STRATEGY);
    }

    fn make_deps() -> StrategyDeps {
        let client: Arc<dyn ExchangeClient> =
            Arc::new(spot_maker_infrastructure::PaperExchangeClient::new("paper"));
        StrategyDeps {
            agent: TradingAgentEntity::new("a1", "ex1", MARKET_MAKING_STRATEGY, "ETH"),
            exchange: ExchangeEntity::new("ex1", "paper", "ETH", 0.001, true),
            client: Arc::clone(&client),
            candle_service: Arc::new(CandleService::new(client)),
        }
    }
}
