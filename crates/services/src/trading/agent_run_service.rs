//! 单次代理运行服务
//!
//! 装配一次运行（实体加载 → 镜像 → 策略 → 逐市场tick），
//! 运行后执行回撤保护、落库事件并乐观保存实体。
//! 市场级错误隔离在市场内，代理级错误中止本次tick

use std::sync::Arc;

use anyhow::{anyhow, Result};
use serde_json::json;
use tracing::{error, info, warn};

use spot_maker_common::utils::now_mills;
use spot_maker_common::EngineError;
use spot_maker_domain::entities::{event_types, EngineEvent};
use spot_maker_domain::traits::{
    EventRepository, ExchangeClient, ExchangeRepository, TradingAgentRepository,
};
use spot_maker_execution::ExchangeMirror;
use spot_maker_market::CandleService;
use spot_maker_strategies::{StrategyDeps, StrategyFactory};

pub struct AgentRunService {
    agents: Arc<dyn TradingAgentRepository>,
    exchanges: Arc<dyn ExchangeRepository>,
    events: Arc<dyn EventRepository>,
    /// 客户端解析器：默认走工厂缓存，测试时注入桩
    client_resolver: Box<dyn Fn(&str, &str) -> Result<Arc<dyn ExchangeClient>> + Send + Sync>,
}

impl AgentRunService {
    pub fn new(
        agents: Arc<dyn TradingAgentRepository>,
        exchanges: Arc<dyn ExchangeRepository>,
        events: Arc<dyn EventRepository>,
    ) -> Self {
        Self {
            agents,
            exchanges,
            events,
            client_resolver: Box::new(|exchange_id, exchange_name| {
                spot_maker_infrastructure::ExchangeClientFactory::cached(
                    exchange_id,
                    exchange_name,
                )
            }),
        }
    }

    pub fn with_client_resolver(
        mut self,
        resolver: impl Fn(&str, &str) -> Result<Arc<dyn ExchangeClient>> + Send + Sync + 'static,
    ) -> Self {
        self.client_resolver = Box::new(resolver);
        self
    }

    /// 执行一个代理的完整更新周期
    pub async fn run_agent(&self, agent_id: &str) -> Result<()> {
        let mut agent = self
            .agents
            .find_by_id(agent_id)
            .await?
            .ok_or_else(|| EngineError::EntityNotFound {
                kind: "tradingagent",
                id: agent_id.to_string(),
            })?;

        // 回撤保护触发后的代理不再下任何订单，直到运维清除paused
        if agent.paused {
            info!("代理处于暂停状态，跳过运行: {}", agent_id);
            return Ok(());
        }

        let exchange = self
            .exchanges
            .find_by_id(&agent.exchange_id)
            .await?
            .ok_or_else(|| EngineError::EntityNotFound {
                kind: "exchange",
                id: agent.exchange_id.clone(),
            })?;

        let client = (self.client_resolver)(&exchange.id, &exchange.name)?;
        let candle_service = Arc::new(CandleService::new(Arc::clone(&client)));
        let exchange_id = exchange.id.clone();

        let mut strategy = StrategyFactory::create(
            &agent.strategy,
            StrategyDeps {
                agent: agent.clone(),
                exchange,
                client: Arc::clone(&client),
                candle_service,
            },
        )?;

        if !strategy.before_run().await? {
            warn!("策略准备未通过，中止本次运行: {}", agent_id);
            return Ok(());
        }

        let markets = strategy.active_markets();
        for market in &markets {
            // 市场级错误隔离：单个市场失败不拖垮整次运行
            if let Err(e) = strategy.run_for_market(market).await {
                error!("市场tick失败: {} {}: {}", agent_id, market, e);
                self.events
                    .append(EngineEvent::new(
                        "market_tick_failed",
                        json!({ "agent": agent_id, "market": market, "error": e.to_string() }),
                        &exchange_id,
                        now_mills(),
                    ))
                    .await
                    .ok();
            }
        }

        let outcome = strategy.finish();
        agent.strategy_state = outcome.strategy_state;

        // 回撤保护：活跃市场的基础币 + fiat 估值
        let mirror = ExchangeMirror::new(outcome.exchange, Arc::clone(&client));
        let mut currencies: Vec<String> = markets
            .iter()
            .map(|m| m.split('/').next().unwrap_or(m).to_string())
            .collect();
        currencies.push(agent.fiat_currency.clone());
        currencies.dedup();
        let total = mirror.get_total_balance(false, Some(&currencies), true);
        let (exchange_entity, _) = mirror.into_parts();

        let mut drawdown_event = None;
        if let Some(total) = total {
            if total > agent.peak_market_amount {
                agent.peak_market_amount = total;
            }
            let peak = agent.peak_market_amount;
            if peak > 0.0 && (peak - total) / peak > agent.max_drawdown {
                warn!(
                    "触发最大回撤保护: {} peak={:.6} current={:.6}",
                    agent_id, peak, total
                );
                agent.paused = true;
                drawdown_event = Some(EngineEvent::new(
                    event_types::MAX_DRAWDOWN_REACHED,
                    json!({ "peak": peak, "currentTotal": total }),
                    &exchange_id,
                    now_mills(),
                ));
            }
        }

        // 落库：事件 → 交易所镜像 → 代理
        for event in outcome.events {
            self.events.append(event).await.ok();
        }
        if let Some(event) = drawdown_event {
            self.events.append(event).await.ok();
        }

        self.exchanges
            .save(&exchange_entity)
            .await
            .map_err(|e| anyhow!("交易所实体保存失败: {}", e))?;

        self.agents
            .save(&agent)
            .await
            .map_err(|e| anyhow!("代理实体保存失败: {}", e))?;

        info!("代理运行完成: {}", agent_id);
        Ok(())
    }
}
