//! 交易代理更新任务
//!
//! 每个代理一条重复任务（name相同、data按agent_id区分），
//! 任务锁保证同一代理至多一次并发运行

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use spot_maker_domain::traits::TradingAgentRepository;
use spot_maker_services::AgentRunService;

use crate::scheduler::{JobOrchestrator, JobProcessor};

pub const AGENT_UPDATE_JOB: &str = "agent_update";

/// 代理更新处理器
pub struct AgentUpdateProcessor {
    service: Arc<AgentRunService>,
}

impl AgentUpdateProcessor {
    pub fn new(service: Arc<AgentRunService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl JobProcessor for AgentUpdateProcessor {
    async fn process(&self, data: &serde_json::Value) -> Result<()> {
        let agent_id = data
            .get("agent_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow!("任务数据缺少agent_id"))?;
        self.service.run_agent(agent_id).await
    }
}

/// 注册处理器并为每个代理建立重复更新任务
pub async fn schedule_agent_jobs(
    orchestrator: &JobOrchestrator,
    agents: Arc<dyn TradingAgentRepository>,
    service: Arc<AgentRunService>,
    interval_ms: i64,
) -> Result<usize> {
    orchestrator
        .register_processor(AGENT_UPDATE_JOB, Arc::new(AgentUpdateProcessor::new(service)))
        .await;

    let all = agents.find_all().await?;
    for agent in &all {
        orchestrator
            .create_repeating_job(interval_ms, AGENT_UPDATE_JOB, json!({ "agent_id": agent.id }))
            .await?;
    }
    info!("代理更新任务已调度: {}个代理", all.len());
    Ok(all.len())
}
