//! # 应用启动引导模块
//!
//! 装配仓储、注册策略与任务处理器，按环境变量编排运行模式

use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info, warn};

use spot_maker_core::config::EngineConfig;
use spot_maker_domain::entities::{ExchangeEntity, TradingAgentEntity};
use spot_maker_domain::traits::{
    EventRepository, ExchangeRepository, JobRepository, TradingAgentRepository,
};
use spot_maker_infrastructure::{
    ExchangeClientFactory, MemoryEventRepository, MemoryExchangeRepository,
    MemoryJobRepository, MemoryTradingAgentRepository,
};
use spot_maker_market::CandleService;
use spot_maker_orchestration::{schedule_agent_jobs, JobOrchestrator, OrchestratorConfig};
use spot_maker_services::{AgentRunService, AllocatorService};
use spot_maker_strategies::{StrategyFactory, MARKET_MAKING_STRATEGY};

/// 装配好的仓储集
struct Repositories {
    exchanges: Arc<dyn ExchangeRepository>,
    agents: Arc<dyn TradingAgentRepository>,
    events: Arc<dyn EventRepository>,
    jobs: Arc<dyn JobRepository>,
}

fn build_repositories() -> Repositories {
    Repositories {
        exchanges: Arc::new(MemoryExchangeRepository::new()),
        agents: Arc::new(MemoryTradingAgentRepository::new()),
        events: Arc::new(MemoryEventRepository::new()),
        jobs: Arc::new(MemoryJobRepository::new()),
    }
}

/// 本地演示用：种一个纸面交易所和对应代理
async fn seed_paper_agent(repos: &Repositories) -> Result<()> {
    let mut exchange = ExchangeEntity::new("paper-1", "paper", "ETH", 0.001, true);
    exchange.version = repos.exchanges.save(&exchange).await?;

    let mut agent =
        TradingAgentEntity::new("agent-1", "paper-1", MARKET_MAKING_STRATEGY, "ETH");
    agent.version = repos.agents.save(&agent).await?;

    info!("🧪 已创建演示代理: agent-1 (paper-1)");
    Ok(())
}

/// 组合配置器运行一轮
async fn run_allocator_once(repos: &Repositories) -> Result<()> {
    let agents = repos.agents.find_all().await?;
    for mut agent in agents {
        let Some(exchange) = repos.exchanges.find_by_id(&agent.exchange_id).await? else {
            warn!("代理引用的交易所不存在: {}", agent.exchange_id);
            continue;
        };
        let client = ExchangeClientFactory::cached(&exchange.id, &exchange.name)?;
        let candles = Arc::new(CandleService::new(Arc::clone(&client)));
        let allocator = AllocatorService::new(client, candles);

        match allocator.allocate(&mut agent).await {
            Ok(markets) => {
                info!("✅ 组合配置完成: {} -> {:?}", agent.id, markets);
                if let Err(e) = repos.agents.save(&agent).await {
                    error!("❌ 代理保存失败: {}: {}", agent.id, e);
                }
            }
            Err(e) => error!("❌ 组合配置失败: {}: {}", agent.id, e),
        }
    }
    Ok(())
}

/// 应用入口总编排
pub async fn run() -> Result<()> {
    let config = EngineConfig::from_env();
    info!("🕐 应用环境: {}", config.app_env);

    let repos = build_repositories();

    // 注册内置策略（进程级注册表，仅启动期写入）
    StrategyFactory::register_builtins();

    // 本地演示模式
    if config.seed_paper_agent {
        seed_paper_agent(&repos).await?;
    }

    // 1) 组合配置器
    if config.run_allocator {
        info!("📡 启动组合配置器");
        if let Err(e) = run_allocator_once(&repos).await {
            error!("❌ 组合配置器失败: {}", e);
        }
    }

    // 2) 代理更新任务
    let orchestrator = Arc::new(JobOrchestrator::new(
        Arc::clone(&repos.jobs),
        OrchestratorConfig::default(),
    ));
    if config.run_agent_jobs {
        let service = Arc::new(AgentRunService::new(
            Arc::clone(&repos.agents),
            Arc::clone(&repos.exchanges),
            Arc::clone(&repos.events),
        ));
        let count = schedule_agent_jobs(
            &orchestrator,
            Arc::clone(&repos.agents),
            service,
            config.agent_update_interval_ms,
        )
        .await?;
        info!(
            "🤖 代理更新任务: {}个, 间隔{}ms",
            count, config.agent_update_interval_ms
        );
    }

    orchestrator.start().await?;
    info!("✅ 任务编排器已启动");

    // 心跳任务
    let heartbeat_handle = tokio::spawn(async {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(600));
        loop {
            interval.tick().await;
            info!("💓 程序正在运行中...");
        }
    });

    // 信号处理
    let signal_name = wait_for_shutdown_signal().await;
    info!("📡 接收到 {} 信号", signal_name);
    heartbeat_handle.abort();

    // 优雅关闭
    info!("🛑 开始优雅关闭...");
    crate::graceful_shutdown(orchestrator).await
}

/// 等待退出信号
async fn wait_for_shutdown_signal() -> &'static str {
    use tokio::signal;

    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to register SIGTERM handler");
        let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())
            .expect("Failed to register SIGINT handler");
        let mut sigquit = signal::unix::signal(signal::unix::SignalKind::quit())
            .expect("Failed to register SIGQUIT handler");

        tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
            _ = sigquit.recv() => "SIGQUIT",
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await.expect("Failed to listen for ctrl-c");
        "CTRL+C"
    }
}
