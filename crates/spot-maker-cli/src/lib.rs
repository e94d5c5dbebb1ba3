//! # Spot Maker CLI
//!
//! 做市引擎主程序入口

pub mod app;

use anyhow::Result;
use dotenv::dotenv;
use tracing::{error, info};

/// 应用初始化：环境变量与日志
pub fn app_init() -> Result<()> {
    dotenv().ok();
    spot_maker_core::logger::setup_logging()?;
    info!("应用初始化完成");
    Ok(())
}

/// 运行主程序 - 委托给 app::bootstrap
pub async fn run() -> Result<()> {
    app::bootstrap::run().await
}

/// 优雅关闭：先停编排器，再清进程级缓存与注册表
pub async fn graceful_shutdown(
    orchestrator: std::sync::Arc<spot_maker_orchestration::JobOrchestrator>,
) -> Result<()> {
    let manager = spot_maker_core::config::ShutdownManager::new(
        spot_maker_core::config::ShutdownConfig {
            total_timeout: std::time::Duration::from_secs(30),
            hook_timeout: std::time::Duration::from_secs(20),
            force_exit_on_timeout: false,
        },
    );

    {
        let orchestrator = std::sync::Arc::clone(&orchestrator);
        manager
            .register_shutdown_hook("orchestrator_stop".to_string(), move || {
                let orchestrator = std::sync::Arc::clone(&orchestrator);
                async move {
                    orchestrator.stop().await;
                    Ok(())
                }
            })
            .await;
    }

    manager
        .register_shutdown_hook("exchange_client_cache".to_string(), || async {
            spot_maker_infrastructure::ExchangeClientFactory::clear_cache();
            Ok(())
        })
        .await;

    manager
        .register_shutdown_hook("strategy_registry".to_string(), || async {
            spot_maker_strategies::StrategyFactory::clear();
            Ok(())
        })
        .await;

    if let Err(e) = manager.shutdown().await {
        error!("优雅关闭失败: {}", e);
        return Err(e);
    }
    info!("应用已优雅退出");
    Ok(())
}
