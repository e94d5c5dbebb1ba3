use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

/// 优雅停止管理器
///
/// 关闭顺序由注册顺序决定：先停任务编排器，再清理进程级缓存
pub struct ShutdownManager {
    /// 是否正在关闭
    is_shutting_down: Arc<AtomicBool>,
    /// 关闭回调函数列表（带名称，便于定位超时的钩子）
    shutdown_hooks: Arc<RwLock<Vec<(String, ShutdownHook)>>>,
    config: ShutdownConfig,
}

/// 关闭回调函数
pub type ShutdownHook = Box<
    dyn Fn() -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send>>
        + Send
        + Sync,
>;

/// 关闭配置
#[derive(Debug, Clone)]
pub struct ShutdownConfig {
    /// 总超时时间
    pub total_timeout: Duration,
    /// 每个钩子的超时时间
    pub hook_timeout: Duration,
    /// 超时后是否强制退出进程
    pub force_exit_on_timeout: bool,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            total_timeout: Duration::from_secs(30),
            hook_timeout: Duration::from_secs(10),
            force_exit_on_timeout: true,
        }
    }
}

impl ShutdownManager {
    pub fn new(config: ShutdownConfig) -> Self {
        Self {
            is_shutting_down: Arc::new(AtomicBool::new(false)),
            shutdown_hooks: Arc::new(RwLock::new(Vec::new())),
            config,
        }
    }

    pub fn new_default() -> Self {
        Self::new(ShutdownConfig::default())
    }

    /// 检查是否正在关闭
    pub fn is_shutting_down(&self) -> bool {
        self.is_shutting_down.load(Ordering::Acquire)
    }

    /// 获取关闭状态的原子引用
    pub fn shutdown_signal(&self) -> Arc<AtomicBool> {
        self.is_shutting_down.clone()
    }

    /// 注册关闭回调
    pub async fn register_shutdown_hook<F, Fut>(&self, name: String, hook: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        let boxed_hook: ShutdownHook = Box::new(move || Box::pin(hook()));
        let mut hooks = self.shutdown_hooks.write().await;
        info!("注册关闭回调: {}", name);
        hooks.push((name, boxed_hook));
    }

    /// 执行优雅关闭
    pub async fn shutdown(&self) -> Result<()> {
        if self
            .is_shutting_down
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("关闭已在进行中");
            return Ok(());
        }

        info!("开始执行优雅关闭，总超时: {:?}", self.config.total_timeout);
        let start_time = std::time::Instant::now();

        let shutdown_result =
            tokio::time::timeout(self.config.total_timeout, self.execute_shutdown_hooks()).await;

        match shutdown_result {
            Ok(Ok(())) => {
                info!("优雅关闭完成，耗时: {:?}", start_time.elapsed());
                Ok(())
            }
            Ok(Err(e)) => {
                error!("关闭过程中发生错误: {}", e);
                if self.config.force_exit_on_timeout {
                    error!("强制退出程序");
                    std::process::exit(1);
                }
                Err(e)
            }
            Err(_) => {
                error!("关闭超时 ({:?})", self.config.total_timeout);
                if self.config.force_exit_on_timeout {
                    std::process::exit(1);
                }
                Err(anyhow::anyhow!("关闭超时"))
            }
        }
    }

    /// 逐个执行关闭回调，失败不中断后续回调
    async fn execute_shutdown_hooks(&self) -> Result<()> {
        let hooks = self.shutdown_hooks.read().await;
        if hooks.is_empty() {
            info!("没有注册的关闭回调");
            return Ok(());
        }

        info!("执行 {} 个关闭回调", hooks.len());
        for (name, hook) in hooks.iter() {
            let hook_start = std::time::Instant::now();
            match tokio::time::timeout(self.config.hook_timeout, hook()).await {
                Ok(Ok(())) => {
                    info!("关闭回调 {} 完成，耗时: {:?}", name, hook_start.elapsed());
                }
                Ok(Err(e)) => {
                    error!("关闭回调 {} 失败: {}", name, e);
                }
                Err(_) => {
                    error!("关闭回调 {} 超时 ({:?})", name, self.config.hook_timeout);
                }
            }
        }
        Ok(())
    }
}
