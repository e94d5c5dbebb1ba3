//! 策略领域接口

use anyhow::Result;
use async_trait::async_trait;

use crate::entities::{EngineEvent, ExchangeEntity, StrategyState};

/// 一次策略运行的产出：镜像状态 + 策略状态 + 运行期间产生的事件
pub struct StrategyRunOutcome {
    pub exchange: ExchangeEntity,
    pub strategy_state: StrategyState,
    pub events: Vec<EngineEvent>,
}

/// 策略接口 - 每次代理运行构造一个实例，运行结束后回收状态
///
/// 镜像在一次运行内由策略实例独占；市场内的对账步骤保持文档化顺序，
/// 跨市场顺序不做保证，策略不得依赖它
#[async_trait]
pub trait Strategy: Send {
    /// 策略名称
    fn name(&self) -> &str;

    /// 运行前准备：刷新活跃市场集与总额。返回false表示本次运行应中止
    async fn before_run(&mut self) -> Result<bool>;

    /// 当前活跃市场集
    fn active_markets(&self) -> Vec<String>;

    /// 执行单个市场的完整tick。市场内错误应被隔离，不应使整次运行失败
    async fn run_for_market(&mut self, market: &str) -> Result<()>;

    /// 回收运行产物（镜像实体、策略状态、事件）
    fn finish(self: Box<Self>) -> StrategyRunOutcome;
}
