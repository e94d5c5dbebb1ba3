//! 仓储接口 - 定义数据访问的抽象
//!
//! 所有save均为乐观保存：实体携带version，版本不匹配时返回Conflict，
//! 保存成功后仓储返回新版本号由调用方写回实体

use anyhow::Result;
use async_trait::async_trait;

use crate::entities::{Candle, EngineEvent, ExchangeEntity, Job, TradingAgentEntity};
use crate::enums::Timeframe;

/// 交易所仓储接口
#[async_trait]
pub trait ExchangeRepository: Send + Sync {
    /// 根据ID查询
    async fn find_by_id(&self, id: &str) -> Result<Option<ExchangeEntity>>;

    /// 乐观保存，返回新版本号
    async fn save(&self, entity: &ExchangeEntity) -> Result<u64>;

    /// 删除
    async fn delete(&self, id: &str) -> Result<()>;
}

/// 交易代理仓储接口
#[async_trait]
pub trait TradingAgentRepository: Send + Sync {
    /// 根据ID查询
    async fn find_by_id(&self, id: &str) -> Result<Option<TradingAgentEntity>>;

    /// 查询全部代理
    async fn find_all(&self) -> Result<Vec<TradingAgentEntity>>;

    /// 乐观保存，返回新版本号
    async fn save(&self, entity: &TradingAgentEntity) -> Result<u64>;

    /// 删除
    async fn delete(&self, id: &str) -> Result<()>;
}

/// K线仓储接口
#[async_trait]
pub trait CandleRepository: Send + Sync {
    /// 查询K线（按时间升序）
    async fn find_candles(
        &self,
        exchange_name: &str,
        market: &str,
        timeframe: Timeframe,
        limit: Option<usize>,
    ) -> Result<Vec<Candle>>;

    /// 批量保存（按唯一键upsert），返回写入条数
    async fn save_candles(&self, candles: Vec<Candle>) -> Result<usize>;
}

/// 事件仓储接口（append-only）
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// 追加事件
    async fn append(&self, event: EngineEvent) -> Result<()>;

    /// 查询某交易所最近的事件（按时间降序）
    async fn find_recent(&self, exchange_id: &str, limit: usize) -> Result<Vec<EngineEvent>>;
}

/// 任务仓储接口
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// 根据ID查询
    async fn find_by_id(&self, id: &str) -> Result<Option<Job>>;

    /// 按名称查询
    async fn find_by_name(&self, name: &str) -> Result<Vec<Job>>;

    /// 查询到期且可抢占的任务（按priority降序、next_run_at升序）
    async fn find_due(&self, now: i64, lock_lifetime: i64, limit: usize) -> Result<Vec<Job>>;

    /// 原子抢占：仅当locked_at为空或超过lock_lifetime时设置locked_at=now。
    /// 返回抢占后的任务；抢占失败返回None
    async fn claim(&self, id: &str, now: i64, lock_lifetime: i64) -> Result<Option<Job>>;

    /// 乐观保存，返回新版本号
    async fn save(&self, job: &Job) -> Result<u64>;

    /// 插入新任务
    async fn insert(&self, job: Job) -> Result<()>;

    /// 删除
    async fn delete(&self, id: &str) -> Result<()>;
}
