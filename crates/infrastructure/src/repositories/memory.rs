//! 内存仓储
//!
//! DashMap承载的文档存储，带乐观保存：实体版本与存储版本不一致时
//! 返回Conflict，保存成功后版本+1。持久化后端替换时只需换掉本模块

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::RwLock;

use spot_maker_common::EngineError;
use spot_maker_domain::entities::{
    Candle, EngineEvent, ExchangeEntity, Job, TradingAgentEntity,
};
use spot_maker_domain::enums::Timeframe;
use spot_maker_domain::traits::{
    CandleRepository, EventRepository, ExchangeRepository, JobRepository, TradingAgentRepository,
};

/// 乐观版本检查：通过则返回下一个版本号
fn check_version(
    kind: &'static str,
    id: &str,
    stored: Option<u64>,
    incoming: u64,
) -> Result<u64, EngineError> {
    match stored {
        Some(v) if v != incoming => Err(EngineError::Conflict {
            kind,
            id: id.to_string(),
            expected: v,
        }),
        _ => Ok(incoming + 1),
    }
}

// ---------------------------------------------------------------------------
// Exchange
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryExchangeRepository {
    store: DashMap<String, ExchangeEntity>,
}

impl MemoryExchangeRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExchangeRepository for MemoryExchangeRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<ExchangeEntity>> {
        Ok(self.store.get(id).map(|e| e.clone()))
    }

    async fn save(&self, entity: &ExchangeEntity) -> Result<u64> {
        let next = check_version(
            "exchange",
            &entity.id,
            self.store.get(&entity.id).map(|e| e.version),
            entity.version,
        )?;
        let mut stored = entity.clone();
        stored.version = next;
        self.store.insert(entity.id.clone(), stored);
        Ok(next)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.store.remove(id);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TradingAgent
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryTradingAgentRepository {
    store: DashMap<String, TradingAgentEntity>,
}

impl MemoryTradingAgentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TradingAgentRepository for MemoryTradingAgentRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<TradingAgentEntity>> {
        Ok(self.store.get(id).map(|e| e.clone()))
    }

    async fn find_all(&self) -> Result<Vec<TradingAgentEntity>> {
        Ok(self.store.iter().map(|e| e.clone()).collect())
    }

    async fn save(&self, entity: &TradingAgentEntity) -> Result<u64> {
        let next = check_version(
            "tradingagent",
            &entity.id,
            self.store.get(&entity.id).map(|e| e.version),
            entity.version,
        )?;
        let mut stored = entity.clone();
        stored.version = next;
        self.store.insert(entity.id.clone(), stored);
        Ok(next)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.store.remove(id);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Candle
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryCandleRepository {
    store: DashMap<String, Candle>,
}

impl MemoryCandleRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CandleRepository for MemoryCandleRepository {
    async fn find_candles(
        &self,
        exchange_name: &str,
        market: &str,
        timeframe: Timeframe,
        limit: Option<usize>,
    ) -> Result<Vec<Candle>> {
        let mut candles: Vec<Candle> = self
            .store
            .iter()
            .filter(|c| {
                c.exchange_name == exchange_name
                    && c.market == market
                    && c.timeframe == timeframe
            })
            .map(|c| c.clone())
            .collect();
        candles.sort_by_key(|c| c.timestamp);
        if let Some(limit) = limit {
            let start = candles.len().saturating_sub(limit);
            candles.drain(..start);
        }
        Ok(candles)
    }

    async fn save_candles(&self, candles: Vec<Candle>) -> Result<usize> {
        let count = candles.len();
        for candle in candles {
            self.store.insert(candle.key(), candle);
        }
        Ok(count)
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryEventRepository {
    store: RwLock<Vec<EngineEvent>>,
}

impl MemoryEventRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventRepository for MemoryEventRepository {
    async fn append(&self, event: EngineEvent) -> Result<()> {
        self.store.write().await.push(event);
        Ok(())
    }

    async fn find_recent(&self, exchange_id: &str, limit: usize) -> Result<Vec<EngineEvent>> {
        let store = self.store.read().await;
        Ok(store
            .iter()
            .rev()
            .filter(|e| e.exchange_id == exchange_id)
            .take(limit)
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryJobRepository {
    store: DashMap<String, Job>,
}

impl MemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobRepository for MemoryJobRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Job>> {
        Ok(self.store.get(id).map(|j| j.clone()))
    }

    async fn find_by_name(&self, name: &str) -> Result<Vec<Job>> {
        Ok(self
            .store
            .iter()
            .filter(|j| j.name == name)
            .map(|j| j.clone())
            .collect())
    }

    async fn find_due(&self, now: i64, lock_lifetime: i64, limit: usize) -> Result<Vec<Job>> {
        let mut due: Vec<Job> = self
            .store
            .iter()
            .filter(|j| j.is_due(now) && j.is_claimable(now, lock_lifetime))
            .map(|j| j.clone())
            .collect();
        due.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.next_run_at.cmp(&b.next_run_at))
        });
        due.truncate(limit);
        Ok(due)
    }

    async fn claim(&self, id: &str, now: i64, lock_lifetime: i64) -> Result<Option<Job>> {
        // DashMap按键互斥，entry内检查加写入构成原子抢占
        match self.store.get_mut(id) {
            Some(mut job) => {
                if job.is_claimable(now, lock_lifetime) {
                    job.locked_at = Some(now);
                    job.last_run_at = Some(now);
                    job.version += 1;
                    Ok(Some(job.clone()))
                } else {
                    Ok(None)
                }
            }
            None => Ok(None),
        }
    }

    async fn save(&self, job: &Job) -> Result<u64> {
        let next = check_version(
            "job",
            &job.id,
            self.store.get(&job.id).map(|j| j.version),
            job.version,
        )?;
        let mut stored = job.clone();
        stored.version = next;
        self.store.insert(job.id.clone(), stored);
        Ok(next)
    }

    async fn insert(&self, job: Job) -> Result<()> {
        self.store.insert(job.id.clone(), job);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.store.remove(id);
        Ok(())
    }
}
