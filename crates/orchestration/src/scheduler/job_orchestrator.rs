//! 任务编排器
//!
//! 轮询任务存储中到期的任务，通过locked_at原子抢占后派发给
//! 注册的处理器。锁超过存活期（处理器崩溃）后可被回收。
//! 停机时停止轮询并等待在途任务收尾

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use spot_maker_common::utils::{local_order_id, now_mills};
use spot_maker_domain::entities::Job;
use spot_maker_domain::traits::JobRepository;

/// 任务处理器接口
#[async_trait]
pub trait JobProcessor: Send + Sync {
    async fn process(&self, data: &serde_json::Value) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// 轮询间隔
    pub poll_interval: Duration,
    /// 锁存活期（毫秒），超过后视为处理器崩溃可回收
    pub lock_lifetime_ms: i64,
    /// 单次轮询最多抢占的任务数
    pub batch_size: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            lock_lifetime_ms: 10 * 3_600_000,
            batch_size: 16,
        }
    }
}

struct Inner {
    jobs: Arc<dyn JobRepository>,
    processors: Mutex<HashMap<String, Arc<dyn JobProcessor>>>,
    config: OrchestratorConfig,
    /// 在途任务句柄，停机时逐个等待
    in_flight: Mutex<Vec<JoinHandle<()>>>,
}

pub struct JobOrchestrator {
    inner: Arc<Inner>,
    shutdown_tx: broadcast::Sender<()>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl JobOrchestrator {
    pub fn new(jobs: Arc<dyn JobRepository>, config: OrchestratorConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(4);
        Self {
            inner: Arc::new(Inner {
                jobs,
                processors: Mutex::new(HashMap::new()),
                config,
                in_flight: Mutex::new(Vec::new()),
            }),
            shutdown_tx,
            worker: Mutex::new(None),
        }
    }

    /// 注册处理器（启动期调用）
    pub async fn register_processor(&self, name: &str, processor: Arc<dyn JobProcessor>) {
        self.inner
            .processors
            .lock()
            .await
            .insert(name.to_string(), processor);
        info!("任务处理器已注册: {}", name);
    }

    /// 幂等创建重复任务：同名且data深度相等的任务已存在时跳过
    pub async fn create_repeating_job(
        &self,
        interval_ms: i64,
        name: &str,
        data: serde_json::Value,
    ) -> Result<()> {
        let existing = self.inner.jobs.find_by_name(name).await?;
        if existing.iter().any(|job| job.data == data) {
            return Ok(());
        }

        let mut job = Job::new(
            &format!("job-{}", local_order_id()),
            name,
            data,
            now_mills(),
        );
        job.repeat_interval = Some(interval_ms);
        self.inner.jobs.insert(job).await?;
        info!("重复任务已创建: {} (every {}ms)", name, interval_ms);
        Ok(())
    }

    /// 启动轮询循环
    pub async fn start(&self) -> Result<()> {
        let mut worker_slot = self.worker.lock().await;
        if worker_slot.is_some() {
            return Err(anyhow!("编排器已在运行"));
        }

        let inner = Arc::clone(&self.inner);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut interval = tokio::time::interval(inner.config.poll_interval);

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        Self::poll_once(&inner).await;
                    }
                    _ = shutdown_rx.recv() => {
                        info!("编排器收到停机信号，停止轮询");
                        break;
                    }
                }
            }
        });
        *worker_slot = Some(handle);
        info!("任务编排器已启动");
        Ok(())
    }

    /// 单轮：抢占到期任务并派发
    async fn poll_once(inner: &Arc<Inner>) {
        let now = now_mills();
        let due = match inner
            .jobs
            .find_due(now, inner.config.lock_lifetime_ms, inner.config.batch_size)
            .await
        {
            Ok(jobs) => jobs,
            Err(e) => {
                warn!("轮询任务失败: {}", e);
                return;
            }
        };

        for job in due {
            let claimed = match inner
                .jobs
                .claim(&job.id, now, inner.config.lock_lifetime_ms)
                .await
            {
                Ok(Some(job)) => job,
                Ok(None) => continue,
                Err(e) => {
                    warn!("任务抢占失败: {}: {}", job.id, e);
                    continue;
                }
            };

            let processor = inner.processors.lock().await.get(&claimed.name).cloned();
            let Some(processor) = processor else {
                warn!("任务缺少处理器: {}", claimed.name);
                let mut job = claimed;
                job.fail_run(now_mills(), "no processor registered");
                inner.jobs.save(&job).await.ok();
                continue;
            };

            let jobs_repo = Arc::clone(&inner.jobs);
            let handle = tokio::spawn(async move {
                Self::run_job(jobs_repo, processor, claimed).await;
            });
            inner.in_flight.lock().await.push(handle);
        }

        // 清理已完成的在途句柄
        inner.in_flight.lock().await.retain(|h| !h.is_finished());
    }

    async fn run_job(
        jobs: Arc<dyn JobRepository>,
        processor: Arc<dyn JobProcessor>,
        mut job: Job,
    ) {
        info!("任务开始: {} ({})", job.name, job.id);
        match processor.process(&job.data).await {
            Ok(()) => {
                job.finish_run(now_mills());
                info!("任务完成: {} ({})", job.name, job.id);
            }
            Err(e) => {
                error!("任务失败: {} ({}): {}", job.name, job.id, e);
                job.fail_run(now_mills(), &e.to_string());
            }
        }
        if let Err(e) = jobs.save(&job).await {
            error!("任务状态保存失败: {}: {}", job.id, e);
        }
    }

    /// 优雅停机：停止轮询，等待在途任务收尾
    pub async fn stop(&self) {
        let _ = self.shutdown_tx.send(());
        if let Some(worker) = self.worker.lock().await.take() {
            let _ = worker.await;
        }
        let handles: Vec<JoinHandle<()>> =
            std::mem::take(&mut *self.inner.in_flight.lock().await);
        for handle in handles {
            let _ = handle.await;
        }
        info!("任务编排器已停止");
    }
}
