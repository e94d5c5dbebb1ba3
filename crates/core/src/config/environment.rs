//! 引擎环境配置
//!
//! 启动时把环境变量一次性装配成类型化配置，避免解析逻辑散落在调用方。
//! 未设置或无法解析的变量一律落回代码默认值

use std::collections::HashMap;
use std::env;

/// 缓存服务支持的时间周期
const CACHED_TIMEFRAMES: [&str; 5] = ["1m", "5m", "15m", "1h", "1d"];

/// K线缓存新鲜度配置
///
/// 查询顺序：周期专属（CANDLE_CACHE_STALENESS_1H_MS 等）→
/// 全局（CANDLE_CACHE_STALENESS_MS）→ 调用方默认值
#[derive(Debug, Clone, Default)]
pub struct CandleCacheConfig {
    global_ms: Option<i64>,
    per_timeframe_ms: HashMap<String, i64>,
}

impl CandleCacheConfig {
    pub fn from_env() -> Self {
        let mut per_timeframe_ms = HashMap::new();
        for timeframe in CACHED_TIMEFRAMES {
            let key = format!("CANDLE_CACHE_STALENESS_{}_MS", timeframe.to_uppercase());
            if let Some(ms) = read_millis(&key) {
                per_timeframe_ms.insert(timeframe.to_string(), ms);
            }
        }
        Self {
            global_ms: read_millis("CANDLE_CACHE_STALENESS_MS"),
            per_timeframe_ms,
        }
    }

    pub fn staleness_ms(&self, timeframe: &str, default_ms: i64) -> i64 {
        self.per_timeframe_ms
            .get(timeframe)
            .copied()
            .or(self.global_ms)
            .unwrap_or(default_ms)
    }
}

/// 引擎运行配置
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// 运行环境；local时默认开启演示种子
    pub app_env: String,
    /// 启动时种一个纸面交易所与演示代理
    pub seed_paper_agent: bool,
    /// 启动时跑一轮组合配置器
    pub run_allocator: bool,
    /// 调度代理更新任务
    pub run_agent_jobs: bool,
    /// 代理更新间隔（毫秒）
    pub agent_update_interval_ms: i64,
    /// K线缓存新鲜度
    pub candle_cache: CandleCacheConfig,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
        let is_local = app_env == "local";
        Self {
            seed_paper_agent: read_flag("SEED_PAPER_AGENT").unwrap_or(is_local),
            run_allocator: read_flag("IS_RUN_ALLOCATOR").unwrap_or(false),
            run_agent_jobs: read_flag("IS_RUN_AGENT_JOBS").unwrap_or(true),
            agent_update_interval_ms: read_millis("AGENT_UPDATE_INTERVAL_MS").unwrap_or(30_000),
            candle_cache: CandleCacheConfig::from_env(),
            app_env,
        }
    }

    pub fn is_local(&self) -> bool {
        self.app_env == "local"
    }
}

/// 开关型变量：1/true/yes/on 与 0/false/no/off；其余内容视为未设置
fn read_flag(key: &str) -> Option<bool> {
    let raw = env::var(key).ok()?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// 毫秒型变量：负值与不可解析的内容视为未设置
fn read_millis(key: &str) -> Option<i64> {
    let raw = env::var(key).ok()?;
    raw.trim().parse::<i64>().ok().filter(|ms| *ms >= 0)
}
