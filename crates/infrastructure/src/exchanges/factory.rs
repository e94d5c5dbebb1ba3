//! 交易所客户端工厂与进程级缓存
//!
//! 缓存按exchange_id键控，启动时填充；关闭时显式清空，
//! 避免惰性全局构造带来的不确定析构顺序

use std::sync::Arc;

use anyhow::{anyhow, Result};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use tracing::info;

use spot_maker_domain::traits::ExchangeClient;

use super::PaperExchangeClient;

pub type SharedExchangeClient = Arc<dyn ExchangeClient>;

/// 进程级客户端缓存（exchange_id -> client）
static CLIENT_CACHE: Lazy<DashMap<String, SharedExchangeClient>> = Lazy::new(DashMap::new);

/// 交易所客户端工厂
pub struct ExchangeClientFactory;

impl ExchangeClientFactory {
    /// 按交易所名称创建客户端
    pub fn create(exchange_name: &str) -> Result<SharedExchangeClient> {
        match exchange_name.to_lowercase().as_str() {
            "paper" => Ok(Arc::new(PaperExchangeClient::new("paper"))),
            // 真实交易所适配器在部署侧注册：
            // "binance" => Ok(Arc::new(BinanceAdapter::from_env()?)),
            _ => Err(anyhow!("不支持的交易所: {}", exchange_name)),
        }
    }

    /// 取缓存的客户端，不存在则创建并缓存
    pub fn cached(exchange_id: &str, exchange_name: &str) -> Result<SharedExchangeClient> {
        if let Some(client) = CLIENT_CACHE.get(exchange_id) {
            return Ok(Arc::clone(&client));
        }
        let client = Self::create(exchange_name)?;
        CLIENT_CACHE.insert(exchange_id.to_string(), Arc::clone(&client));
        info!("交易所客户端已缓存: {} ({})", exchange_id, exchange_name);
        Ok(client)
    }

    /// 手工注册客户端（启动期注入自定义适配器）
    pub fn register(exchange_id: &str, client: SharedExchangeClient) {
        CLIENT_CACHE.insert(exchange_id.to_string(), client);
    }

    /// 清空缓存（优雅关闭钩子）
    pub fn clear_cache() {
        CLIENT_CACHE.clear();
        info!("交易所客户端缓存已清空");
    }
}
