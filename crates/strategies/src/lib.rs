//! # Spot Maker Strategies
//!
//! 做市策略：入场/离场门控、双边报价、交易代理状态机与策略注册表

pub mod agent;
pub mod context;
pub mod entry;
pub mod exit;
pub mod factory;
pub mod market_maker;
pub mod options;

pub use agent::MarketMakingStrategy;
pub use factory::{StrategyDeps, StrategyFactory, MARKET_MAKING_STRATEGY};
pub use options::{
    resolve_options, EntryOptions, ExitOptions, MarketMakerOptions, StrategyOptions,
};
