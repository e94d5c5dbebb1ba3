//! 领域端口定义

pub mod exchange_client;
pub mod repository_trait;
pub mod strategy_trait;

pub use exchange_client::*;
pub use repository_trait::*;
pub use strategy_trait::*;
