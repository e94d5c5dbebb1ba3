//! 交易所适配器

pub mod factory;
pub mod paper_adapter;

pub use factory::*;
pub use paper_adapter::*;
