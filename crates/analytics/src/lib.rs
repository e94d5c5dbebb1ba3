//! # Spot Maker Analytics
//!
//! 量化模型层：GBM参数估计、成交强度估计、最优报价

pub mod gbm;
pub mod market_dynamics;
pub mod quoting;

pub use gbm::*;
pub use market_dynamics::*;
pub use quoting::*;
