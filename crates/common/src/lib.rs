//! # Spot Maker Common
//!
//! 公共类型、工具函数和统一错误定义

pub mod errors;
pub mod types;
pub mod utils;

// 重新导出常用类型
pub use errors::{EngineError, Result};
pub use types::*;
