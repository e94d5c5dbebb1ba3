//! 公共类型定义

pub mod candle_types;

// 重新导出
pub use candle_types::*;
