//! # Spot Maker Indicators
//!
//! 技术指标库。所有指标接收有序序列，返回与输入等长的向量，
//! 序列不足时前段给出退化值而不是截断

pub mod momentum;
pub mod returns;
pub mod trend;
pub mod volatility;

pub use momentum::*;
pub use returns::*;
pub use trend::*;
pub use volatility::*;

/// 序列末值，指标消费方最常用的读数
pub fn tail(values: &[f64]) -> Option<f64> {
    values.last().copied()
}
