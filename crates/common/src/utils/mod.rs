//! 工具函数模块

pub mod ids;
pub mod math;
pub mod time;

// 重新导出常用函数
pub use ids::*;
pub use math::*;
pub use time::*;
