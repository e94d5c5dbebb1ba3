//! # Spot Maker Domain
//!
//! 领域层：持久化实体、枚举和端口定义
//! 遵循依赖倒置原则：services/orchestration 依赖本层接口，infrastructure 提供实现

pub mod entities;
pub mod enums;
pub mod traits;

// 重新导出常用类型
pub use entities::*;
pub use enums::*;
pub use traits::*;
