//! 仓储实现

pub mod memory;

pub use memory::*;
