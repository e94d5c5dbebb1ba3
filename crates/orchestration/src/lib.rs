//! # Spot Maker Orchestration
//!
//! 任务编排：轮询持久化任务存储、按任务名互斥抢占、优雅停机

pub mod jobs;
pub mod scheduler;

pub use jobs::*;
pub use scheduler::*;
