pub mod agent_job;

pub use agent_job::*;
