pub mod agent_run_service;

pub use agent_run_service::AgentRunService;
