pub mod job_orchestrator;

pub use job_orchestrator::{JobOrchestrator, JobProcessor, OrchestratorConfig};
