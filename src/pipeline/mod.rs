pub mod export;
pub mod ingestion;
pub mod loader;
pub mod orchestrator;
pub mod processing;
pub mod run;
pub mod storage;
pub mod warehouse;

pub use orchestrator::{Pipeline, RunOptions};
pub use run::{PipelineRun, RunSummary};
