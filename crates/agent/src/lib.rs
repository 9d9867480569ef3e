//! Turn orchestration for Bruin: history merging and the provider tool loop.

pub mod merge;
pub mod orchestrator;

pub use merge::merge_histories;
pub use orchestrator::Orchestrator;
