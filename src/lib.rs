pub mod ai;
pub mod branch;
pub mod config;
pub mod git;
pub mod ui;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use ai::{GenerationClient, GenerationError};
pub use branch::{BranchCreationController, FlowOutcome, SuggestionSource};
pub use config::{GenerationConfig, Settings};
pub use git::{GitRepository, VersionControl};
