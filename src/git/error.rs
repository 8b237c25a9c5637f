use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("Not a git repository")]
    NotARepository,
    #[error("A branch named '{0}' already exists")]
    AlreadyExists(String),
    #[error("'{0}' is not a valid branch name")]
    InvalidName(String),
    #[error("No workspace folder is open")]
    NoWorkspace,
    #[error("Failed to create branch: {0}")]
    CreateFailed(String),
    #[error("Failed to switch branch: {0}")]
    SwitchFailed(String),
}

impl RepositoryError {
    /// Maps git's stderr for a failed create or switch onto an error variant.
    pub fn from_git_stderr(name: &str, stderr: &str, creating: bool) -> Self {
        let lower = stderr.to_lowercase();
        if lower.contains("already exists") {
            Self::AlreadyExists(name.to_string())
        } else if lower.contains("not a git repository") {
            Self::NotARepository
        } else if lower.contains("not a valid branch name") || lower.contains("is not a valid") {
            Self::InvalidName(name.to_string())
        } else if creating {
            Self::CreateFailed(stderr.trim().to_string())
        } else {
            Self::SwitchFailed(stderr.trim().to_string())
        }
    }
}
