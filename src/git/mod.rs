use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument};

mod error;
pub mod runner;

pub use error::RepositoryError;
pub use runner::{CommandOutput, CommandRunner, ProcessRunner};

pub const DEFAULT_DIFF_MAX_LENGTH: usize = 2000;
pub const STAGED_DIFF_LABEL: &str = "Staged changes:\n";
pub const TRUNCATION_MARKER: &str = "\n... (diff truncated)";

/// Snapshot of the repository used as generation input. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryContext {
    pub current_branch: Option<String>,
    pub staged_diff: String,
    pub staged_files: Vec<String>,
    pub modified_files: Vec<String>,
}

/// Version-control backend. Reads are advisory and fall back to empty
/// values; only the two mutations report errors.
#[async_trait]
pub trait VersionControl: Send + Sync {
    async fn is_repository(&self) -> bool;
    async fn current_branch_name(&self) -> Option<String>;
    async fn staged_file_names(&self) -> Vec<String>;
    async fn modified_file_names(&self) -> Vec<String>;
    async fn has_staged_changes(&self) -> bool;
    async fn staged_diff(&self, max_length: usize) -> String;
    async fn branch_exists(&self, name: &str) -> bool;
    async fn create_branch(&self, name: &str) -> Result<(), RepositoryError>;
    async fn switch_branch(&self, name: &str) -> Result<(), RepositoryError>;

    async fn gather_context(&self, max_diff_length: usize) -> RepositoryContext {
        RepositoryContext {
            current_branch: self.current_branch_name().await,
            staged_diff: self.staged_diff(max_diff_length).await,
            staged_files: self.staged_file_names().await,
            modified_files: self.modified_file_names().await,
        }
    }
}

/// Labels a staged diff and cuts it down to `max_length` characters.
pub fn format_staged_diff(diff: &str, max_length: usize) -> String {
    if diff.trim().is_empty() {
        return String::new();
    }

    if diff.chars().count() <= max_length {
        return format!("{}{}", STAGED_DIFF_LABEL, diff);
    }

    let truncated: String = diff.chars().take(max_length).collect();
    format!("{}{}{}", STAGED_DIFF_LABEL, truncated, TRUNCATION_MARKER)
}

fn non_empty_lines(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// [`VersionControl`] backed by the `git` binary, run in the workspace root.
#[derive(Clone)]
pub struct GitRepository {
    workspace: Option<PathBuf>,
    runner: Arc<dyn CommandRunner>,
}

impl GitRepository {
    pub fn new(workspace: Option<PathBuf>, runner: Arc<dyn CommandRunner>) -> Self {
        Self { workspace, runner }
    }

    pub fn open(workspace: impl Into<PathBuf>) -> Self {
        Self::new(Some(workspace.into()), Arc::new(ProcessRunner))
    }

    pub fn workspace(&self) -> Option<&Path> {
        self.workspace.as_deref()
    }

    /// Output of a successful read, `None` on anything else.
    async fn read(&self, args: &[&str]) -> Option<String> {
        let workspace = self.workspace.as_deref()?;
        match self.runner.execute("git", args, workspace).await {
            Ok(output) if output.success() => Some(output.stdout),
            Ok(output) => {
                debug!(
                    args = %args.join(" "),
                    exit_code = output.exit_code,
                    stderr = %output.stderr,
                    "git query failed"
                );
                None
            }
            Err(e) => {
                debug!(args = %args.join(" "), "git query could not run: {:#}", e);
                None
            }
        }
    }

    async fn mutate(
        &self,
        args: &[&str],
        name: &str,
        creating: bool,
    ) -> Result<(), RepositoryError> {
        let workspace = self.workspace.as_deref().ok_or(RepositoryError::NoWorkspace)?;
        let output = self.runner.execute("git", args, workspace).await.map_err(|e| {
            let message = format!("{:#}", e);
            if creating {
                RepositoryError::CreateFailed(message)
            } else {
                RepositoryError::SwitchFailed(message)
            }
        })?;

        if output.success() {
            Ok(())
        } else {
            Err(RepositoryError::from_git_stderr(name, &output.stderr, creating))
        }
    }
}

#[async_trait]
impl VersionControl for GitRepository {
    async fn is_repository(&self) -> bool {
        self.read(&["rev-parse", "--show-toplevel"]).await.is_some()
    }

    async fn current_branch_name(&self) -> Option<String> {
        let branch = self.read(&["rev-parse", "--abbrev-ref", "HEAD"]).await?;
        let branch = branch.trim();
        // Detached HEAD has no branch name.
        if branch.is_empty() || branch == "HEAD" {
            None
        } else {
            Some(branch.to_string())
        }
    }

    async fn staged_file_names(&self) -> Vec<String> {
        self.read(&["diff", "--cached", "--name-only"])
            .await
            .map(|out| non_empty_lines(&out))
            .unwrap_or_default()
    }

    async fn modified_file_names(&self) -> Vec<String> {
        self.read(&["diff", "--name-only"])
            .await
            .map(|out| non_empty_lines(&out))
            .unwrap_or_default()
    }

    async fn has_staged_changes(&self) -> bool {
        self.read(&["diff", "--name-only", "--cached"])
            .await
            .map(|out| out.lines().any(|line| !line.trim().is_empty()))
            .unwrap_or(false)
    }

    async fn staged_diff(&self, max_length: usize) -> String {
        self.read(&["diff", "--cached"])
            .await
            .map(|diff| format_staged_diff(&diff, max_length))
            .unwrap_or_default()
    }

    async fn branch_exists(&self, name: &str) -> bool {
        let reference = format!("refs/heads/{}", name);
        self.read(&["show-ref", "--verify", "--quiet", reference.as_str()])
            .await
            .is_some()
    }

    #[instrument(skip(self))]
    async fn create_branch(&self, name: &str) -> Result<(), RepositoryError> {
        self.mutate(&["checkout", "-b", name], name, true).await?;
        info!("created and switched to branch");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn switch_branch(&self, name: &str) -> Result<(), RepositoryError> {
        self.mutate(&["checkout", name], name, false).await?;
        info!("switched to existing branch");
        Ok(())
    }
}
