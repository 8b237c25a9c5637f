use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::instrument;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// The only way this crate touches external processes.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs `program args...` in `working_dir`. Only a failure to spawn is an
    /// `Err`; a non-zero exit is reported through [`CommandOutput::exit_code`].
    async fn execute(
        &self,
        program: &str,
        args: &[&str],
        working_dir: &Path,
    ) -> Result<CommandOutput>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    #[instrument(skip(self), fields(command = %format!("{} {}", program, args.join(" "))))]
    async fn execute(
        &self,
        program: &str,
        args: &[&str],
        working_dir: &Path,
    ) -> Result<CommandOutput> {
        let output = Command::new(resolve_program(program))
            .args(args)
            .current_dir(working_dir)
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to execute {} {}", program, args.join(" ")))?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }
}

fn resolve_program(program: &str) -> PathBuf {
    which::which(program).unwrap_or_else(|_| PathBuf::from(program))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn git_available() -> bool {
        which::which("git").is_ok()
    }

    #[tokio::test]
    async fn test_reports_exit_code_and_stderr() {
        if !git_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let output = ProcessRunner
            .execute("git", &["rev-parse", "--show-toplevel"], dir.path())
            .await
            .unwrap();

        assert!(!output.success());
        assert!(output.stderr.to_lowercase().contains("not a git repository"));
    }

    #[tokio::test]
    async fn test_missing_program_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = ProcessRunner
            .execute("definitely-not-a-real-binary-4711", &[], dir.path())
            .await;
        assert!(result.is_err());
    }
}
