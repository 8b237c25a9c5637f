use crate::ai::{ChatTransport, GenerationClient, RequestFailure, Sleeper};
use crate::branch::{BranchCreationController, Prompter, Selection};
use crate::config::{GenerationConfig, Settings};
use crate::git::{
    format_staged_diff, CommandOutput, CommandRunner, RepositoryContext, RepositoryError,
    VersionControl,
};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;


// Test utilities and helpers
pub(crate) struct TestUtils;

impl TestUtils {
    pub fn valid_settings() -> Settings {
        Settings {
            api_key: "sk-test-key".to_string(),
            ..Settings::default()
        }
    }

    pub fn controller(
        vcs: Arc<FakeVcs>,
        transport: Arc<ScriptedTransport>,
        settings: Settings,
        prompter: Arc<dyn Prompter>,
    ) -> BranchCreationController {
        let client = GenerationClient::with_parts(transport, Arc::new(NoopSleeper));
        BranchCreationController::new(vcs, client, Arc::new(settings), prompter)
    }
}

/// In-memory repository that records every mutation.
#[derive(Default)]
pub(crate) struct FakeVcs {
    pub repository: bool,
    pub current_branch: Option<String>,
    pub staged_files: Vec<String>,
    pub modified_files: Vec<String>,
    pub diff: String,
    pub existing_branches: Vec<String>,
    pub create_error: Option<RepositoryError>,
    pub mutations: Mutex<Vec<String>>,
}

impl FakeVcs {
    /// A repository on `main` with one staged file.
    pub fn staged() -> Self {
        Self {
            repository: true,
            current_branch: Some("main".to_string()),
            staged_files: vec!["src/login.rs".to_string()],
            diff: "diff --git a/src/login.rs b/src/login.rs\n+pub fn login() {}\n".to_string(),
            ..Self::default()
        }
    }

    pub fn mutations(&self) -> Vec<String> {
        self.mutations.lock().unwrap().clone()
    }
}

#[async_trait]
impl VersionControl for FakeVcs {
    async fn is_repository(&self) -> bool {
        self.repository
    }

    async fn current_branch_name(&self) -> Option<String> {
        self.current_branch.clone()
    }

    async fn staged_file_names(&self) -> Vec<String> {
        self.staged_files.clone()
    }

    async fn modified_file_names(&self) -> Vec<String> {
        self.modified_files.clone()
    }

    async fn has_staged_changes(&self) -> bool {
        !self.staged_files.is_empty()
    }

    async fn staged_diff(&self, max_length: usize) -> String {
        format_staged_diff(&self.diff, max_length)
    }

    async fn branch_exists(&self, name: &str) -> bool {
        self.existing_branches.iter().any(|b| b == name)
    }

    async fn create_branch(&self, name: &str) -> Result<(), RepositoryError> {
        self.mutations.lock().unwrap().push(format!("create {}", name));
        match &self.create_error {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    async fn switch_branch(&self, name: &str) -> Result<(), RepositoryError> {
        self.mutations.lock().unwrap().push(format!("switch {}", name));
        Ok(())
    }
}

/// Replays a fixed list of responses and remembers each instruction sent.
pub(crate) struct ScriptedTransport {
    outcomes: Mutex<VecDeque<Result<String, RequestFailure>>>,
    calls: AtomicU32,
    instructions: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new(outcomes: Vec<Result<String, RequestFailure>>) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(outcomes.into()),
            calls: AtomicU32::new(0),
            instructions: Mutex::new(Vec::new()),
        })
    }

    pub fn replying(content: &str) -> Arc<Self> {
        Self::new(vec![Ok(content.to_string())])
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_instruction(&self) -> Option<String> {
        self.instructions.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn complete(
        &self,
        _config: &GenerationConfig,
        instruction: &str,
    ) -> Result<String, RequestFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.instructions.lock().unwrap().push(instruction.to_string());
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(RequestFailure::classify(
                    "no scripted response",
                    crate::ai::FailureKind::Api,
                ))
            })
    }
}

pub(crate) struct NoopSleeper;

#[async_trait]
impl Sleeper for NoopSleeper {
    async fn sleep(&self, _duration: Duration) {}
}

/// Answers the picker and the switch prompt with fixed replies.
pub(crate) struct ScriptedPrompter {
    selection: Selection,
    confirm: bool,
    pub shown: Mutex<Vec<(Vec<String>, Option<String>)>>,
    pub confirmations: AtomicU32,
}

impl ScriptedPrompter {
    pub fn new(selection: Selection, confirm: bool) -> Arc<Self> {
        Arc::new(Self {
            selection,
            confirm,
            shown: Mutex::new(Vec::new()),
            confirmations: AtomicU32::new(0),
        })
    }

    pub fn choosing(name: &str) -> Arc<Self> {
        Self::new(Selection::Candidate(name.to_string()), false)
    }
}

#[async_trait]
impl Prompter for ScriptedPrompter {
    async fn select_branch(&self, candidates: &[String], context: &RepositoryContext) -> Selection {
        self.shown
            .lock()
            .unwrap()
            .push((candidates.to_vec(), context.current_branch.clone()));
        self.selection.clone()
    }

    async fn confirm_switch(&self, _name: &str) -> bool {
        self.confirmations.fetch_add(1, Ordering::SeqCst);
        self.confirm
    }
}

/// Answers git invocations by their joined argument list.
#[derive(Default)]
pub(crate) struct FakeRunner {
    responses: HashMap<String, CommandOutput>,
    pub invocations: Mutex<Vec<String>>,
}

impl FakeRunner {
    pub fn respond(mut self, args: &str, stdout: &str) -> Self {
        self.responses.insert(
            args.to_string(),
            CommandOutput {
                stdout: stdout.to_string(),
                ..CommandOutput::default()
            },
        );
        self
    }

    pub fn fail(mut self, args: &str, stderr: &str) -> Self {
        self.responses.insert(
            args.to_string(),
            CommandOutput {
                stderr: stderr.to_string(),
                exit_code: 128,
                ..CommandOutput::default()
            },
        );
        self
    }

    pub fn invocations(&self) -> Vec<String> {
        self.invocations.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn execute(
        &self,
        program: &str,
        args: &[&str],
        _working_dir: &Path,
    ) -> Result<CommandOutput> {
        assert_eq!(program, "git");
        let key = args.join(" ");
        self.invocations.lock().unwrap().push(key.clone());
        // Unscripted commands behave like git outside a repository.
        Ok(self.responses.get(&key).cloned().unwrap_or(CommandOutput {
            stdout: String::new(),
            stderr: "fatal: not a git repository (or any of the parent directories): .git".to_string(),
            exit_code: 128,
        }))
    }
}
