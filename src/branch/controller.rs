use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use super::validator::validate_branch_name;
use crate::ai::{GenerationClient, GenerationError};
use crate::config::{GenerationConfig, SettingsSource};
use crate::git::{RepositoryContext, RepositoryError, VersionControl, DEFAULT_DIFF_MAX_LENGTH};

pub const MAX_DESCRIPTION_LENGTH: usize = 2000;
pub const FALLBACK_FILE_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    CheckRepo,
    CheckStagedOrInput,
    CheckConfig,
    GatherContext,
    Generate,
    AwaitSelection,
    ValidateChoice,
    CreateBranch,
    OfferSwitch,
    Done,
}

/// What the suggestions should be based on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuggestionSource {
    StagedChanges,
    Description(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Candidate(String),
    Custom(String),
    Cancel,
}

/// The interactive half of the flow.
#[async_trait]
pub trait Prompter: Send + Sync {
    async fn select_branch(&self, candidates: &[String], context: &RepositoryContext) -> Selection;
    async fn confirm_switch(&self, name: &str) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowOutcome {
    Created(String),
    Switched(String),
    Cancelled,
    /// The branch already existed and the user chose not to switch.
    Declined(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    OpenSettings,
    ShowStagedChanges,
    SwitchToExisting(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowFailureKind {
    Busy,
    NotARepository,
    NoStagedChanges,
    InvalidDescription,
    Configuration,
    Timeout,
    Api,
    Parse,
    InvalidBranchName,
    Repository,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct FlowFailure {
    pub kind: FlowFailureKind,
    pub message: String,
    pub recovery: Option<RecoveryAction>,
}

impl FlowFailure {
    fn new(kind: FlowFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            recovery: None,
        }
    }

    fn with_recovery(mut self, recovery: RecoveryAction) -> Self {
        self.recovery = Some(recovery);
        self
    }
}

impl From<GenerationError> for FlowFailure {
    fn from(error: GenerationError) -> Self {
        if error.is_timeout() {
            return FlowFailure::new(
                FlowFailureKind::Timeout,
                format!(
                    "The request timed out. {}. Check your connection or raise timeout_ms.",
                    error
                ),
            );
        }

        match error {
            GenerationError::Configuration { .. } => {
                FlowFailure::new(FlowFailureKind::Configuration, error.to_string())
                    .with_recovery(RecoveryAction::OpenSettings)
            }
            GenerationError::Network { .. } => {
                FlowFailure::new(FlowFailureKind::Api, format!("API error. {}", error))
            }
            GenerationError::Parse(message) => FlowFailure::new(
                FlowFailureKind::Parse,
                format!("The API returned no usable branch names: {}", message),
            ),
        }
    }
}

impl From<RepositoryError> for FlowFailure {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::AlreadyExists(ref name) => {
                let recovery = RecoveryAction::SwitchToExisting(name.clone());
                FlowFailure::new(FlowFailureKind::Repository, error.to_string())
                    .with_recovery(recovery)
            }
            RepositoryError::NotARepository | RepositoryError::NoWorkspace => {
                FlowFailure::new(FlowFailureKind::NotARepository, error.to_string())
            }
            RepositoryError::InvalidName(_) => {
                FlowFailure::new(FlowFailureKind::InvalidBranchName, error.to_string())
            }
            RepositoryError::CreateFailed(_) | RepositoryError::SwitchFailed(_) => {
                FlowFailure::new(FlowFailureKind::Repository, error.to_string())
            }
        }
    }
}

/// Releases the single-flight flag on every exit path.
struct FlightGuard<'a>(&'a AtomicBool);

impl<'a> FlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives one suggestion request from precondition checks to the branch
/// mutation. Only one request runs at a time; a second call while one is in
/// progress fails with [`FlowFailureKind::Busy`].
pub struct BranchCreationController {
    vcs: Arc<dyn VersionControl>,
    client: GenerationClient,
    settings: Arc<dyn SettingsSource>,
    prompter: Arc<dyn Prompter>,
    in_flight: AtomicBool,
    trail: Mutex<Vec<FlowState>>,
}

impl BranchCreationController {
    pub fn new(
        vcs: Arc<dyn VersionControl>,
        client: GenerationClient,
        settings: Arc<dyn SettingsSource>,
        prompter: Arc<dyn Prompter>,
    ) -> Self {
        Self {
            vcs,
            client,
            settings,
            prompter,
            in_flight: AtomicBool::new(false),
            trail: Mutex::new(vec![FlowState::Idle]),
        }
    }

    /// States visited by the most recent run, starting at `Idle`.
    pub fn last_trail(&self) -> Vec<FlowState> {
        self.trail.lock().map(|t| t.clone()).unwrap_or_default()
    }

    fn enter(&self, state: FlowState) {
        debug!(?state, "branch flow transition");
        if let Ok(mut trail) = self.trail.lock() {
            trail.push(state);
        }
    }

    #[instrument(skip(self))]
    pub async fn run(&self, source: SuggestionSource) -> Result<FlowOutcome, FlowFailure> {
        let _guard = FlightGuard::acquire(&self.in_flight).ok_or_else(|| {
            FlowFailure::new(
                FlowFailureKind::Busy,
                "A branch name suggestion is already in progress",
            )
        })?;

        if let Ok(mut trail) = self.trail.lock() {
            *trail = vec![FlowState::Idle];
        }

        let result = self.run_steps(&source).await;
        self.enter(FlowState::Done);
        match &result {
            Ok(outcome) => info!(?outcome, "branch flow finished"),
            Err(failure) => warn!(kind = ?failure.kind, "branch flow failed: {}", failure),
        }
        result
    }

    async fn run_steps(&self, source: &SuggestionSource) -> Result<FlowOutcome, FlowFailure> {
        self.enter(FlowState::CheckRepo);
        if !self.vcs.is_repository().await {
            return Err(FlowFailure::new(
                FlowFailureKind::NotARepository,
                "The workspace is not a git repository",
            ));
        }

        self.enter(FlowState::CheckStagedOrInput);
        let description = match source {
            SuggestionSource::StagedChanges => {
                if !self.vcs.has_staged_changes().await {
                    return Err(FlowFailure::new(
                        FlowFailureKind::NoStagedChanges,
                        "No staged changes found. Stage your changes first.",
                    )
                    .with_recovery(RecoveryAction::ShowStagedChanges));
                }
                None
            }
            SuggestionSource::Description(text) => Some(validate_description(text)?),
        };

        self.enter(FlowState::CheckConfig);
        let config = self.load_config()?;

        self.enter(FlowState::GatherContext);
        let context = self.vcs.gather_context(DEFAULT_DIFF_MAX_LENGTH).await;
        debug!(
            current_branch = ?context.current_branch,
            staged = context.staged_files.len(),
            modified = context.modified_files.len(),
            diff_len = context.staged_diff.len(),
            "gathered repository context"
        );
        let diff = match source {
            SuggestionSource::StagedChanges => diff_context(&context),
            SuggestionSource::Description(_) => None,
        };

        self.enter(FlowState::Generate);
        let candidates = self
            .client
            .generate(&config, diff.as_deref(), description, None)
            .await?;

        self.enter(FlowState::AwaitSelection);
        let name = match self.prompter.select_branch(&candidates, &context).await {
            Selection::Candidate(name) | Selection::Custom(name) => name,
            Selection::Cancel => return Ok(FlowOutcome::Cancelled),
        };

        self.enter(FlowState::ValidateChoice);
        validate_branch_name(&name).map_err(|e| {
            FlowFailure::new(
                FlowFailureKind::InvalidBranchName,
                format!("Invalid branch name '{}': {}", name, e),
            )
        })?;

        self.enter(FlowState::CreateBranch);
        if self.vcs.branch_exists(&name).await {
            self.enter(FlowState::OfferSwitch);
            if !self.prompter.confirm_switch(&name).await {
                return Ok(FlowOutcome::Declined(name));
            }
            self.vcs.switch_branch(&name).await?;
            return Ok(FlowOutcome::Switched(name));
        }

        self.vcs.create_branch(&name).await?;
        Ok(FlowOutcome::Created(name))
    }

    fn load_config(&self) -> Result<GenerationConfig, FlowFailure> {
        let settings = self.settings.fetch().map_err(|e| {
            FlowFailure::new(
                FlowFailureKind::Configuration,
                format!("Could not load settings: {:#}", e),
            )
            .with_recovery(RecoveryAction::OpenSettings)
        })?;

        GenerationConfig::from_settings(&settings).map_err(|validation| {
            FlowFailure::new(
                FlowFailureKind::Configuration,
                format!("Configuration error: {}", validation.summary()),
            )
            .with_recovery(RecoveryAction::OpenSettings)
        })
    }
}

fn validate_description(text: &str) -> Result<&str, FlowFailure> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(FlowFailure::new(
            FlowFailureKind::InvalidDescription,
            "The description cannot be empty",
        ));
    }
    if trimmed.chars().count() > MAX_DESCRIPTION_LENGTH {
        return Err(FlowFailure::new(
            FlowFailureKind::InvalidDescription,
            format!(
                "The description cannot be longer than {} characters",
                MAX_DESCRIPTION_LENGTH
            ),
        ));
    }
    Ok(trimmed)
}

/// The staged diff, or a short file list when there is no diff text.
pub fn diff_context(context: &RepositoryContext) -> Option<String> {
    if !context.staged_diff.trim().is_empty() {
        return Some(context.staged_diff.clone());
    }

    let files: Vec<&str> = context
        .staged_files
        .iter()
        .chain(context.modified_files.iter())
        .map(String::as_str)
        .take(FALLBACK_FILE_LIMIT)
        .collect();

    if files.is_empty() {
        None
    } else {
        Some(format!("Changed files: {}", files.join(", ")))
    }
}
