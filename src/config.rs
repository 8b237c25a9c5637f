use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use validator::Validate;

pub const DEFAULT_API_ENDPOINT: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-5.1";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const MIN_TIMEOUT_MS: u64 = 5_000;
pub const MAX_TIMEOUT_MS: u64 = 120_000;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_SUGGESTION_COUNT: u32 = 5;
pub const MIN_SUGGESTION_COUNT: u32 = 1;
pub const MAX_SUGGESTION_COUNT: u32 = 10;

const API_KEY_ENV: &str = "BRANCHWISE_API_KEY";
const FALLBACK_API_KEY_ENV: &str = "OPENAI_API_KEY";
const API_ENDPOINT_ENV: &str = "BRANCHWISE_API_ENDPOINT";
const MODEL_ENV: &str = "BRANCHWISE_MODEL";

/// User-editable settings, persisted as TOML in the platform config directory.
#[derive(Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub api_endpoint: String,
    pub api_key: String,
    pub model: String,
    pub timeout_ms: u64,
    pub temperature: f32,
    pub suggestion_count: u32,
    pub reasoning_effort: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_endpoint: DEFAULT_API_ENDPOINT.to_string(),
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            temperature: DEFAULT_TEMPERATURE,
            suggestion_count: DEFAULT_SUGGESTION_COUNT,
            reasoning_effort: None,
        }
    }
}

// The key never reaches logs or debug output in clear text.
impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("api_endpoint", &self.api_endpoint)
            .field("api_key", &mask_api_key(&self.api_key))
            .field("model", &self.model)
            .field("timeout_ms", &self.timeout_ms)
            .field("temperature", &self.temperature)
            .field("suggestion_count", &self.suggestion_count)
            .field("reasoning_effort", &self.reasoning_effort)
            .finish()
    }
}

impl Settings {
    pub fn create_default(path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(&Settings::default())?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {:?}", parent))?;
        }
        fs::write(path, content).with_context(|| format!("Failed to write {:?}", path))?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
        let settings: Settings =
            toml::from_str(&content).with_context(|| format!("Invalid settings in {:?}", path))?;
        Ok(settings.normalized())
    }

    /// Applies environment overrides on top of whatever the file said.
    pub fn with_env_overrides(mut self) -> Self {
        let key = std::env::var(API_KEY_ENV)
            .or_else(|_| std::env::var(FALLBACK_API_KEY_ENV))
            .ok()
            .filter(|value| !value.trim().is_empty());
        if let Some(key) = key {
            self.api_key = key;
        }
        if let Ok(endpoint) = std::env::var(API_ENDPOINT_ENV) {
            if !endpoint.trim().is_empty() {
                self.api_endpoint = endpoint;
            }
        }
        if let Ok(model) = std::env::var(MODEL_ENV) {
            if !model.trim().is_empty() {
                self.model = model;
            }
        }
        self
    }

    /// Clamps the values that have a recognized range instead of rejecting them.
    pub fn normalized(mut self) -> Self {
        self.timeout_ms = self.timeout_ms.clamp(MIN_TIMEOUT_MS, MAX_TIMEOUT_MS);
        self.suggestion_count = clamp_suggestion_count(self.suggestion_count);
        self
    }

    /// Effort used for this model when the settings leave it unset.
    pub fn effective_reasoning_effort(&self) -> Result<ReasoningEffort, String> {
        match self.reasoning_effort.as_deref().map(str::trim) {
            Some(value) if !value.is_empty() => value.parse(),
            _ => Ok(ReasoningEffort::default_for_model(&self.model)),
        }
    }
}

pub fn clamp_suggestion_count(count: u32) -> u32 {
    count.clamp(MIN_SUGGESTION_COUNT, MAX_SUGGESTION_COUNT)
}

/// Shows only the first three characters of a secret.
pub fn mask_api_key(key: &str) -> String {
    if key.is_empty() {
        return "(not set)".to_string();
    }
    let prefix: String = key.chars().take(3).collect();
    format!("{}***", prefix)
}

pub fn get_config_path() -> Result<PathBuf> {
    let proj_dirs = ProjectDirs::from("com", "branchwise", "branchwise")
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

    Ok(proj_dirs.config_dir().join("config.toml"))
}

/// Anything that can hand the controller a fresh copy of the settings.
pub trait SettingsSource: Send + Sync {
    fn fetch(&self) -> Result<Settings>;
}

impl SettingsSource for Settings {
    fn fetch(&self) -> Result<Settings> {
        Ok(self.clone().normalized())
    }
}

/// Reads `config.toml` on every call so edits take effect without a restart.
#[derive(Debug, Clone)]
pub struct FileSettings {
    path: PathBuf,
}

impl FileSettings {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn ensure_exists(&self) -> Result<bool> {
        if self.path.exists() {
            return Ok(false);
        }
        Settings::create_default(&self.path)?;
        Ok(true)
    }
}

impl SettingsSource for FileSettings {
    fn fetch(&self) -> Result<Settings> {
        let settings = if self.path.exists() {
            Settings::load(&self.path)?
        } else {
            Settings::default()
        };
        Ok(settings.with_env_overrides())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    None,
    Minimal,
    Low,
    Medium,
    High,
    Xhigh,
}

impl ReasoningEffort {
    pub const ALL: [ReasoningEffort; 6] = [
        ReasoningEffort::None,
        ReasoningEffort::Minimal,
        ReasoningEffort::Low,
        ReasoningEffort::Medium,
        ReasoningEffort::High,
        ReasoningEffort::Xhigh,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Minimal => "minimal",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Xhigh => "xhigh",
        }
    }

    /// `gpt-5.1`/`gpt-5.2` answer without deliberation by default, the
    /// `-pro` and `-codex-max` variants are tuned for deep reasoning.
    pub fn default_for_model(model: &str) -> Self {
        let model = model.trim().to_lowercase();
        if model.ends_with("-pro") || model.ends_with("-codex-max") {
            ReasoningEffort::High
        } else if model == "gpt-5.1" || model == "gpt-5.2" {
            ReasoningEffort::None
        } else {
            ReasoningEffort::Medium
        }
    }
}

impl fmt::Display for ReasoningEffort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReasoningEffort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|effort| effort.as_str() == wanted)
            .ok_or_else(|| {
                let allowed: Vec<&str> = Self::ALL.iter().map(|e| e.as_str()).collect();
                format!("'{}' is not one of {}", s.trim(), allowed.join(", "))
            })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    pub valid: bool,
    pub missing_fields: Vec<String>,
    pub invalid_fields: Vec<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            valid: true,
            ..Self::default()
        }
    }

    fn from_parts(missing_fields: Vec<String>, invalid_fields: Vec<String>) -> Self {
        Self {
            valid: missing_fields.is_empty() && invalid_fields.is_empty(),
            missing_fields,
            invalid_fields,
        }
    }

    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if !self.missing_fields.is_empty() {
            parts.push(format!("missing {}", self.missing_fields.join(", ")));
        }
        if !self.invalid_fields.is_empty() {
            parts.push(format!("invalid {}", self.invalid_fields.join("; ")));
        }
        parts.join("; ")
    }
}

/// Everything one generation request needs. Built fresh from [`Settings`]
/// for every invocation and never mutated afterwards.
#[derive(Clone, Validate)]
pub struct GenerationConfig {
    #[validate(url(message = "must be an absolute URL"))]
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    #[validate(range(min = 1, message = "must be greater than 0"))]
    pub timeout_ms: u64,
    #[validate(range(min = 0.0, max = 2.0, message = "must be between 0 and 2"))]
    pub temperature: f32,
    pub suggestion_count: u32,
    pub reasoning_effort: Option<ReasoningEffort>,
}

impl fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &mask_api_key(&self.api_key))
            .field("model", &self.model)
            .field("timeout_ms", &self.timeout_ms)
            .field("temperature", &self.temperature)
            .field("suggestion_count", &self.suggestion_count)
            .field("reasoning_effort", &self.reasoning_effort)
            .finish()
    }
}

// Diagnostics are reported in this order, keyed by the settings names.
const FIELD_ORDER: [(&str, &str); 7] = [
    ("endpoint", "api_endpoint"),
    ("api_key", "api_key"),
    ("model", "model"),
    ("timeout_ms", "timeout_ms"),
    ("temperature", "temperature"),
    ("suggestion_count", "suggestion_count"),
    ("reasoning_effort", "reasoning_effort"),
];

impl GenerationConfig {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout_ms: u64,
        temperature: f32,
        suggestion_count: u32,
        reasoning_effort: Option<ReasoningEffort>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
            timeout_ms,
            temperature,
            suggestion_count: clamp_suggestion_count(suggestion_count),
            reasoning_effort,
        }
    }

    /// Builds the config for one invocation, rejecting it when any field is
    /// missing or invalid, including an unknown reasoning effort.
    pub fn from_settings(settings: &Settings) -> Result<Self, ValidationResult> {
        let reasoning_effort = settings.effective_reasoning_effort();
        let config = Self::new(
            settings.api_endpoint.trim(),
            settings.api_key.trim(),
            settings.model.trim(),
            settings.timeout_ms,
            settings.temperature,
            settings.suggestion_count,
            reasoning_effort.clone().ok(),
        );

        let mut result = config.validate_fields();
        if let Err(reason) = reasoning_effort {
            result
                .invalid_fields
                .push(format!("reasoning_effort: {}", reason));
            result.valid = false;
        }

        if result.valid {
            Ok(config)
        } else {
            Err(result)
        }
    }

    pub fn validate_fields(&self) -> ValidationResult {
        let mut missing = Vec::new();
        for (field, value) in [
            ("api_endpoint", &self.endpoint),
            ("api_key", &self.api_key),
            ("model", &self.model),
        ] {
            if value.trim().is_empty() {
                missing.push(field.to_string());
            }
        }

        let mut invalid = Vec::new();
        if let Err(errors) = self.validate() {
            let field_errors = errors.field_errors();
            for (rust_name, settings_name) in FIELD_ORDER {
                if missing.iter().any(|m| m == settings_name) {
                    continue;
                }
                if let Some(errs) = field_errors.get(rust_name) {
                    for err in errs.iter() {
                        let message = err
                            .message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| err.code.to_string());
                        invalid.push(format!("{}: {}", settings_name, message));
                    }
                }
            }
        }
        // NaN compares false against both bounds, so the range rule lets it through.
        if self.temperature.is_nan() {
            invalid.push("temperature: must be between 0 and 2".to_string());
        }

        ValidationResult::from_parts(missing, invalid)
    }

    pub fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.endpoint.trim_end_matches('/'))
    }
}
