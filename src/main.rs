use anyhow::Result;
use branchwise::ai::GenerationClient;
use branchwise::branch::{BranchCreationController, SuggestionSource};
use branchwise::config::{self, FileSettings, GenerationConfig, SettingsSource};
use branchwise::git::GitRepository;
use branchwise::ui::{self, TerminalPrompter};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "branchwise", version, about = "Suggests git branch names from your changes")]
struct Cli {
    /// Repository to work in (defaults to the current directory)
    #[arg(long, global = true)]
    repo: Option<PathBuf>,

    /// Print debug logs to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Suggest branch names from the staged diff
    Staged,
    /// Suggest branch names from a description of the work
    Describe {
        /// What the branch is for; asked interactively when omitted
        text: Option<String>,
    },
    /// Show the settings file and the effective settings
    Settings,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("branchwise=debug")
    } else {
        EnvFilter::try_from_env("BRANCHWISE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = FileSettings::new(config::get_config_path()?);

    let source = match cli.command {
        Command::Settings => return show_settings(&settings),
        Command::Staged => SuggestionSource::StagedChanges,
        Command::Describe { text: Some(text) } => SuggestionSource::Description(text),
        Command::Describe { text: None } => match ui::read_description()? {
            Some(text) => SuggestionSource::Description(text),
            None => return Ok(ExitCode::SUCCESS),
        },
    };

    let workspace = match cli.repo {
        Some(path) => path,
        None => std::env::current_dir()?,
    };

    let controller = BranchCreationController::new(
        Arc::new(GitRepository::open(workspace)),
        GenerationClient::new(),
        Arc::new(settings),
        Arc::new(TerminalPrompter),
    );

    println!("{}", "Generating branch name suggestions...".dimmed());
    match controller.run(source).await {
        Ok(outcome) => {
            ui::print_outcome(&outcome);
            Ok(ExitCode::SUCCESS)
        }
        Err(failure) => {
            ui::print_failure(&failure);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn show_settings(settings: &FileSettings) -> Result<ExitCode> {
    if settings.ensure_exists()? {
        println!("Created default config file at {:?}", settings.path());
    }

    let current = settings.fetch()?;
    println!("{}", "branchwise settings".green().bold());
    println!("Config file:       {}", settings.path().display());
    println!("api_endpoint:      {}", current.api_endpoint);
    println!("api_key:           {}", config::mask_api_key(&current.api_key));
    println!("model:             {}", current.model);
    println!("timeout_ms:        {}", current.timeout_ms);
    println!("temperature:       {}", current.temperature);
    println!("suggestion_count:  {}", current.suggestion_count);
    match current.effective_reasoning_effort() {
        Ok(effort) if current.reasoning_effort.is_none() => {
            println!("reasoning_effort:  {} (default for {})", effort, current.model)
        }
        Ok(effort) => println!("reasoning_effort:  {}", effort),
        Err(reason) => println!("reasoning_effort:  {}", reason.red()),
    }

    match GenerationConfig::from_settings(&current) {
        Ok(_) => {
            println!("\n{}", "Settings are valid.".green());
            Ok(ExitCode::SUCCESS)
        }
        Err(validation) => {
            println!("\n{} {}", "Settings need attention:".red().bold(), validation.summary());
            println!("Edit {} or set BRANCHWISE_API_KEY.", settings.path().display());
            Ok(ExitCode::FAILURE)
        }
    }
}
