use anyhow::{Context, Result};
use async_trait::async_trait;
use colored::*;
use std::io::{self, BufRead, Write};
use tracing::warn;

use crate::branch::{FlowFailure, FlowOutcome, Prompter, RecoveryAction, Selection};
use crate::git::RepositoryContext;

/// What a single line typed at the picker means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickerInput {
    Choose(Selection),
    AskCustomName,
    Retry,
}

/// Interprets one line typed at the picker. Empty input picks the first
/// (most relevant) candidate.
pub fn parse_picker_input(input: &str, candidates: &[String]) -> PickerInput {
    let input = input.trim();
    match input.to_lowercase().as_str() {
        "" if !candidates.is_empty() => {
            PickerInput::Choose(Selection::Candidate(candidates[0].clone()))
        }
        "q" | "quit" | "cancel" => PickerInput::Choose(Selection::Cancel),
        "c" | "custom" => PickerInput::AskCustomName,
        _ => match input.parse::<usize>() {
            Ok(n) if n >= 1 && n <= candidates.len() => {
                PickerInput::Choose(Selection::Candidate(candidates[n - 1].clone()))
            }
            _ => PickerInput::Retry,
        },
    }
}

pub fn parse_confirmation(input: &str) -> bool {
    matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
}

/// [`Prompter`] over stdin/stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompter;

impl TerminalPrompter {
    async fn ask(prompt: String) -> Option<String> {
        let result = tokio::task::spawn_blocking(move || read_line(&prompt)).await;
        match result {
            Ok(Ok(line)) => line,
            Ok(Err(e)) => {
                warn!("failed to read from terminal: {:#}", e);
                None
            }
            Err(e) => {
                warn!("terminal prompt task failed: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl Prompter for TerminalPrompter {
    async fn select_branch(&self, candidates: &[String], context: &RepositoryContext) -> Selection {
        println!();
        if let Some(branch) = &context.current_branch {
            println!("Current branch: {}", branch.blue());
        }
        println!("{}", "Suggested branch names:".green().bold());
        for (i, name) in candidates.iter().enumerate() {
            println!("  {}) {}", (i + 1).to_string().yellow(), name);
        }
        println!("  {}) Enter a custom name", "c".yellow());
        println!("  {}) Cancel", "q".yellow());

        loop {
            let Some(line) = Self::ask("Select a branch [1]: ".to_string()).await else {
                return Selection::Cancel;
            };
            match parse_picker_input(&line, candidates) {
                PickerInput::Choose(selection) => return selection,
                PickerInput::AskCustomName => {
                    let Some(name) = Self::ask("Branch name: ".to_string()).await else {
                        return Selection::Cancel;
                    };
                    let name = name.trim_end_matches(['\r', '\n']).to_string();
                    if name.is_empty() {
                        return Selection::Cancel;
                    }
                    return Selection::Custom(name);
                }
                PickerInput::Retry => {
                    println!(
                        "{}",
                        format!(
                            "Please enter a number between 1 and {}, 'c' or 'q'",
                            candidates.len()
                        )
                        .red()
                    );
                }
            }
        }
    }

    async fn confirm_switch(&self, name: &str) -> bool {
        let prompt = format!("Branch '{}' already exists. Switch to it? [y/N]: ", name);
        Self::ask(prompt)
            .await
            .map(|answer| parse_confirmation(&answer))
            .unwrap_or(false)
    }
}

/// `None` on end of input.
fn read_line(prompt: &str) -> Result<Option<String>> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut line = String::new();
    let read = io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

/// Asks for a free-text description of the planned work.
pub fn read_description() -> Result<Option<String>> {
    println!("{}", "Describe the work this branch is for:".green().bold());
    read_line("> ")
}

pub fn print_outcome(outcome: &FlowOutcome) {
    match outcome {
        FlowOutcome::Created(name) => {
            println!("{} {}", "Created and switched to branch".green(), name.bold())
        }
        FlowOutcome::Switched(name) => println!("{} {}", "Switched to branch".green(), name.bold()),
        FlowOutcome::Cancelled => println!("{}", "Cancelled.".yellow()),
        FlowOutcome::Declined(name) => {
            println!("{} {}", "Kept the current branch; not switching to".yellow(), name)
        }
    }
}

pub fn print_failure(failure: &FlowFailure) {
    eprintln!("{}: {}", "Error".red().bold(), failure.message);
    match &failure.recovery {
        Some(RecoveryAction::OpenSettings) => {
            eprintln!("Run {} to review your settings.", "branchwise settings".cyan())
        }
        Some(RecoveryAction::ShowStagedChanges) => {
            eprintln!("Stage changes with {} and try again.", "git add <files>".cyan())
        }
        Some(RecoveryAction::SwitchToExisting(name)) => {
            eprintln!("Switch to it with {}.", format!("git checkout {}", name).cyan())
        }
        None => {}
    }
}
