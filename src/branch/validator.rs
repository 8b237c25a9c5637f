use thiserror::Error;

pub const MAX_BRANCH_NAME_LENGTH: usize = 255;

const FORBIDDEN_CHARS: [char; 7] = ['~', '^', ':', '?', '*', '[', ']'];
const RESERVED_NAMES: [&str; 4] = ["HEAD", "FETCH_HEAD", "ORIG_HEAD", "MERGE_HEAD"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BranchNameError {
    #[error("Branch name cannot be empty")]
    Empty,
    #[error("Branch name cannot be longer than 255 characters")]
    TooLong,
    #[error("Branch name contains invalid characters (~ ^ : ? * [ ] or control characters)")]
    InvalidCharacters,
    #[error("Branch name cannot contain '..' or start or end with '.'")]
    DotRule,
    #[error("Branch name cannot start or end with whitespace")]
    Whitespace,
    #[error("Branch name is reserved by git")]
    Reserved,
}

/// Checks `name` against git's ref naming rules. The first broken rule wins.
pub fn validate_branch_name(name: &str) -> Result<(), BranchNameError> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(BranchNameError::Empty);
    }
    if name.chars().count() > MAX_BRANCH_NAME_LENGTH {
        return Err(BranchNameError::TooLong);
    }
    if name
        .chars()
        .any(|c| FORBIDDEN_CHARS.contains(&c) || (c as u32) < 0x20 || c == '\u{7f}')
    {
        return Err(BranchNameError::InvalidCharacters);
    }
    if name.contains("..") || name.starts_with('.') || name.ends_with('.') {
        return Err(BranchNameError::DotRule);
    }
    if name != trimmed {
        return Err(BranchNameError::Whitespace);
    }
    if RESERVED_NAMES.contains(&name) {
        return Err(BranchNameError::Reserved);
    }

    Ok(())
}
