pub const BRANCH_PREFIXES: [&str; 7] = [
    "feature/",
    "bugfix/",
    "hotfix/",
    "refactor/",
    "docs/",
    "test/",
    "chore/",
];

pub const MAX_SUGGESTED_NAME_LENGTH: usize = 50;

const DESCRIPTION_LABEL: &str = "Task description:";
const DIFF_LABEL: &str = "Changes (git diff):";

/// Builds the single system instruction sent to the model.
///
/// A non-blank description takes precedence over the diff. With neither, the
/// instruction still asks for `count` names and the model falls back to
/// generic suggestions.
pub fn build_instruction(
    diff_context: Option<&str>,
    description: Option<&str>,
    count: u32,
) -> String {
    let content_block = match (non_blank(description), non_blank(diff_context)) {
        (Some(description), _) => Some(format!("{}\n{}", DESCRIPTION_LABEL, description)),
        (None, Some(diff)) => Some(format!("{}\n{}", DIFF_LABEL, diff)),
        (None, None) => None,
    };

    let mut prompt = format!(
        "You are an expert at naming git branches.\n\
         Generate exactly {count} branch name suggestions for the work described below.\n\
         \n\
         Rules:\n\
         - Start every name with one of these prefixes: {prefixes}\n\
         - Use kebab-case after the prefix (lowercase words separated by hyphens)\n\
         - Keep each name at most {max_len} characters long\n\
         - Every name must be unique within the list\n\
         \n\
         Output format:\n\
         - Exactly one branch name per line\n\
         - Order the names from most relevant to least relevant\n\
         - No numbering, no explanations, no extra commentary\n",
        count = count,
        prefixes = BRANCH_PREFIXES.join(", "),
        max_len = MAX_SUGGESTED_NAME_LENGTH,
    );

    if let Some(block) = content_block {
        prompt.push('\n');
        prompt.push_str(&block);
        prompt.push('\n');
    }

    prompt
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
