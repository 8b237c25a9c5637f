use super::error::{FailureKind, GenerationError, RequestFailure};
use super::schema::ChatCompletionResponse;

/// Pulls `choices[0].message.content` out of a raw response body.
pub fn extract_content(body: &str) -> Result<String, RequestFailure> {
    let response: ChatCompletionResponse = serde_json::from_str(body).map_err(|e| {
        RequestFailure::new(
            FailureKind::InvalidResponse,
            format!(
                "Failed to parse API response: {} - Raw response: {}",
                e,
                body.chars().take(200).collect::<String>()
            ),
        )
    })?;

    let choice = response.choices.into_iter().next().ok_or_else(|| {
        RequestFailure::new(
            FailureKind::InvalidResponse,
            "API response contained no choices",
        )
    })?;

    Ok(choice.message.content.unwrap_or_default())
}

/// Splits the reply into candidate names: one per line, trimmed, blanks
/// dropped, order and duplicates kept, at most `count` entries.
pub fn parse_candidates(content: &str, count: usize) -> Result<Vec<String>, GenerationError> {
    let lines: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();

    if lines.is_empty() {
        return Err(GenerationError::Parse(
            "No branch names found in API response".to_string(),
        ));
    }

    Ok(lines.into_iter().take(count).collect())
}
