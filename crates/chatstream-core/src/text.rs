//! Text post-processing for model output

const FENCE: &str = "```";

/// Remove a wrapping triple-backtick code fence (with optional language tag).
///
/// Safe on partial output: an opening fence is stripped even if the closing
/// one hasn't arrived yet.
pub fn strip_code_fence(s: &str) -> String {
    let mut text = s.trim();

    if let Some(after_fence) = text.strip_prefix(FENCE) {
        text = match text.find('\n') {
            Some(newline) => &text[newline + 1..],
            // Only the opening line so far: drop the fence and its tag
            None => {
                let tag_len = after_fence
                    .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
                    .unwrap_or(after_fence.len());
                after_fence[tag_len..].trim_start()
            }
        };
    }

    if let Some(before_fence) = text.strip_suffix(FENCE) {
        text = before_fence.trim_end();
    }

    text.to_string()
}
