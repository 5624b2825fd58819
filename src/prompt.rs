/// Prompts longer than this abort the Run before any invocation
pub const PROMPT_CHAR_LIMIT: usize = 20_000;

/// Render the final prompt from the configured template.
///
/// `{footer}` selects between the zero-shot and chain-of-thought footers; when
/// the template has no marker the footer is appended on its own line. The
/// `[[placeholder]]` slot carries an image description for questions that
/// reference one.
pub fn render_prompt(
    template: &str,
    utterance: &str,
    alternatives: &str,
    footer_zero_shot: &str,
    footer_cot: &str,
    use_cot: bool,
    image_description: Option<&str>,
) -> String {
    let footer = if use_cot { footer_cot } else { footer_zero_shot };

    let mut prompt = if template.contains("{footer}") {
        template.replace("{footer}", footer)
    } else if !footer_zero_shot.is_empty() || !footer_cot.is_empty() {
        format!("{template}\n{footer}")
    } else {
        template.to_string()
    };

    prompt = prompt.replace("{utterance}", utterance);
    prompt = prompt.replace("{alternatives}", alternatives);

    if let Some(description) = image_description {
        prompt = prompt.replace("[[placeholder]]", description);
    }

    prompt
}

/// Flatten the configured system prompt to a single line; empty text means
/// no system message is sent.
pub fn system_prompt(text: &str) -> Option<String> {
    if text.is_empty() {
        return None;
    }
    Some(text.replace('\n', " "))
}
