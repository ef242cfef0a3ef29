//! Prompt text for the garment rewriter.

/// Wraps a shopper's description in the rewriting instructions.
#[must_use]
pub fn build_rewrite_instruction(prompt: &str) -> String {
    format!(
        "You are a fashion expert and also an expert in prompting Google's image generation \
         model, Imagen. The user describes their ideal piece of clothing, either directly or \
         through the mood and feel they are after; vague descriptions are acceptable. \
         Rewrite the following prompt into a single, enhanced prompt for a text-to-image model. \
         Focus on a visually rich and detailed description of a **single** piece of clothing. \
         Do not provide multiple options or explanations. \
         The image must be in the style of professional studio photography. \
         The image must not include a model, just the **single** piece of clothing. \
         If no gender is specified, default to a gender neutral style. \
         Directly output the rewritten prompt. Original prompt: '{prompt}'"
    )
}

/// Trims a rewriter reply and drops one pair of wrapping double quotes.
///
/// A lone `"` both opens and closes, so it cleans to an empty prompt.
#[must_use]
pub fn clean_rewritten_prompt(reply: &str) -> String {
    let trimmed = reply.trim();
    if trimmed == "\"" {
        return String::new();
    }
    trimmed
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(trimmed)
        .to_string()
}
