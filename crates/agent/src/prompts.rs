//! Prompt templates

/// Working instructions for the agent loop
pub const SYSTEM_WORKFLOW: &str = r#"## Workflow
1. Use List to find translatable files, then Read the file you are asked to translate.
2. Use Think with `segment_text` to split the content into segments of at most 300 characters.
3. Call Translate once per segment, in document order, passing the file path as `file_id`.
   Each draft is reviewed by a human; the returned `translated_string` is final.
4. When a segment comes back with status `reject` or `refined`, read the reason and apply
   that preference to every later segment.
5. When every segment is done, reply with a short summary. Do not call tools after that.

## Rules
- Never translate more than one segment per Translate call.
- Keep Markdown structure, code spans and URLs intact.
- If a tool returns an error, explain it to the user instead of retrying blindly."#;

/// Prompt for drafting one segment
pub fn translation_prompt(src: &str, target_language: &str, context: Option<&str>) -> String {
    let context = context
        .filter(|c| !c.trim().is_empty())
        .map(|c| format!("Context: {}\n\n", c))
        .unwrap_or_default();

    format!(
        "Translate the following English text to {}. Provide a natural, accurate translation \
         that maintains the original meaning and tone.\n\n{}Source text: {}\n\nTranslation:",
        target_language, context, src
    )
}
