//! Prompt pair sent to the script-writing model.

/// Fixed system instruction describing the JSON contract.
pub const SYSTEM_PROMPT: &str = r#"You are a podcast script writer. You turn source material into a lively, accurate conversation between two speakers: a Host who guides the episode and a Guest who explains the material.

Answer with a single JSON document and nothing else. It must match this structure:

{
  "title": "overall episode title (required, non-empty)",
  "summary": "one or two sentence summary (optional)",
  "script_segments": [
    {
      "segment_title": "short meaningful segment title (optional)",
      "paragraphs": [
        { "speaker": "Host", "text": "what the host says" },
        { "speaker": "Guest", "text": "what the guest says" }
      ]
    }
  ]
}

Rules:
- "speaker" is exactly "Host" or "Guest".
- Every segment has at least one paragraph and the script has at least one segment.
- Paragraph text is plain spoken prose that will be read aloud by a speech engine. Never use markdown: no asterisks, no underscores for emphasis, no bullet points, no lines starting with "- " or "* ", and do not surround hyphens with spaces.
- Cover the source material exhaustively without repeating yourself.
- Keep facts faithful to the source."#;

const USER_PROMPT_TEMPLATE: &str = "Write a two-person podcast script about the following source text.\n\n\
Source text:\n\"\"\"\n{source_text}\n\"\"\"";

/// Rendered system and user instructions for one generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPair {
    pub system: String,
    pub user: String,
}

pub fn render_user_prompt(source_text: &str) -> String {
    USER_PROMPT_TEMPLATE.replace("{source_text}", source_text.trim())
}

pub fn render(source_text: &str) -> PromptPair {
    PromptPair {
        system: SYSTEM_PROMPT.to_string(),
        user: render_user_prompt(source_text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embeds_source_text_in_user_prompt() {
        let prompts = render("  The ocean covers most of Earth.\n");
        assert!(prompts.user.contains("\"\"\"\nThe ocean covers most of Earth.\n\"\"\""));
        assert!(!prompts.user.contains("{source_text}"));
        assert_eq!(prompts.system, SYSTEM_PROMPT);
    }

    #[test]
    fn system_prompt_names_the_wire_fields() {
        for field in ["\"title\"", "\"summary\"", "\"script_segments\"", "\"segment_title\"", "\"paragraphs\""] {
            assert!(SYSTEM_PROMPT.contains(field), "{field}");
        }
    }
}
