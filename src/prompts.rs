//! Prompt templates for chunk and meta-summary calls

use serde::{Deserialize, Serialize};

/// What kind of content is being summarized; steers the prompt wording
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryMode {
    #[default]
    Document,
    Code,
}

/// System prompt for per-chunk and single-shot calls
pub const SUMMARY_SYSTEM_PROMPT: &str = "You are a concise technical summarizer. \
Extract the key points, decisions, and structure of the given text and compress \
them efficiently. Preserve names, figures, and code identifiers exactly.";

/// System prompt for the second-pass synthesis call
pub const META_SYSTEM_PROMPT: &str = "You are a technical editor. You will receive \
numbered section summaries of a single large document. Merge them into one \
coherent summary, removing repetition while keeping every distinct point. Do \
not mention the sectioning.";

/// Prompt for an input that fits a single call
pub fn single_shot_prompt(mode: SummaryMode, text: &str) -> String {
    format!("{}\n\n{}", instruction(mode), text)
}

/// Prompt for one chunk of a larger input
pub fn chunk_prompt(mode: SummaryMode, part: usize, total: usize, text: &str) -> String {
    format!(
        "{} This is part {part} of {total} of a larger document; summarize only \
         this part.\n\n{text}",
        instruction(mode)
    )
}

/// Prompt for the meta-summary over concatenated chunk summaries
pub fn meta_prompt(combined: &str) -> String {
    format!(
        "Synthesize the following section summaries into a single coherent \
         summary:\n\n{combined}"
    )
}

fn instruction(mode: SummaryMode) -> &'static str {
    match mode {
        SummaryMode::Document => "Summarize the following text.",
        SummaryMode::Code => {
            "Summarize the following code: describe its purpose, main components, \
             and notable behavior."
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_deserializes_lowercase() {
        let mode: SummaryMode = serde_json::from_str("\"code\"").unwrap();
        assert_eq!(mode, SummaryMode::Code);
        let mode: SummaryMode = serde_json::from_str("\"document\"").unwrap();
        assert_eq!(mode, SummaryMode::Document);
    }

    #[test]
    fn test_chunk_prompt_numbers_parts() {
        let prompt = chunk_prompt(SummaryMode::Document, 3, 9, "body");
        assert!(prompt.contains("part 3 of 9"));
        assert!(prompt.ends_with("body"));
    }

    #[test]
    fn test_code_mode_wording() {
        let prompt = single_shot_prompt(SummaryMode::Code, "fn main() {}");
        assert!(prompt.contains("code"));
    }
}
