//! Letter count tool: counts occurrences of a letter in a word or phrase.

use async_trait::async_trait;
use parley_core::tool::parse_arguments;
use parley_core::{RunContext, Tool, ToolError};
use serde::Deserialize;

pub struct CountLettersTool;

#[derive(Deserialize)]
struct CountLettersArgs {
    word: String,
    letter: String,
}

#[async_trait]
impl Tool for CountLettersTool {
    fn name(&self) -> &str {
        "CountLettersTool"
    }

    fn description(&self) -> &str {
        "Count the number of times a letter appears in a word or phrase."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "word": {
                    "type": "string",
                    "description": "The word or phrase whose letters you want to count."
                },
                "letter": {
                    "type": "string",
                    "description": "The letter you want to count in the word or phrase."
                }
            },
            "required": ["word", "letter"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        _context: &RunContext,
    ) -> Result<String, ToolError> {
        let args: CountLettersArgs = parse_arguments(self.name(), arguments)?;
        if args.letter.is_empty() {
            return Err(ToolError::failed(self.name(), "letter must not be empty"));
        }
        let count = count_occurrences(&args.word, &args.letter);
        Ok(format!(
            "There are {count} \"{}\"s in \"{}\".",
            args.letter.to_uppercase(),
            args.word
        ))
    }
}

/// Case-insensitive count of non-overlapping occurrences of `needle`.
pub fn count_occurrences(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    haystack
        .to_lowercase()
        .matches(&needle.to_lowercase())
        .count()
}
