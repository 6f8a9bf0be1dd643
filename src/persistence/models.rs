use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::PricingConfig;
use crate::llm::{Role, Usage};

/// One entry in a conversation transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Accumulated token counters for a conversation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCount {
    #[serde(default)]
    pub input: u64,
    #[serde(default)]
    pub output: u64,
    #[serde(default)]
    pub total: u64,
}

impl TokenCount {
    /// Add a turn's usage, keeping `total == input + output`
    pub fn add(&mut self, input: u64, output: u64) {
        self.input += input;
        self.output += output;
        self.total = self.input + self.output;
    }

    pub fn add_usage(&mut self, usage: &Usage) {
        self.add(usage.prompt_tokens, usage.completion_tokens);
    }

    pub fn estimated_cost_usd(&self, pricing: &PricingConfig) -> f64 {
        (self.input as f64 * pricing.input_per_million_usd
            + self.output as f64 * pricing.output_per_million_usd)
            / 1_000_000.0
    }
}

/// Persisted conversation, one JSON file per conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationLog {
    pub id: String,
    pub title: String,
    /// ISO-8601 time of the last save
    pub timestamp: String,
    pub prompt_id: Option<String>,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub token_count: TokenCount,
}

/// Row in the conversation history panel
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    pub id: Option<String>,
    pub title: String,
    pub timestamp: String,
    pub message_count: usize,
    /// `DD-MM-YYYY HH:MM`, or the raw timestamp when it does not parse
    pub display_date: String,
    pub file_path: PathBuf,
}

/// The subset of a log file needed for listing and id lookups.
/// Lenient so hand-edited or older files still show up.
#[derive(Debug, Deserialize)]
pub(crate) struct LogHeader {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub messages: Vec<serde::de::IgnoredAny>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_count_total_invariant() {
        let mut count = TokenCount::default();
        count.add(120, 80);
        count.add_usage(&Usage::new(10, 5));
        assert_eq!(count.input, 130);
        assert_eq!(count.output, 85);
        assert_eq!(count.total, count.input + count.output);
    }

    #[test]
    fn test_estimated_cost() {
        let count = TokenCount {
            input: 1_000_000,
            output: 500_000,
            total: 1_500_000,
        };
        let cost = count.estimated_cost_usd(&PricingConfig::default());
        assert!((cost - 3.30).abs() < 1e-9);
    }

    #[test]
    fn test_log_json_shape() {
        let log = ConversationLog {
            id: "0b8a4c1e-0000-4000-8000-000000000000".to_string(),
            title: "Bundfradrag".to_string(),
            timestamp: "2025-03-14T10:22:05.123456".to_string(),
            prompt_id: None,
            messages: vec![ChatMessage::user("Hvad er bundfradraget?")],
            token_count: TokenCount::default(),
        };

        let value = serde_json::to_value(&log).unwrap();
        assert_eq!(value["prompt_id"], serde_json::Value::Null);
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["token_count"]["total"], 0);
    }
}
