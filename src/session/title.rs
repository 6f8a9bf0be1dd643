//! Conversation title generation

use chrono::{DateTime, Local};

use crate::llm::AssistantApi;
use crate::persistence::ChatMessage;
use crate::utils::truncate_str;

/// Prefix of the title used when generation fails
pub const FALLBACK_TITLE_PREFIX: &str = "Skattesamtale";

pub const MAX_TITLE_WORDS: usize = 8;

/// Messages fed to the title model
const CONTEXT_MESSAGES: usize = 4;

/// Characters kept from each context message
const CONTEXT_CHARS: usize = 200;

const TITLE_MAX_TOKENS: u32 = 40;
const TITLE_TEMPERATURE: f32 = 0.3;

/// Ask the title model for a short title. Never fails: any error, or an
/// empty answer, yields the dated fallback title.
pub async fn generate_title(api: &dyn AssistantApi, model: &str, messages: &[ChatMessage]) -> String {
    let prompt = title_prompt(messages);

    match api
        .complete_text(model, &prompt, TITLE_MAX_TOKENS, TITLE_TEMPERATURE)
        .await
    {
        Ok(raw) => {
            let title = clean_title(&raw, MAX_TITLE_WORDS);
            if title.is_empty() {
                tracing::warn!("Title model returned an empty title");
                fallback_title(Local::now())
            } else {
                title
            }
        }
        Err(e) => {
            tracing::error!("Could not generate conversation title: {}", e);
            fallback_title(Local::now())
        }
    }
}

pub fn fallback_title(now: DateTime<Local>) -> String {
    format!("{} {}", FALLBACK_TITLE_PREFIX, now.format("%d-%m-%Y %H:%M"))
}

fn title_prompt(messages: &[ChatMessage]) -> String {
    let context = messages
        .iter()
        .take(CONTEXT_MESSAGES)
        .map(|m| format!("{}: {}...", m.role, truncate_str(&m.content, CONTEXT_CHARS)))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Nedenstående er en samtale om skatteret.\n\
         Generer en kort, beskrivende titel på maksimalt {MAX_TITLE_WORDS} ord, der opsummerer samtalens hovedemne.\n\
         Du skal kun svare med titlen, intet andet.\n\n\
         Samtale:\n{context}"
    )
}

/// Trim, strip surrounding quotes and cap the word count
fn clean_title(raw: &str, max_words: usize) -> String {
    let stripped = raw.trim().trim_matches(|c| c == '"' || c == '\'');
    let words: Vec<&str> = stripped.split_whitespace().collect();

    if words.len() > max_words {
        words[..max_words].join(" ")
    } else {
        stripped.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteError;
    use crate::llm::mock::MockAssistantApi;
    use regex::Regex;

    fn conversation() -> Vec<ChatMessage> {
        vec![
            ChatMessage::user("Hvordan beskattes udbytte fra unoterede aktier?"),
            ChatMessage::assistant("x".repeat(500)),
            ChatMessage::user("Og for selskaber?"),
            ChatMessage::assistant("Emne: Selskabers udbytte"),
            ChatMessage::user("Denne besked kommer ikke med"),
        ]
    }

    #[tokio::test]
    async fn test_title_from_completion() {
        let api = MockAssistantApi::default();
        *api.completion.lock().unwrap() = Ok("\"Beskatning af udbytte\"".to_string());

        let title = generate_title(&api, "gpt-3.5-turbo", &conversation()).await;

        assert_eq!(title, "Beskatning af udbytte");
    }

    #[tokio::test]
    async fn test_prompt_uses_first_four_truncated_messages() {
        let api = MockAssistantApi::default();

        generate_title(&api, "gpt-3.5-turbo", &conversation()).await;

        let prompts = api.prompts.lock().unwrap();
        let prompt = &prompts[0];
        assert!(prompt.contains("user: Hvordan beskattes udbytte fra unoterede aktier?..."));
        assert!(prompt.contains(&format!("assistant: {}...", "x".repeat(200))));
        assert!(!prompt.contains(&"x".repeat(201)));
        assert!(!prompt.contains("Denne besked kommer ikke med"));
        assert!(prompt.contains("maksimalt 8 ord"));
    }

    #[tokio::test]
    async fn test_failure_falls_back_to_dated_title() {
        let api = MockAssistantApi::default();
        *api.completion.lock().unwrap() = Err(RemoteError::Api {
            endpoint: "/chat/completions".to_string(),
            status: 500,
            body: "boom".to_string(),
        });

        let title = generate_title(&api, "gpt-3.5-turbo", &conversation()).await;

        let pattern = Regex::new(r"^Skattesamtale \d{2}-\d{2}-\d{4} \d{2}:\d{2}$").unwrap();
        assert!(pattern.is_match(&title), "{title}");
    }

    #[tokio::test]
    async fn test_blank_completion_falls_back() {
        let api = MockAssistantApi::default();
        *api.completion.lock().unwrap() = Ok("  \"\"  ".to_string());

        let title = generate_title(&api, "gpt-3.5-turbo", &conversation()).await;

        assert!(title.starts_with(FALLBACK_TITLE_PREFIX));
    }

    #[test]
    fn test_clean_title_truncates_words() {
        assert_eq!(
            clean_title("'En meget lang titel der slet ikke overholder grænsen på otte ord'", 8),
            "En meget lang titel der slet ikke overholder"
        );
        assert_eq!(clean_title("  Moms  ", 8), "Moms");
    }
}
