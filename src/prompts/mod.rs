//! Prompt library and instruction selection
//!
//! Prompts are JSON files in the prompts directory, one per prompt:
//! `{"title": "...", "content": "..."}`. The file stem is the prompt id.
//! Independently of the library, sessions can answer with a fixed response
//! structure which takes precedence over any selected prompt.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::fs;

/// Fixed answer structure sent as run instructions when enabled
pub const FIXED_RESPONSE_STRUCTURE: &str = r#"Du er en skatterådgiver, der hjælper med at besvare spørgsmål om dansk skattelovgivning.
Du skal altid strukturere dine svar på følgende måde:

Emne: [kort opsummering af brugerens spørgsmål]

1. Angiver alle relevante lovgrundlag med specifikke paragraffer, som der bruges som kilde til svar
2. Uddybende svar
3. Forbehold

Vær præcis og klar i dine formuleringer og fokuser på at give praktisk anvendelig rådgivning."#;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptDefinition {
    /// Always the source file stem; an `id` in the file is ignored
    #[serde(skip_deserializing)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

/// All prompts available to a session, keyed by id
#[derive(Debug, Clone, Default)]
pub struct PromptLibrary {
    prompts: BTreeMap<String, PromptDefinition>,
}

impl PromptLibrary {
    /// Read every `*.json` file in `dir`. Files that fail to load are
    /// reported and skipped; a missing directory is created empty.
    pub async fn load_all(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create prompt directory {}", dir.display()))?;

        let mut prompts = BTreeMap::new();
        let mut entries = fs::read_dir(dir)
            .await
            .with_context(|| format!("Failed to read prompt directory {}", dir.display()))?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();

            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }

            match Self::load_prompt_file(&path).await {
                Ok(prompt) => {
                    prompts.insert(prompt.id.clone(), prompt);
                }
                Err(e) => {
                    tracing::warn!("Failed to load prompt from {}: {:#}", path.display(), e);
                }
            }
        }

        tracing::info!("Loaded {} prompts from {}", prompts.len(), dir.display());
        Ok(Self { prompts })
    }

    async fn load_prompt_file(path: &Path) -> Result<PromptDefinition> {
        let content = fs::read_to_string(path)
            .await
            .context("Failed to read prompt file")?;

        let mut prompt: PromptDefinition =
            serde_json::from_str(&content).context("Failed to parse prompt JSON")?;

        prompt.id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .context("Invalid filename")?
            .to_string();

        if prompt.title.trim().is_empty() {
            prompt.title = prompt.id.clone();
        }

        Ok(prompt)
    }

    pub fn get(&self, id: &str) -> Option<&PromptDefinition> {
        self.prompts.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.prompts.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PromptDefinition> {
        self.prompts.values()
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }
}

impl FromIterator<PromptDefinition> for PromptLibrary {
    fn from_iter<I: IntoIterator<Item = PromptDefinition>>(iter: I) -> Self {
        Self {
            prompts: iter.into_iter().map(|p| (p.id.clone(), p)).collect(),
        }
    }
}

/// Instructions to send with a run, if any.
///
/// The fixed structure wins when enabled; otherwise the active prompt's
/// content is used. Empty content means the assistant's own instructions
/// apply.
pub fn system_instructions(
    use_fixed_structure: bool,
    active_prompt: Option<&str>,
    library: &PromptLibrary,
) -> Option<String> {
    if use_fixed_structure {
        return Some(FIXED_RESPONSE_STRUCTURE.to_string());
    }

    active_prompt
        .and_then(|id| library.get(id))
        .map(|prompt| prompt.content.clone())
        .filter(|content| !content.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_all_skips_malformed_file() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();

        fs::write(
            dir.join("skatteraadgiver.json"),
            r#"{"title": "Skatterådgiver", "content": "Svar kort og præcist."}"#,
        )
        .await
        .unwrap();
        fs::write(
            dir.join("moms.json"),
            r#"{"title": "Moms", "content": "Fokusér på momsloven.", "author": "ignored"}"#,
        )
        .await
        .unwrap();
        fs::write(dir.join("broken.json"), r#"{"title": "#).await.unwrap();
        fs::write(dir.join("README.md"), "not a prompt").await.unwrap();

        let library = PromptLibrary::load_all(dir).await.unwrap();

        assert_eq!(library.len(), 2);
        assert!(!library.contains("broken"));
        assert_eq!(library.get("skatteraadgiver").unwrap().title, "Skatterådgiver");
        assert_eq!(library.get("moms").unwrap().content, "Fokusér på momsloven.");
    }

    #[tokio::test]
    async fn test_filename_overrides_id_field() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("arveafgift.json"),
            r#"{"id": "something-else", "title": "Arv", "content": "..."}"#,
        )
        .await
        .unwrap();

        let library = PromptLibrary::load_all(temp_dir.path()).await.unwrap();

        let prompt = library.get("arveafgift").unwrap();
        assert_eq!(prompt.id, "arveafgift");
        assert!(library.get("something-else").is_none());
    }

    #[tokio::test]
    async fn test_non_string_id_field_is_ignored() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("moms.json"),
            r#"{"id": 7, "title": "Moms", "content": "Fokusér på momsloven."}"#,
        )
        .await
        .unwrap();
        fs::write(
            temp_dir.path().join("selskab.json"),
            r#"{"id": {"nested": true}, "title": "Selskabsskat", "content": "x"}"#,
        )
        .await
        .unwrap();

        let library = PromptLibrary::load_all(temp_dir.path()).await.unwrap();

        assert_eq!(library.len(), 2);
        assert_eq!(library.get("moms").unwrap().id, "moms");
        assert_eq!(library.get("moms").unwrap().title, "Moms");
        assert_eq!(library.get("selskab").unwrap().title, "Selskabsskat");
    }

    #[tokio::test]
    async fn test_missing_directory_is_created() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("prompts");

        let library = PromptLibrary::load_all(&dir).await.unwrap();

        assert!(library.is_empty());
        assert!(dir.is_dir());
    }

    #[test]
    fn test_system_instructions_selection() {
        let library: PromptLibrary = vec![
            PromptDefinition {
                id: "kort".to_string(),
                title: "Kort".to_string(),
                content: "Svar i tre sætninger.".to_string(),
            },
            PromptDefinition {
                id: "tom".to_string(),
                title: "Tom".to_string(),
                content: "  ".to_string(),
            },
        ]
        .into_iter()
        .collect();

        assert_eq!(
            system_instructions(true, Some("kort"), &library).as_deref(),
            Some(FIXED_RESPONSE_STRUCTURE)
        );
        assert_eq!(
            system_instructions(false, Some("kort"), &library).as_deref(),
            Some("Svar i tre sætninger.")
        );
        assert_eq!(system_instructions(false, Some("tom"), &library), None);
        assert_eq!(system_instructions(false, Some("ukendt"), &library), None);
        assert_eq!(system_instructions(false, None, &library), None);
    }
}
