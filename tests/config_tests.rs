use anyhow::Result;
use serial_test::serial;
use skatteret_assistant::config::{Config, API_KEY_ENV};
use skatteret_assistant::error::ConfigError;
use std::fs;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;

// Mutex to serialize tests that modify environment variables
static ENV_MUTEX: Mutex<()> = Mutex::new(());

#[test]
fn test_config_default() {
    let config = Config::default();

    assert_eq!(config.assistant.assistant_id, "asst_gknNNm2uyfxPyuzxx0JHfhtF");
    assert_eq!(config.assistant.vector_store_id, "vs_67d1e99c789c8191bd776ac5437cbc08");
    assert_eq!(config.assistant.base_url, "https://api.openai.com/v1");
    assert_eq!(config.assistant.title_model, "gpt-3.5-turbo");
    assert!(config.assistant.use_fixed_structure);

    assert_eq!(config.storage.prompts_dir.to_str(), Some("prompts"));
    assert_eq!(config.storage.logs_dir.to_str(), Some("logs"));

    assert_eq!(config.polling.interval(), Duration::from_secs(1));
    assert_eq!(config.polling.deadline(), Some(Duration::from_secs(600)));

    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 8501);
    assert!(!config.server.cors_enabled);
}

#[test]
fn test_config_serialization() -> Result<()> {
    let config = Config::default();

    let toml_str = toml::to_string_pretty(&config)?;
    assert!(toml_str.contains("[assistant]"));
    assert!(!toml_str.contains("api_key"));
    assert!(!toml_str.contains("sk-"));

    let deserialized: Config = toml::from_str(&toml_str)?;
    assert_eq!(config.assistant.assistant_id, deserialized.assistant.assistant_id);
    assert_eq!(config.polling.interval_ms, deserialized.polling.interval_ms);

    Ok(())
}

#[test]
fn test_partial_file_keeps_defaults() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
[assistant]
assistant_id = "asst_custom"

[polling]
deadline_secs = 0
"#,
    )?;

    let config = Config::load_from(&path)?;

    assert_eq!(config.assistant.assistant_id, "asst_custom");
    assert_eq!(config.assistant.vector_store_id, "vs_67d1e99c789c8191bd776ac5437cbc08");
    assert_eq!(config.polling.interval_ms, 1000);
    assert_eq!(config.polling.deadline(), None);
    assert_eq!(config.server.port, 8501);

    Ok(())
}

#[test]
fn test_invalid_file_reports_path() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("config.toml");
    fs::write(&path, "[assistant\nassistant_id = ")?;

    match Config::load_from(&path) {
        Err(ConfigError::Parse { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("expected parse error, got {:?}", other.map(|_| ())),
    }

    Ok(())
}

#[test]
#[serial]
fn test_api_key_from_environment() {
    let _guard = ENV_MUTEX.lock().unwrap();
    std::env::set_var(API_KEY_ENV, "sk-env");

    assert_eq!(Config::default().api_key().unwrap(), "sk-env");

    std::env::remove_var(API_KEY_ENV);
}

#[test]
#[serial]
fn test_api_key_in_config_file_is_not_a_credential() -> Result<()> {
    let _guard = ENV_MUTEX.lock().unwrap();
    std::env::remove_var(API_KEY_ENV);

    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
[assistant]
api_key = "sk-file"
assistant_id = "asst_custom"
"#,
    )?;

    let config = Config::load_from(&path)?;

    assert_eq!(config.assistant.assistant_id, "asst_custom");
    assert!(matches!(
        config.api_key(),
        Err(ConfigError::MissingCredential { .. })
    ));
    assert!(!toml::to_string_pretty(&config)?.contains("sk-file"));

    Ok(())
}

#[test]
#[serial]
fn test_missing_api_key_is_an_error() {
    let _guard = ENV_MUTEX.lock().unwrap();
    std::env::set_var(API_KEY_ENV, "   ");

    let err = Config::default().api_key().unwrap_err();
    assert!(matches!(err, ConfigError::MissingCredential { var } if var == API_KEY_ENV));
    assert!(err.to_string().contains(API_KEY_ENV));

    std::env::remove_var(API_KEY_ENV);
}
