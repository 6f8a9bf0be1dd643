use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use skatteret_assistant::config::{Config, API_KEY_ENV};
use skatteret_assistant::llm::openai::OpenAiAssistantsClient;
use skatteret_assistant::persistence::ConversationStore;
use skatteret_assistant::server;

#[derive(Parser)]
#[command(name = "skatteret-assistant")]
#[command(about = "Browser chat front-end for a tax-law assistant", long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web front-end (default)
    Serve {
        /// Address to bind
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
        /// Allow cross-origin requests
        #[arg(long)]
        cors: bool,
    },
    /// Configure the assistant
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
        /// Set the remote assistant id
        #[arg(long)]
        assistant_id: Option<String>,
        /// Set the document index id
        #[arg(long)]
        vector_store_id: Option<String>,
    },
    /// Manage stored conversations
    Conversations {
        #[command(subcommand)]
        action: ConversationCommands,
    },
}

#[derive(Subcommand)]
enum ConversationCommands {
    /// List stored conversations, most recently saved first
    List,
    /// Delete a stored conversation by id
    Delete { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "skatteret_assistant=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    match cli.command {
        None => serve(config, None, None, false).await?,
        Some(Commands::Serve { host, port, cors }) => serve(config, host, port, cors).await?,
        Some(Commands::Config {
            show,
            assistant_id,
            vector_store_id,
        }) => {
            handle_config(config, show, assistant_id, vector_store_id)?;
        }
        Some(Commands::Conversations { action }) => {
            handle_conversations(&config, action).await?;
        }
    }

    Ok(())
}

async fn serve(mut config: Config, host: Option<String>, port: Option<u16>, cors: bool) -> Result<()> {
    // No credential, no server
    let api_key = config.api_key()?;

    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    config.server.cors_enabled |= cors;

    let client = OpenAiAssistantsClient::from_config(&config.assistant, api_key);

    server::start_server(config, Arc::new(client)).await
}

fn handle_config(
    mut config: Config,
    show: bool,
    assistant_id: Option<String>,
    vector_store_id: Option<String>,
) -> Result<()> {
    if show {
        println!("Current configuration:");
        println!("{}", toml::to_string_pretty(&config)?);
        let credential = if config.api_key().is_ok() { "set" } else { "not set" };
        println!("{}: {}", API_KEY_ENV, credential);
        return Ok(());
    }

    let mut changed = false;

    if let Some(id) = assistant_id {
        config.assistant.assistant_id = id;
        changed = true;
        println!("Assistant id updated");
    }

    if let Some(id) = vector_store_id {
        config.assistant.vector_store_id = id;
        changed = true;
        println!("Vector store id updated");
    }

    if changed {
        config.save()?;
        println!("Configuration saved to: {:?}", Config::config_path()?);
    } else {
        println!("No changes made. Use --show to view current configuration.");
    }

    Ok(())
}

async fn handle_conversations(config: &Config, action: ConversationCommands) -> Result<()> {
    let store = ConversationStore::new(config.storage.logs_dir.clone()).await?;

    match action {
        ConversationCommands::List => {
            let conversations = store.list_all().await;
            if conversations.is_empty() {
                println!("No stored conversations in {}", store.dir().display());
            }
            for c in conversations {
                println!(
                    "{}  {:<16}  {:>3} messages  {}",
                    c.id.as_deref().unwrap_or("-"),
                    c.display_date,
                    c.message_count,
                    c.title
                );
            }
        }
        ConversationCommands::Delete { id } => {
            if store.delete(&id).await? {
                println!("Deleted conversation {}", id);
            } else {
                anyhow::bail!("Conversation not found: {}", id);
            }
        }
    }

    Ok(())
}
