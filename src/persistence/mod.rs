//! Conversation log persistence

pub mod models;
mod store;

pub use models::{ChatMessage, ConversationLog, ConversationSummary, TokenCount};
pub use store::{default_title, display_date, ConversationStore};
