//! API route handlers
//!
//! This module contains all HTTP route handlers for the server.

pub mod config;
pub mod conversations;
pub mod events;
pub mod files;
pub mod health;
pub mod messages;
pub mod prompts;
pub mod sessions;
pub mod ui;
