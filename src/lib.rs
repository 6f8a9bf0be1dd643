// Library exports for skatteret-assistant
// This allows the modules to be imported in tests and external code

pub mod config;
pub mod error;
pub mod llm;
pub mod persistence;
pub mod prompts;
pub mod run;
pub mod server;
pub mod session;
pub mod utils;
