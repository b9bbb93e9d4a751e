// ============================================================================
// File: src/lib.rs
// Search arXiv and chat about a selected paper with a chat-completion model
// ============================================================================

pub mod browser;
pub mod config;
pub mod conversation;
pub mod credentials;
pub mod llm_client;
pub mod markdown;
pub mod models;
pub mod render;
pub mod repl;
pub mod search_client;
pub mod telemetry;
