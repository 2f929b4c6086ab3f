//! Configuration management following 12-factor app principles
//!
//! All configuration is loaded from environment variables to ensure
//! clean separation between code and config.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database connection URL (PostgreSQL)
    pub database_url: String,

    /// Completion backend base URL (streaming POST /chat)
    pub chat_api_url: String,

    /// Mode classification backend base URL (POST /tools)
    pub tools_api_url: String,

    /// Gmail REST API base URL
    pub gmail_api_url: String,

    /// Default language model for chat turns
    pub default_model: String,

    /// Runtime configuration
    pub log_level: String,
    pub rust_log: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        let config = Self {
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL is required"))?,

            chat_api_url: env::var("CHAT_API_URL")
                .map_err(|_| anyhow::anyhow!("CHAT_API_URL is required"))?,
            tools_api_url: env::var("TOOLS_API_URL")
                .map_err(|_| anyhow::anyhow!("TOOLS_API_URL is required"))?,
            gmail_api_url: env::var("GMAIL_API_URL")
                .unwrap_or_else(|_| "https://gmail.googleapis.com/gmail/v1".to_string()),

            default_model: env::var("DEFAULT_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            rust_log: env::var("RUST_LOG").unwrap_or_else(|_| "sunday=debug".to_string()),
        };

        Ok(config)
    }
}
