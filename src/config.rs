//! Configuration module for environment variables and application settings
//!
//! Loaded once in `main` and passed explicitly into `server::start`. Missing
//! required variables (signing secret, storage URL, upload credentials) are
//! fatal at startup.

use anyhow::{Result, anyhow};
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    /// Secret used to sign session tokens
    pub jwt_secret: String,

    /// PostgreSQL connection URL
    pub database_url: String,

    /// Image store credentials
    pub upload: UploadConfig,

    /// Server configuration
    pub server: ServerConfig,
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub endpoint: String,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            jwt_secret: env::var("JWT_SECRET")
                .map_err(|_| anyhow!("JWT_SECRET environment variable is required"))?,

            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow!("DATABASE_URL environment variable is required"))?,

            upload: UploadConfig {
                endpoint: env::var("UPLOAD_ENDPOINT")
                    .map_err(|_| anyhow!("UPLOAD_ENDPOINT environment variable is required"))?,
                api_key: env::var("UPLOAD_API_KEY")
                    .map_err(|_| anyhow!("UPLOAD_API_KEY environment variable is required"))?,
            },

            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "4000".to_string())
                    .parse()
                    .unwrap_or(4000),
            },
        })
    }
}
