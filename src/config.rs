// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use config::{Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Header the relay provider puts the shared secret in unless configured otherwise.
pub const DEFAULT_SECRET_HEADER: &str = "x-inbound-secret";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    /// Attempts made when SQLite reports the database as busy or locked.
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub busy_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub path: String,
    pub header_name: String,
    /// When set, takes precedence over the credential record in the database.
    pub secret: Option<String>,
    pub max_payload_bytes: usize,
    pub processing_timeout_secs: u64,
    pub max_raw_snapshot_bytes: usize,
}

impl WebhookConfig {
    pub fn processing_timeout(&self) -> Duration {
        Duration::from_secs(self.processing_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentConfig {
    pub enabled: bool,
    pub directory: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub log: LogConfig,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub webhook: WebhookConfig,
    pub attachments: AttachmentConfig,
}

impl Settings {
    pub fn new(config_path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut config_builder = config::Config::builder()
            // Log defaults
            .set_default("log.level", "info")?

            // Server defaults
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?

            // Database defaults
            .set_default("database.url", "sqlite:data/tempinbox.db")?
            .set_default("database.max_connections", 5)?
            .set_default("database.max_retries", 3)?
            .set_default("database.retry_backoff_ms", 50)?
            .set_default("database.busy_timeout_ms", 5000)?

            // Webhook defaults
            .set_default("webhook.path", "/api/inbound-email")?
            .set_default("webhook.header_name", DEFAULT_SECRET_HEADER)?
            .set_default("webhook.max_payload_bytes", 25 * 1024 * 1024)?
            .set_default("webhook.processing_timeout_secs", 30)?
            .set_default("webhook.max_raw_snapshot_bytes", 256 * 1024)?

            // Attachment defaults
            .set_default("attachments.enabled", true)?
            .set_default("attachments.directory", "data/attachments")?;

        if let Some(path) = config_path {
            config_builder = config_builder.add_source(File::with_name(path));
        }

        // e.g. `TEMPINBOX__WEBHOOK__SECRET=...` would override `webhook.secret`
        config_builder = config_builder.add_source(
            Environment::with_prefix("TEMPINBOX")
                .prefix_separator("__")
                .separator("__")
                .ignore_empty(true),
        );

        // Short names commonly set by hosting platforms
        let env_vars = [
            ("DATABASE_URL", "database.url"),
            ("HOST", "server.host"),
            ("PORT", "server.port"),
            ("INBOUND_SECRET", "webhook.secret"),
            ("INBOUND_SECRET_HEADER", "webhook.header_name"),
            ("ATTACHMENTS_DIR", "attachments.directory"),
        ];

        for (env_var, config_path) in &env_vars {
            if let Ok(value) = env::var(env_var) {
                if value.is_empty() {
                    continue;
                }
                if *env_var == "PORT" {
                    let port = value.parse::<u16>().map_err(|_| {
                        config::ConfigError::Message(format!("Invalid port value in {}: {}", env_var, value))
                    })?;
                    config_builder = config_builder.set_override(config_path, port)?;
                } else {
                    config_builder = config_builder.set_override(config_path, value)?;
                }
            }
        }

        config_builder.build()?.try_deserialize()
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig { level: "info".to_string() }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            workers: None,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:data/tempinbox.db".to_string(),
            max_connections: 5,
            max_retries: 3,
            retry_backoff_ms: 50,
            busy_timeout_ms: 5000,
        }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            path: "/api/inbound-email".to_string(),
            header_name: DEFAULT_SECRET_HEADER.to_string(),
            secret: None,
            max_payload_bytes: 25 * 1024 * 1024,
            processing_timeout_secs: 30,
            max_raw_snapshot_bytes: 256 * 1024,
        }
    }
}

impl Default for AttachmentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: "data/attachments".to_string(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log: LogConfig::default(),
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            webhook: WebhookConfig::default(),
            attachments: AttachmentConfig::default(),
        }
    }
}
