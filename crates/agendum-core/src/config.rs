//! Agendum configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgendumConfig {
    #[serde(default)]
    pub db_path: Option<String>,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub push: PushConfig,
}

impl AgendumConfig {
    /// Load config from the default path (~/.agendum/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::error::AgendumError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| crate::error::AgendumError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::AgendumError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Agendum home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".agendum")
    }

    /// Resolved database path (config override or default under home).
    pub fn resolved_db_path(&self) -> PathBuf {
        match &self.db_path {
            Some(p) => PathBuf::from(p),
            None => Self::home_dir().join("agendum.db"),
        }
    }
}

/// HTTP/WebSocket gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_port() -> u16 {
    4000
}
fn default_bind() -> String {
    "0.0.0.0".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
        }
    }
}

/// Periodic job configuration. The reminder lookahead window is fixed in the
/// scheduler crate and is deliberately not configurable here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Reminder sweep period in seconds.
    #[serde(default = "default_reminder_interval")]
    pub reminder_interval_secs: u64,
    /// Trial-expiry sweep period in seconds.
    #[serde(default = "default_account_interval")]
    pub account_interval_secs: u64,
}

fn default_reminder_interval() -> u64 {
    60
}
fn default_account_interval() -> u64 {
    3600
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            reminder_interval_secs: default_reminder_interval(),
            account_interval_secs: default_account_interval(),
        }
    }
}

/// SMTP configuration for outbound mail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_from_name")]
    pub from_name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".into()
}
fn default_smtp_port() -> u16 {
    587
}
fn default_from_name() -> String {
    "Agendum".into()
}
fn default_true() -> bool {
    true
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            email: String::new(),
            password: String::new(),
            from_name: default_from_name(),
            enabled: true,
        }
    }
}

/// Push provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushConfig {
    /// Expo push API endpoint for native tokens.
    #[serde(default = "default_expo_url")]
    pub expo_api_url: String,
    /// VAPID public key handed to web clients at subscribe time.
    #[serde(default)]
    pub vapid_public_key: String,
    /// Contact address reported to web-push services.
    #[serde(default = "default_vapid_contact")]
    pub vapid_contact: String,
}

fn default_expo_url() -> String {
    "https://exp.host/--/api/v2/push/send".into()
}
fn default_vapid_contact() -> String {
    "mailto:ops@agendum.app".into()
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            expo_api_url: default_expo_url(),
            vapid_public_key: String::new(),
            vapid_contact: default_vapid_contact(),
        }
    }
}
