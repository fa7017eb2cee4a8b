use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::pipeline::domain::SourceId;

pub const DEFAULT_CONFIG_PATH: &str = "config.json";
const DEFAULT_DATABASE_URL: &str = "sqlite://obituary.db?mode=rwc";
const DEFAULT_OCR_LANGUAGE: &str = "deu";
const DEFAULT_LOG_LEVEL: &str = "info";

fn default_retention_days() -> i64 {
    14
}

/// Everything a run needs, resolved once in `main` and passed down. There is
/// no global configuration state.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub telemetry: TelemetryConfig,
    pub database_url: String,
    pub ocr_language: String,
    pub notifier: NotifierConfig,
    pub keywords: Vec<String>,
    pub sources: Vec<SourceConfig>,
}

/// Authenticated SMTP submission settings.
#[derive(Debug, Clone, Deserialize)]
pub struct NotifierConfig {
    pub server_address: String,
    pub server_port: u16,
    pub sender_address: String,
    /// Usually left empty in the file and supplied via `OBIT_SMTP_PASSWORD`.
    #[serde(default)]
    pub sender_password: String,
    pub receiver_addresses: Vec<String>,
}

/// One monitored undertaker.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub identifier: SourceId,
    pub base_url: String,
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// On-disk shape of the JSON configuration file.
#[derive(Debug, Deserialize)]
struct FileConfig {
    notifier: NotifierConfig,
    #[serde(default)]
    keywords: Vec<String>,
    sources: Vec<SourceConfig>,
    #[serde(default)]
    database_url: Option<String>,
    #[serde(default)]
    ocr_language: Option<String>,
}

impl AppConfig {
    /// Load the JSON file at `path` and apply environment overrides
    /// (`OBIT_DATABASE_URL`, `OBIT_SMTP_PASSWORD`, `OBIT_LOG_LEVEL`).
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: FileConfig =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Self::resolve(file)
    }

    fn resolve(file: FileConfig) -> Result<Self, ConfigError> {
        let mut notifier = file.notifier;
        if let Ok(password) = env::var("OBIT_SMTP_PASSWORD") {
            notifier.sender_password = password;
        }
        if notifier.sender_password.is_empty() {
            return Err(ConfigError::MissingSmtpPassword);
        }

        for source in &file.sources {
            if source.retention_days <= 0 {
                return Err(ConfigError::InvalidRetention {
                    source: source.identifier.0.clone(),
                });
            }
        }

        let database_url = env::var("OBIT_DATABASE_URL")
            .ok()
            .or(file.database_url)
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());
        let log_level =
            env::var("OBIT_LOG_LEVEL").unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string());

        Ok(Self {
            telemetry: TelemetryConfig { log_level },
            database_url,
            ocr_language: file
                .ocr_language
                .unwrap_or_else(|| DEFAULT_OCR_LANGUAGE.to_string()),
            notifier,
            keywords: file.keywords,
            sources: file.sources,
        })
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    MissingSmtpPassword,
    InvalidRetention {
        source: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read { path, .. } => {
                write!(f, "unable to read config file {}", path.display())
            }
            ConfigError::Parse { path, .. } => {
                write!(f, "config file {} is not valid JSON", path.display())
            }
            ConfigError::MissingSmtpPassword => write!(
                f,
                "no SMTP password: set notifier.sender_password or OBIT_SMTP_PASSWORD"
            ),
            ConfigError::InvalidRetention { source } => {
                write!(f, "source '{source}' must keep a positive retention_days")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::MissingSmtpPassword | ConfigError::InvalidRetention { .. } => None,
        }
    }
}
