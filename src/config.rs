use std::{path::PathBuf, str::FromStr};

use log::warn;
use scratch_email_lettre::SmtpSettings;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} has an invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
    #[error("{0} must be set")]
    Missing(&'static str),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageConfig {
    Local {
        root: PathBuf,
    },
    Firebase {
        credentials: PathBuf,
        bucket: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchConfig {
    pub url: String,
    pub api_key: Option<String>,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub base_url: String,
    pub secret_key: String,
    pub database_url: String,
    pub log_file_path: String,
    pub log_archive_pattern: String,
    pub smtp: Option<SmtpSettings>,
    pub mail_from: String,
    pub search: Option<SearchConfig>,
    pub storage: StorageConfig,
    pub secure_cookies: bool,
    pub max_upload_bytes: usize,
    pub totp_issuer: String,
    pub bcrypt_cost: u32,
}

/// Reads variables through `lookup`, treating empty values as unset.
struct Vars<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    fn optional(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn or(&self, name: &str, default: &str) -> String {
        self.optional(name).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T: FromStr>(&self, name: &'static str, default: T) -> Result<T, ConfigError> {
        match self.optional(name) {
            None => Ok(default),
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid { name, value }),
        }
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.optional(name).ok_or(ConfigError::Missing(name))
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let vars = Vars { lookup };

        let secret_key = match vars.optional("SECRET_KEY") {
            Some(key) => key,
            None => {
                warn!("SECRET_KEY is not set, using an insecure default");
                "secret".to_string()
            }
        };

        let smtp = match vars.optional("MAIL_SERVER") {
            Some(host) => Some(SmtpSettings {
                host,
                username: vars.required("MAIL_USERNAME")?,
                password: vars.required("MAIL_PASSWORD")?,
            }),
            None => {
                warn!("MAIL_SERVER is not set, emails will only be logged");
                None
            }
        };

        let search = match vars.optional("MEILI_URL") {
            Some(url) => Some(SearchConfig {
                url,
                api_key: vars.optional("MEILI_API_KEY"),
            }),
            None => {
                warn!("MEILI_URL is not set, search is disabled");
                None
            }
        };

        let storage = match vars.or("STORAGE_BACKEND", "local").to_lowercase().as_str() {
            "local" => StorageConfig::Local {
                root: PathBuf::from(vars.or("STORAGE_LOCAL_ROOT", "uploads")),
            },
            "firebase" => StorageConfig::Firebase {
                credentials: PathBuf::from(vars.required("GOOGLE_APPLICATION_CREDENTIALS")?),
                bucket: vars.required("FIREBASE_STORAGE_BUCKET")?,
            },
            other => {
                return Err(ConfigError::Invalid {
                    name: "STORAGE_BACKEND",
                    value: other.to_string(),
                });
            }
        };

        let max_upload_mb: usize = vars.parsed("SCRATCH_MAX_UPLOAD_MB", 256)?;
        let bcrypt_cost: u32 = vars.parsed("BCRYPT_COST", 12)?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::Invalid {
                name: "BCRYPT_COST",
                value: bcrypt_cost.to_string(),
            });
        }

        Ok(Self {
            host: vars.or("SCRATCH_HOST", "127.0.0.1"),
            port: vars.parsed("SCRATCH_PORT", 5000)?,
            base_url: vars
                .or("SCRATCH_BASE_URL", "http://localhost:5000")
                .trim_end_matches('/')
                .to_string(),
            secret_key,
            database_url: vars.or("DATABASE_URL", "sqlite://app.db?mode=rwc"),
            log_file_path: vars.or("LOG_FILE_PATH", "logs/scratch.log"),
            log_archive_pattern: vars.or("LOG_ARCHIVE_PATTERN", "logs/scratch.{}.log.gz"),
            smtp,
            mail_from: vars.or("MAIL_FROM", "scratch <noreply@localhost>"),
            search,
            storage,
            secure_cookies: vars.parsed("SCRATCH_SECURE_COOKIES", false)?,
            max_upload_bytes: max_upload_mb * 1024 * 1024,
            totp_issuer: vars.or("TOTP_ISSUER", "scratch"),
            bcrypt_cost,
        })
    }
}
