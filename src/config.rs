use crate::error::{Error, Result};
use serde::Deserialize;
use std::{fs, path::Path};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(rename = "einvoice")]
    pub provider: ProviderConfig,
    pub card: CardConfig,
    pub upload: UploadConfig,
    pub pushover: PushoverConfig,
}

/// Credentials for the government e-invoice app API.
#[derive(Clone, Deserialize)]
pub struct ProviderConfig {
    pub app_id: String,
    pub api_key: String,
    #[serde(default = "default_provider_url")]
    pub base_url: String,
    /// Seconds the signed request stays valid.
    #[serde(default = "default_ts_tolerance")]
    pub ts_tolerance: i64,
}

#[derive(Clone, Deserialize)]
pub struct CardConfig {
    #[serde(default = "default_card_type")]
    pub card_type: String,
    pub card_number: String,
    pub card_encrypt: String,
}

#[derive(Clone, Deserialize)]
pub struct UploadConfig {
    pub host: String,
    pub username: String,
    pub password: String,
}

#[derive(Clone, Deserialize)]
pub struct PushoverConfig {
    pub api_key: String,
    pub user_key: String,
    #[serde(default = "default_pushover_url")]
    pub base_url: String,
}

fn default_provider_url() -> String {
    "https://api.einvoice.nat.gov.tw".to_string()
}

fn default_ts_tolerance() -> i64 {
    180
}

// Mobile barcode carrier
fn default_card_type() -> String {
    "3J0002".to_string()
}

fn default_pushover_url() -> String {
    "https://api.pushover.net".to_string()
}

// Secrets stay out of logs.
impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("app_id", &self.app_id)
            .field("base_url", &self.base_url)
            .field("ts_tolerance", &self.ts_tolerance)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for CardConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardConfig")
            .field("card_type", &self.card_type)
            .field("card_number", &self.card_number)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for UploadConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadConfig")
            .field("host", &self.host)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for PushoverConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushoverConfig")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Load from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let cfg: Config =
            toml::from_str(content).map_err(|e| Error::Config(format!("invalid config: {e}")))?;
        Ok(cfg.trimmed())
    }

    /// Build from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup, so the environment mapping is testable
    /// without touching process state.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| Error::Config(format!("missing environment variable {key}")))
        };

        let ts_tolerance = match lookup("EINVOICE_TS_TOLERANCE") {
            Some(raw) => raw.parse().map_err(|_| {
                Error::Config(format!("EINVOICE_TS_TOLERANCE is not an integer: {raw}"))
            })?,
            None => default_ts_tolerance(),
        };

        let cfg = Config {
            provider: ProviderConfig {
                app_id: required("APP_ID")?,
                api_key: required("API_KEY")?,
                base_url: lookup("EINVOICE_BASE_URL").unwrap_or_else(default_provider_url),
                ts_tolerance,
            },
            card: CardConfig {
                card_type: lookup("CARD_TYPE").unwrap_or_else(default_card_type),
                card_number: required("CARD_NUMBER")?,
                card_encrypt: required("CARD_ENCRYPT")?,
            },
            upload: UploadConfig {
                host: required("UPLOAD_HOST")?,
                username: required("UPLOAD_USERNAME")?,
                password: required("UPLOAD_PASSWORD")?,
            },
            pushover: PushoverConfig {
                api_key: required("PUSHOVER_API_KEY")?,
                user_key: required("PUSHOVER_USER_KEY")?,
                base_url: lookup("PUSHOVER_BASE_URL").unwrap_or_else(default_pushover_url),
            },
        };
        Ok(cfg.trimmed())
    }

    fn trimmed(mut self) -> Self {
        for url in [
            &mut self.provider.base_url,
            &mut self.upload.host,
            &mut self.pushover.base_url,
        ] {
            let len = url.trim_end_matches('/').len();
            url.truncate(len);
        }
        self
    }
}
