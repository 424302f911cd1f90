//! Client configuration.
//!
//! A JSON file describes where the gateway lives and, optionally, which
//! merchant to act as:
//!
//! ```json
//! {
//!   "base_url": "https://secure.platononline.com/",
//!   "timeout_secs": 15,
//!   "merchant": {
//!     "merchant_key": "CLIENT_KEY",
//!     "secret_key": "$PLATON_SECRET",
//!     "success_redirect": "https://merchant.example/ok"
//!   }
//! }
//! ```
//!
//! `.env` is loaded before the file is parsed, so `$VAR` references may be
//! satisfied from it.

use platon_types::config::MerchantConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "config_defaults::default_base_url")]
    base_url: Url,
    #[serde(default = "config_defaults::default_timeout_secs")]
    timeout_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    merchant: Option<MerchantConfig>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            base_url: config_defaults::default_base_url(),
            timeout_secs: config_defaults::default_timeout_secs(),
            merchant: None,
        }
    }
}

pub mod config_defaults {
    use std::env;
    use url::Url;

    pub const DEFAULT_BASE_URL: &str = "https://secure.platononline.com/";
    pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

    /// `$PLATON_BASE_URL`, else the production gateway.
    pub fn default_base_url() -> Url {
        env::var("PLATON_BASE_URL")
            .ok()
            .and_then(|s| Url::parse(&s).ok())
            .unwrap_or_else(production_url)
    }

    pub fn default_timeout_secs() -> u64 {
        DEFAULT_TIMEOUT_SECS
    }

    fn production_url() -> Url {
        Url::parse(DEFAULT_BASE_URL).expect("valid production gateway URL")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {0}: {1}")]
    FileRead(PathBuf, std::io::Error),
    #[error("Failed to parse config file: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl ClientConfig {
    /// Loads `.env` (if any) and then the JSON file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let path = path.as_ref();
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::FileRead(path.to_path_buf(), e))?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn merchant(&self) -> Option<&MerchantConfig> {
        self.merchant.as_ref()
    }

    pub fn with_merchant(mut self, merchant: MerchantConfig) -> Self {
        self.merchant = Some(merchant);
        self
    }
}
