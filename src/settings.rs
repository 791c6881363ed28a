use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use config::{Config, Environment};
use serde::Deserialize;

use crate::error::{PageGenError, Result};

pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";
pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_HERO_IMAGE: &str = "https://via.placeholder.com/800x400";
pub const DEFAULT_TITLE_TEMPLATE: &str = "Bucketlist + {{INTEGRATION_NAME}} Integration";

const REQUIRED: [&str; 6] = [
    "wordpress_site_url",
    "wordpress_username",
    "wordpress_app_password",
    "wordpress_template_page_id",
    "anthropic_api_key",
    "csv_file_path",
];

/// Run configuration, loaded once at startup and passed by reference.
#[derive(Clone, Deserialize)]
pub struct Settings {
    pub wordpress_site_url: String,
    pub wordpress_username: String,
    pub wordpress_app_password: String,
    pub wordpress_template_page_id: u64,
    pub anthropic_api_key: String,
    pub csv_file_path: PathBuf,
    pub anthropic_model: String,
    pub anthropic_base_url: String,
    pub anthropic_max_tokens: u32,
    pub hero_image_url: String,
    pub page_title_template: String,
    pub http_timeout_secs: u64,
}

impl Settings {
    /// Load from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_environment(Environment::default())
    }

    fn from_environment(env: Environment) -> Result<Self> {
        let cfg = Config::builder()
            .set_default("anthropic_model", DEFAULT_MODEL)
            .and_then(|b| b.set_default("anthropic_base_url", DEFAULT_ANTHROPIC_BASE_URL))
            .and_then(|b| b.set_default("anthropic_max_tokens", 1024_i64))
            .and_then(|b| b.set_default("hero_image_url", DEFAULT_HERO_IMAGE))
            .and_then(|b| b.set_default("page_title_template", DEFAULT_TITLE_TEMPLATE))
            .and_then(|b| b.set_default("http_timeout_secs", 30_i64))
            .map_err(|e| PageGenError::Config(e.to_string()))?
            .add_source(env.ignore_empty(true))
            .build()
            .map_err(|e| PageGenError::Config(e.to_string()))?;

        let missing: Vec<String> = REQUIRED
            .iter()
            .filter(|key| cfg.get_string(key).map(|v| v.trim().is_empty()).unwrap_or(true))
            .map(|key| key.to_uppercase())
            .collect();
        if !missing.is_empty() {
            return Err(PageGenError::Config(format!(
                "missing required environment variables: {}",
                missing.join(", ")
            )));
        }

        let mut settings: Settings = cfg
            .try_deserialize()
            .map_err(|e| PageGenError::Config(e.to_string()))?;
        settings.wordpress_site_url = settings.wordpress_site_url.trim_end_matches('/').to_string();
        settings.anthropic_base_url = settings.anthropic_base_url.trim_end_matches('/').to_string();
        Ok(settings)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("wordpress_site_url", &self.wordpress_site_url)
            .field("wordpress_username", &self.wordpress_username)
            .field("wordpress_app_password", &"<redacted>")
            .field("wordpress_template_page_id", &self.wordpress_template_page_id)
            .field("anthropic_api_key", &"<redacted>")
            .field("csv_file_path", &self.csv_file_path)
            .field("anthropic_model", &self.anthropic_model)
            .field("anthropic_base_url", &self.anthropic_base_url)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .finish_non_exhaustive()
    }
}
