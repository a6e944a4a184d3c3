use anyhow::Result;
use config::{Config, Environment};
use serde::Deserialize;

const DEFAULT_API_BASE: &str = "https://note.com/api";
const DEFAULT_SITE_BASE: &str = "https://note.com";
const DEFAULT_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Process-wide settings, overridable through `NOTE_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Root of the JSON API (`NOTE_API_BASE`)
    pub api_base: String,
    /// Public site root used for the row URLs (`NOTE_SITE_BASE`)
    pub site_base: String,
    /// `NOTE_USER_AGENT`
    pub user_agent: String,
}

impl Settings {
    pub fn load() -> Result<Self> {
        Self::from_env(Environment::with_prefix("NOTE"))
    }

    fn from_env(env: Environment) -> Result<Self> {
        let mut settings: Settings = Config::builder()
            .set_default("api_base", DEFAULT_API_BASE)?
            .set_default("site_base", DEFAULT_SITE_BASE)?
            .set_default("user_agent", DEFAULT_USER_AGENT)?
            .add_source(env)
            .build()?
            .try_deserialize()?;
        settings.site_base = settings.site_base.trim_end_matches('/').to_string();
        Ok(settings)
    }
}
