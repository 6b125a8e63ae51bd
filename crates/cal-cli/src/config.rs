//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use cal_api::{DEFAULT_PRODUCT_URL, DEFAULT_SEARCH_URL};
use cal_core::{DEFAULT_DEBOUNCE_WINDOW, SessionConfig};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Public, rate-limited FoodData Central key.
pub const DEMO_API_KEY: &str = "DEMO_KEY";

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// FoodData Central API key.
    pub api_key: String,
    /// Quiet period before a typed query is searched.
    pub debounce_ms: u64,
    pub search_url: String,
    pub product_url: String,
    pub request_timeout_secs: u64,
    pub camera: CameraConfig,
}

/// Settings for the simulated camera used by `cal session`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraConfig {
    /// When false, every camera request is denied.
    pub available: bool,
    /// Delay before the permission request resolves.
    pub grant_delay_ms: u64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"[REDACTED]")
            .field("debounce_ms", &self.debounce_ms)
            .field("search_url", &self.search_url)
            .field("product_url", &self.product_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("camera", &self.camera)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: DEMO_API_KEY.to_string(),
            debounce_ms: u64::try_from(DEFAULT_DEBOUNCE_WINDOW.as_millis()).unwrap_or(300),
            search_url: DEFAULT_SEARCH_URL.to_string(),
            product_url: DEFAULT_PRODUCT_URL.to_string(),
            request_timeout_secs: 10,
            camera: CameraConfig::default(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            available: true,
            grant_delay_ms: 150,
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // CAL_API_KEY, CAL_CAMERA__AVAILABLE, ...
        figment = figment.merge(Env::prefixed("CAL_").split("__"));

        let config: Self = figment.extract()?;
        if config.request_timeout_secs == 0 {
            return Err(figment::Error::from(
                "request_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(config)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            debounce_window: Duration::from_millis(self.debounce_ms),
        }
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn uses_demo_key(&self) -> bool {
        self.api_key == DEMO_API_KEY
    }

    /// The configuration as JSON with the API key masked.
    pub fn redacted_json(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(key) = value.get_mut("api_key") {
            *key = serde_json::Value::from("[REDACTED]");
        }
        value
    }
}

/// Returns the platform-specific config directory for cal.
///
/// On Linux: `~/.config/cal`
pub fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("cal"))
}
