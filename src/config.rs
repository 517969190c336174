//! Application configuration
//!
//! The only setting is the base URL of the backend that issues voice tokens.

use std::sync::OnceLock;

const DEFAULT_API_BASE: &str = "http://localhost:3000";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub api_base: String,
}

impl AppConfig {
    pub fn new(api_base: &str) -> Self {
        AppConfig {
            api_base: api_base.trim().trim_end_matches('/').to_string(),
        }
    }

    /// Resolve the configuration for the current platform.
    ///
    /// Native builds read `API_BASE` from the environment (after loading
    /// `.env`). Browser builds use the value baked in at compile time, or
    /// the page origin when none was provided.
    pub fn from_env() -> Self {
        #[cfg(not(target_arch = "wasm32"))]
        let api_base = {
            dotenvy::dotenv().ok();
            std::env::var("API_BASE")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
        };

        #[cfg(target_arch = "wasm32")]
        let api_base = option_env!("API_BASE")
            .filter(|v| !v.trim().is_empty())
            .map(str::to_string)
            .or_else(|| web_sys::window().and_then(|w| w.location().origin().ok()))
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        AppConfig::new(&api_base)
    }
}

static APP_CONFIG: OnceLock<AppConfig> = OnceLock::new();

pub fn init_config(config: AppConfig) {
    if APP_CONFIG.set(config).is_err() {
        tracing::warn!("Configuration already initialized; keeping the first value");
    }
}

/// Current configuration, falling back to the environment if `init_config`
/// was never called.
pub fn app_config() -> &'static AppConfig {
    APP_CONFIG.get_or_init(AppConfig::from_env)
}
