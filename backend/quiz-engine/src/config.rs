use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Base URL of the study-aid backend that hosts quiz definitions and the
    /// grading endpoints.
    pub grading_api_url: String,
    /// Timeout for quiz fetches and basic grading calls.
    pub request_timeout_secs: u64,
    /// Timeout for AI revalidation calls (the LLM path is slower).
    pub revalidate_timeout_secs: u64,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Load environment variables from root .env file (two levels up)
        // Try root .env first, then fallback to local .env
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            dotenvy::dotenv().ok();
        }

        // Determine environment (defaults to dev)
        let env_name = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // Build configuration from config/*.toml + ENV overrides
        let config_builder = config::Config::builder()
            .add_source(
                config::File::with_name(&format!("config/{}", env_name)).required(false), // Allow missing config file, fallback to ENV
            )
            // Override with environment variables (prefix: APP_)
            .add_source(config::Environment::with_prefix("APP").separator("__"));

        let settings = config_builder.build()?;

        let grading_api_url = settings
            .get_string("grading.api_url")
            .or_else(|_| env::var("GRADING_API_URL"))
            .unwrap_or_else(|_| "http://localhost:6888".to_string());

        let request_timeout_secs = settings
            .get_int("grading.request_timeout_secs")
            .ok()
            .or_else(|| {
                env::var("GRADING_REQUEST_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
            })
            .filter(|v| *v > 0)
            .unwrap_or(10) as u64;

        let revalidate_timeout_secs = settings
            .get_int("grading.revalidate_timeout_secs")
            .ok()
            .or_else(|| {
                env::var("GRADING_REVALIDATE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
            })
            .filter(|v| *v > 0)
            .unwrap_or(45) as u64;

        Ok(Config {
            grading_api_url,
            request_timeout_secs,
            revalidate_timeout_secs,
        })
    }
}
