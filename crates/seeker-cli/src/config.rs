use config::{Config, Environment, File};
use seeker::agent::{AgentConfig, DEFAULT_MAX_ROUNDS};
use seeker::providers::configs::{OpenAiProviderConfig, ProviderConfig, OPENAI_HOST, OPENAI_MODEL};
use seeker::tools::extract::{ExtractContentTool, DEFAULT_MAX_CHARS};
use seeker::tools::web_search::{WebSearchTool, DEFAULT_MAX_RESULTS, DUCKDUCKGO_HTML_URL};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "SEEKER";
const API_KEY_FALLBACK: &str = "OPENAI_API_KEY";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration value: set {env_var}")]
    MissingEnvVar { env_var: String },

    #[error(transparent)]
    Other(#[from] config::ConfigError),
}

/// Environment variable that sets a dotted configuration key
pub fn to_env_var(field: &str) -> String {
    format!("{}_{}", ENV_PREFIX, field.replace('.', "__").to_uppercase())
}

#[derive(Debug, Deserialize)]
pub struct ProviderSettings {
    pub host: String,
    pub api_key: String,
    pub model: String,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<i32>,
}

impl ProviderSettings {
    pub fn into_config(self) -> ProviderConfig {
        ProviderConfig::OpenAi(OpenAiProviderConfig {
            host: self.host,
            api_key: self.api_key,
            model: self.model,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct AgentSettings {
    /// Model requests per turn, 0 for no limit
    pub max_rounds: usize,
    pub stream_timeout_secs: u64,
    #[serde(default)]
    pub system_template: Option<PathBuf>,
}

impl AgentSettings {
    pub fn to_agent_config(&self) -> AgentConfig {
        AgentConfig {
            max_rounds: (self.max_rounds > 0).then_some(self.max_rounds),
            stream_timeout: (self.stream_timeout_secs > 0)
                .then(|| Duration::from_secs(self.stream_timeout_secs)),
            system_template: self.system_template.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchSettings {
    pub endpoint: String,
    pub max_results: usize,
    pub max_page_chars: usize,
    pub timeout_secs: u64,
}

impl SearchSettings {
    pub fn web_search_tool(&self) -> WebSearchTool {
        WebSearchTool::new(
            self.endpoint.clone(),
            self.max_results,
            Duration::from_secs(self.timeout_secs),
        )
    }

    pub fn extract_tool(&self) -> ExtractContentTool {
        ExtractContentTool::new(self.max_page_chars, Duration::from_secs(self.timeout_secs))
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub provider: ProviderSettings,
    pub agent: AgentSettings,
    pub search: SearchSettings,
}

impl Settings {
    /// Load settings from defaults, then `config_file` (or `./seeker.toml` when present),
    /// then `SEEKER_*` environment variables
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            // Provider defaults
            .set_default("provider.host", OPENAI_HOST)?
            .set_default("provider.model", OPENAI_MODEL)?
            // Agent defaults
            .set_default("agent.max_rounds", DEFAULT_MAX_ROUNDS as i64)?
            .set_default("agent.stream_timeout_secs", 120_i64)?
            // Tool defaults
            .set_default("search.endpoint", DUCKDUCKGO_HTML_URL)?
            .set_default("search.max_results", DEFAULT_MAX_RESULTS as i64)?
            .set_default("search.max_page_chars", DEFAULT_MAX_CHARS as i64)?
            .set_default("search.timeout_secs", 20_i64)?;

        if let Ok(api_key) = std::env::var(API_KEY_FALLBACK) {
            builder = builder.set_default("provider.api_key", api_key)?;
        }

        builder = match config_file {
            Some(path) => builder.add_source(File::from(path).required(true)),
            None => builder.add_source(File::with_name("seeker").required(false)),
        };

        let config = builder
            // Layer on the environment variables
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        if config.get_string("provider.api_key").is_err() {
            return Err(ConfigError::MissingEnvVar {
                env_var: format!("{} or {}", to_env_var("provider.api_key"), API_KEY_FALLBACK),
            });
        }

        config.try_deserialize().map_err(|err| {
            tracing::debug!("Configuration error: {:?}", &err);
            match err {
                config::ConfigError::NotFound(field) => ConfigError::MissingEnvVar {
                    env_var: to_env_var(&field),
                },
                other => ConfigError::Other(other),
            }
        })
    }
}
