mod file_config;

pub use file_config::{ClassifierConfig, FileConfig, LlmConfig, RecommendationConfig};

use crate::llm::ApiKeySource;
use crate::recommendation::{Language, DEFAULT_SEARCH_BASE_URL};
use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::time::Duration;

pub const DEFAULT_CLASSIFIER_URL: &str = "http://localhost:8500";
pub const DEFAULT_MAX_FRAME_BYTES: usize = 8 * 1024 * 1024;

/// Which chat-completion backend answers song requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LlmProviderKind {
    #[default]
    #[value(name = "openai")]
    OpenAi,
    Ollama,
}

impl LlmProviderKind {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            LlmProviderKind::OpenAi => "https://api.openai.com/v1",
            LlmProviderKind::Ollama => "http://localhost:11434",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            LlmProviderKind::OpenAi => "gpt-3.5-turbo",
            LlmProviderKind::Ollama => "llama3.1:8b",
        }
    }
}

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub default_language: Language,
    pub max_frame_bytes: usize,
    pub call_timeout_secs: Option<u64>,
    pub classifier_url: String,
    pub llm_provider: LlmProviderKind,
    pub llm_base_url: Option<String>,
    pub llm_model: Option<String>,
    pub api_key: Option<String>,
    pub api_key_command: Option<String>,
    pub search_base_url: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            port: 3005,
            logging_level: RequestsLoggingLevel::default(),
            default_language: Language::default(),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            call_timeout_secs: None,
            classifier_url: DEFAULT_CLASSIFIER_URL.to_string(),
            llm_provider: LlmProviderKind::default(),
            llm_base_url: None,
            llm_model: None,
            api_key: None,
            api_key_command: None,
            search_base_url: DEFAULT_SEARCH_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub default_language: Language,
    pub max_frame_bytes: usize,
    /// Bound on each external call of a cycle; `None` waits indefinitely.
    pub call_deadline: Option<Duration>,
    pub classifier_url: String,
    pub llm: LlmSettings,
    pub search_base_url: String,
}

/// Settings for the LLM provider.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub provider: LlmProviderKind,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub api_key_command: Option<String>,
}

impl LlmSettings {
    /// The command wins over a static key when both are set.
    pub fn api_key_source(&self) -> ApiKeySource {
        match (&self.api_key_command, &self.api_key) {
            (Some(cmd), _) => ApiKeySource::Command(cmd.clone()),
            (None, Some(key)) => ApiKeySource::Static(key.clone()),
            (None, None) => ApiKeySource::None,
        }
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let port = file.port.unwrap_or(cli.port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let default_language = match file.default_language {
            Some(s) => match Language::from_str(&s, true) {
                Ok(language) => language,
                Err(_) => bail!("Unsupported default_language: {:?}", s),
            },
            None => cli.default_language,
        };

        let max_frame_bytes = file.max_frame_bytes.unwrap_or(cli.max_frame_bytes);
        if max_frame_bytes == 0 {
            bail!("max_frame_bytes must be greater than zero");
        }

        let call_deadline = match file.call_timeout_secs.or(cli.call_timeout_secs) {
            Some(0) => bail!("call_timeout_secs must be greater than zero"),
            Some(secs) => Some(Duration::from_secs(secs)),
            None => None,
        };

        let classifier_url = file
            .classifier
            .unwrap_or_default()
            .base_url
            .unwrap_or_else(|| cli.classifier_url.clone());
        if classifier_url.trim().is_empty() {
            bail!("Classifier base URL must not be empty");
        }

        let llm_file = file.llm.unwrap_or_default();
        let provider = match llm_file.provider {
            Some(s) => match LlmProviderKind::from_str(&s, true) {
                Ok(provider) => provider,
                Err(_) => bail!("Unknown LLM provider: {:?}", s),
            },
            None => cli.llm_provider,
        };
        let llm = LlmSettings {
            provider,
            base_url: llm_file
                .base_url
                .or_else(|| cli.llm_base_url.clone())
                .unwrap_or_else(|| provider.default_base_url().to_string()),
            model: llm_file
                .model
                .or_else(|| cli.llm_model.clone())
                .unwrap_or_else(|| provider.default_model().to_string()),
            api_key: llm_file.api_key.or_else(|| cli.api_key.clone()),
            api_key_command: llm_file
                .api_key_command
                .or_else(|| cli.api_key_command.clone()),
        };

        let search_base_url = file
            .recommendation
            .unwrap_or_default()
            .search_base_url
            .unwrap_or_else(|| cli.search_base_url.clone());

        Ok(AppConfig {
            port,
            logging_level,
            default_language,
            max_frame_bytes,
            call_deadline,
            classifier_url,
            llm,
            search_base_url,
        })
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
