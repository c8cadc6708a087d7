use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use moodtune::capture::{CaptureSession, Frame, SharedCaptureSession};
use moodtune::classifier::HttpExpressionClassifier;
use moodtune::config::{self, AppConfig, LlmProviderKind, DEFAULT_CLASSIFIER_URL};
use moodtune::llm::{ApiKeySource, LlmProvider, OllamaProvider, OpenAIProvider};
use moodtune::pipeline::{RecommendationPipeline, TriggerOutcome};
use moodtune::recommendation::{Language, LlmSongRecommender, DEFAULT_SEARCH_BASE_URL};
use moodtune::server::{run_server, RequestsLoggingLevel, ServerConfig};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    if path_buf.is_absolute() {
        return Ok(path_buf);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(path_buf))
}

#[derive(Parser, Debug)]
#[clap(version, about = "Song recommendations from facial expressions")]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, global = true, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, global = true, default_value_t = 3005)]
    pub port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, global = true, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Language used when a request does not name one.
    #[clap(long, global = true, default_value = "english")]
    pub default_language: Language,

    /// Largest accepted frame upload, in bytes.
    #[clap(long, global = true, default_value_t = config::DEFAULT_MAX_FRAME_BYTES)]
    pub max_frame_bytes: usize,

    /// Give up on each external call after this many seconds. Unbounded if unset.
    #[clap(long, global = true)]
    pub call_timeout_secs: Option<u64>,

    /// Base URL of the expression classification service.
    #[clap(long, global = true, default_value = DEFAULT_CLASSIFIER_URL)]
    pub classifier_url: String,

    /// LLM backend answering song requests.
    #[clap(long, global = true, default_value = "openai")]
    pub llm_provider: LlmProviderKind,

    /// Base URL of the LLM API. Defaults depend on the provider.
    #[clap(long, global = true)]
    pub llm_base_url: Option<String>,

    /// Model to ask. Defaults depend on the provider.
    #[clap(long, global = true)]
    pub llm_model: Option<String>,

    /// API key for the LLM backend.
    #[clap(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Shell command printing the API key, run before every request.
    #[clap(long, global = true)]
    pub api_key_command: Option<String>,

    /// Search page of the streaming provider used for song links.
    #[clap(long, global = true, default_value = DEFAULT_SEARCH_BASE_URL)]
    pub search_base_url: String,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service.
    Serve,

    /// Run one recommendation cycle on an image file and print the outcome as JSON.
    Recommend {
        /// Encoded image (JPEG, PNG, ...) containing a face.
        #[clap(value_parser = parse_path)]
        frame: PathBuf,

        /// Language of the song. Falls back to the default language.
        #[clap(long)]
        language: Option<Language>,
    },
}

/// Convert CLI args to CliConfig for config resolution
impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            port: args.port,
            logging_level: args.logging_level.clone(),
            default_language: args.default_language,
            max_frame_bytes: args.max_frame_bytes,
            call_timeout_secs: args.call_timeout_secs,
            classifier_url: args.classifier_url.clone(),
            llm_provider: args.llm_provider,
            llm_base_url: args.llm_base_url.clone(),
            llm_model: args.llm_model.clone(),
            api_key: args.api_key.clone(),
            api_key_command: args.api_key_command.clone(),
            search_base_url: args.search_base_url.clone(),
        }
    }
}

fn build_llm(app_config: &AppConfig) -> Arc<dyn LlmProvider> {
    let settings = &app_config.llm;
    let llm: Arc<dyn LlmProvider> = match settings.provider {
        LlmProviderKind::OpenAi => {
            let key_source = settings.api_key_source();
            if matches!(key_source, ApiKeySource::None) {
                warn!("No API key configured for the OpenAI-compatible backend");
            }
            Arc::new(OpenAIProvider::new(
                settings.base_url.as_str(),
                settings.model.as_str(),
                key_source,
            ))
        }
        LlmProviderKind::Ollama => Arc::new(OllamaProvider::new(
            settings.base_url.as_str(),
            settings.model.as_str(),
        )),
    };
    info!(
        "Song recommendations from {} ({}) at {}",
        llm.name(),
        llm.model(),
        settings.base_url
    );
    llm
}

fn build_pipeline(
    app_config: &AppConfig,
    capture: Arc<dyn CaptureSession>,
    llm: Arc<dyn LlmProvider>,
) -> RecommendationPipeline {
    let recommender = LlmSongRecommender::new(llm)
        .with_search_base_url(app_config.search_base_url.clone())
        .with_deadline(app_config.call_deadline);
    let classifier = HttpExpressionClassifier::new(app_config.classifier_url.clone());

    RecommendationPipeline::new(capture, Arc::new(classifier), Arc::new(recommender))
        .with_call_deadline(app_config.call_deadline)
}

async fn recommend_once(
    app_config: &AppConfig,
    frame_path: &Path,
    language: Language,
) -> Result<()> {
    let bytes = std::fs::read(frame_path)
        .with_context(|| format!("Failed to read frame: {:?}", frame_path))?;
    let frame = Frame::new(bytes);
    if frame.is_empty() {
        bail!("Frame file is empty: {:?}", frame_path);
    }

    let capture = Arc::new(SharedCaptureSession::with_frame(frame));
    let pipeline = build_pipeline(app_config, capture, build_llm(app_config));
    let outcome = pipeline.get_recommendation(language).await;

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    match outcome {
        TriggerOutcome::Ready { .. } => Ok(()),
        TriggerOutcome::Failed { notice } => bail!(notice),
        TriggerOutcome::Ignored { reason } => bail!("Cycle did not run: {}", reason.as_str()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    // Load TOML config if provided
    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };

    let cli_config: config::CliConfig = (&cli_args).into();
    let app_config = AppConfig::resolve(&cli_config, file_config)?;

    match &cli_args.command {
        Command::Serve => {
            info!("Initializing metrics...");
            moodtune::metrics::init_metrics();

            info!("Configuration:");
            info!("  port: {}", app_config.port);
            info!("  classifier: {}", app_config.classifier_url);
            info!("  default language: {}", app_config.default_language);
            match app_config.call_deadline {
                Some(deadline) => info!("  call deadline: {:?}", deadline),
                None => info!("  call deadline: none"),
            }

            let llm = build_llm(&app_config);
            let health_llm = llm.clone();
            tokio::spawn(async move {
                match health_llm.health_check().await {
                    Ok(()) => info!("LLM backend is reachable"),
                    Err(e) => warn!("LLM backend health check failed: {}", e),
                }
            });

            let capture = Arc::new(SharedCaptureSession::new());
            let pipeline = Arc::new(build_pipeline(&app_config, capture.clone(), llm));
            let server_config = ServerConfig {
                requests_logging_level: app_config.logging_level.clone(),
                port: app_config.port,
                default_language: app_config.default_language,
                max_frame_bytes: app_config.max_frame_bytes,
            };
            run_server(server_config, capture, pipeline).await
        }
        Command::Recommend { frame, language } => {
            let language = language.unwrap_or(app_config.default_language);
            recommend_once(&app_config, frame, language).await
        }
    }
}
