mod api;
mod config;
mod report;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use taxwise_core::{detect_image_mime_type, ExtractedRecord, TaxwiseError, UploadedDocument};
use taxwise_llm::providers::gemini::GeminiProvider;
use taxwise_llm::providers::mock::MockProvider;
use taxwise_llm::providers::ollama::OllamaProvider;
use taxwise_llm::providers::openrouter::OpenRouterProvider;
use taxwise_llm::{CompletionService, ProviderRegistry};
use taxwise_logging::init_logger;
use taxwise_prompts::PromptActions;
use taxwise_session::{initial_record, render_insights, Session};

use api::AppState;
use config::Config;

#[derive(Parser)]
#[command(name = "taxwise")]
#[command(about = "TaxWise AI: plain-language explanations, deduction ideas and risk checks for tax forms")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web app
    Serve {
        /// Port to bind the HTTP server to
        #[arg(short, long)]
        port: Option<u16>,
        /// Provider to use (gemini, openrouter, ollama, mock)
        #[arg(long)]
        provider: Option<String>,
        /// Default model
        #[arg(short, long)]
        model: Option<String>,
    },
    /// Run all three insights for one image and print them
    Analyze {
        /// Path to the tax form image
        image: PathBuf,
        /// JSON file to use as the extracted record instead of the sample
        #[arg(long)]
        record: Option<PathBuf>,
        /// Optional context about you for deduction suggestions
        #[arg(long)]
        user_info: Option<String>,
        #[arg(long)]
        provider: Option<String>,
        #[arg(short, long)]
        model: Option<String>,
    },
    /// Check whether a server is running
    Status {
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env();
    let _log_guard = init_logger(config.log_dir.as_deref(), &config.log_level, config.log_json);

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            port,
            provider,
            model,
        } => {
            let config = Config {
                port: port.unwrap_or(config.port),
                provider: provider.or(config.provider),
                model: model.or(config.model),
                ..config
            };
            run_server(config).await?;
        }
        Commands::Analyze {
            image,
            record,
            user_info,
            provider,
            model,
        } => {
            let config = Config {
                provider: provider.or(config.provider),
                model: model.or(config.model),
                ..config
            };
            run_analyze(config, &image, record.as_deref(), user_info).await?;
        }
        Commands::Status { port } => {
            let port = port.unwrap_or(config.port);
            let client = reqwest::Client::new();
            match client
                .get(format!("http://{}:{}/api/health", config.bind_address, port))
                .send()
                .await
            {
                Ok(resp) => {
                    let body: serde_json::Value = resp.json().await?;
                    println!("{}", serde_json::to_string_pretty(&body)?);
                }
                Err(_) => {
                    println!("TaxWise is not running on port {}", port);
                }
            }
        }
    }

    Ok(())
}

/// Canned answers so the app can be explored without credentials.
fn demo_provider() -> MockProvider {
    MockProvider::new("mock")
        .with_route(
            "taxFormSimplification",
            r#"{"simplifiedExplanation": "This is a W-2. It shows what your employer paid you last year and how much tax was already taken out of your pay."}"#,
        )
        .with_route(
            "personalizedDeductionSuggestions",
            r#"{"suggestions": ["Contribute to a traditional IRA to lower taxable income.", "Keep receipts for charitable donations if you itemize."], "warnings": ["Suggestions are based on sample data."]}"#,
        )
        .with_route(
            "assessTaxFormRisk",
            r#"{"riskAssessment": "Low risk. Withholding looks consistent with reported wages.", "redFlags": []}"#,
        )
}

fn build_registry(config: &Config) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();

    if let Some(api_key) = &config.gemini_api_key {
        registry.register("gemini", Arc::new(GeminiProvider::new(api_key)));
        info!("Registered Gemini provider");
    }

    if let Some(api_key) = &config.openrouter_api_key {
        registry.register("openrouter", Arc::new(OpenRouterProvider::new(api_key)));
        info!("Registered OpenRouter provider");
    }

    registry.register(
        "ollama",
        Arc::new(OllamaProvider::new().with_base_url(&config.ollama_url)),
    );
    registry.register("mock", Arc::new(demo_provider()));

    registry
}

fn build_service(config: &Config) -> Result<CompletionService> {
    let registry = build_registry(config);
    let name = config.provider_name();
    let provider = registry.get(&name).ok_or_else(|| {
        TaxwiseError::NoProvider(format!(
            "`{name}` is not available (registered: {})",
            registry.list().join(", ")
        ))
    })?;

    let model = config.model_name();
    let mut service = CompletionService::new(provider, &model).with_timeout(config.timeout());
    if let Some(vision_model) = &config.vision_model {
        service = service.with_vision_model(vision_model);
    }
    info!(
        provider = %name,
        model = %model,
        timeout_secs = config.timeout_secs,
        "Completion service ready"
    );
    Ok(service)
}

fn new_session(service: CompletionService, record: ExtractedRecord) -> Session {
    Session::new(Arc::new(PromptActions::new(service)), record)
}

async fn run_server(config: Config) -> Result<()> {
    info!(
        port = config.port,
        bind = %config.bind_address,
        "Starting TaxWise"
    );

    let service = build_service(&config)?;
    let app_state = Arc::new(AppState {
        provider: service.provider_name().to_string(),
        model: service.default_model().to_string(),
        session: new_session(service, initial_record()),
        export_name: config.export_name.clone(),
    });

    let app = api::build_router(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());
    let addr = format!("{}:{}", config.bind_address, config.port);

    info!(addr = %addr, "HTTP server listening");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn run_analyze(
    config: Config,
    image: &Path,
    record: Option<&Path>,
    user_info: Option<String>,
) -> Result<()> {
    let Some(mime_type) = detect_image_mime_type(image) else {
        bail!("{} is not a supported image file", image.display());
    };
    let bytes = tokio::fs::read(image)
        .await
        .with_context(|| format!("failed to read {}", image.display()))?;
    let file_name = image.file_name().map(|n| n.to_string_lossy().into_owned());
    let document = UploadedDocument::from_bytes(mime_type, &bytes, file_name)?;

    let record = match record {
        Some(path) => {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            ExtractedRecord::parse(text)
                .with_context(|| format!("{} is not valid JSON", path.display()))?
        }
        None => initial_record(),
    };

    let session = new_session(build_service(&config)?, record);
    session.set_user_info(user_info);
    let mut notifications = session.notifications();

    report::note_info(&format!("Analyzing {} ({mime_type})...", image.display()));
    session.select_document(Some(document));
    let snapshot = session.wait_until_idle().await;

    while let Ok(notification) = notifications.try_recv() {
        report::print_notification(&notification);
    }
    print!(
        "\n{}",
        report::format_insights(&render_insights(&snapshot), report::supports_color())
    );

    Ok(())
}
