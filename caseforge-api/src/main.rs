use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use caseforge_api::config::ApiConfig;
use caseforge_api::storage::{migrations, SqliteAuditStore};
use caseforge_api::{handlers, AppState};
use caseforge_core::{ComplianceDictionary, InMemoryObjectStorage, Pipeline, PlainTextExtractor};
use caseforge_llm_sdk::gemini::GeminiClient;
use caseforge_llm_sdk::LlmClient;
use clap::Parser;
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "caseforge-api", about = "Healthcare test case generation API")]
struct Args {
    /// Override the listen address, e.g. 0.0.0.0:9000
    #[arg(long)]
    bind: Option<String>,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let (config, config_path) = ApiConfig::load().context("Failed to load configuration")?;
    info!(config = %config_path.display(), "Configuration loaded");

    let api_key = config
        .llm
        .gemini_api_key
        .clone()
        .or_else(|| std::env::var("GEMINI_API_KEY").ok())
        .context("No Gemini API key configured; set llm.gemini_api_key or GEMINI_API_KEY")?;
    let llm: Arc<dyn LlmClient> = Arc::new(
        GeminiClient::new(api_key, config.llm.model.clone())
            .context("Failed to construct Gemini client")?,
    );

    if let Some(parent) = config.database.path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }
    let mut connection = rusqlite::Connection::open(&config.database.path)
        .context("Failed to open audit database")?;
    migrations::run_migrations(&mut connection).context("Failed to run migrations")?;
    let audit_store = Arc::new(SqliteAuditStore::new(Arc::new(Mutex::new(connection))));

    let object_storage = Arc::new(InMemoryObjectStorage::new());
    let pipeline = Arc::new(Pipeline::new(
        config.pipeline_config(),
        object_storage.clone(),
        Arc::new(PlainTextExtractor::new(object_storage)),
        llm,
        audit_store,
        Arc::new(ComplianceDictionary::healthcare_default()),
    ));

    let allowed_origins = config
        .cors
        .as_ref()
        .map(|cors| cors.allowed_origins.clone())
        .unwrap_or_default();

    let bind_addr = args
        .bind
        .unwrap_or_else(|| format!("{}:{}", config.server.host, config.server.port));
    info!("Starting caseforge-api server at http://{}", bind_addr);

    HttpServer::new(move || {
        let mut cors = Cors::default()
            .allowed_methods(vec!["GET", "POST", "PUT"])
            .allow_any_header();
        for origin in &allowed_origins {
            cors = cors.allowed_origin(origin);
        }

        App::new()
            .wrap(cors)
            .app_data(web::Data::new(AppState {
                pipeline: pipeline.clone(),
            }))
            .app_data(web::PayloadConfig::new(16 * 1024 * 1024))
            .service(handlers::health::health)
            .service(handlers::documents::upload)
            .service(handlers::documents::generate)
            .service(handlers::documents::regenerate)
            .service(handlers::documents::traceability)
            .service(handlers::test_cases::set_status)
            .service(handlers::export::export)
            .service(handlers::audit::audit_log)
    })
    .bind(bind_addr)?
    .run()
    .await?;

    Ok(())
}
