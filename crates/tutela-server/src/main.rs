mod advisor;
mod export;
mod routes;

use std::sync::Arc;

use tracing::info;

use tutela_ai::{HttpRetriever, OllamaGenerator};
use tutela_core::ai::{Retriever, TextGenerator};
use tutela_core::config::Config;
use tutela_core::db::Db;
use tutela_core::engine::Engine;

use advisor::Advisor;
use routes::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tutela_server=info,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    if let Some(parent) = std::path::Path::new(&config.db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let db = Db::open(&config.db_path)?;
    db.migrate()?;
    let db = Arc::new(db);

    let generator: Option<Arc<dyn TextGenerator>> = if config.llm_url.is_empty() {
        info!("no LLM configured, running with offline fallbacks");
        None
    } else {
        Some(Arc::new(OllamaGenerator::new(
            &config.llm_url,
            &config.llm_model,
            config.llm_timeout_s,
        )?))
    };

    let retriever: Option<Arc<dyn Retriever>> = if config.retriever_url.is_empty() {
        info!("no retriever configured, legal grounds will cite the constitutional minimum");
        None
    } else {
        Some(Arc::new(HttpRetriever::new(
            &config.retriever_url,
            config.llm_timeout_s,
        )?))
    };

    let engine = Arc::new(Engine::new(
        generator.clone(),
        retriever.clone(),
        config.top_k,
        config.enforce_econ_filter,
    ));
    let advisor = Advisor::new(generator, retriever, config.top_k);

    std::fs::create_dir_all(&config.export_dir)?;

    let state = Arc::new(AppState::new(
        Arc::clone(&db),
        engine,
        advisor,
        config.export_dir.clone(),
    ));
    let app = build_router(state, &config.static_dir);

    let addr = format!("{}:{}", config.bind, config.port);
    info!("Listening on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
