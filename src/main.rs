// Módulos de la aplicación
mod api;
mod app_state;
mod chunker;
mod config;
mod error;
mod extractor;
mod generator;
mod layout;
mod llm;
mod merger;
mod models;
mod neo4j_client;
mod source;
mod store;
mod validator;

use std::sync::Arc;

use anyhow::Context;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Cargar .env e inicializar logging
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 2. Cargar configuración
    let cfg = config::AppConfig::from_env().context("Error al cargar la configuración")?;

    // 3. Preparar el almacén de mapas mentales
    let store = store::from_config(&cfg)
        .await
        .context("Error inicializando el almacenamiento")?;

    // 4. Inicializar gestor de LLMs y la estrategia de generación
    let llm_manager = llm::LlmManager::from_config(&cfg);
    let app_state = AppState::new(
        cfg.clone(),
        llm_manager.clone(),
        Arc::new(llm_manager),
        store,
    );
    info!(
        "Estrategia '{}' con modelo '{}', almacenamiento '{}'",
        app_state.generator.name(),
        cfg.llm_chat_model,
        app_state.store.backend()
    );

    // 5. Configurar el router de la API y el servicio de ficheros estáticos
    let app = api::create_router(app_state)
        .fallback_service(ServeDir::new(&cfg.frontend_dir))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // 6. Iniciar el servidor
    let listener = tokio::net::TcpListener::bind(&cfg.server_addr)
        .await
        .with_context(|| format!("No se pudo escuchar en {}", cfg.server_addr))?;
    let server_url = format!("http://{}", cfg.server_addr);
    info!("🚀 Servidor escuchando en {}", &server_url);

    // Abrir el frontend en el navegador por defecto
    if cfg.open_browser && webbrowser::open(&server_url).is_err() {
        info!("No se pudo abrir el navegador. Por favor, accede a {} manualmente.", server_url);
    }

    // Apagado ordenado con Ctrl-C.
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Señal de apagado recibida, iniciando cierre del servidor.");
        })
        .await
        .context("Error en el servidor HTTP")?;

    info!("✅ Servidor cerrado correctamente.");
    Ok(())
}
