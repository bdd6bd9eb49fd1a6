// Finanzas - Web Server
// Opens the database once and serves the REST API

use anyhow::{Context, Result};
use finanzas::api::{router, AppState};
use finanzas::{init_logging, open_database, Config};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let (config, rest) = Config::from_args(std::env::args().skip(1))?;
    if !rest.is_empty() {
        anyhow::bail!("Argumentos no reconocidos: {}", rest.join(" "));
    }

    // Created on first start if missing
    let conn = open_database(&config.db_path)
        .with_context(|| format!("No se pudo abrir la base de datos {}", config.db_path.display()))?;

    let app = router(AppState::new(conn), config.max_upload_bytes);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("No se pudo escuchar en {}", addr))?;

    info!("Servidor en http://{}", addr);
    info!("API: http://{}/api/transacciones", addr);

    axum::serve(listener, app).await.context("El servidor terminó con error")?;

    Ok(())
}
