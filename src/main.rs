use hr_console::{app, apply_migrations, resolve, AppState, S3Store, Settings};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("hr_console=info,tower_http=info")),
        )
        .init();

    let settings = Settings::from_env()?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect(&settings.database_url)
        .await?;

    let model = resolve(&settings.database_schema)?;
    apply_migrations(&pool, &model).await?;
    let store = S3Store::connect(&settings.storage).await;
    tracing::info!(bucket = %settings.storage.bucket, "object storage ready");

    let state = AppState::new(pool.clone(), model, Arc::new(store));
    let listener = TcpListener::bind(settings.listen_addr).await?;
    tracing::info!("hr-console listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
