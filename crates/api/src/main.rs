use anyhow::Context;

use bookforge_auth::TokenConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    bookforge_observability::init();

    // Missing or weak signing secret is fatal here, never per-request.
    let config = TokenConfig::from_env().context("token configuration")?;

    let enforce_sessions = std::env::var("BOOKFORGE_SESSION_ENFORCEMENT")
        .map(|v| v != "false" && v != "0")
        .unwrap_or(true);

    let app = bookforge_api::app::build_app(config, enforce_sessions).await;

    let listener = tokio::net::TcpListener::bind("0.0.0.0:8080")
        .await
        .context("failed to bind 0.0.0.0:8080")?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
