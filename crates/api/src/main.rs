use anyhow::Context;

use identra_api::{
    app::{build_app, services},
    config::AppConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("invalid configuration")?;
    identra_observability::init(config.log_format);

    let accounts = services::build_accounts(&config).await?;
    accounts.set_up(&config.admin).await;

    let app = build_app(accounts);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
