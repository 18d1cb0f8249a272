use std::env;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;

use casebook_backend::core::logging;
use casebook_backend::rag::CaseIndex;
use casebook_backend::server;
use casebook_backend::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let state = AppState::initialize().await?;
    logging::init(&state.paths);

    let port = env::var("PORT")
        .ok()
        .and_then(|val| val.parse::<u16>().ok())
        .unwrap_or(8787);
    let bind_addr = format!("127.0.0.1:{}", port);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;

    println!("CASEBOOK_PORT={}", addr.port());
    tracing::info!(
        "Listening on {} ({} cases indexed)",
        addr,
        state.index.len()
    );

    let app: Router = server::router::router(state.clone());

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
