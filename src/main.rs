use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use nplusone_batch::config::Config;
use nplusone_batch::seed::{self, SeedOptions};
use nplusone_batch::{http, schema, telemetry, AuthorRepository, Comparator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    telemetry::init_logging(&config.logging());

    info!(version = env!("CARGO_PKG_VERSION"), "starting nplusone-batch");

    let pool = schema::open(&config.database_url, config.max_connections).await?;
    let repository = AuthorRepository::new(pool);

    let summary = seed::seed(
        &repository,
        SeedOptions {
            authors: config.seed_authors,
            ..SeedOptions::default()
        },
    )
    .await?;
    info!(authors = summary.authors, books = summary.books, "database ready");

    let comparator = Comparator::new(repository).lazy_batch_size(config.lazy_batch_size);
    let app = http::create_router(comparator);

    let listener = TcpListener::bind(config.bind).await?;
    info!(addr = %config.bind, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
