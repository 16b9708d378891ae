use anyhow::Context;
use clap::Parser;
use hooklab::api::ApiServer;
use hooklab::config::{Args, LogFormat};
use hooklab::rules::{RhaiConditionEngine, RuleEvaluator};
use hooklab::state::{AppState, DEFAULT_KEY};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args);

    let state = Arc::new(AppState::new());
    state.set_response_config(DEFAULT_KEY, args.default_response()?);

    if let Some(seed) = args.seed()? {
        let evaluator = RuleEvaluator::new(RhaiConditionEngine::new());
        seed.apply(&state, &evaluator)?;
    }

    let shutdown = CancellationToken::new();
    let server = ApiServer::bind(Arc::clone(&state), args.server_config(), shutdown.clone())
        .await
        .context("Could not start server")?;

    tokio::spawn(async move {
        wait_for_signal().await;
        shutdown.cancel();
    });

    server.run().await?;
    info!("Server stopped gracefully");
    Ok(())
}

fn init_logging(args: &Args) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match args.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
