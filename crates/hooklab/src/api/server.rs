//! API server.

use crate::api::router::route_request;
use crate::api::ApiContext;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::state::AppState;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use hyper_util::server::graceful::GracefulShutdown;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How long in-flight connections get to finish after shutdown starts.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP server for hooklab
pub struct ApiServer {
    listener: TcpListener,
    ctx: Arc<ApiContext>,
}

impl ApiServer {
    /// Bind the listener. Port 0 picks a free port; see [`ApiServer::local_addr`].
    pub async fn bind(
        state: Arc<AppState>,
        config: ServerConfig,
        shutdown: CancellationToken,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(config.addr)
            .await
            .map_err(|e| ServerError::Bind(config.addr, e))?;
        let ctx = Arc::new(ApiContext::new(state, config, shutdown));
        Ok(Self { listener, ctx })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener.local_addr().map_err(ServerError::LocalAddr)
    }

    pub fn context(&self) -> &Arc<ApiContext> {
        &self.ctx
    }

    /// Serve until the shutdown token is cancelled, then close every event
    /// stream and wait for open connections to drain.
    pub async fn run(self) -> Result<(), anyhow::Error> {
        let addr = self.local_addr()?;
        info!("Hooklab listening on http://{}", addr);

        let graceful = GracefulShutdown::new();
        let shutdown = self.ctx.shutdown.clone();

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    let (stream, peer) = match result {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            error!("Accept error: {}", e);
                            continue;
                        }
                    };
                    let io = TokioIo::new(stream);
                    let ctx = Arc::clone(&self.ctx);
                    let service = service_fn(move |req| {
                        let ctx = Arc::clone(&ctx);
                        async move { route_request(req, ctx).await }
                    });

                    let conn = http1::Builder::new().serve_connection(io, service);
                    let conn = graceful.watch(conn);
                    tokio::spawn(async move {
                        if let Err(e) = conn.await {
                            debug!("Connection error from {}: {}", peer, e);
                        }
                    });
                }
                _ = shutdown.cancelled() => {
                    info!("Hooklab shutting down");
                    break;
                }
            }
        }

        drop(self.listener);
        let closed = self.ctx.state().close_subscribers();
        debug!(closed, "Closed event stream subscribers");

        tokio::select! {
            _ = graceful.shutdown() => info!("All connections closed"),
            _ = tokio::time::sleep(DRAIN_TIMEOUT) => {
                warn!("Timed out waiting for connections to close");
            }
        }
        Ok(())
    }
}
