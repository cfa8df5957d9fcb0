//! ServerBuilder for fluent API to build HTTP servers

use super::rest::{SharedAdapter, build_router};
use crate::core::record::{Fields, Record};
use crate::core::service::DataAdapter;
use anyhow::Result;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Builder for serving a data adapter over REST
///
/// # Example
///
/// ```ignore
/// ServerBuilder::new()
///     .with_adapter(FileAdapter::new("./database"))
///     .serve("127.0.0.1:3000")
///     .await?;
/// ```
pub struct ServerBuilder {
    adapter: Option<SharedAdapter>,
    custom_routes: Vec<Router>,
    permissive_cors: bool,
}

impl ServerBuilder {
    /// Create a new ServerBuilder
    pub fn new() -> Self {
        Self {
            adapter: None,
            custom_routes: Vec::new(),
            permissive_cors: false,
        }
    }

    /// Set the adapter exposed by the server (required)
    pub fn with_adapter(mut self, adapter: impl DataAdapter<Record, Fields> + 'static) -> Self {
        self.adapter = Some(Arc::new(adapter));
        self
    }

    /// Set an adapter that is also used elsewhere in the application
    pub fn with_shared_adapter(mut self, adapter: SharedAdapter) -> Self {
        self.adapter = Some(adapter);
        self
    }

    /// Add custom routes to the server
    ///
    /// Custom routes are merged before the CRUD routes, so they must not
    /// reuse the `/{table}` and `/{table}/{id}` shapes.
    pub fn with_custom_routes(mut self, routes: Router) -> Self {
        self.custom_routes.push(routes);
        self
    }

    /// Allow cross-origin requests from any origin
    pub fn with_permissive_cors(mut self) -> Self {
        self.permissive_cors = true;
        self
    }

    /// Build the final REST router
    pub fn build(self) -> Result<Router> {
        let adapter = self
            .adapter
            .ok_or_else(|| anyhow::anyhow!("DataAdapter is required. Call .with_adapter()"))?;

        let mut app = Router::new();
        for custom_router in self.custom_routes {
            app = app.merge(custom_router);
        }
        app = app.merge(build_router(adapter));

        if self.permissive_cors {
            app = app.layer(CorsLayer::permissive());
        }

        Ok(app.layer(TraceLayer::new_for_http()))
    }

    /// Serve the application with graceful shutdown
    ///
    /// This will:
    /// - Bind to the provided address
    /// - Start serving requests
    /// - Handle SIGTERM and SIGINT (Ctrl+C) for graceful shutdown
    pub async fn serve(self, addr: &str) -> Result<()> {
        let listener = TcpListener::bind(addr).await?;
        self.serve_listener(listener, shutdown_signal()).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve_listener<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let app = self.build()?;

        tracing::info!(addr = %listener.local_addr()?, "Server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}
