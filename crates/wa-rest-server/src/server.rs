// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Main server implementation

use crate::auth::{AuthConfig, auth_middleware};
use crate::config::ServerConfig;
use crate::dependencies::DefaultServerDependencies;
use crate::error::{ServerError, ServerResult};
use crate::handlers;
use crate::session::SessionHandle;
use crate::state::AppState;
use axum::{
    Router,
    middleware::from_fn,
    routing::{get, post},
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;

/// REST API server
pub struct Server {
    config: ServerConfig,
    app: Router,
    session: Arc<SessionHandle>,
}

impl Server {
    /// Create a new server instance
    pub async fn new(config: ServerConfig) -> ServerResult<Self> {
        let state = DefaultServerDependencies::new(config.clone()).await?.into_state();
        Self::with_state(config, state).await
    }

    /// Construct a server from an already-built app state (used for custom dependencies)
    pub async fn with_state(config: ServerConfig, state: AppState) -> ServerResult<Self> {
        config.validate()?;
        let session = Arc::clone(&state.session);
        let app = Self::build_app(state, &config);
        Ok(Self {
            config,
            app,
            session,
        })
    }

    /// Build the Axum application with routes and middleware
    fn build_app(state: AppState, config: &ServerConfig) -> Router {
        let middleware_stack = ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(CompressionLayer::new());

        let auth_config = AuthConfig::new(config.api_keys.clone());
        let api_routes = Router::new()
            .route("/auth/status", get(handlers::auth::auth_status))
            .route("/auth/qr", get(handlers::auth::request_qr_code))
            .route("/auth/pair", post(handlers::auth::pair_phone))
            .route("/auth/wait", get(handlers::auth::wait_for_pairing))
            .route("/auth/logout", post(handlers::auth::logout))
            .layer(from_fn(move |req, next| {
                auth_middleware(auth_config.clone(), req, next)
            }));

        let public_routes = Router::new()
            .route("/health", get(handlers::health::health_check))
            .route("/version", get(handlers::health::version))
            .route("/openapi.json", get(handlers::openapi::openapi_spec));

        let app = Router::new()
            .nest("/api/v1", api_routes)
            .merge(public_routes)
            .with_state(state)
            .layer(middleware_stack);

        if config.enable_cors {
            app.layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        } else {
            app
        }
    }

    /// Run until SIGINT/SIGTERM
    pub async fn run(self) -> ServerResult<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on an existing listener until `shutdown` resolves, then close the session
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        info!("Starting server on {}", addr);

        let result = axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|err| ServerError::Internal(format!("REST server error: {err}")));

        self.session.close().await;
        info!("Server stopped");
        result
    }

    /// Get the bind address
    pub fn addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// The router, for serving or for driving in-process
    pub fn router(&self) -> Router {
        self.app.clone()
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
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
    info!("Shutdown signal received");
}
