//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build one proxy engine per configured route
//! - Create the Axum Router with a single catch-all handler
//! - Wire up middleware (tracing)
//! - Bind to a plain listener or terminate TLS via axum-server
//! - Dispatch each request to the engine of the matching route

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::{HttpRouteConfig, ProxyConfig, RouteConfig, WebSocketRouteConfig};
use crate::error::BuildError;
use crate::handle::{ConnectionInfo, ProxyHandle, Recyclable};
use crate::http::options::{ProxyBuilder, Targets};
use crate::http::proxy::ReverseProxy;
use crate::load_balancer::WeightedTarget;
use crate::observability::metrics;
use crate::pool::{ChannelPool, Pool};
use crate::routing::{Route, Router as RouteTable};
use crate::websocket::{Dialer, WsReverseProxy};

/// The engine a route dispatches to.
pub enum Upstream {
    Http(Arc<ReverseProxy>),
    /// Engines borrowed per request from a pool and bound to `address`.
    Pooled {
        pool: Arc<ChannelPool<ReverseProxy>>,
        address: String,
    },
    WebSocket(Arc<WsReverseProxy>),
}

impl std::fmt::Debug for Upstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Upstream::Http(proxy) => f.debug_tuple("Http").field(proxy).finish(),
            Upstream::Pooled { pool, address } => f
                .debug_struct("Pooled")
                .field("address", address)
                .field("idle", &pool.len())
                .finish(),
            Upstream::WebSocket(proxy) => f.debug_tuple("WebSocket").field(proxy).finish(),
        }
    }
}

impl Upstream {
    /// Build the engine described by `route`.
    pub fn from_config(route: &RouteConfig) -> Result<Self, BuildError> {
        match (&route.http, &route.websocket) {
            (Some(http), _) => Self::http(&route.name, http),
            (None, Some(ws)) => Self::websocket(&route.name, ws),
            (None, None) => Err(BuildError::NoTargets),
        }
    }

    fn http(name: &str, config: &HttpRouteConfig) -> Result<Self, BuildError> {
        let mut builder = ProxyBuilder::new()
            .name(name)
            .debug(config.debug)
            .timeout(Duration::from_millis(config.timeout_ms))
            .max_conn_duration(Duration::from_secs(config.max_conn_duration_secs));

        builder = if config.balance {
            builder.balancer(
                config
                    .targets
                    .iter()
                    .map(|t| WeightedTarget::new(t.address.as_str(), t.weight)),
            )
        } else {
            match config.targets.first() {
                Some(t) => builder.target(t.address.as_str()),
                None => builder,
            }
        };
        if config.disable_virtual_host {
            builder = builder.disable_virtual_host();
        }
        if config.disable_path_normalizing {
            builder = builder.disable_path_normalizing();
        }
        if let Some(tls) = &config.tls {
            builder = builder.tls_files(&tls.cert_path, &tls.key_path);
        }

        let Some(pool) = config.pool else {
            return Ok(Upstream::Http(Arc::new(builder.build()?)));
        };

        let options = builder.into_options()?;
        let address = match &options.targets {
            Some(Targets::Single(addr)) => addr.clone(),
            _ => return Err(BuildError::NoTargets),
        };
        let template = options.clone();
        let pool = ChannelPool::new(pool.initial_capacity, pool.max_capacity, move |addr: &str| {
            let mut options = template.clone();
            options.targets = Some(Targets::Single(addr.to_string()));
            ReverseProxy::with_options(options)
        })?;

        Ok(Upstream::Pooled {
            pool: Arc::new(pool),
            address,
        })
    }

    fn websocket(name: &str, config: &WebSocketRouteConfig) -> Result<Self, BuildError> {
        let proxy = WsReverseProxy::builder()
            .name(name)
            .debug(config.debug)
            .target(config.target.as_str())
            .dialer(Dialer::default().connect_timeout(Duration::from_millis(config.connect_timeout_ms)))
            .build()?;
        Ok(Upstream::WebSocket(Arc::new(proxy)))
    }

    /// Serve one request through this engine.
    pub async fn serve(&self, request: Request<Body>, conn: ConnectionInfo) -> Response {
        match self {
            Upstream::Http(proxy) => proxy.serve(request, conn).await,
            Upstream::WebSocket(proxy) => proxy.serve(request, conn).await,
            Upstream::Pooled { pool, address } => {
                let mut proxy = match pool.get(address) {
                    Ok(proxy) => proxy,
                    Err(e) => {
                        tracing::error!(address = %address, error = %e, "Failed to borrow proxy from pool");
                        return (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response();
                    }
                };
                let response = proxy.serve(request, conn).await;
                proxy.reset();
                pool.put(proxy);
                response
            }
        }
    }

    fn close(&self) {
        if let Upstream::Pooled { pool, .. } = self {
            pool.close();
        }
    }
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RouteTable<Upstream>>,
    /// Whether the listener terminates TLS.
    pub tls: bool,
}

/// HTTP server for the reverse proxy.
pub struct HttpServer {
    routes: Arc<RouteTable<Upstream>>,
    config: ProxyConfig,
}

impl HttpServer {
    /// Build every route's engine from `config`.
    pub fn new(config: ProxyConfig) -> Result<Self, BuildError> {
        let mut routes = Vec::with_capacity(config.routes.len());
        for route in &config.routes {
            let upstream = Upstream::from_config(route)?;
            tracing::info!(
                route = %route.name,
                host = ?route.host,
                path_prefix = ?route.path_prefix,
                priority = route.priority,
                upstream = ?upstream,
                "Route configured"
            );
            routes.push(Route::new(
                route.name.as_str(),
                route.host.as_deref(),
                route.path_prefix.as_deref(),
                route.priority,
                upstream,
            ));
        }

        Ok(Self {
            routes: Arc::new(RouteTable::new(routes)),
            config,
        })
    }

    /// Build the Axum router with all middleware layers.
    pub fn router(&self, tls: bool) -> Router {
        let state = AppState {
            routes: self.routes.clone(),
            tls,
        };
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server on `listener` until `shutdown` resolves.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, routes = self.routes.len(), "HTTP server starting");

        let app = self.router(false).into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;

        self.close();
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Run a TLS-terminating server on `addr`; stop it through `handle`.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        handle: axum_server::Handle,
    ) -> Result<(), std::io::Error> {
        tracing::info!(address = %addr, routes = self.routes.len(), "HTTPS server starting");

        let app = self.router(true).into_make_service_with_connect_info::<SocketAddr>();
        axum_server::bind_rustls(addr, tls).handle(handle).serve(app).await?;

        self.close();
        tracing::info!("HTTPS server stopped");
        Ok(())
    }

    /// Close every route's engine pool.
    pub fn close(&self) {
        for route in self.routes.routes() {
            route.target.close();
        }
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    pub fn routes(&self) -> &RouteTable<Upstream> {
        &self.routes
    }
}

/// Main proxy handler: match the route, hand the request to its engine.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let conn = if state.tls {
        ConnectionInfo::tls(addr)
    } else {
        ConnectionInfo::plain(addr)
    };

    match state.routes.match_request(&request) {
        Some(route) => route.target.serve(request, conn).await,
        None => {
            tracing::warn!(
                method = %request.method(),
                path = %request.uri().path(),
                "No route matched"
            );
            metrics::record_request("none", "none", 404, Instant::now());
            (StatusCode::NOT_FOUND, "No matching route found").into_response()
        }
    }
}
