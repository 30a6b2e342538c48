//! Upstream client handle.
//!
//! # Responsibilities
//! - Hold the address one upstream is reached at (rebindable)
//! - Own the pooled hyper client used to dispatch to it
//! - Build the outbound URI for a forwarded request

use axum::body::Body;
use axum::http::uri::{PathAndQuery, Scheme};
use axum::http::Uri;
use hyper_rustls::HttpsConnector;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use rustls::ClientConfig;

use crate::error::BuildError;
use crate::http::options::BuildOptions;
use crate::net::tls;

/// Transport shared by every upstream client.
pub type HttpsClient = Client<HttpsConnector<HttpConnector>, Body>;

/// One upstream endpoint.
#[derive(Clone)]
pub struct UpstreamClient {
    addr: String,
    scheme: Scheme,
    client: HttpsClient,
}

impl std::fmt::Debug for UpstreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamClient")
            .field("addr", &self.addr)
            .field("scheme", &self.scheme)
            .finish()
    }
}

impl UpstreamClient {
    /// Create a client for `addr` using the transport settings in `options`.
    pub fn new(addr: impl Into<String>, options: &BuildOptions) -> Result<Self, BuildError> {
        let (tls_config, scheme) = match &options.tls {
            Some(config) => (ClientConfig::clone(config), Scheme::HTTPS),
            None => (tls::default_client_config()?, Scheme::HTTP),
        };

        let mut http = HttpConnector::new();
        http.enforce_http(false);
        http.set_nodelay(true);
        http.set_connect_timeout(Some(std::time::Duration::from_secs(10)));

        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_tls_config(tls_config)
            .https_or_http()
            .enable_http1()
            .wrap_connector(http);

        let mut builder = Client::builder(TokioExecutor::new());
        builder.set_host(true);
        if let Some(lifetime) = options.max_conn_duration {
            builder.pool_idle_timeout(lifetime);
        }

        Ok(Self {
            addr: addr.into(),
            scheme,
            client: builder.build(connector),
        })
    }

    /// Address this client dispatches to; empty when unbound.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn is_bound(&self) -> bool {
        !self.addr.is_empty()
    }

    pub fn is_tls(&self) -> bool {
        self.scheme == Scheme::HTTPS
    }

    pub fn set_addr(&mut self, addr: &str) {
        addr.clone_into(&mut self.addr);
    }

    pub fn clear_addr(&mut self) {
        self.addr.clear();
    }

    pub fn http(&self) -> &HttpsClient {
        &self.client
    }

    /// Absolute URI of `path_and_query` on this upstream.
    pub fn uri_for(&self, path_and_query: &str) -> Result<Uri, axum::http::Error> {
        let path_and_query: PathAndQuery = path_and_query.parse()?;
        Ok(Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.addr.as_str())
            .path_and_query(path_and_query)
            .build()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::options::ProxyBuilder;
    use std::sync::Arc;

    fn options() -> BuildOptions {
        ProxyBuilder::new().target("x:1").into_options().unwrap()
    }

    #[tokio::test]
    async fn test_uri_for() {
        let client = UpstreamClient::new("127.0.0.1:3000", &options()).unwrap();
        let uri = client.uri_for("/a/b?c=d").unwrap();
        assert_eq!(uri.to_string(), "http://127.0.0.1:3000/a/b?c=d");
        assert!(!client.is_tls());
    }

    #[tokio::test]
    async fn test_https_scheme_when_tls_configured() {
        let mut opts = options();
        opts.tls = Some(Arc::new(tls::default_client_config().unwrap()));
        let client = UpstreamClient::new("example.com:443", &opts).unwrap();
        assert!(client.is_tls());
        assert_eq!(client.uri_for("/").unwrap().to_string(), "https://example.com:443/");
    }

    #[tokio::test]
    async fn test_rebind_and_clear() {
        let mut client = UpstreamClient::new("", &options()).unwrap();
        assert!(!client.is_bound());
        assert!(client.uri_for("/").is_err());

        client.set_addr("10.0.0.2:80");
        assert_eq!(client.addr(), "10.0.0.2:80");
        client.clear_addr();
        assert!(!client.is_bound());
    }
}
