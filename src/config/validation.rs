//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check each route names exactly one upstream kind
//! - Validate value ranges (pool capacities, weights, URLs, addresses)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{HttpRouteConfig, ProxyConfig, RouteConfig};
use crate::websocket::options::parse_target;

/// A semantic problem in a loaded configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no routes configured")]
    NoRoutes,

    #[error("invalid listener bind address '{0}'")]
    BindAddress(String),

    #[error("invalid metrics address '{0}'")]
    MetricsAddress(String),

    #[error("duplicate route name '{0}'")]
    DuplicateRoute(String),

    #[error("route '{0}': exactly one of [routes.http] or [routes.websocket] is required")]
    UpstreamKind(String),

    #[error("route '{0}': path_prefix must start with '/'")]
    PathPrefix(String),

    #[error("route '{0}': no targets configured")]
    NoTargets(String),

    #[error("route '{0}': multiple targets require balance = true")]
    BalanceRequired(String),

    #[error("route '{0}': pool cannot be combined with balance")]
    PoolWithBalance(String),

    #[error("route '{route}': invalid pool capacity initial={initial}, max={max}")]
    PoolCapacity { route: String, initial: usize, max: usize },

    #[error("route '{0}': balanced targets must have a non-empty address")]
    EmptyTarget(String),

    #[error("route '{route}': {reason}")]
    WebSocketTarget { route: String, reason: String },
}

/// Check `config` and report every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if config.routes.is_empty() {
        errors.push(ValidationError::NoRoutes);
    }

    let mut seen = HashSet::new();
    for route in &config.routes {
        if !seen.insert(route.name.as_str()) {
            errors.push(ValidationError::DuplicateRoute(route.name.clone()));
        }
        validate_route(route, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_route(route: &RouteConfig, errors: &mut Vec<ValidationError>) {
    let name = &route.name;

    if let Some(prefix) = &route.path_prefix {
        if !prefix.starts_with('/') {
            errors.push(ValidationError::PathPrefix(name.clone()));
        }
    }

    match (&route.http, &route.websocket) {
        (Some(http), None) => validate_http(name, http, errors),
        (None, Some(ws)) => {
            if let Err(e) = parse_target(&ws.target) {
                errors.push(ValidationError::WebSocketTarget {
                    route: name.clone(),
                    reason: e.to_string(),
                });
            }
        }
        _ => errors.push(ValidationError::UpstreamKind(name.clone())),
    }
}

fn validate_http(name: &str, http: &HttpRouteConfig, errors: &mut Vec<ValidationError>) {
    if http.targets.is_empty() {
        errors.push(ValidationError::NoTargets(name.to_string()));
    }
    if http.targets.len() > 1 && !http.balance {
        errors.push(ValidationError::BalanceRequired(name.to_string()));
    }
    if http.balance && http.targets.iter().any(|t| t.address.is_empty()) {
        errors.push(ValidationError::EmptyTarget(name.to_string()));
    }

    if let Some(pool) = http.pool {
        if http.balance {
            errors.push(ValidationError::PoolWithBalance(name.to_string()));
        }
        if pool.max_capacity == 0 || pool.initial_capacity > pool.max_capacity {
            errors.push(ValidationError::PoolCapacity {
                route: name.to_string(),
                initial: pool.initial_capacity,
                max: pool.max_capacity,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{PoolConfig, TargetConfig, WebSocketRouteConfig};

    fn http_route(name: &str, targets: &[&str]) -> RouteConfig {
        RouteConfig {
            name: name.to_string(),
            host: None,
            path_prefix: Some("/".to_string()),
            priority: 0,
            http: Some(HttpRouteConfig {
                targets: targets
                    .iter()
                    .map(|a| TargetConfig {
                        address: a.to_string(),
                        weight: 1,
                    })
                    .collect(),
                ..Default::default()
            }),
            websocket: None,
        }
    }

    fn config(routes: Vec<RouteConfig>) -> ProxyConfig {
        ProxyConfig {
            routes,
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate_config(&config(vec![http_route("api", &["127.0.0.1:3000"])])).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut multi = http_route("multi", &["a:1", "b:1"]);
        multi.path_prefix = Some("api".to_string());

        let mut both = http_route("both", &["a:1"]);
        both.websocket = Some(WebSocketRouteConfig {
            target: "ws://a:1".to_string(),
            connect_timeout_ms: 1000,
            debug: false,
        });

        let mut cfg = config(vec![multi, both, http_route("dup", &[]), http_route("dup", &["a:1"])]);
        cfg.listener.bind_address = "not-an-address".to_string();

        let errors = validate_config(&cfg).unwrap_err();
        assert!(errors.contains(&ValidationError::BindAddress("not-an-address".into())));
        assert!(errors.contains(&ValidationError::PathPrefix("multi".into())));
        assert!(errors.contains(&ValidationError::BalanceRequired("multi".into())));
        assert!(errors.contains(&ValidationError::UpstreamKind("both".into())));
        assert!(errors.contains(&ValidationError::NoTargets("dup".into())));
        assert!(errors.contains(&ValidationError::DuplicateRoute("dup".into())));
        assert_eq!(errors.len(), 6);
    }

    #[test]
    fn test_no_routes() {
        assert_eq!(validate_config(&config(vec![])), Err(vec![ValidationError::NoRoutes]));
    }

    #[test]
    fn test_pool_rules() {
        let mut route = http_route("pooled", &["a:1", "b:1"]);
        let http = route.http.as_mut().unwrap();
        http.balance = true;
        http.pool = Some(PoolConfig {
            initial_capacity: 5,
            max_capacity: 2,
        });

        let errors = validate_config(&config(vec![route])).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::PoolWithBalance("pooled".into()),
                ValidationError::PoolCapacity {
                    route: "pooled".into(),
                    initial: 5,
                    max: 2
                },
            ]
        );
    }

    #[test]
    fn test_websocket_target() {
        let route = RouteConfig {
            name: "ws".to_string(),
            host: None,
            path_prefix: None,
            priority: 0,
            http: None,
            websocket: Some(WebSocketRouteConfig {
                target: "http://127.0.0.1:9000".to_string(),
                connect_timeout_ms: 1000,
                debug: false,
            }),
        };
        let errors = validate_config(&config(vec![route])).unwrap_err();
        assert!(matches!(&errors[0], ValidationError::WebSocketTarget { route, .. } if route == "ws"));
    }
}
