//! Service configuration loaded from environment variables.

use std::time::Duration;

use domain::{DEFAULT_INVENTORY_MANAGER_EMAIL, DEFAULT_STOCK_THRESHOLD};
use workflow::PartialFailurePolicy;

pub const GATEWAY_PORT: u16 = 8000;
pub const PRODUCT_SERVICE_PORT: u16 = 8001;
pub const INVENTORY_SERVICE_PORT: u16 = 8002;
pub const ORDER_SERVICE_PORT: u16 = 8003;
pub const NOTIFICATION_SERVICE_PORT: u16 = 8004;

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Base URLs of the four backend services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceUrls {
    pub products: String,
    pub inventory: String,
    pub orders: String,
    pub notifications: String,
}

impl Default for ServiceUrls {
    fn default() -> Self {
        Self {
            products: format!("http://localhost:{PRODUCT_SERVICE_PORT}"),
            inventory: format!("http://localhost:{INVENTORY_SERVICE_PORT}"),
            orders: format!("http://localhost:{ORDER_SERVICE_PORT}"),
            notifications: format!("http://localhost:{NOTIFICATION_SERVICE_PORT}"),
        }
    }
}

/// Configuration shared by every service binary.
///
/// Reads from environment variables:
/// - `HOST`, `PORT`: bind address (port defaults per service)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `json` for JSON lines, anything else for plain text
/// - `DATABASE_URL`: PostgreSQL connection string; unset means in-memory
/// - `PRODUCT_SERVICE_URL`, `INVENTORY_SERVICE_URL`, `ORDER_SERVICE_URL`,
///   `NOTIFICATION_SERVICE_URL`: collaborator base URLs
/// - `STOCK_THRESHOLD`: low stock alert threshold (default: 10)
/// - `REQUEST_TIMEOUT_SECS`: per call timeout for collaborators (default: 5)
/// - `INVENTORY_MANAGER_EMAIL`: recipient of low stock alerts
/// - `FULFILLMENT_PARTIAL_POLICY`: `compensate` (default) or `tolerate`
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub services: ServiceUrls,
    pub stock_threshold: f64,
    pub request_timeout: Duration,
    pub inventory_manager_email: String,
    pub partial_failure_policy: PartialFailurePolicy,
}

impl Config {
    /// Loads configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    pub fn from_env(default_port: u16) -> Self {
        Self::from_lookup(default_port, |key| std::env::var(key).ok())
    }

    fn from_lookup(default_port: u16, var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::with_port(default_port);
        let urls = defaults.services.clone();
        Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: var("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(default_port),
            log_level: var("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: match var("LOG_FORMAT") {
                Some(format) if format.eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
            database_url: var("DATABASE_URL").filter(|url| !url.is_empty()),
            services: ServiceUrls {
                products: var("PRODUCT_SERVICE_URL").unwrap_or(urls.products),
                inventory: var("INVENTORY_SERVICE_URL").unwrap_or(urls.inventory),
                orders: var("ORDER_SERVICE_URL").unwrap_or(urls.orders),
                notifications: var("NOTIFICATION_SERVICE_URL").unwrap_or(urls.notifications),
            },
            stock_threshold: var("STOCK_THRESHOLD")
                .and_then(|t| t.parse::<f64>().ok())
                .filter(|t| t.is_finite())
                .unwrap_or(defaults.stock_threshold),
            request_timeout: var("REQUEST_TIMEOUT_SECS")
                .and_then(|t| t.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            inventory_manager_email: var("INVENTORY_MANAGER_EMAIL")
                .unwrap_or(defaults.inventory_manager_email),
            partial_failure_policy: var("FULFILLMENT_PARTIAL_POLICY")
                .and_then(|p| p.parse().ok())
                .unwrap_or_default(),
        }
    }

    /// Defaults for a service listening on `port`.
    pub fn with_port(port: u16) -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            services: ServiceUrls::default(),
            stock_threshold: DEFAULT_STOCK_THRESHOLD,
            request_timeout: Duration::from_secs(5),
            inventory_manager_email: DEFAULT_INVENTORY_MANAGER_EMAIL.to_string(),
            partial_failure_policy: PartialFailurePolicy::default(),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(port: u16, vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(port, |key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = load(ORDER_SERVICE_PORT, &[]);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8003);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Text);
        assert!(config.database_url.is_none());
        assert_eq!(config.services.products, "http://localhost:8001");
        assert_eq!(config.services.notifications, "http://localhost:8004");
        assert_eq!(config.stock_threshold, 10.0);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.inventory_manager_email, "inventory_manager@example.com");
        assert_eq!(config.partial_failure_policy, PartialFailurePolicy::Compensate);
    }

    #[test]
    fn test_overrides() {
        let config = load(
            GATEWAY_PORT,
            &[
                ("PORT", "9000"),
                ("LOG_FORMAT", "JSON"),
                ("DATABASE_URL", "postgres://localhost/orders"),
                ("INVENTORY_SERVICE_URL", "http://inventory:8002"),
                ("STOCK_THRESHOLD", "3.5"),
                ("REQUEST_TIMEOUT_SECS", "2"),
                ("FULFILLMENT_PARTIAL_POLICY", "tolerate"),
            ],
        );
        assert_eq!(config.port, 9000);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/orders"));
        assert_eq!(config.services.inventory, "http://inventory:8002");
        assert_eq!(config.stock_threshold, 3.5);
        assert_eq!(config.request_timeout, Duration::from_secs(2));
        assert_eq!(config.partial_failure_policy, PartialFailurePolicy::Tolerate);
    }

    #[test]
    fn test_unparsable_values_fall_back() {
        let config = load(
            PRODUCT_SERVICE_PORT,
            &[
                ("PORT", "not-a-port"),
                ("STOCK_THRESHOLD", "lots"),
                ("REQUEST_TIMEOUT_SECS", "0"),
                ("FULFILLMENT_PARTIAL_POLICY", "retry"),
                ("DATABASE_URL", ""),
            ],
        );
        assert_eq!(config.port, 8001);
        assert_eq!(config.stock_threshold, 10.0);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.partial_failure_policy, PartialFailurePolicy::Compensate);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_addr_formatting() {
        let mut config = Config::with_port(8080);
        config.host = "127.0.0.1".to_string();
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }
}
