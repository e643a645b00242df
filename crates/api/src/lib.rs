//! HTTP services and API gateway for the inventory and order system.
//!
//! Each backend service (products, inventory, orders, notifications) is an
//! axum router over its own store, with structured logging (tracing) and
//! Prometheus metrics. The gateway proxies to the services and serves the
//! cross-service views.

pub mod config;
pub mod error;
pub mod extract;
pub mod routes;
pub mod telemetry;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use metrics_exporter_prometheus::PrometheusHandle;
use store::{InventoryStore, NotificationStore, OrderStore, ProductStore};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use workflow::{
    HttpInventoryClient, HttpNotifier, HttpProductLookup, InventoryClient, Notifier,
    ProductLookup, http_client,
};

use config::Config;
use routes::gateway::GatewayState;
use routes::inventory::Stock;
use routes::notifications::Notifications;
use routes::orders::OrderState;

pub const PRODUCT_SERVICE: &str = "product-service";
pub const INVENTORY_SERVICE: &str = "inventory-service";
pub const ORDER_SERVICE: &str = "order-service";
pub const NOTIFICATION_SERVICE: &str = "notification-service";
pub const GATEWAY: &str = "api-gateway";

/// Remote services a backend service calls.
#[derive(Clone)]
pub struct Collaborators {
    pub products: Arc<dyn ProductLookup>,
    pub inventory: Arc<dyn InventoryClient>,
    pub notifier: Arc<dyn Notifier>,
}

impl Collaborators {
    /// HTTP clients against the configured service URLs.
    pub fn http(config: &Config) -> reqwest::Result<Self> {
        let client = http_client(config.request_timeout)?;
        let urls = &config.services;
        Ok(Self {
            products: Arc::new(HttpProductLookup::new(client.clone(), urls.products.clone())),
            inventory: Arc::new(HttpInventoryClient::new(
                client.clone(),
                urls.inventory.clone(),
            )),
            notifier: Arc::new(HttpNotifier::new(client, urls.notifications.clone())),
        })
    }
}

fn metrics_router(metrics_handle: PrometheusHandle) -> Router {
    Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle)
}

fn with_layers(router: Router) -> Router {
    router
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Adds the root, health and metrics routes every backend service exposes.
fn service_app(router: Router, service: &'static str, metrics_handle: PrometheusHandle) -> Router {
    with_layers(
        router
            .route("/", get(move || routes::health::root(service)))
            .route("/health", get(routes::health::check))
            .merge(metrics_router(metrics_handle)),
    )
}

/// Creates the product service router.
pub fn product_app<S: ProductStore + 'static>(
    service: Arc<domain::ProductService<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    use routes::products;

    let router = Router::new()
        .route("/products", post(products::create::<S>).get(products::list::<S>))
        .route(
            "/products/{id}",
            get(products::get::<S>)
                .put(products::update::<S>)
                .delete(products::delete::<S>),
        )
        .route("/products/sku/{sku}", get(products::get_by_sku::<S>))
        .with_state(service);
    service_app(router, PRODUCT_SERVICE, metrics_handle)
}

/// Creates the inventory service router.
pub fn inventory_app<S: InventoryStore + 'static>(
    stock: Arc<Stock<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    use routes::inventory;

    let router = Router::new()
        .route("/inventory", post(inventory::create::<S>).get(inventory::list::<S>))
        .route(
            "/inventory/{product_id}",
            get(inventory::get::<S>).put(inventory::update::<S>),
        )
        .route("/inventory/{product_id}/adjust", post(inventory::adjust::<S>))
        .with_state(stock);
    service_app(router, INVENTORY_SERVICE, metrics_handle)
}

/// Creates the order service router. The fulfillment worker in `state`
/// must already be running.
pub fn order_app<S: OrderStore + 'static>(
    state: Arc<OrderState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    use routes::orders;

    let router = Router::new()
        .route("/orders", post(orders::create::<S>).get(orders::list::<S>))
        .route("/orders/{id}", get(orders::get::<S>))
        .route("/orders/{id}/status", put(orders::update_status::<S>))
        .route("/orders/{id}/fulfillment", get(orders::fulfillment::<S>))
        .route("/orders/customer/{email}", get(orders::by_customer::<S>))
        .with_state(state);
    service_app(router, ORDER_SERVICE, metrics_handle)
}

/// Creates the notification service router.
pub fn notification_app<S: NotificationStore + 'static>(
    service: Arc<Notifications<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    use routes::notifications;

    let router = Router::new()
        .route(
            "/notifications",
            post(notifications::create::<S>).get(notifications::list::<S>),
        )
        .route("/notifications/{id}", get(notifications::get::<S>))
        .route("/notifications/{id}/resend", post(notifications::resend::<S>))
        .with_state(service);
    service_app(router, NOTIFICATION_SERVICE, metrics_handle)
}

/// Creates the gateway router.
pub fn gateway_app(state: GatewayState, metrics_handle: PrometheusHandle) -> Router {
    use routes::gateway;

    let router = Router::new()
        .route("/", get(gateway::root))
        .route("/health", get(gateway::health))
        .route(
            "/{service}",
            get(gateway::proxy_root)
                .post(gateway::proxy_root)
                .put(gateway::proxy_root)
                .delete(gateway::proxy_root),
        )
        .route(
            "/{service}/{*path}",
            get(gateway::proxy)
                .post(gateway::proxy)
                .put(gateway::proxy)
                .delete(gateway::proxy),
        )
        .with_state(Arc::new(state))
        .merge(metrics_router(metrics_handle));
    with_layers(router)
}
