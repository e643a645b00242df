//! Order service entry point.

use std::sync::Arc;

use api::Collaborators;
use api::config::{Config, ORDER_SERVICE_PORT};
use api::routes::orders::OrderState;
use metrics_exporter_prometheus::PrometheusHandle;
use store::{InMemoryStore, OrderStore, PostgresStore};
use workflow::OrderWorkflow;

fn app<S: OrderStore + 'static>(
    store: S,
    config: &Config,
    collaborators: Collaborators,
    metrics_handle: PrometheusHandle,
) -> axum::Router {
    let workflow = OrderWorkflow::new(
        store,
        collaborators.products,
        collaborators.inventory,
        collaborators.notifier,
    )
    .with_policy(config.partial_failure_policy);
    tracing::info!(policy = %config.partial_failure_policy, "fulfillment worker starting");
    api::order_app(Arc::new(OrderState::start(workflow)), metrics_handle)
}

#[tokio::main]
async fn main() {
    let config = Config::from_env(ORDER_SERVICE_PORT);
    api::telemetry::init_tracing(&config);
    let metrics_handle =
        api::telemetry::install_metrics().expect("failed to install Prometheus recorder");
    let collaborators = Collaborators::http(&config).expect("failed to build HTTP client");

    let app = match &config.database_url {
        Some(url) => {
            let store = PostgresStore::connect(url)
                .await
                .expect("failed to connect to database");
            store.run_migrations().await.expect("migrations failed");
            app(store, &config, collaborators, metrics_handle)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store");
            app(InMemoryStore::new(), &config, collaborators, metrics_handle)
        }
    };

    api::telemetry::serve(app, &config, api::ORDER_SERVICE)
        .await
        .expect("server error");
}
