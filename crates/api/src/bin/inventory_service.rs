//! Inventory service entry point.

use std::sync::Arc;

use api::Collaborators;
use api::config::{Config, INVENTORY_SERVICE_PORT};
use domain::InventoryService;
use metrics_exporter_prometheus::PrometheusHandle;
use store::{InMemoryStore, InventoryStore, PostgresStore};
use workflow::StockKeeper;

fn app<S: InventoryStore + 'static>(
    store: S,
    config: &Config,
    collaborators: &Collaborators,
    metrics_handle: PrometheusHandle,
) -> axum::Router {
    let stock = StockKeeper::new(
        InventoryService::with_threshold(store, config.stock_threshold),
        collaborators.products.clone(),
        collaborators.notifier.clone(),
    );
    api::inventory_app(Arc::new(stock), metrics_handle)
}

#[tokio::main]
async fn main() {
    let config = Config::from_env(INVENTORY_SERVICE_PORT);
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
            app(store, &config, &collaborators, metrics_handle)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store");
            app(InMemoryStore::new(), &config, &collaborators, metrics_handle)
        }
    };

    api::telemetry::serve(app, &config, api::INVENTORY_SERVICE)
        .await
        .expect("server error");
}
