//! Product service entry point.

use std::sync::Arc;

use api::config::{Config, PRODUCT_SERVICE_PORT};
use domain::ProductService;
use metrics_exporter_prometheus::PrometheusHandle;
use store::{InMemoryStore, PostgresStore, ProductStore};

fn app<S: ProductStore + 'static>(store: S, metrics_handle: PrometheusHandle) -> axum::Router {
    api::product_app(Arc::new(ProductService::new(store)), metrics_handle)
}

#[tokio::main]
async fn main() {
    let config = Config::from_env(PRODUCT_SERVICE_PORT);
    api::telemetry::init_tracing(&config);
    let metrics_handle =
        api::telemetry::install_metrics().expect("failed to install Prometheus recorder");

    let app = match &config.database_url {
        Some(url) => {
            let store = PostgresStore::connect(url)
                .await
                .expect("failed to connect to database");
            store.run_migrations().await.expect("migrations failed");
            app(store, metrics_handle)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store");
            app(InMemoryStore::new(), metrics_handle)
        }
    };

    api::telemetry::serve(app, &config, api::PRODUCT_SERVICE)
        .await
        .expect("server error");
}
