//! Notification service entry point.

use std::sync::Arc;

use api::config::{Config, NOTIFICATION_SERVICE_PORT};
use domain::{DeliveryChannel, LogChannel, NotificationService};
use metrics_exporter_prometheus::PrometheusHandle;
use store::{InMemoryStore, NotificationStore, PostgresStore};

fn app<S: NotificationStore + 'static>(
    store: S,
    config: &Config,
    metrics_handle: PrometheusHandle,
) -> axum::Router {
    let channel: Arc<dyn DeliveryChannel> = Arc::new(LogChannel);
    let service = NotificationService::with_manager_email(
        store,
        channel,
        config.inventory_manager_email.clone(),
    );
    api::notification_app(Arc::new(service), metrics_handle)
}

#[tokio::main]
async fn main() {
    let config = Config::from_env(NOTIFICATION_SERVICE_PORT);
    api::telemetry::init_tracing(&config);
    let metrics_handle =
        api::telemetry::install_metrics().expect("failed to install Prometheus recorder");

    let app = match &config.database_url {
        Some(url) => {
            let store = PostgresStore::connect(url)
                .await
                .expect("failed to connect to database");
            store.run_migrations().await.expect("migrations failed");
            app(store, &config, metrics_handle)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store");
            app(InMemoryStore::new(), &config, metrics_handle)
        }
    };

    api::telemetry::serve(app, &config, api::NOTIFICATION_SERVICE)
        .await
        .expect("server error");
}
