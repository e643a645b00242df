//! API gateway entry point.

use api::config::{Config, GATEWAY_PORT};
use api::routes::gateway::GatewayState;

#[tokio::main]
async fn main() {
    let config = Config::from_env(GATEWAY_PORT);
    api::telemetry::init_tracing(&config);
    let metrics_handle =
        api::telemetry::install_metrics().expect("failed to install Prometheus recorder");

    let state = GatewayState::new(&config.services).expect("failed to build HTTP client");
    let app = api::gateway_app(state, metrics_handle);

    api::telemetry::serve(app, &config, api::GATEWAY)
        .await
        .expect("server error");
}
