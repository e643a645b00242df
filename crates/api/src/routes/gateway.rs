//! API gateway: a single entry point that proxies to the backend services
//! and serves a few cross-service views.

use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, RawQuery, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use reqwest::Client;
use serde::Serialize;
use serde_json::{Map, Value, json};
use workflow::http_client;

use crate::config::ServiceUrls;
use crate::error::ApiError;

pub const PROXY_TIMEOUT: Duration = Duration::from_secs(30);
pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(2);

/// Registered backend services and the clients used to reach them.
pub struct GatewayState {
    client: Client,
    health_client: Client,
    services: Vec<(&'static str, String)>,
}

impl GatewayState {
    pub fn new(urls: &ServiceUrls) -> reqwest::Result<Self> {
        Ok(Self::with_clients(
            urls,
            http_client(PROXY_TIMEOUT)?,
            http_client(HEALTH_TIMEOUT)?,
        ))
    }

    pub fn with_clients(urls: &ServiceUrls, client: Client, health_client: Client) -> Self {
        let services = vec![
            ("products", urls.products.clone()),
            ("inventory", urls.inventory.clone()),
            ("orders", urls.orders.clone()),
            ("notifications", urls.notifications.clone()),
        ]
        .into_iter()
        .map(|(name, url)| (name, url.trim_end_matches('/').to_string()))
        .collect();
        Self {
            client,
            health_client,
            services,
        }
    }

    fn base_url(&self, service: &str) -> Result<&str, ApiError> {
        self.services
            .iter()
            .find(|(name, _)| *name == service)
            .map(|(_, url)| url.as_str())
            .ok_or_else(|| ApiError::NotFound(format!("Service '{service}' not found")))
    }
}

pub type SharedGateway = Arc<GatewayState>;

#[derive(Serialize)]
pub struct GatewayInfo {
    pub status: &'static str,
    pub service: &'static str,
    pub available_services: Vec<&'static str>,
}

/// GET /
pub async fn root(State(state): State<SharedGateway>) -> Json<GatewayInfo> {
    Json(GatewayInfo {
        status: "ok",
        service: "api-gateway",
        available_services: state.services.iter().map(|(name, _)| *name).collect(),
    })
}

/// GET /health: pings the root of every registered service.
#[tracing::instrument(skip(state))]
pub async fn health(State(state): State<SharedGateway>) -> Json<Value> {
    let mut services = Map::new();
    let mut healthy = true;

    for (name, url) in &state.services {
        let entry = match state.health_client.get(format!("{url}/")).send().await {
            Ok(response) => {
                let up = response.status() == StatusCode::OK;
                healthy &= up;
                json!({
                    "status": if up { "up" } else { "down" },
                    "status_code": response.status().as_u16(),
                })
            }
            Err(e) => {
                healthy = false;
                tracing::warn!(service = *name, error = %e, "Health check failed");
                json!({ "status": "down", "error": e.to_string() })
            }
        };
        services.insert((*name).to_string(), entry);
    }

    Json(json!({
        "status": if healthy { "healthy" } else { "degraded" },
        "services": services,
    }))
}

/// Requests the gateway answers itself instead of relaying.
#[derive(Debug, PartialEq, Eq)]
enum Aggregate {
    ProductWithInventory(i64),
    OrderWithProducts(i64),
}

impl Aggregate {
    fn parse(method: &Method, service: &str, path: &str) -> Option<Self> {
        if method != Method::GET {
            return None;
        }
        let (id, view) = path.split_once('/')?;
        let id = id.parse().ok()?;
        match (service, view) {
            ("products", "with-inventory") => Some(Aggregate::ProductWithInventory(id)),
            ("orders", "with-products") => Some(Aggregate::OrderWithProducts(id)),
            _ => None,
        }
    }
}

/// `/{service}` for GET, POST, PUT and DELETE.
pub async fn proxy_root(
    State(state): State<SharedGateway>,
    Path(service): Path<String>,
    method: Method,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Result<Response, ApiError> {
    forward(&state, method, &service, None, query, body).await
}

/// `/{service}/{*path}` for GET, POST, PUT and DELETE.
pub async fn proxy(
    State(state): State<SharedGateway>,
    Path((service, path)): Path<(String, String)>,
    method: Method,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Result<Response, ApiError> {
    match Aggregate::parse(&method, &service, &path) {
        Some(Aggregate::ProductWithInventory(id)) => product_with_inventory(&state, id).await,
        Some(Aggregate::OrderWithProducts(id)) => order_with_products(&state, id).await,
        None => forward(&state, method, &service, Some(&path), query, body).await,
    }
}

#[tracing::instrument(skip(state, body))]
async fn forward(
    state: &GatewayState,
    method: Method,
    service: &str,
    path: Option<&str>,
    query: Option<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let base = state.base_url(service)?;
    let mut url = format!("{base}/{service}");
    if let Some(path) = path {
        url.push('/');
        url.push_str(path);
    }
    if let Some(query) = query.filter(|q| !q.is_empty()) {
        url.push('?');
        url.push_str(&query);
    }

    let mut request = state.client.request(method, &url);
    if !body.is_empty() {
        request = request.header(CONTENT_TYPE, "application/json").body(body);
    }

    let response = request.send().await.map_err(|e| {
        metrics::counter!("gateway_proxy_errors_total", "service" => service.to_string())
            .increment(1);
        tracing::error!(%url, error = %e, "Proxy request failed");
        ApiError::Unavailable(format!("Service unavailable: {e}"))
    })?;

    metrics::counter!(
        "gateway_proxy_requests_total",
        "service" => service.to_string(),
        "status" => response.status().as_u16().to_string()
    )
    .increment(1);
    relay(response).await
}

/// Copies an upstream response's status, content type and body.
async fn relay(response: reqwest::Response) -> Result<Response, ApiError> {
    let status = response.status();
    let content_type = response.headers().get(CONTENT_TYPE).cloned();
    let body = response
        .bytes()
        .await
        .map_err(|e| ApiError::Unavailable(format!("Service unavailable: {e}")))?;

    let mut relayed = (status, body).into_response();
    match content_type {
        Some(content_type) => {
            relayed.headers_mut().insert(CONTENT_TYPE, content_type);
        }
        None => {
            relayed.headers_mut().remove(CONTENT_TYPE);
        }
    }
    Ok(relayed)
}

async fn fetch_json(client: &Client, url: String) -> reqwest::Result<(StatusCode, Value)> {
    let response = client.get(url).send().await?;
    let status = response.status();
    let body = response.json::<Value>().await.unwrap_or(Value::Null);
    Ok((status, body))
}

/// GET /products/{id}/with-inventory
#[tracing::instrument(skip(state))]
async fn product_with_inventory(state: &GatewayState, id: i64) -> Result<Response, ApiError> {
    let products = state.base_url("products")?;
    let inventory = state.base_url("inventory")?;

    let product = match fetch_json(&state.client, format!("{products}/products/{id}")).await {
        Ok((StatusCode::OK, Value::Object(product))) => product,
        _ => return Err(ApiError::NotFound("Product not found".to_string())),
    };

    let stock = match fetch_json(&state.client, format!("{inventory}/inventory/{id}")).await {
        Ok((StatusCode::OK, stock)) => stock,
        _ => json!({ "quantity": 0, "location": null }),
    };

    let mut combined = product;
    combined.insert("inventory".to_string(), stock);
    Ok(Json(Value::Object(combined)).into_response())
}

/// GET /orders/{id}/with-products
#[tracing::instrument(skip(state))]
async fn order_with_products(state: &GatewayState, id: i64) -> Result<Response, ApiError> {
    let orders = state.base_url("orders")?;
    let products = state.base_url("products")?;

    let (status, order) = fetch_json(&state.client, format!("{orders}/orders/{id}"))
        .await
        .map_err(|e| ApiError::Unavailable(format!("Service unavailable: {e}")))?;
    if status != StatusCode::OK {
        return Err(ApiError::Upstream(status, "Order not found".to_string()));
    }
    let Value::Object(mut order) = order else {
        return Err(ApiError::Internal("Malformed order response".to_string()));
    };

    if let Some(Value::Array(items)) = order.get_mut("items") {
        for item in items.iter_mut() {
            let product_id = item.get("product_id").and_then(Value::as_i64);
            let product = match product_id {
                Some(product_id) => product_summary(state, products, product_id).await,
                None => json!({ "error": "Product not found" }),
            };
            if let Value::Object(item) = item {
                item.insert("product".to_string(), product);
            }
        }
    }

    Ok(Json(Value::Object(order)).into_response())
}

async fn product_summary(state: &GatewayState, products: &str, product_id: i64) -> Value {
    match fetch_json(&state.client, format!("{products}/products/{product_id}")).await {
        Ok((StatusCode::OK, product)) => json!({
            "name": product["name"],
            "sku": product["sku"],
            "description": product["description"],
        }),
        Ok(_) => json!({ "error": "Product not found" }),
        Err(e) => json!({ "error": e.to_string() }),
    }
}
