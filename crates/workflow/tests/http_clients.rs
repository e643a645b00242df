//! HTTP collaborator clients against in-process mock services.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use store::ProductId;
use tokio::net::TcpListener;
use workflow::{
    HttpInventoryClient, HttpNotifier, HttpProductLookup, InventoryClient, Notifier,
    ProductLookup, WorkflowError, http_client,
};

#[derive(Clone, Default)]
struct Recorded {
    bodies: Arc<Mutex<Vec<Value>>>,
}

async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

async fn product(Path(id): Path<i64>) -> (StatusCode, Json<Value>) {
    match id {
        1 => (
            StatusCode::OK,
            Json(json!({
                "id": 1,
                "name": "Laptop",
                "description": null,
                "price": 999.99,
                "sku": "LAP-001",
                "created_at": "2024-01-01T00:00:00Z",
                "updated_at": null
            })),
        ),
        500 => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "boom"})),
        ),
        _ => (StatusCode::NOT_FOUND, Json(json!({"error": "Product not found"}))),
    }
}

async fn inventory(Path(id): Path<i64>) -> (StatusCode, Json<Value>) {
    if id == 1 {
        (StatusCode::OK, Json(json!({"product_id": 1, "quantity": 4.0})))
    } else {
        (StatusCode::NOT_FOUND, Json(json!({"error": "Inventory not found"})))
    }
}

async fn adjust(
    State(recorded): State<Recorded>,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    recorded.bodies.lock().unwrap().push(body.clone());
    let amount = body["amount"].as_f64().unwrap_or_default();
    if id == 1 && 4.0 + amount >= 0.0 {
        (
            StatusCode::OK,
            Json(json!({"product_id": 1, "quantity": 4.0 + amount})),
        )
    } else {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Adjustment would cause negative inventory"})),
        )
    }
}

async fn notifications(
    State(recorded): State<Recorded>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    recorded.bodies.lock().unwrap().push(body);
    (StatusCode::CREATED, Json(json!({"id": 1, "status": "pending"})))
}

fn client() -> reqwest::Client {
    http_client(Duration::from_secs(2)).unwrap()
}

#[tokio::test]
async fn product_lookup_maps_statuses() {
    let url = serve(Router::new().route("/products/{id}", get(product))).await;
    let lookup = HttpProductLookup::new(client(), url);

    let found = lookup.get_product(ProductId::new(1)).await.unwrap().unwrap();
    assert_eq!(found.price, 999.99);
    assert_eq!(found.sku, "LAP-001");

    assert!(lookup.get_product(ProductId::new(2)).await.unwrap().is_none());

    let err = lookup.get_product(ProductId::new(500)).await.unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::UnexpectedStatus {
            service: "product",
            status: 500
        }
    ));
}

#[tokio::test]
async fn inventory_check_and_adjust() {
    let recorded = Recorded::default();
    let app = Router::new()
        .route("/inventory/{id}", get(inventory))
        .route("/inventory/{id}/adjust", post(adjust))
        .with_state(recorded.clone());
    let client = HttpInventoryClient::new(client(), serve(app).await);

    assert!(client.check(ProductId::new(1), 4.0).await.unwrap());
    assert!(!client.check(ProductId::new(1), 4.5).await.unwrap());
    assert!(!client.check(ProductId::new(2), 1.0).await.unwrap());

    assert_eq!(client.adjust(ProductId::new(1), -3.0, false).await.unwrap(), 1.0);
    let err = client.adjust(ProductId::new(1), -5.0, false).await.unwrap_err();
    assert!(matches!(err, WorkflowError::UnexpectedStatus { status: 400, .. }));

    let bodies = recorded.bodies.lock().unwrap().clone();
    assert_eq!(bodies[0], json!({"amount": -3.0, "allow_negative": false}));
}

#[tokio::test]
async fn notifier_posts_type_and_data() {
    let recorded = Recorded::default();
    let app = Router::new()
        .route("/notifications", post(notifications))
        .with_state(recorded.clone());
    let notifier = HttpNotifier::new(client(), format!("{}/", serve(app).await));

    notifier
        .notify("order_status", json!({"order_id": 3, "status": "failed"}))
        .await
        .unwrap();

    let bodies = recorded.bodies.lock().unwrap().clone();
    assert_eq!(
        bodies,
        vec![json!({"type": "order_status", "data": {"order_id": 3, "status": "failed"}})]
    );
}

#[tokio::test]
async fn unreachable_service_is_unavailable() {
    // Bind then drop a listener to get a port nothing is serving.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let lookup = HttpProductLookup::new(client(), format!("http://{addr}"));
    let err = lookup.get_product(ProductId::new(1)).await.unwrap_err();
    assert!(matches!(err, WorkflowError::Unavailable { service: "product", .. }));
}
