//! HTTP API tests
//!
//! Drives the router end to end with the in-memory store and ledger.

use agroledger_backend::config::{
    DatabaseConfig, JwtConfig, LedgerConfig, LedgerMode, LogConfig, ServerConfig, StoreConfig,
};
use agroledger_backend::external::InMemoryLedger;
use agroledger_backend::middleware::Claims;
use agroledger_backend::store::InMemoryRecordStore;
use agroledger_backend::{create_app, AppState, Config};
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &str = "test-secret";

fn test_config() -> Config {
    Config {
        environment: "test".to_string(),
        server: ServerConfig {
            port: 0,
            host: "127.0.0.1".to_string(),
        },
        database: DatabaseConfig {
            url: String::new(),
            max_connections: 1,
            min_connections: 0,
        },
        jwt: JwtConfig {
            secret: SECRET.to_string(),
        },
        store: StoreConfig::default(),
        ledger: LedgerConfig {
            mode: LedgerMode::Memory,
            base_url: String::new(),
            api_key: String::new(),
            timeout_secs: 5,
            signer: "0xfarmer".to_string(),
        },
        log: LogConfig::default(),
    }
}

fn app() -> Router {
    create_app(AppState {
        store: Arc::new(InMemoryRecordStore::new()),
        ledger: Arc::new(InMemoryLedger::new("0xfarmer")),
        config: Arc::new(test_config()),
    })
}

fn token(owner_id: Uuid) -> String {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: owner_id.to_string(),
        role: "farmer".to_string(),
        exp: now + 3600,
        iat: now,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    bearer: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_health_is_public() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/api/v1/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["store"], "connected");
}

#[tokio::test]
async fn test_inventory_requires_token() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/api/v1/inventory", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let (status, body) = send(&app, Method::GET, "/api/v1/inventory", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "INVALID_TOKEN");
}

#[tokio::test]
async fn test_item_sale_and_publish_flow() {
    let app = app();
    let token = token(Uuid::new_v4());
    let auth = Some(token.as_str());

    let (status, item) = send(
        &app,
        Method::POST,
        "/api/v1/inventory",
        auth,
        Some(json!({
            "name": "Groundnuts",
            "category": "Legumes",
            "unit": "bags",
            "quantity": 100,
            "price_per_unit": 500
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(item["notarization_status"], "none");
    let item_id = item["id"].as_str().unwrap().to_string();

    let (status, sale) = send(
        &app,
        Method::POST,
        "/api/v1/sales",
        auth,
        Some(json!({
            "inventory_item_id": item_id,
            "buyers": [{ "name": "Ama", "quantity": 20, "amount_paid": 10000 }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(sale["product_name"], "Groundnuts");

    let (_, item) = send(&app, Method::GET, &format!("/api/v1/inventory/{}", item_id), auth, None).await;
    assert_eq!(item["quantity"], "80");

    let (status, item) = send(
        &app,
        Method::POST,
        &format!("/api/v1/inventory/{}/publish", item_id),
        auth,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(item["notarization_status"], "published");
    assert_eq!(item["sync"]["status"], "published");

    let (status, listings) = send(&app, Method::GET, "/api/v1/marketplace", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listings.as_array().unwrap().len(), 1);
    assert_eq!(listings[0]["id"], item_id.as_str());

    let (status, records) = send(&app, Method::GET, "/api/v1/ledger/records", auth, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(records[0]["matches_snapshot"], true);
}

#[tokio::test]
async fn test_oversell_is_unprocessable() {
    let app = app();
    let token = token(Uuid::new_v4());
    let auth = Some(token.as_str());

    let (_, item) = send(
        &app,
        Method::POST,
        "/api/v1/inventory",
        auth,
        Some(json!({
            "name": "Yams",
            "category": "Tubers",
            "unit": "tubers",
            "quantity": 5,
            "price_per_unit": 3
        })),
    )
    .await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/sales",
        auth,
        Some(json!({
            "inventory_item_id": item["id"],
            "buyers": [{ "name": "Kofi", "quantity": 6, "amount_paid": 18 }]
        })),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "INSUFFICIENT_STOCK");
    assert_eq!(
        body["error"]["message"],
        "Insufficient stock. Only 5 units available"
    );
}

#[tokio::test]
async fn test_publish_zero_price_is_bad_request() {
    let app = app();
    let token = token(Uuid::new_v4());
    let auth = Some(token.as_str());

    let (_, item) = send(
        &app,
        Method::POST,
        "/api/v1/inventory",
        auth,
        Some(json!({
            "name": "Sorghum",
            "category": "Grains",
            "unit": "bags",
            "quantity": 5,
            "price_per_unit": 0
        })),
    )
    .await;

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/v1/inventory/{}/publish", item["id"].as_str().unwrap()),
        auth,
        None,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["field"], "price_per_unit");
}

#[tokio::test]
async fn test_items_are_private_to_their_owner() {
    let app = app();
    let owner = token(Uuid::new_v4());
    let stranger = token(Uuid::new_v4());

    let (_, item) = send(
        &app,
        Method::POST,
        "/api/v1/inventory",
        Some(owner.as_str()),
        Some(json!({
            "name": "Honey",
            "category": "Apiary",
            "unit": "jars",
            "quantity": 12,
            "price_per_unit": 8
        })),
    )
    .await;

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/api/v1/inventory/{}", item["id"].as_str().unwrap()),
        Some(stranger.as_str()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
