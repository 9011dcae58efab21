//! Stub catalog API served over HTTP for black-box tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch};
use axum::{Json, Router};

use roastah_client::api::{parse_tag_request, ProductList, TransitionRequest};
use roastah_client::{ApiError, InMemoryProductApi, ProductApi};
use roastah_core::SellerId;
use roastah_products::{ProductDetails, ProductDetailsPatch, ProductId, ProductRecord, RoastLevel};

pub const TOKEN: &str = "test-token";

#[derive(Clone)]
struct StubState {
    catalog: Arc<InMemoryProductApi>,
}

struct StubError(ApiError);

impl From<ApiError> for StubError {
    fn from(err: ApiError) -> Self {
        Self(err)
    }
}

impl IntoResponse for StubError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.0.to_body())).into_response()
    }
}

fn authorize(headers: &HeaderMap) -> Result<(), StubError> {
    let expected = format!("Bearer {TOKEN}");
    match headers.get("authorization").and_then(|v| v.to_str().ok()) {
        Some(value) if value == expected => Ok(()),
        _ => Err(StubError(ApiError::Unauthorized)),
    }
}

fn product_id(raw: &str) -> Result<ProductId, StubError> {
    raw.parse()
        .map_err(|_| StubError(ApiError::Validation(format!("invalid product id {raw}"))))
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn fetch_product(
    State(state): State<StubState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ProductRecord>, StubError> {
    authorize(&headers)?;
    Ok(Json(state.catalog.fetch_product(product_id(&id)?).await?))
}

async fn list_products(
    State(state): State<StubState>,
    headers: HeaderMap,
) -> Result<Json<ProductList>, StubError> {
    authorize(&headers)?;
    let items = state.catalog.list_products().await?;
    Ok(Json(ProductList { items }))
}

async fn transition_state(
    State(state): State<StubState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<TransitionRequest>,
) -> Result<Json<ProductRecord>, StubError> {
    authorize(&headers)?;
    let record = state
        .catalog
        .transition_state(product_id(&id)?, body.state)
        .await?;
    Ok(Json(record))
}

async fn set_tag(
    State(state): State<StubState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<ProductRecord>, StubError> {
    authorize(&headers)?;
    let (tag, value) = parse_tag_request(&body)?;
    Ok(Json(state.catalog.set_tag(product_id(&id)?, tag, value).await?))
}

async fn update_fields(
    State(state): State<StubState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(patch): Json<ProductDetailsPatch>,
) -> Result<Json<ProductRecord>, StubError> {
    authorize(&headers)?;
    Ok(Json(state.catalog.update_fields(product_id(&id)?, patch).await?))
}

async fn delete_product(
    State(state): State<StubState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, StubError> {
    authorize(&headers)?;
    state.catalog.delete_product(product_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn router(catalog: Arc<InMemoryProductApi>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/seller/products", get(list_products))
        .route(
            "/api/products/:id",
            get(fetch_product).patch(update_fields).delete(delete_product),
        )
        .route("/api/products/:id/state", patch(transition_state))
        .route("/api/products/:id/tags", patch(set_tag))
        .with_state(StubState { catalog })
}

pub struct TestServer {
    pub base_url: String,
    pub catalog: Arc<InMemoryProductApi>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub async fn spawn() -> Self {
        let catalog = Arc::new(InMemoryProductApi::new(SellerId::new()));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let app = router(catalog.clone());
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            catalog,
            handle,
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub fn details(name: &str) -> ProductDetails {
    ProductDetails {
        name: name.to_string(),
        description: "Washed, bright acidity".to_string(),
        price_cents: 2_250,
        weight_grams: 250,
        roast_level: RoastLevel::Light,
        origin: Some("Nyeri, Kenya".to_string()),
    }
}
