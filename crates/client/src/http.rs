//! REST implementation of [`ProductApi`].

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use roastah_products::{ProductDetailsPatch, ProductId, ProductRecord, ProductState, ProductTag};

use crate::api::{tag_request, ApiError, ErrorBody, ProductApi, ProductList, TransitionRequest};
use crate::config::ClientConfig;

/// Talks to the marketplace API over HTTP with an optional bearer token.
#[derive(Debug, Clone)]
pub struct HttpProductApi {
    client: reqwest::Client,
    api_url: String,
    token: Option<String>,
}

impl HttpProductApi {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn with_token(api_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..Self::new(api_url)
        }
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.auth_token.clone(),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Check connectivity by hitting the health endpoint.
    pub async fn check_connectivity(&self) -> bool {
        let url = format!("{}/health", self.api_url);
        matches!(self.client.get(&url).send().await, Ok(resp) if resp.status().is_success())
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.api_url, path);
        let req = self.client.request(method, url);
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response, ApiError> {
        let resp = req.send().await.map_err(|e| ApiError::Network(e.to_string()))?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.json::<ErrorBody>().await.ok();
        let err = ApiError::from_status(status.as_u16(), body);
        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!("catalog API rejected the session token");
        } else {
            tracing::debug!(status = status.as_u16(), error = %err, "catalog API error");
        }
        Err(err)
    }

    async fn send_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ApiError> {
        let resp = self.send(req).await?;
        resp.json::<T>()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))
    }
}

#[async_trait]
impl ProductApi for HttpProductApi {
    async fn fetch_product(&self, id: ProductId) -> Result<ProductRecord, ApiError> {
        self.send_json(self.request(Method::GET, &format!("/api/products/{id}")))
            .await
    }

    async fn list_products(&self) -> Result<Vec<ProductRecord>, ApiError> {
        let list: ProductList = self
            .send_json(self.request(Method::GET, "/api/seller/products"))
            .await?;
        Ok(list.items)
    }

    async fn transition_state(
        &self,
        id: ProductId,
        to: ProductState,
    ) -> Result<ProductRecord, ApiError> {
        let req = self
            .request(Method::PATCH, &format!("/api/products/{id}/state"))
            .json(&TransitionRequest { state: to });
        self.send_json(req).await
    }

    async fn set_tag(
        &self,
        id: ProductId,
        tag: ProductTag,
        value: bool,
    ) -> Result<ProductRecord, ApiError> {
        let req = self
            .request(Method::PATCH, &format!("/api/products/{id}/tags"))
            .json(&tag_request(tag, value));
        self.send_json(req).await
    }

    async fn update_fields(
        &self,
        id: ProductId,
        patch: ProductDetailsPatch,
    ) -> Result<ProductRecord, ApiError> {
        let req = self
            .request(Method::PATCH, &format!("/api/products/{id}"))
            .json(&patch);
        self.send_json(req).await
    }

    async fn delete_product(&self, id: ProductId) -> Result<(), ApiError> {
        self.send(self.request(Method::DELETE, &format!("/api/products/{id}")))
            .await?;
        Ok(())
    }
}
