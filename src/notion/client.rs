// src/notion/client.rs

//! HTTP client for the hosted content API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, Method, RequestBuilder};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::NotionConfig;
use crate::notion::{ContentSource, DatabaseQuery, ListPage};

/// Error body returned by the API on non-2xx responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// [`ContentSource`] backed by the REST API.
#[derive(Clone)]
pub struct HttpNotionClient {
    client: Client,
    base_url: String,
}

impl HttpNotionClient {
    /// Build a client with auth and version headers baked in.
    pub fn new(config: &NotionConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::config("NOTION_API_KEY is not configured"))?;

        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|e| AppError::config(format!("invalid API key: {}", e)))?;
        headers.insert(AUTHORIZATION, bearer);
        let version = HeaderValue::from_str(&config.version)
            .map_err(|e| AppError::config(format!("invalid API version: {}", e)))?;
        headers.insert("Notion-Version", version);

        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/{}", self.base_url, path))
    }

    /// Send a request and decode the body, mapping API error objects.
    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        context: &str,
        request: RequestBuilder,
    ) -> Result<T> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error: ErrorBody = serde_json::from_str(&body).unwrap_or(ErrorBody {
                code: "unknown".to_string(),
                message: body,
            });
            log::warn!(
                "{} failed with {} ({}): {}",
                context,
                status.as_u16(),
                error.code,
                error.message
            );
            return Err(AppError::Notion {
                status: status.as_u16(),
                code: error.code,
                message: error.message,
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| AppError::malformed(context, e))
    }
}

#[async_trait]
impl ContentSource for HttpNotionClient {
    async fn retrieve_database(&self, database_id: &str) -> Result<Value> {
        let path = format!("databases/{}", database_id);
        self.send("databases.retrieve", self.request(Method::GET, &path))
            .await
    }

    async fn query_database(&self, database_id: &str, query: &DatabaseQuery) -> Result<ListPage> {
        let path = format!("databases/{}/query", database_id);
        log::debug!("Querying database {} (cursor {:?})", database_id, query.start_cursor);
        self.send(
            "databases.query",
            self.request(Method::POST, &path).json(query),
        )
        .await
    }

    async fn list_block_children(
        &self,
        block_id: &str,
        start_cursor: Option<&str>,
        page_size: u32,
    ) -> Result<ListPage> {
        let path = format!("blocks/{}/children", block_id);
        let mut request = self
            .request(Method::GET, &path)
            .query(&[("page_size", page_size.to_string())]);
        if let Some(cursor) = start_cursor {
            request = request.query(&[("start_cursor", cursor)]);
        }
        self.send("blocks.children.list", request).await
    }

    async fn retrieve_page(&self, page_id: &str) -> Result<Value> {
        let path = format!("pages/{}", page_id);
        self.send("pages.retrieve", self.request(Method::GET, &path))
            .await
    }

    async fn retrieve_block(&self, block_id: &str) -> Result<Value> {
        let path = format!("blocks/{}", block_id);
        self.send("blocks.retrieve", self.request(Method::GET, &path))
            .await
    }
}
