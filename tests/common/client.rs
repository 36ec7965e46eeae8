//! HTTP client for end-to-end tests
//!
//! This module wraps reqwest and provides methods for all catalog-server
//! endpoints, so tests exercise the raw wire protocol.
//!
//! When API routes or request formats change, update only this file.

use super::constants::*;
use reqwest::Response;
use serde_json::Value;
use std::time::Duration;

/// HTTP test client
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    /// URL of `path` below `/catalog`; the root is `/catalog` itself.
    fn entry_url(&self, path: &str) -> String {
        format!("{}/catalog{}", self.base_url, path.trim_end_matches('/'))
    }

    fn resource_url(&self, path: &str, resource: &str) -> String {
        format!("{}/{}", self.entry_url(path), resource)
    }

    fn time_query(time: Option<&str>) -> Vec<(&'static str, String)> {
        time.map(|t| vec![("time", t.to_string())])
            .unwrap_or_default()
    }

    // ========================================================================
    // Status
    // ========================================================================

    /// GET /
    pub async fn status(&self) -> Response {
        self.client
            .get(format!("{}/", self.base_url))
            .send()
            .await
            .expect("Status request failed")
    }

    // ========================================================================
    // Catalog Entries
    // ========================================================================

    /// GET /catalog/{path}/metadata
    pub async fn get_metadata(&self, path: &str, time: Option<&str>) -> Response {
        self.client
            .get(self.resource_url(path, "metadata"))
            .query(&Self::time_query(time))
            .send()
            .await
            .expect("Get metadata request failed")
    }

    /// GET /catalog/{path}/children
    pub async fn get_children(&self, path: &str, time: Option<&str>) -> Response {
        self.client
            .get(self.resource_url(path, "children"))
            .query(&Self::time_query(time))
            .send()
            .await
            .expect("Get children request failed")
    }

    /// GET /catalog/{path}/history
    pub async fn get_history(&self, path: &str) -> Response {
        self.client
            .get(self.resource_url(path, "history"))
            .send()
            .await
            .expect("Get history request failed")
    }

    /// PATCH /catalog/{path}/metadata?type={doc_type}
    pub async fn patch_metadata(&self, path: &str, doc_type: &str, metadata: Value) -> Response {
        self.client
            .patch(self.resource_url(path, "metadata"))
            .query(&[("type", doc_type)])
            .json(&metadata)
            .send()
            .await
            .expect("Patch metadata request failed")
    }

    /// PUT /catalog/{path}/metadata?type={doc_type}
    pub async fn put_metadata(&self, path: &str, doc_type: &str, metadata: Value) -> Response {
        self.client
            .put(self.resource_url(path, "metadata"))
            .query(&[("type", doc_type)])
            .json(&metadata)
            .send()
            .await
            .expect("Put metadata request failed")
    }

    /// PUT /catalog/{path}/metadata with a raw body
    pub async fn put_raw_metadata(&self, path: &str, body: &'static str) -> Response {
        self.client
            .put(self.resource_url(path, "metadata"))
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
            .expect("Put metadata request failed")
    }

    /// DELETE /catalog/{path}?cascade={cascade}
    pub async fn delete(&self, path: &str, cascade: Option<bool>) -> Response {
        let mut request = self.client.delete(self.entry_url(path));
        if let Some(cascade) = cascade {
            request = request.query(&[("cascade", cascade)]);
        }
        request.send().await.expect("Delete request failed")
    }

    // ========================================================================
    // Search
    // ========================================================================

    /// GET /catalog?query={query}&time={time}
    pub async fn search(&self, query: &str, time: Option<&str>) -> Response {
        let mut params = vec![("query", query.to_string())];
        params.extend(Self::time_query(time));
        self.client
            .get(format!("{}/catalog", self.base_url))
            .query(&params)
            .send()
            .await
            .expect("Search request failed")
    }
}
