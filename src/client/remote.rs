//! HTTP client for a remote catalog server.

use anyhow::Context;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use crate::catalog::{
    CatalogError, CatalogPath, CatalogService, MetadataDocument, Payload, SearchHit,
};
use crate::store::VersionedRecord;

/// [`CatalogService`] implementation that talks to a catalog server.
///
/// Paths are normalized locally, so an invalid path fails before any request
/// is made. Every operation is a single synchronous request without retries.
pub struct RemoteCatalog {
    client: Client,
    base_url: String,
}

fn format_time(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn transport_error(err: reqwest::Error) -> CatalogError {
    CatalogError::Upstream {
        status: None,
        body: err.to_string(),
    }
}

fn upstream_error(response: Response) -> CatalogError {
    let status = response.status().as_u16();
    let body = response.text().unwrap_or_default();
    CatalogError::Upstream {
        status: Some(status),
        body,
    }
}

impl RemoteCatalog {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `base_url` - Base URL of the catalog server (e.g., "http://localhost:3001")
    /// * `timeout` - Per-request timeout
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        // Ensure base_url doesn't have trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of `path` below `/catalog`, with each segment percent-encoded.
    /// The root maps to `/catalog` itself.
    fn entry_url(&self, path: &CatalogPath, resource: Option<&str>) -> String {
        let mut url = format!("{}/catalog", self.base_url);
        for segment in path.segments() {
            url.push('/');
            url.push_str(&urlencoding::encode(segment));
        }
        if let Some(resource) = resource {
            url.push('/');
            url.push_str(resource);
        }
        url
    }

    /// Sends `request`. Returns `None` on 404 and an upstream error on any other
    /// non-success status.
    fn send(&self, request: RequestBuilder) -> Result<Option<Response>, CatalogError> {
        let response = request.send().map_err(transport_error)?;
        let status = response.status();
        debug!("{} {}", status, response.url());
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(upstream_error(response));
        }
        Ok(Some(response))
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<Option<T>, CatalogError> {
        match self.send(request)? {
            None => Ok(None),
            Some(response) => response.json().map(Some).map_err(transport_error),
        }
    }

    fn with_time(request: RequestBuilder, at: Option<DateTime<Utc>>) -> RequestBuilder {
        match at {
            Some(at) => request.query(&[("time", format_time(at))]),
            None => request,
        }
    }

    /// Every version written at `path`, or `None` if it was never written.
    pub fn history(&self, path: &str) -> Result<Option<Vec<VersionedRecord>>, CatalogError> {
        let path = CatalogPath::normalize(path)?;
        let request = self.client.get(self.entry_url(&path, Some("history")));
        self.get_json(request)
    }

    /// Server status as reported by `GET /`.
    pub fn status(&self) -> Result<serde_json::Value, CatalogError> {
        let request = self.client.get(format!("{}/", self.base_url));
        self.get_json(request)?.ok_or_else(|| CatalogError::Upstream {
            status: Some(StatusCode::NOT_FOUND.as_u16()),
            body: "status endpoint not found".to_string(),
        })
    }
}

impl CatalogService for RemoteCatalog {
    fn write(
        &self,
        path: &str,
        doc_type: &str,
        metadata: Payload,
        patch: bool,
    ) -> Result<(), CatalogError> {
        let path = CatalogPath::normalize(path)?;
        let url = self.entry_url(&path, Some("metadata"));
        let request = if patch {
            self.client.patch(url)
        } else {
            self.client.put(url)
        };
        let request = request.query(&[("type", doc_type)]).json(&metadata);
        match self.send(request)? {
            Some(_) => Ok(()),
            None => Err(CatalogError::Upstream {
                status: Some(StatusCode::NOT_FOUND.as_u16()),
                body: format!("write to {} was not routed", path),
            }),
        }
    }

    fn rm(&self, path: &str, cascade: bool) -> Result<(), CatalogError> {
        let path = CatalogPath::normalize(path)?;
        let request = self
            .client
            .delete(self.entry_url(&path, None))
            .query(&[("cascade", cascade)]);
        match self.send(request)? {
            Some(_) => Ok(()),
            None => Err(CatalogError::NotFound(path.to_string())),
        }
    }

    fn ls(
        &self,
        path: &str,
        at: Option<DateTime<Utc>>,
    ) -> Result<Option<Vec<String>>, CatalogError> {
        let path = CatalogPath::normalize(path)?;
        let request = self.client.get(self.entry_url(&path, Some("children")));
        self.get_json(Self::with_time(request, at))
    }

    fn read(
        &self,
        path: &str,
        at: Option<DateTime<Utc>>,
    ) -> Result<Option<MetadataDocument>, CatalogError> {
        let path = CatalogPath::normalize(path)?;
        let request = self.client.get(self.entry_url(&path, Some("metadata")));
        self.get_json(Self::with_time(request, at))
    }

    fn search(
        &self,
        query: &str,
        at: Option<DateTime<Utc>>,
    ) -> Result<Vec<SearchHit>, CatalogError> {
        let request = self
            .client
            .get(format!("{}/catalog", self.base_url))
            .query(&[("query", query)]);
        Ok(self
            .get_json(Self::with_time(request, at))?
            .unwrap_or_default())
    }
}
