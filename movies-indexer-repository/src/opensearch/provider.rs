//! OpenSearch provider implementation.
//!
//! This module provides the concrete implementation of `SearchIndexProvider`
//! using the OpenSearch Rust crate.

use async_trait::async_trait;
use movies_indexer_shared::Lookup;
use opensearch::{
    http::{
        request::JsonBody,
        transport::{SingleNodeConnectionPool, TransportBuilder},
        StatusCode,
    },
    indices::{IndicesCreateParts, IndicesExistsParts},
    BulkParts, GetParts, OpenSearch,
};
use serde_json::{json, Value};
use tracing::{debug, error, warn};
use url::Url;

use crate::config::OpenSearchConfig;
use crate::errors::SearchIndexError;
use crate::index_config::IndexDefinition;
use crate::interfaces::{SearchIndexConnector, SearchIndexProvider};
use crate::types::{BatchOperationResult, BatchOperationSummary, BulkDocument};

/// OpenSearch provider implementation.
///
/// Provides index management and bulk writes against an OpenSearch (or
/// API-compatible Elasticsearch) node.
///
/// # Example
///
/// ```ignore
/// use movies_indexer_repository::{OpenSearchConfig, OpenSearchProvider, IndexDefinition};
///
/// let config = OpenSearchConfig::from_parts("http", "localhost", 9200);
/// let provider = OpenSearchProvider::new(&config).await?;
/// provider.ensure_index_exists(&IndexDefinition::movies()).await?;
/// ```
pub struct OpenSearchProvider {
    client: OpenSearch,
}

impl OpenSearchProvider {
    /// Create a new OpenSearch provider for the configured URL.
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchProvider)` - A new provider instance
    /// * `Err(SearchIndexError)` - If the URL is invalid or the transport cannot be built
    pub async fn new(config: &OpenSearchConfig) -> Result<Self, SearchIndexError> {
        let parsed_url = Url::parse(&config.url)
            .map_err(|e| SearchIndexError::validation(format!("Invalid URL {}: {}", config.url, e)))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let transport = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let client = OpenSearch::new(transport);

        debug!(url = %config.url, "Created OpenSearch provider");

        Ok(Self { client })
    }

    /// Map a non-success HTTP status to an error.
    ///
    /// Throttling and gateway errors mean the cluster is temporarily unable to
    /// serve and are reported as `UnavailableError` so callers retry them.
    fn status_error(operation: &str, status: StatusCode, body: String) -> SearchIndexError {
        let message = format!("{} failed with status {}: {}", operation, status, body);
        match status.as_u16() {
            429 | 502 | 503 | 504 => SearchIndexError::unavailable(message),
            _ if operation == "create_index" => SearchIndexError::index_creation(message),
            _ => SearchIndexError::index(message),
        }
    }

    /// Build the NDJSON body of a bulk request: an `index` action line followed
    /// by the document source, for every document.
    fn bulk_body(documents: &[BulkDocument]) -> Vec<JsonBody<Value>> {
        let mut body: Vec<JsonBody<Value>> = Vec::with_capacity(documents.len() * 2);
        for doc in documents {
            body.push(json!({ "index": { "_id": doc.id } }).into());
            body.push(doc.source.clone().into());
        }
        body
    }
}

/// Turn a `_bulk` response into a per-document summary.
///
/// The response holds one item per action, in request order. An item failed
/// when it carries an `error` object or a non-2xx `status`.
pub(crate) fn parse_bulk_response(
    response: &Value,
    documents: &[BulkDocument],
) -> Result<BatchOperationSummary, SearchIndexError> {
    let items = response
        .get("items")
        .and_then(Value::as_array)
        .ok_or_else(|| SearchIndexError::parse("bulk response has no items array"))?;

    if items.len() != documents.len() {
        return Err(SearchIndexError::parse(format!(
            "bulk response has {} items for {} documents",
            items.len(),
            documents.len()
        )));
    }

    let results = items
        .iter()
        .zip(documents)
        .map(|(item, doc)| {
            // Each item is keyed by its action name, e.g. {"index": {...}}.
            let outcome = item.as_object().and_then(|o| o.values().next());
            let status = outcome
                .and_then(|o| o.get("status"))
                .and_then(Value::as_u64)
                .unwrap_or(0);
            let error = outcome.and_then(|o| o.get("error")).filter(|e| !e.is_null());

            let document_id = outcome
                .and_then(|o| o.get("_id"))
                .and_then(Value::as_str)
                .unwrap_or(doc.id.as_str())
                .to_string();

            if error.is_none() && (200..300).contains(&status) {
                BatchOperationResult {
                    document_id,
                    success: true,
                    error: None,
                }
            } else {
                let reason = error
                    .map(|e| {
                        e.get("reason")
                            .and_then(Value::as_str)
                            .map(str::to_string)
                            .unwrap_or_else(|| e.to_string())
                    })
                    .unwrap_or_else(|| format!("status {}", status));
                BatchOperationResult {
                    document_id,
                    success: false,
                    error: Some(SearchIndexError::bulk_index(reason)),
                }
            }
        })
        .collect();

    Ok(BatchOperationSummary::from_results(results))
}

#[async_trait]
impl SearchIndexProvider for OpenSearchProvider {
    async fn index_exists(&self, index: &str) -> Result<bool, SearchIndexError> {
        let response = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[index]))
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let status = response.status_code();
        match status.as_u16() {
            200 => Ok(true),
            404 => Ok(false),
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(Self::status_error("index_exists", status, body))
            }
        }
    }

    async fn create_index(&self, definition: &IndexDefinition) -> Result<(), SearchIndexError> {
        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(&definition.name))
            .body(definition.body.clone())
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let status = response.status_code();
        if status.is_success() {
            debug!(index = %definition.name, "Index created");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        // Another writer created it between our existence check and now.
        if status.as_u16() == 400 && body.contains("resource_already_exists_exception") {
            debug!(index = %definition.name, "Index already exists");
            return Ok(());
        }

        error!(index = %definition.name, status = %status, body = %body, "Create index request failed");
        Err(Self::status_error("create_index", status, body))
    }

    async fn bulk_upsert(
        &self,
        index: &str,
        documents: &[BulkDocument],
    ) -> Result<BatchOperationSummary, SearchIndexError> {
        if documents.is_empty() {
            return Ok(BatchOperationSummary::default());
        }

        let response = self
            .client
            .bulk(BulkParts::Index(index))
            .body(Self::bulk_body(documents))
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(index = %index, status = %status, body = %body, "Bulk request failed");
            return Err(Self::status_error("bulk", status, body));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;

        let summary = parse_bulk_response(&body, documents)?;
        if summary.failed > 0 {
            warn!(
                index = %index,
                succeeded = summary.succeeded,
                failed = summary.failed,
                "Bulk request completed with some failures"
            );
        } else {
            debug!(index = %index, count = summary.succeeded, "Bulk request succeeded");
        }
        Ok(summary)
    }

    async fn fetch_document(&self, index: &str, id: &str) -> Lookup<Value> {
        let response = match self.client.get(GetParts::IndexId(index, id)).send().await {
            Ok(response) => response,
            Err(e) => return Lookup::ConnectionFailed(e.to_string()),
        };

        let status = response.status_code();
        if status.as_u16() == 404 {
            return Lookup::NotFound;
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Lookup::ConnectionFailed(format!("status {}: {}", status, body));
        }

        match response.json::<Value>().await {
            Ok(mut body) => match body.get_mut("_source").map(Value::take) {
                Some(source) => Lookup::Found(source),
                None => Lookup::NotFound,
            },
            Err(e) => Lookup::ConnectionFailed(e.to_string()),
        }
    }
}

/// Opens a new [`OpenSearchProvider`] for every pass.
pub struct OpenSearchConnector {
    config: OpenSearchConfig,
}

impl OpenSearchConnector {
    pub fn new(config: OpenSearchConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SearchIndexConnector for OpenSearchConnector {
    async fn connect(&self) -> Result<Box<dyn SearchIndexProvider>, SearchIndexError> {
        let provider = OpenSearchProvider::new(&self.config).await?;
        Ok(Box::new(provider))
    }
}
