//! OpenSearch implementation of the search index provider.
//!
//! The same HTTP API is served by Elasticsearch, so this provider works
//! against either backend.

mod provider;

pub use provider::{OpenSearchConnector, OpenSearchProvider};
