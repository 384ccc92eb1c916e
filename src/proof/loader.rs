//! # JSON-LD Document Loader
//!
//! Loads the contexts a Linked-Data document refers to. Well-known contexts
//! are bundled with the crate; others are fetched over HTTP when remote
//! loading is enabled. Fetched documents are cached for the life of the
//! process. The cache only saves fetches: a loader with remote loading
//! disabled never serves a document another loader fetched.

use std::sync::LazyLock;

use dashmap::DashMap;
use serde_json::Value;

use crate::error::{Err, OrKind};
use crate::provider::HttpClient;
use crate::{tracerr, Result};

const PRELOADED: [(&str, &str); 7] = [
    ("https://www.w3.org/2018/credentials/v1", include_str!("contexts/credentials_v1.json")),
    ("https://www.w3.org/2018/credentials/examples/v1", include_str!("contexts/examples_v1.json")),
    ("https://www.w3.org/ns/did/v1", include_str!("contexts/did_v1.json")),
    ("https://w3id.org/did/v1", include_str!("contexts/did_v1.json")),
    ("https://w3id.org/security/suites/jws-2020/v1", include_str!("contexts/jws_2020_v1.json")),
    ("https://w3id.org/security/suites/ed25519-2018/v1", include_str!("contexts/ed25519_2018_v1.json")),
    ("https://w3id.org/security/suites/secp256k1-2019/v1", include_str!("contexts/secp256k1_2019_v1.json")),
];

static CACHE: LazyLock<DashMap<String, Value>> = LazyLock::new(DashMap::new);

/// Loads JSON-LD context documents.
#[derive(Clone, Debug)]
pub struct DocumentLoader<H: HttpClient> {
    http: H,
    remote: bool,
}

impl<H: HttpClient> DocumentLoader<H> {
    /// Create a loader. When `remote` is false only bundled contexts can be
    /// loaded.
    #[must_use]
    pub const fn new(http: H, remote: bool) -> Self {
        Self { http, remote }
    }

    /// Load a context document.
    ///
    /// A failed remote load is retried once.
    ///
    /// # Errors
    ///
    /// Returns [`Err::ResolutionFailed`] if the document is not bundled and
    /// cannot be fetched.
    pub async fn load(&self, url: &str) -> Result<Value> {
        if let Some((_, json)) = PRELOADED.iter().find(|(preloaded, _)| *preloaded == url) {
            return serde_json::from_str(json).or_kind(Err::ResolutionFailed);
        }
        if !self.remote {
            tracerr!(Err::ResolutionFailed, "context {url} is not bundled and remote loading is disabled");
        }
        if let Some(document) = CACHE.get(url) {
            return Ok(document.value().clone());
        }

        let document = match self.http.get(url).await {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!("loading context {url} failed, retrying: {e}");
                self.http.get(url).await.or_kind(Err::ResolutionFailed)?
            }
        };
        CACHE.insert(url.to_string(), document.clone());
        Ok(document)
    }

    /// Load every context referenced by URL from a document's `@context`.
    /// Inline context definitions need no loading.
    ///
    /// # Errors
    ///
    /// Returns [`Err::ResolutionFailed`] if a context cannot be loaded.
    pub async fn load_contexts(&self, document: &Value) -> Result<()> {
        let urls: Vec<&str> = match document.get("@context") {
            Some(Value::String(url)) => vec![url.as_str()],
            Some(Value::Array(contexts)) => contexts.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        };
        for url in urls {
            self.load(url).await?;
        }
        Ok(())
    }
}
