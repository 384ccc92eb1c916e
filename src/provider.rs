//! # Provider Traits
//!
//! Network-facing collaborators used by the DID service. Implementers supply
//! HTTP transport and ledger access; the crate ships a `reqwest`-backed
//! [`ReqwestClient`] and a [`RegistryClient`] that talks to the EBSI DID
//! registry and the cheqd resolver over HTTP.

use std::future::Future;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use serde_json::Value;

use crate::config::DidConfig;
use crate::did::{DidMethod, DidOptions, DidUrl, Document};
use crate::error::{Err, OrKind};
use crate::key::Key;
use crate::{tracerr, Result};

const DID_JSON: &str = "application/did+ld+json, application/did+json, application/json";

/// [`HttpClient`] fetches and posts JSON documents.
///
/// Async and fallible because implementers perform network I/O.
pub trait HttpClient: Send + Sync {
    /// GET a JSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the server responds with a
    /// non-success status, or the body is not JSON.
    fn get(&self, url: &str) -> impl Future<Output = Result<Value>> + Send;

    /// POST a JSON body, returning the JSON response (or `null` for an empty
    /// body).
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server responds with a
    /// non-success status.
    fn post_json(&self, url: &str, body: &Value) -> impl Future<Output = Result<Value>> + Send;
}

/// [`LedgerClient`] proxies DID methods whose documents live on a ledger.
pub trait LedgerClient: Send + Sync {
    /// Create a DID on the ledger for `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger rejects or cannot perform the creation.
    fn create(
        &self, method: DidMethod, key: &Key, options: &DidOptions,
    ) -> impl Future<Output = Result<Document>> + Send;

    /// Register (anchor) a locally composed document.
    ///
    /// # Errors
    ///
    /// Returns an error if the registration fails.
    fn register(&self, document: &Document) -> impl Future<Output = Result<()>> + Send;

    /// Fetch the current document for a DID.
    ///
    /// # Errors
    ///
    /// Returns an error if the DID cannot be resolved.
    fn resolve(&self, did: &str) -> impl Future<Output = Result<Document>> + Send;
}

/// [`HttpClient`] backed by `reqwest`.
#[derive(Clone, Debug)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Create a client that asks for DID JSON on every request.
    ///
    /// # Errors
    ///
    /// Returns [`Err::RequestError`] if the underlying client cannot be
    /// built.
    pub fn new() -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(DID_JSON));
        let client = reqwest::Client::builder().default_headers(headers).build()?;
        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    async fn get(&self, url: &str) -> Result<Value> {
        tracing::debug!("GET {url}");
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.json().await?)
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value> {
        tracing::debug!("POST {url}");
        let response = self.client.post(url).json(body).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Default [`LedgerClient`] speaking HTTP to public registries.
///
/// Only EBSI registration is supported; IOTA and cheqd creation need a
/// ledger-specific client.
#[derive(Clone, Debug)]
pub struct RegistryClient<H: HttpClient> {
    http: H,
    config: DidConfig,
}

impl<H: HttpClient> RegistryClient<H> {
    /// Create a registry client using the registry URLs in `config`.
    #[must_use]
    pub const fn new(http: H, config: DidConfig) -> Self {
        Self { http, config }
    }

    fn registry_url(&self) -> &str {
        self.config.ebsi_registry_url.trim_end_matches('/')
    }
}

impl<H: HttpClient> LedgerClient for RegistryClient<H> {
    async fn create(&self, method: DidMethod, _: &Key, _: &DidOptions) -> Result<Document> {
        tracerr!(Err::UnsupportedOperationKind, "the registry client cannot create did:{method}")
    }

    async fn register(&self, document: &Document) -> Result<()> {
        let url = DidUrl::parse(&document.id)?;
        if url.did_method()? != DidMethod::Ebsi {
            tracerr!(Err::UnsupportedOperationKind, "cannot register did:{}", url.method);
        }
        let body = serde_json::to_value(document)?;
        self.http
            .post_json(&format!("{}/identifiers", self.registry_url()), &body)
            .await
            .or_kind(Err::RegistrationFailed)?;
        Ok(())
    }

    async fn resolve(&self, did: &str) -> Result<Document> {
        let url = DidUrl::parse(did)?;
        let value = match url.did_method()? {
            DidMethod::Ebsi => {
                let endpoint = format!("{}/identifiers/{}", self.registry_url(), url.did());
                self.http.get(&endpoint).await.or_kind(Err::ResolutionFailed)?
            }
            DidMethod::Cheqd => {
                let base = self.config.cheqd_resolver_url.trim_end_matches('/');
                let mut value = self
                    .http
                    .get(&format!("{base}/{}", url.did()))
                    .await
                    .or_kind(Err::ResolutionFailed)?;
                match value.get_mut("didDocument") {
                    Some(document) => document.take(),
                    None => value,
                }
            }
            method => {
                tracerr!(Err::UnsupportedOperationKind, "the registry client cannot resolve did:{method}")
            }
        };
        serde_json::from_value(value).or_kind(Err::ResolutionFailed)
    }
}
