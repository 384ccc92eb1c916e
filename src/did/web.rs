//! # DID Web
//!
//! `did:web` binds a DID to a domain: the document is hosted at a well-known
//! HTTPS location derived from the identifier.
//!
//! See <https://w3c-ccg.github.io/did-method-web>

use std::fmt::Write as _;

use url::Url;

use super::{DidUrl, Document, MethodType, PublicKeyFormat, VerificationMethod, DID_CONTEXT};
use crate::core::{Kind, OneMany};
use crate::error::{Err, OrKind};
use crate::key::{Key, KeyType};
use crate::provider::HttpClient;
use crate::{tracerr, Result};

/// Build the method-specific identifier for a domain and optional path.
///
/// The domain may carry a port. Path segments may be separated by `/` or
/// `:`.
///
/// # Errors
///
/// Returns [`Err::InvalidDidUrl`] if the domain and path do not form a valid
/// URL.
pub fn identifier(domain: &str, path: Option<&str>) -> Result<String> {
    let path = path.unwrap_or_default().replace(':', "/");
    let url = Url::parse(&format!("https://{domain}/{}", path.trim_start_matches('/')))?;
    let Some(host) = url.host_str() else {
        tracerr!(Err::InvalidDidUrl, "no host in domain: {domain}")
    };

    let mut identifier = host.to_string();
    if let Some(port) = url.port() {
        let _ = write!(identifier, "%3A{port}");
    }
    for segment in url.path_segments().into_iter().flatten().filter(|s| !s.is_empty()) {
        let _ = write!(identifier, ":{segment}");
    }
    Ok(identifier)
}

/// Create a `did:web` document embedding the public half of `key`.
///
/// # Errors
///
/// Returns an error if the identifier cannot be built or the key cannot be
/// converted to a JWK.
pub fn create(key: &Key, domain: &str, path: Option<&str>) -> Result<Document> {
    let did = format!("did:web:{}", identifier(domain, path)?);
    let kid = format!("{did}#{}", key.key_id);

    let mut jwk = key.to_jwk(KeyType::Public)?;
    jwk.kid = None;

    Ok(Document {
        context: Some(OneMany::One(Kind::String(DID_CONTEXT.to_string()))),
        id: did.clone(),
        verification_method: Some(vec![VerificationMethod {
            id: kid.clone(),
            type_: MethodType::JsonWebKey2020,
            controller: did,
            key: PublicKeyFormat::PublicKeyJwk { public_key_jwk: jwk },
        }]),
        authentication: Some(vec![Kind::String(kid.clone())]),
        assertion_method: Some(vec![Kind::String(kid)]),
        ..Document::default()
    })
}

/// The HTTPS location of the document for a `did:web` DID.
#[must_use]
pub fn to_web_http(url: &DidUrl) -> String {
    // segments after the domain form the path; a percent-encoded colon in the
    // domain is a port separator
    let domain = url.identifier.replace(':', "/").replace("%3A", ":");
    let mut http = format!("https://{domain}");
    if !url.identifier.contains(':') {
        http.push_str("/.well-known");
    }
    http.push_str("/did.json");
    http
}

/// Fetch the document for a `did:web` DID.
///
/// # Errors
///
/// Returns [`Err::ResolutionFailed`] if the document cannot be fetched or
/// parsed, or if its id does not match the DID.
pub async fn resolve(url: &DidUrl, http: &impl HttpClient) -> Result<Document> {
    let location = to_web_http(url);
    tracing::debug!("resolving {} at {location}", url.did());

    let value = http.get(&location).await.or_kind(Err::ResolutionFailed)?;
    let document: Document = serde_json::from_value(value).or_kind(Err::ResolutionFailed)?;
    if document.id != url.did() {
        tracerr!(Err::ResolutionFailed, "document id {} does not match {}", document.id, url.did());
    }
    Ok(document)
}
