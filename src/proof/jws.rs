//! # JSON Web Signature
//!
//! Compact and detached JWS encoding shared by JWT credentials and
//! Linked-Data proofs.

use std::sync::LazyLock;

use base64ct::{Base64UrlUnpadded, Encoding};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Err, OrKind};
use crate::key::jwk::Jwk;
use crate::{tracerr, Result};

static COMPACT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9\-_]*\.[A-Za-z0-9\-_]*\.[A-Za-z0-9\-_]*$").expect("should compile")
});

/// Whether `data` has the shape of a compact JWS.
#[must_use]
pub fn is_compact(data: &str) -> bool {
    COMPACT.is_match(data.trim())
}

/// Protected JWS header.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Header {
    /// Signature algorithm, such as `EdDSA` or `ES256K`.
    pub alg: String,

    /// Media type of the complete JWS.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,

    /// Verification method that produced the signature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// Embedded public key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwk: Option<Jwk>,

    /// `false` when the payload is not base64url-encoded (RFC 7797).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub b64: Option<bool>,

    /// Extensions that must be understood.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crit: Option<Vec<String>>,
}

/// A decoded compact JWS.
#[derive(Clone, Debug)]
pub struct Jws {
    /// Protected header.
    pub header: Header,

    /// Decoded payload.
    pub payload: Value,

    /// `<header>.<payload>` as signed.
    pub signing_input: String,

    /// Base64url signature, not yet decoded.
    pub signature: String,
}

impl Jws {
    /// Decode a compact JWS without checking its signature.
    ///
    /// # Errors
    ///
    /// Returns [`Err::MalformedCredential`] if the token does not have three
    /// parts or the header or payload cannot be decoded.
    pub fn parse(token: &str) -> Result<Self> {
        let parts: Vec<&str> = token.trim().split('.').collect();
        let [header, payload, signature] = parts.as_slice() else {
            tracerr!(Err::MalformedCredential, "compact JWS must have 3 parts, found {}", parts.len())
        };

        Ok(Self {
            header: decode_segment(header)?,
            payload: decode_segment(payload)?,
            signing_input: format!("{header}.{payload}"),
            signature: (*signature).to_string(),
        })
    }
}

/// Base64url-encode the JSON serialization of `value`.
///
/// # Errors
///
/// Returns an error if `value` cannot be serialized.
pub fn encode_segment<T: Serialize>(value: &T) -> Result<String> {
    Ok(Base64UrlUnpadded::encode_string(&serde_json::to_vec(value)?))
}

/// Decode a base64url JSON segment.
///
/// # Errors
///
/// Returns [`Err::MalformedCredential`] if the segment is not base64url JSON.
pub fn decode_segment<T: for<'de> Deserialize<'de>>(segment: &str) -> Result<T> {
    let bytes = Base64UrlUnpadded::decode_vec(segment).or_kind(Err::MalformedCredential)?;
    serde_json::from_slice(&bytes).or_kind(Err::MalformedCredential)
}

/// Decode a base64url signature, returning `None` if it is not valid
/// base64url.
#[must_use]
pub fn decode_signature(signature: &str) -> Option<Vec<u8>> {
    Base64UrlUnpadded::decode_vec(signature).ok()
}

/// Split a detached JWS (`<header>..<signature>`) into header segment,
/// decoded header and signature segment.
///
/// # Errors
///
/// Returns [`Err::MalformedCredential`] if the JWS is not detached or its
/// header cannot be decoded.
pub fn split_detached(jws: &str) -> Result<(&str, Header, &str)> {
    let Some((header, signature)) = jws.split_once("..") else {
        tracerr!(Err::MalformedCredential, "JWS is not detached")
    };
    if signature.contains('.') {
        tracerr!(Err::MalformedCredential, "JWS is not detached");
    }
    Ok((header, decode_segment(header)?, signature))
}
