//! # JWT Credentials
//!
//! Credentials and presentations carried as compact JWTs. Members that have a
//! registered claim (id, issuer, subject and dates) are moved out of the
//! `vc`/`vp` claim into the JWT claims so they are not duplicated.

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::jws::{self, Header, Jws};
use super::ProofConfig;
use crate::credential::{from_iso, has_type, VP_TYPE};
use crate::error::Err;
use crate::key::jwk::Jwk;
use crate::key::{CryptoService, Key};
use crate::{tracerr, Result};

/// Members moved into registered claims.
const REGISTERED: [&str; 6] = ["id", "issuer", "issuanceDate", "issued", "validFrom", "expirationDate"];

/// JWT claims of a credential or presentation token.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Claims {
    /// Credential or presentation id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,

    /// Issuer (or holder) DID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// Subject DID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Issued at, seconds since the epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Not valid before, seconds since the epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,

    /// Expiry, seconds since the epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    /// Intended verifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,

    /// Verifier-supplied nonce.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    /// Stripped credential.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vc: Option<Value>,

    /// Stripped presentation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vp: Option<Value>,
}

/// Encode a credential or presentation as a signed JWT.
///
/// Registered claims are taken from `config`, falling back to the members of
/// the document. `jwk` is embedded in the header when given.
///
/// # Errors
///
/// Returns [`Err::MalformedCredential`] if the document is not a JSON object
/// or carries an invalid date, and [`Err::KeyNotFound`] if the key has no
/// private half.
pub fn sign(
    document: &Value, config: &ProofConfig, key: &Key, crypto: &CryptoService, jwk: Option<Jwk>,
) -> Result<String> {
    if !document.is_object() {
        tracerr!(Err::MalformedCredential, "only JSON objects can be signed");
    }
    let is_vp = has_type(document, VP_TYPE);
    let member = |name: &str| document.get(name).and_then(Value::as_str);

    let subject = if is_vp {
        member("holder").map(ToString::to_string)
    } else {
        document.pointer("/credentialSubject/id").and_then(Value::as_str).map(ToString::to_string)
    };

    let iat = match (config.issue_date, member("issuanceDate").or_else(|| member("issued"))) {
        (Some(date), _) => date.timestamp(),
        (None, Some(date)) => from_iso(date)?.timestamp(),
        (None, None) => Utc::now().timestamp(),
    };
    let nbf = match (config.valid_date, member("validFrom")) {
        (Some(date), _) => date.timestamp(),
        (None, Some(date)) => from_iso(date)?.timestamp(),
        (None, None) => iat,
    };
    let exp = match (config.expiration_date, member("expirationDate")) {
        (Some(date), _) => Some(date.timestamp()),
        (None, Some(date)) => Some(from_iso(date)?.timestamp()),
        (None, None) => None,
    };

    let stripped = strip(document.clone(), is_vp);
    let claims = Claims {
        jti: config.credential_id.clone().or_else(|| member("id").map(ToString::to_string)),
        iss: Some(config.issuer_did.clone()),
        sub: config.subject_did.clone().or(subject),
        iat: Some(iat),
        nbf: Some(nbf),
        exp,
        aud: config.verifier_did.clone(),
        nonce: config.nonce.clone(),
        vc: (!is_vp).then(|| stripped.clone()),
        vp: is_vp.then_some(stripped),
    };

    let header = Header {
        alg: key.algorithm.jws_algorithm().to_string(),
        typ: Some("JWT".to_string()),
        kid: Some(config.verification_method().to_string()),
        jwk,
        ..Header::default()
    };

    let signing_input = format!("{}.{}", jws::encode_segment(&header)?, jws::encode_segment(&claims)?);
    let signature = crypto.sign(key, signing_input.as_bytes())?;
    Ok(format!("{signing_input}.{}", Base64UrlUnpadded::encode_string(&signature)))
}

/// Verify a decoded token with `key`.
///
/// A signature that does not match, or a header algorithm that differs from
/// the key's, is reported as `false`.
///
/// # Errors
///
/// Returns [`Err::InvalidKeyFormat`] if the key material is invalid.
pub fn verify(jws: &Jws, key: &Key, crypto: &CryptoService) -> Result<bool> {
    if jws.header.alg != key.algorithm.jws_algorithm() {
        tracing::debug!("JWT algorithm {} does not match {} key", jws.header.alg, key.algorithm);
        return Ok(false);
    }
    let Some(signature) = jws::decode_signature(&jws.signature) else {
        return Ok(false);
    };
    crypto.verify(key, jws.signing_input.as_bytes(), &signature)
}

/// The signer of a token and the verification method it names: the `iss`
/// claim, and the header `kid` falling back to `iss`.
///
/// # Errors
///
/// Returns [`Err::MalformedCredential`] if the token has no `iss` claim.
pub fn signer(jws: &Jws) -> Result<(String, String)> {
    let Some(iss) = jws.payload.get("iss").and_then(Value::as_str) else {
        tracerr!(Err::MalformedCredential, "token has no iss claim")
    };
    let kid = jws.header.kid.as_deref().unwrap_or(iss);
    Ok((iss.to_string(), kid.to_string()))
}

// Remove members carried by registered claims. Issuer claims other than the
// id are kept.
fn strip(mut document: Value, is_vp: bool) -> Value {
    let Some(object) = document.as_object_mut() else {
        return document;
    };

    let issuer = object.get("issuer").and_then(Value::as_object).cloned();
    for name in REGISTERED {
        object.remove(name);
    }
    object.remove("proof");
    if let Some(mut issuer) = issuer {
        issuer.remove("id");
        if !issuer.is_empty() {
            object.insert("issuer".to_string(), Value::Object(issuer));
        }
    }

    if is_vp {
        object.remove("holder");
    } else if let Some(subject) = object.get_mut("credentialSubject").and_then(Value::as_object_mut) {
        subject.remove("id");
    }
    document
}
