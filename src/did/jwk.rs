//! # DID JWK
//!
//! A `did:jwk` identifier is the base64url encoding of the public JWK's JSON.
//! The document is reconstructed from the embedded key alone.
//!
//! See <https://github.com/quartzjer/did-jwk/blob/main/spec.md>

use base64ct::{Base64UrlUnpadded, Encoding};

use super::{DidUrl, Document, MethodType, PublicKeyFormat, VerificationMethod, DID_CONTEXT};
use crate::core::{Kind, OneMany};
use crate::error::{Err, OrKind};
use crate::key::jwk::Jwk;
use crate::key::{Key, KeyType};
use crate::Result;

const JWS_2020_CONTEXT: &str = "https://w3id.org/security/suites/jws-2020/v1";

/// Create a `did:jwk` document for the public half of `key`.
///
/// # Errors
///
/// Returns an error if the key cannot be converted to a JWK.
pub fn create(key: &Key) -> Result<Document> {
    let mut jwk = key.to_jwk(KeyType::Public)?;
    jwk.kid = None;
    let identifier = Base64UrlUnpadded::encode_string(serde_json::to_string(&jwk)?.as_bytes());
    resolve(&DidUrl::parse(&format!("did:jwk:{identifier}"))?)
}

/// Reconstruct the document for a `did:jwk` DID or DID URL.
///
/// # Errors
///
/// Returns [`Err::InvalidDidUrl`] if the identifier does not decode to a JWK.
pub fn resolve(url: &DidUrl) -> Result<Document> {
    let json = Base64UrlUnpadded::decode_vec(&url.identifier).or_kind(Err::InvalidDidUrl)?;
    let jwk: Jwk = serde_json::from_slice(&json).or_kind(Err::InvalidDidUrl)?;
    Ok(compose(url, jwk.public()))
}

fn compose(url: &DidUrl, jwk: Jwk) -> Document {
    let did = url.did();
    let kid = format!("{did}#0");
    let use_ = jwk.use_.clone();

    let reference = || Some(vec![Kind::String(kid.clone())]);
    let (signing, agreement) = match use_.as_deref() {
        Some("sig") => (reference(), None),
        Some("enc") => (None, reference()),
        _ => (reference(), reference()),
    };

    Document {
        context: Some(OneMany::Many(vec![
            Kind::String(DID_CONTEXT.to_string()),
            Kind::String(JWS_2020_CONTEXT.to_string()),
        ])),
        id: did.clone(),
        verification_method: Some(vec![VerificationMethod {
            id: kid.clone(),
            type_: MethodType::JsonWebKey2020,
            controller: did,
            key: PublicKeyFormat::PublicKeyJwk { public_key_jwk: jwk },
        }]),
        authentication: signing.clone(),
        assertion_method: signing.clone(),
        capability_delegation: signing.clone(),
        capability_invocation: signing,
        key_agreement: agreement,
        ..Document::default()
    }
}
