//! # DID EBSI
//!
//! Two versions of `did:ebsi` are supported, distinguished by the first byte
//! of the multibase-decoded identifier:
//!
//! * v1 (legal entities): `0x01` followed by 16 random bytes. Documents are
//!   anchored in the EBSI DID registry and resolved from it.
//! * v2 (natural persons): `0x02` followed by the SHA-256 thumbprint of the
//!   subject's public JWK. Documents are never published; they are composed
//!   from the key on demand.

use multibase::Base;
use rand::RngCore;

use super::{DidUrl, Document, EbsiVersion, MethodType, PublicKeyFormat, VerificationMethod, DID_CONTEXT};
use crate::core::{Kind, OneMany};
use crate::error::{Err, OrKind};
use crate::key::jwk::Jwk;
use crate::key::{Key, KeyType};
use crate::provider::LedgerClient;
use crate::{tracerr, Result};

/// Context used by `did:ebsi` v2 documents.
pub const EBSI_V2_CONTEXT: &str = "https://w3id.org/did/v1";

/// The version encoded in a `did:ebsi` identifier.
///
/// # Errors
///
/// Returns [`Err::InvalidDidUrl`] if the identifier is not multibase or
/// names an unknown version.
pub fn version(url: &DidUrl) -> Result<EbsiVersion> {
    let (_, bytes) = multibase::decode(&url.identifier).or_kind(Err::InvalidDidUrl)?;
    match bytes.first() {
        Some(1) => Ok(EbsiVersion::V1),
        Some(2) => Ok(EbsiVersion::V2),
        other => tracerr!(Err::InvalidDidUrl, "did:ebsi must have version 1 or 2, found {other:?}"),
    }
}

/// A fresh random v1 identifier.
#[must_use]
pub fn v1_identifier() -> String {
    let mut bytes = [0_u8; 17];
    bytes[0] = 1;
    rand::thread_rng().fill_bytes(&mut bytes[1..]);
    multibase::encode(Base::Base58Btc, bytes)
}

/// The v2 identifier for a public key.
///
/// # Errors
///
/// Returns [`Err::InvalidKeyFormat`] if the JWK lacks a thumbprint member.
pub fn v2_identifier(jwk: &Jwk) -> Result<String> {
    let mut bytes = vec![2_u8];
    bytes.extend(jwk.thumbprint_bytes()?);
    Ok(multibase::encode(Base::Base58Btc, bytes))
}

/// Compose a new v1 document with a random identifier, embedding `key`.
///
/// # Errors
///
/// Returns an error if the key cannot be converted to a JWK.
pub fn create_v1(key: &Key) -> Result<Document> {
    let did = format!("did:ebsi:{}", v1_identifier());
    let kid = format!("{did}#{}", key.key_id);

    let mut jwk = key.to_jwk(KeyType::Public)?;
    jwk.kid = None;

    Ok(Document {
        context: Some(OneMany::Many(vec![Kind::String(DID_CONTEXT.to_string())])),
        id: did.clone(),
        verification_method: Some(vec![VerificationMethod {
            id: kid.clone(),
            type_: MethodType::for_jwk(key.algorithm),
            controller: did,
            key: PublicKeyFormat::PublicKeyJwk { public_key_jwk: jwk },
        }]),
        authentication: Some(vec![Kind::String(kid.clone())]),
        assertion_method: Some(vec![Kind::String(kid)]),
        ..Document::default()
    })
}

/// Compose the v2 document for `key`.
///
/// # Errors
///
/// Returns an error if the key cannot be converted to a JWK.
pub fn create_v2(key: &Key) -> Result<Document> {
    let mut jwk = key.to_jwk(KeyType::Public)?;
    jwk.kid = None;
    let url = DidUrl::parse(&format!("did:ebsi:{}", v2_identifier(&jwk)?))?;
    compose_v2(&url, &jwk)
}

/// Compose the v2 document for a DID from the subject's public key.
///
/// # Errors
///
/// Returns [`Err::ResolutionFailed`] if the key's thumbprint does not match
/// the identifier.
pub fn compose_v2(url: &DidUrl, jwk: &Jwk) -> Result<Document> {
    let jwk = Jwk { kid: None, ..jwk.public() };
    if v2_identifier(&jwk)? != url.identifier {
        tracerr!(Err::ResolutionFailed, "public key does not match DID identifier {}", url.did());
    }

    let did = url.did();
    let kid = format!("{did}#{}", jwk.thumbprint()?);

    Ok(Document {
        context: Some(OneMany::Many(vec![Kind::String(EBSI_V2_CONTEXT.to_string())])),
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

/// Anchor a v1 document in the registry.
///
/// Registration is attempted up to `attempts` times, with no delay between
/// attempts.
///
/// # Errors
///
/// Returns [`Err::RegistrationFailed`] once every attempt has failed.
pub async fn register(ledger: &impl LedgerClient, document: &Document, attempts: u32) -> Result<()> {
    for attempt in 1..=attempts {
        match ledger.register(document).await {
            Ok(()) => {
                tracing::debug!("registered {} on attempt {attempt}", document.id);
                return Ok(());
            }
            Err(e) => tracing::warn!("registering {} failed on attempt {attempt}: {e}", document.id),
        }
    }
    tracerr!(Err::RegistrationFailed, "could not register {} after {attempts} attempts", document.id)
}
