//! # Linked-Data Proofs
//!
//! Proofs embedded in JSON-LD credentials and presentations, carried as a
//! detached JWS with an unencoded payload (RFC 7797).
//!
//! Both the proof options (the proof without `jws`) and the document without
//! its proof are canonicalized with the JSON Canonicalization Scheme
//! (RFC 8785) and hashed. The JWS payload is
//! `sha256(options) || sha256(document)`.
//!
//! JCS works on the JSON as written, so JSON-LD contexts do not enter the
//! signing input. They are only checked to be loadable before signing and
//! verifying.
//!
//! The suite names are those of the RDF Dataset Canonicalization (URDNA2015)
//! suites, but the input differs. Proofs made here verify only with this
//! crate, and proofs made by URDNA2015 implementations do not verify here.

use base64ct::{Base64UrlUnpadded, Encoding};
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::jws::{self, Header};
use crate::credential::Proof;
use crate::error::{Err, OrKind};
use crate::key::{CryptoService, Key, KeyAlgorithm};
use crate::{tracerr, Result};

/// Suite for Ed25519 keys.
pub const ED25519_SIGNATURE_2018: &str = "Ed25519Signature2018";

/// Suite for secp256k1 keys.
pub const ECDSA_SECP256K1_SIGNATURE_2019: &str = "EcdsaSecp256k1Signature2019";

/// The signature suite for keys of `algorithm`.
///
/// # Errors
///
/// Returns [`Err::UnsupportedSignatureAlgorithm`] if no suite exists for the
/// algorithm.
pub fn suite(algorithm: KeyAlgorithm) -> Result<&'static str> {
    match algorithm {
        KeyAlgorithm::Ed25519 => Ok(ED25519_SIGNATURE_2018),
        KeyAlgorithm::Secp256k1 => Ok(ECDSA_SECP256K1_SIGNATURE_2019),
        other => tracerr!(Err::UnsupportedSignatureAlgorithm, "no Linked-Data suite for {other} keys"),
    }
}

/// Sign `document`, embedding `proof` with its type and `jws` filled in.
/// Any existing proof is replaced.
///
/// # Errors
///
/// Returns [`Err::UnsupportedSignatureAlgorithm`] if the key has no suite,
/// [`Err::MalformedCredential`] if the document is not a JSON object, and
/// [`Err::KeyNotFound`] if the key has no private half.
pub fn sign(document: &mut Value, mut proof: Proof, key: &Key, crypto: &CryptoService) -> Result<()> {
    proof.type_ = suite(key.algorithm)?.to_string();
    proof.jws = None;

    let header = jws::encode_segment(&Header {
        alg: key.algorithm.jws_algorithm().to_string(),
        b64: Some(false),
        crit: Some(vec!["b64".to_string()]),
        ..Header::default()
    })?;
    let payload = signing_input(document, &proof)?;
    let signature = crypto.sign(key, &message(&header, &payload))?;
    proof.jws = Some(format!("{header}..{}", Base64UrlUnpadded::encode_string(&signature)));

    let Some(object) = document.as_object_mut() else {
        tracerr!(Err::MalformedCredential, "only JSON objects can be signed")
    };
    object.insert("proof".to_string(), serde_json::to_value(proof)?);
    Ok(())
}

/// Verify the proof embedded in `document` with `key`.
///
/// A signature that does not match, or was produced with a different JWS
/// algorithm, is reported as `false`.
///
/// # Errors
///
/// Returns [`Err::MalformedCredential`] if the document has no proof or the
/// proof is not a detached JWS, and [`Err::UnsupportedSignatureAlgorithm`]
/// if the proof suite does not match the key.
pub fn verify(document: &Value, key: &Key, crypto: &CryptoService) -> Result<bool> {
    let Some(proof) = document.get("proof") else {
        tracerr!(Err::MalformedCredential, "document has no proof")
    };
    let proof: Proof = serde_json::from_value(proof.clone()).or_kind(Err::MalformedCredential)?;

    let expected = suite(key.algorithm)?;
    if proof.type_ != expected {
        tracerr!(
            Err::UnsupportedSignatureAlgorithm,
            "{} proof cannot be verified with a {} key",
            proof.type_,
            key.algorithm
        );
    }
    let Some(jws) = &proof.jws else {
        tracerr!(Err::MalformedCredential, "proof has no jws")
    };
    let (header_segment, header, signature) = jws::split_detached(jws)?;
    if header.b64 != Some(false) {
        tracerr!(Err::MalformedCredential, "JWS payload must be unencoded");
    }

    if header.alg != key.algorithm.jws_algorithm() {
        tracing::debug!("JWS algorithm {} does not match {} key", header.alg, key.algorithm);
        return Ok(false);
    }
    let Some(signature) = jws::decode_signature(signature) else {
        return Ok(false);
    };

    let payload = signing_input(document, &proof)?;
    crypto.verify(key, &message(header_segment, &payload), &signature)
}

/// `sha256(JCS(proof options)) || sha256(JCS(document without proof))`.
///
/// # Errors
///
/// Returns an error if either part cannot be canonicalized.
pub fn signing_input(document: &Value, proof: &Proof) -> Result<Vec<u8>> {
    let mut unsigned = document.clone();
    if let Some(object) = unsigned.as_object_mut() {
        object.remove("proof");
    }
    let unsigned_data = serde_json_canonicalizer::to_string(&unsigned)?;
    let unsigned_hash = Sha256::digest(unsigned_data.as_bytes());

    let mut options = proof.clone();
    options.jws = None;
    let options_data = serde_json_canonicalizer::to_string(&options)?;
    let options_hash = Sha256::digest(options_data.as_bytes());

    Ok([options_hash.as_slice(), unsigned_hash.as_slice()].concat())
}

// ASCII(header) || '.' || payload
fn message(header: &str, payload: &[u8]) -> Vec<u8> {
    [header.as_bytes(), b".", payload].concat()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn credential() -> Value {
        json!({
            "@context": ["https://www.w3.org/2018/credentials/v1"],
            "type": ["VerifiableCredential"],
            "issuer": "did:example:issuer",
            "issuanceDate": "2024-01-01T00:00:00Z",
            "credentialSubject": {"id": "did:example:subject", "givenName": "Alice"}
        })
    }

    fn options() -> Proof {
        Proof {
            created: Some("2024-01-01T00:00:00Z".to_string()),
            proof_purpose: Some("assertionMethod".to_string()),
            verification_method: Some("did:example:issuer#key-1".to_string()),
            ..Proof::default()
        }
    }

    #[test]
    fn sign_verify() {
        let crypto = CryptoService::new();
        for algorithm in [KeyAlgorithm::Ed25519, KeyAlgorithm::Secp256k1] {
            let key = crypto.generate(algorithm).expect("should generate");
            let mut document = credential();
            sign(&mut document, options(), &key, &crypto).expect("should sign");

            assert_eq!(document["proof"]["type"], suite(algorithm).expect("should have suite"));
            assert!(document["proof"]["jws"].as_str().expect("should have jws").contains(".."));
            assert!(verify(&document, &key.to_public(), &crypto).expect("should verify"));

            // key order does not matter
            let reordered: Value =
                serde_json::from_str(&serde_json::to_string_pretty(&document).expect("should serialize"))
                    .expect("should parse");
            assert!(verify(&reordered, &key, &crypto).expect("should verify"));
        }
    }

    #[test]
    fn tampered() {
        let crypto = CryptoService::new();
        let key = crypto.generate(KeyAlgorithm::Ed25519).expect("should generate");
        let mut document = credential();
        sign(&mut document, options(), &key, &crypto).expect("should sign");

        let mut claims = document.clone();
        claims["credentialSubject"]["givenName"] = json!("Mallory");
        assert!(!verify(&claims, &key, &crypto).expect("should verify"));

        let mut options = document.clone();
        options["proof"]["proofPurpose"] = json!("authentication");
        assert!(!verify(&options, &key, &crypto).expect("should verify"));
    }

    #[test]
    fn unsupported_suites() {
        let crypto = CryptoService::new();
        let key = crypto.generate(KeyAlgorithm::Secp256r1).expect("should generate");
        let err = sign(&mut credential(), options(), &key, &crypto).expect_err("should fail");
        assert!(err.is(Err::UnsupportedSignatureAlgorithm));

        let ed25519 = crypto.generate(KeyAlgorithm::Ed25519).expect("should generate");
        let secp256k1 = crypto.generate(KeyAlgorithm::Secp256k1).expect("should generate");
        let mut document = credential();
        sign(&mut document, options(), &ed25519, &crypto).expect("should sign");
        let err = verify(&document, &secp256k1, &crypto).expect_err("should fail");
        assert!(err.is(Err::UnsupportedSignatureAlgorithm));
    }

    #[test]
    fn malformed_proofs() {
        let crypto = CryptoService::new();
        let key = crypto.generate(KeyAlgorithm::Ed25519).expect("should generate");

        let err = verify(&credential(), &key, &crypto).expect_err("should fail");
        assert!(err.is(Err::MalformedCredential));

        let mut document = credential();
        document["proof"] = json!({"type": ED25519_SIGNATURE_2018, "jws": "a.b.c"});
        let err = verify(&document, &key, &crypto).expect_err("should fail");
        assert!(err.is(Err::MalformedCredential));
    }
}
