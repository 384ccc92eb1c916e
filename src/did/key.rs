//! # DID Key
//!
//! `did:key` documents are derived entirely from the public key carried in
//! the identifier, so creation and resolution compose the same document.
//!
//! The identifier is the multibase (base58-btc) encoding of a multicodec
//! prefix followed by the public key bytes. With the `jwk_jcs-pub` codec, the
//! key bytes are the canonical (JCS) JSON of the key's required JWK members.
//!
//! See <https://w3c-ccg.github.io/did-method-key>

use curve25519_dalek::edwards::CompressedEdwardsY;
use multibase::Base;

use super::document::split_multicodec;
use super::{
    DidUrl, Document, MethodType, PublicKeyFormat, VerificationMethod, DID_CONTEXT, ED25519_CODEC,
    JWK_JCS_PUB_CODEC, P256_CODEC, RSA_CODEC, SECP256K1_CODEC, X25519_CODEC,
};
use crate::core::{Kind, OneMany};
use crate::error::{Err, OrKind};
use crate::key::jwk::Jwk;
use crate::key::{Key, KeyAlgorithm, KeyType, NativeKeyPair};
use crate::{tracerr, Result};

const JWS_2020_CONTEXT: &str = "https://w3id.org/security/suites/jws-2020/v1";

/// Create a `did:key` document for the public half of `key`.
///
/// # Errors
///
/// Returns an error if the key's public material cannot be encoded.
pub fn create(key: &Key, jwk_jcs_pub: bool) -> Result<Document> {
    let identifier = identifier(key, jwk_jcs_pub)?;
    tracing::debug!("did:key identifier {identifier}");
    resolve(&DidUrl::parse(&format!("did:key:{identifier}"))?)
}

/// The method-specific identifier for a key.
///
/// # Errors
///
/// Returns an error if the key's public material cannot be encoded.
pub fn identifier(key: &Key, jwk_jcs_pub: bool) -> Result<String> {
    let mut bytes = if jwk_jcs_pub {
        JWK_JCS_PUB_CODEC.to_vec()
    } else {
        match key.algorithm {
            KeyAlgorithm::Ed25519 => ED25519_CODEC.to_vec(),
            KeyAlgorithm::Secp256k1 => SECP256K1_CODEC.to_vec(),
            KeyAlgorithm::Secp256r1 => P256_CODEC.to_vec(),
            KeyAlgorithm::Rsa => RSA_CODEC.to_vec(),
        }
    };

    if jwk_jcs_pub {
        let jwk = key.to_jwk(KeyType::Public)?;
        bytes.extend_from_slice(jwk.required_members()?.as_bytes());
    } else {
        bytes.extend_from_slice(&key.public_key_bytes()?);
    }

    Ok(multibase::encode(Base::Base58Btc, bytes))
}

/// Compose the document for a `did:key` DID or DID URL.
///
/// # Errors
///
/// Returns [`Err::InvalidDidUrl`] if the identifier is not multibase encoded
/// or [`Err::UnsupportedAlgorithm`] if its multicodec prefix is not known.
pub fn resolve(url: &DidUrl) -> Result<Document> {
    let (_, bytes) = multibase::decode(&url.identifier).or_kind(Err::InvalidDidUrl)?;

    if let Some(json) = bytes.strip_prefix(JWK_JCS_PUB_CODEC.as_slice()) {
        let jwk: Jwk = serde_json::from_slice(json)?;
        return Ok(jcs_document(url, jwk));
    }

    let (algorithm, public) = split_multicodec(&bytes)?;
    let native = NativeKeyPair::from_bytes(algorithm, public, None)?;

    match &native {
        NativeKeyPair::Ed25519 { verifying, .. } => ed25519_document(url, verifying.as_bytes()),
        NativeKeyPair::Rsa { .. } => Ok(jwk_document(
            url,
            MethodType::RsaVerificationKey2018,
            native.to_jwk(false)?,
        )),
        NativeKeyPair::Secp256k1 { .. } | NativeKeyPair::Secp256r1 { .. } => Ok(jwk_document(
            url,
            MethodType::for_jwk(algorithm),
            native.to_jwk(false)?,
        )),
    }
}

// Ed25519 keys publish both the signing key and a derived X25519 agreement
// key.
fn ed25519_document(url: &DidUrl, key_bytes: &[u8]) -> Result<Document> {
    let did = url.did();
    let kid = format!("{did}#{}", url.identifier);

    let edwards_y = CompressedEdwardsY::from_slice(key_bytes).or_kind(Err::InvalidKeyFormat)?;
    let Some(edwards_pt) = edwards_y.decompress() else {
        tracerr!(Err::InvalidKeyFormat, "Edwards Y cannot be decompressed to point")
    };
    let x25519_bytes = edwards_pt.to_montgomery().to_bytes();

    let mut multi_bytes = X25519_CODEC.to_vec();
    multi_bytes.extend_from_slice(&x25519_bytes);
    let agreement_id = format!("{did}#{}", multibase::encode(Base::Base58Btc, &multi_bytes));

    let signing_vm = VerificationMethod {
        id: kid.clone(),
        type_: MethodType::Ed25519VerificationKey2019,
        controller: did.clone(),
        key: PublicKeyFormat::PublicKeyBase58 {
            public_key_base58: Base::Base58Btc.encode(key_bytes),
        },
    };
    let agreement_vm = VerificationMethod {
        id: agreement_id.clone(),
        type_: MethodType::X25519KeyAgreementKey2019,
        controller: did.clone(),
        key: PublicKeyFormat::PublicKeyBase58 {
            public_key_base58: Base::Base58Btc.encode(x25519_bytes),
        },
    };

    Ok(Document {
        context: Some(OneMany::One(Kind::String(DID_CONTEXT.to_string()))),
        id: did,
        verification_method: Some(vec![signing_vm, agreement_vm]),
        authentication: Some(vec![Kind::String(kid.clone())]),
        assertion_method: Some(vec![Kind::String(kid.clone())]),
        capability_delegation: Some(vec![Kind::String(kid.clone())]),
        capability_invocation: Some(vec![Kind::String(kid)]),
        key_agreement: Some(vec![Kind::String(agreement_id)]),
        ..Document::default()
    })
}

fn jwk_document(url: &DidUrl, type_: MethodType, jwk: Jwk) -> Document {
    let did = url.did();
    let kid = format!("{did}#{}", url.identifier);

    Document {
        context: Some(OneMany::One(Kind::String(DID_CONTEXT.to_string()))),
        id: did.clone(),
        verification_method: Some(vec![VerificationMethod {
            id: kid.clone(),
            type_,
            controller: did,
            key: PublicKeyFormat::PublicKeyJwk { public_key_jwk: jwk },
        }]),
        authentication: Some(vec![Kind::String(kid.clone())]),
        assertion_method: Some(vec![Kind::String(kid.clone())]),
        capability_delegation: Some(vec![Kind::String(kid.clone())]),
        capability_invocation: Some(vec![Kind::String(kid)]),
        ..Document::default()
    }
}

fn jcs_document(url: &DidUrl, jwk: Jwk) -> Document {
    let mut doc = jwk_document(url, MethodType::JsonWebKey2020, jwk);
    doc.context = Some(OneMany::Many(vec![
        Kind::String(DID_CONTEXT.to_string()),
        Kind::String(JWS_2020_CONTEXT.to_string()),
    ]));
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::CryptoService;

    #[test]
    fn ed25519_document_shape() {
        let key = CryptoService::new().generate(KeyAlgorithm::Ed25519).expect("should generate");
        let doc = create(&key, false).expect("should create");

        assert!(doc.id.starts_with("did:key:z6Mk"));
        let vms = doc.verification_method.as_ref().expect("should have methods");
        assert_eq!(vms.len(), 2);
        assert_eq!(vms[0].id, format!("{}#{}", doc.id, &doc.id[8..]));
        assert_eq!(vms[0].type_, MethodType::Ed25519VerificationKey2019);
        assert_eq!(vms[1].type_, MethodType::X25519KeyAgreementKey2019);
        assert!(vms[1].id.contains("#z6LS"));

        let agreement = doc.key_agreement.as_ref().expect("should have key agreement");
        assert_eq!(agreement[0].as_str(), Some(vms[1].id.as_str()));
        assert_eq!(doc.authentication_methods()[0].id, vms[0].id);

        let public = vms[0].public_key().expect("should decode");
        assert_eq!(public.public_key_bytes().expect("should encode"), key.public_key_bytes().expect("should encode"));
    }

    #[test]
    fn resolution_is_deterministic() {
        let key = CryptoService::new().generate(KeyAlgorithm::Secp256k1).expect("should generate");
        let created = create(&key, false).expect("should create");
        let resolved = resolve(&DidUrl::parse(&created.id).expect("should parse")).expect("should resolve");
        assert_eq!(created, resolved);
        assert!(created.id.starts_with("did:key:zQ3s"));
        assert!(created.key_agreement.is_none());

        let vm = &created.verification_method.as_ref().expect("should have methods")[0];
        assert_eq!(vm.type_, MethodType::EcdsaSecp256k1VerificationKey2019);
        assert!(matches!(vm.key, PublicKeyFormat::PublicKeyJwk { .. }));
    }

    #[test]
    fn p256_prefix() {
        let key = CryptoService::new().generate(KeyAlgorithm::Secp256r1).expect("should generate");
        let doc = create(&key, false).expect("should create");
        assert!(doc.id.starts_with("did:key:zDn"));
    }

    #[test]
    fn jwk_jcs_pub() {
        let key = CryptoService::new().generate(KeyAlgorithm::Secp256r1).expect("should generate");
        let doc = create(&key, true).expect("should create");

        let url = DidUrl::parse(&doc.id).expect("should parse");
        let (_, bytes) = multibase::decode(&url.identifier).expect("should decode");
        assert_eq!(&bytes[..3], JWK_JCS_PUB_CODEC.as_slice());

        let json: serde_json::Value = serde_json::from_slice(&bytes[3..]).expect("should be json");
        let mut members: Vec<&String> = json.as_object().expect("should be object").keys().collect();
        members.sort();
        assert_eq!(members, ["crv", "kty", "x", "y"]);

        let vm = &doc.verification_method.as_ref().expect("should have methods")[0];
        assert_eq!(vm.type_, MethodType::JsonWebKey2020);
        assert!(doc.key_agreement.is_none());
        assert_eq!(doc.capability_invocation.as_ref().map(Vec::len), Some(1));
        assert!(matches!(&doc.context, Some(OneMany::Many(c)) if c.len() == 2));
    }

    #[test]
    fn rsa_document() {
        let key = CryptoService::new().generate(KeyAlgorithm::Rsa).expect("should generate");
        let created = create(&key, false).expect("should create");
        let resolved = resolve(&DidUrl::parse(&created.id).expect("should parse")).expect("should resolve");
        assert_eq!(created, resolved);

        let vm = &resolved.verification_method.as_ref().expect("should have methods")[0];
        assert_eq!(vm.type_, MethodType::RsaVerificationKey2018);
        assert!(matches!(&vm.key, PublicKeyFormat::PublicKeyJwk { public_key_jwk } if public_key_jwk.kty == "RSA"));
        assert_eq!(resolved.assertion_methods()[0].id, vm.id);

        let public = vm.public_key().expect("should decode");
        assert_eq!(public.public_key_bytes().expect("should encode"), key.public_key_bytes().expect("should encode"));
    }

    #[test]
    fn unknown_codec() {
        let identifier = multibase::encode(Base::Base58Btc, [0x99, 0x99, 1, 2, 3]);
        let url = DidUrl::parse(&format!("did:key:{identifier}")).expect("should parse");
        let err = resolve(&url).expect_err("should fail");
        assert!(err.is(Err::UnsupportedAlgorithm));
    }
}
