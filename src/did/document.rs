//! # DID Document
//!
//! A DID Document is a JSON-LD document that contains information related to a
//! DID.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{DidMethod, ED25519_CODEC, P256_CODEC, RSA_CODEC, SECP256K1_CODEC};
use crate::core::{Kind, OneMany};
use crate::error::{Err, OrKind};
use crate::key::jwk::Jwk;
use crate::key::{pem, KeyAlgorithm, NativeKeyPair};
use crate::{tracerr, Result};

/// Default DID Core context.
pub const DID_CONTEXT: &str = "https://www.w3.org/ns/did/v1";

/// DID Document
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// The context of the DID document.
    #[serde(rename = "@context", alias = "context", skip_serializing_if = "Option::is_none")]
    pub context: Option<OneMany<Kind<Value>>>,

    /// The DID for a particular DID subject.
    ///
    /// The subject is defined as the entity identified by the DID and described
    /// by the DID document.
    pub id: String,

    /// A set of URIs that are other identifiers for the subject of the above
    /// DID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub also_known_as: Option<Vec<String>>,

    /// One or more DIDs permitted to make changes to the document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub controller: Option<OneMany<String>>,

    /// If set, MUST be a set of verification methods for the DID subject.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_method: Option<Vec<VerificationMethod>>,

    /// The `authentication` verification relationship is used to specify how
    /// the DID subject is expected to be authenticated, for purposes such
    /// as logging into a website or in any sort of challenge-response
    /// protocol.
    ///
    /// <https://www.w3.org/TR/did-core/#authentication>
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentication: Option<Vec<Kind<VerificationMethod>>>,

    /// The `assertion_method` verification relationship is used to specify how
    /// the DID subject is expected to express claims, such as for the
    /// purposes of issuing a Verifiable Credential.
    ///
    /// <https://www.w3.org/TR/did-core/#assertion>
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assertion_method: Option<Vec<Kind<VerificationMethod>>>,

    /// The `capability_delegation` verification relationship.
    ///
    /// <https://www.w3.org/TR/did-core/#capability-delegation>
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capability_delegation: Option<Vec<Kind<VerificationMethod>>>,

    /// The `capability_invocation` verification relationship.
    ///
    /// <https://www.w3.org/TR/did-core/#capability-invocation>
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capability_invocation: Option<Vec<Kind<VerificationMethod>>>,

    /// The `key_agreement` verification relationship is used to specify how an
    /// entity can generate encryption material in order to transmit
    /// confidential information intended for the DID subject.
    ///
    /// <https://www.w3.org/TR/did-core/#key-agreement>
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_agreement: Option<Vec<Kind<VerificationMethod>>>,

    /// A set of services, that express ways of communicating with the DID
    /// subject or related entities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<Vec<Service>>,
}

impl Document {
    /// Find a verification method by id, whether it is listed under
    /// `verificationMethod` or embedded in a relationship.
    ///
    /// A relative id (`#fragment`) matches on the fragment.
    #[must_use]
    pub fn verification_method(&self, id: &str) -> Option<&VerificationMethod> {
        let matches = |vm: &&VerificationMethod| {
            vm.id == id || (id.starts_with('#') && vm.id.ends_with(id))
        };
        self.methods().into_iter().find(|vm| matches(vm))
    }

    /// Every verification method in the document, including those embedded
    /// in relationships, without duplicates.
    #[must_use]
    pub fn methods(&self) -> Vec<&VerificationMethod> {
        let mut methods: Vec<&VerificationMethod> =
            self.verification_method.iter().flatten().collect();

        let relationships = [
            &self.authentication,
            &self.assertion_method,
            &self.capability_delegation,
            &self.capability_invocation,
            &self.key_agreement,
        ];
        for relationship in relationships.into_iter().flatten().flatten() {
            if let Kind::Object(vm) = relationship {
                if !methods.iter().any(|m| m.id == vm.id) {
                    methods.push(vm);
                }
            }
        }
        methods
    }

    /// Resolved `authentication` methods.
    #[must_use]
    pub fn authentication_methods(&self) -> Vec<VerificationMethod> {
        self.resolve_relationship(self.authentication.as_ref())
    }

    /// Resolved `assertionMethod` methods.
    #[must_use]
    pub fn assertion_methods(&self) -> Vec<VerificationMethod> {
        self.resolve_relationship(self.assertion_method.as_ref())
    }

    // References are looked up in the document. Unresolvable references are
    // skipped.
    fn resolve_relationship(
        &self, relationship: Option<&Vec<Kind<VerificationMethod>>>,
    ) -> Vec<VerificationMethod> {
        relationship
            .into_iter()
            .flatten()
            .filter_map(|entry| match entry {
                Kind::String(id) => self.verification_method(id).cloned(),
                Kind::Object(vm) => Some(vm.clone()),
            })
            .collect()
    }
}

/// Services are used to express ways of communicating with the DID subject or
/// associated entities.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    /// A URI unique to the service.
    pub id: String,

    /// The service type.
    #[serde(rename = "type")]
    pub type_: String,

    /// One or more endpoints for the service.
    #[allow(clippy::struct_field_names)]
    pub service_endpoint: OneMany<Kind<Value>>,
}

/// A DID document can express verification methods, such as cryptographic
/// public keys, which can be used to authenticate or authorize interactions
/// with the DID subject or associated parties.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VerificationMethod {
    /// A DID URL that identifies the verification method.
    pub id: String,

    /// The type of verification method.
    #[serde(rename = "type")]
    pub type_: MethodType,

    /// The DID of the controller of the verification method.
    pub controller: String,

    /// The format of the public key material.
    #[serde(flatten)]
    pub key: PublicKeyFormat,
}

impl VerificationMethod {
    /// Decode the method's public key.
    ///
    /// # Errors
    ///
    /// Returns [`Err::UnsupportedAlgorithm`] for key types that cannot sign
    /// (such as X25519 agreement keys) and [`Err::InvalidKeyFormat`] if the
    /// encoded key is malformed.
    pub fn public_key(&self) -> Result<NativeKeyPair> {
        match &self.key {
            PublicKeyFormat::PublicKeyJwk { public_key_jwk } => NativeKeyPair::from_jwk(public_key_jwk),
            PublicKeyFormat::PublicKeyPem { public_key_pem } => Ok(pem::decode(public_key_pem)?.to_public()),
            PublicKeyFormat::PublicKeyBase58 { public_key_base58 } => {
                let bytes = multibase::Base::Base58Btc
                    .decode(public_key_base58)
                    .or_kind(Err::InvalidKeyFormat)?;
                let Some(algorithm) = self.type_.algorithm() else {
                    tracerr!(Err::UnsupportedAlgorithm, "no signing algorithm for {}", self.type_)
                };
                NativeKeyPair::from_bytes(algorithm, &bytes, None)
            }
            PublicKeyFormat::PublicKeyMultibase {
                public_key_multibase,
            } => {
                let (_, bytes) = multibase::decode(public_key_multibase)?;
                let (algorithm, key) = split_multicodec(&bytes)?;
                NativeKeyPair::from_bytes(algorithm, key, None)
            }
        }
    }
}

// Strip a multicodec prefix, identifying the key algorithm.
pub(crate) fn split_multicodec(bytes: &[u8]) -> Result<(KeyAlgorithm, &[u8])> {
    let codecs = [
        (ED25519_CODEC.as_slice(), KeyAlgorithm::Ed25519),
        (SECP256K1_CODEC.as_slice(), KeyAlgorithm::Secp256k1),
        (P256_CODEC.as_slice(), KeyAlgorithm::Secp256r1),
        (RSA_CODEC.as_slice(), KeyAlgorithm::Rsa),
    ];
    for (codec, algorithm) in codecs {
        if let Some(key) = bytes.strip_prefix(codec) {
            return Ok((algorithm, key));
        }
    }
    tracerr!(Err::UnsupportedAlgorithm, "unsupported multicodec key prefix")
}

/// The format of the public key material.
#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
#[serde(rename_all_fields = "camelCase")]
#[serde(untagged)]
pub enum PublicKeyFormat {
    /// The key is encoded as base58-btc, without a multibase prefix.
    PublicKeyBase58 {
        /// The raw public key in base58.
        public_key_base58: String,
    },

    /// The key is encoded as a Multibase string.
    PublicKeyMultibase {
        /// The public key encoded as a Multibase.
        public_key_multibase: String,
    },

    /// The key is encoded as a JWK.
    PublicKeyJwk {
        /// The public key encoded as a JWK.
        public_key_jwk: Jwk,
    },

    /// The key is PEM encoded.
    PublicKeyPem {
        /// The PEM-encoded public key.
        public_key_pem: String,
    },
}

/// Verification method types. Unrecognized types are kept verbatim.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
#[serde(from = "String", into = "String")]
pub enum MethodType {
    /// `Ed25519` verification key, version 2018.
    Ed25519VerificationKey2018,

    /// `Ed25519` verification key, version 2019.
    Ed25519VerificationKey2019,

    /// `Ed25519` verification key, version 2020.
    Ed25519VerificationKey2020,

    /// `X25519` key agreement key, version 2019.
    X25519KeyAgreementKey2019,

    /// secp256k1 verification key, version 2019.
    EcdsaSecp256k1VerificationKey2019,

    /// secp256r1 verification key, version 2019.
    EcdsaSecp256r1VerificationKey2019,

    /// RSA verification key, version 2018.
    RsaVerificationKey2018,

    /// JSON Web Key (JWK), version 2020.
    #[default]
    JsonWebKey2020,

    /// Generic Multi-key format.
    Multikey,

    /// Any other type.
    Other(String),
}

impl MethodType {
    /// The signing algorithm implied by the type, for raw key encodings.
    #[must_use]
    pub const fn algorithm(&self) -> Option<KeyAlgorithm> {
        match self {
            Self::Ed25519VerificationKey2018
            | Self::Ed25519VerificationKey2019
            | Self::Ed25519VerificationKey2020 => Some(KeyAlgorithm::Ed25519),
            Self::EcdsaSecp256k1VerificationKey2019 => Some(KeyAlgorithm::Secp256k1),
            Self::EcdsaSecp256r1VerificationKey2019 => Some(KeyAlgorithm::Secp256r1),
            Self::RsaVerificationKey2018 => Some(KeyAlgorithm::Rsa),
            _ => None,
        }
    }

    /// The verification method type for a key algorithm, when the key is
    /// published as a JWK.
    #[must_use]
    pub const fn for_jwk(algorithm: KeyAlgorithm) -> Self {
        match algorithm {
            KeyAlgorithm::Ed25519 => Self::Ed25519VerificationKey2019,
            KeyAlgorithm::Secp256k1 => Self::EcdsaSecp256k1VerificationKey2019,
            KeyAlgorithm::Secp256r1 => Self::EcdsaSecp256r1VerificationKey2019,
            KeyAlgorithm::Rsa => Self::RsaVerificationKey2018,
        }
    }
}

impl Display for MethodType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ed25519VerificationKey2018 => "Ed25519VerificationKey2018",
            Self::Ed25519VerificationKey2019 => "Ed25519VerificationKey2019",
            Self::Ed25519VerificationKey2020 => "Ed25519VerificationKey2020",
            Self::X25519KeyAgreementKey2019 => "X25519KeyAgreementKey2019",
            Self::EcdsaSecp256k1VerificationKey2019 => "EcdsaSecp256k1VerificationKey2019",
            Self::EcdsaSecp256r1VerificationKey2019 => "EcdsaSecp256r1VerificationKey2019",
            Self::RsaVerificationKey2018 => "RsaVerificationKey2018",
            Self::JsonWebKey2020 => "JsonWebKey2020",
            Self::Multikey => "Multikey",
            Self::Other(other) => other,
        };
        f.write_str(name)
    }
}

impl From<String> for MethodType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Ed25519VerificationKey2018" => Self::Ed25519VerificationKey2018,
            "Ed25519VerificationKey2019" => Self::Ed25519VerificationKey2019,
            "Ed25519VerificationKey2020" => Self::Ed25519VerificationKey2020,
            "X25519KeyAgreementKey2019" => Self::X25519KeyAgreementKey2019,
            "EcdsaSecp256k1VerificationKey2019" => Self::EcdsaSecp256k1VerificationKey2019,
            "EcdsaSecp256r1VerificationKey2019" => Self::EcdsaSecp256r1VerificationKey2019,
            "RsaVerificationKey2018" => Self::RsaVerificationKey2018,
            "JsonWebKey2020" => Self::JsonWebKey2020,
            "Multikey" => Self::Multikey,
            _ => Self::Other(s),
        }
    }
}

impl From<MethodType> for String {
    fn from(method_type: MethodType) -> Self {
        method_type.to_string()
    }
}

/// A resolved DID Document, tagged with the method that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DidVariant {
    /// `did:key`
    Key(Document),

    /// `did:web`
    Web(Document),

    /// `did:ebsi`
    Ebsi(Document),

    /// `did:iota`
    Iota(Document),

    /// `did:cheqd`
    Cheqd(Document),

    /// `did:jwk`
    Jwk(Document),
}

impl DidVariant {
    /// Tag a document with its method.
    #[must_use]
    pub const fn new(method: DidMethod, document: Document) -> Self {
        match method {
            DidMethod::Key => Self::Key(document),
            DidMethod::Web => Self::Web(document),
            DidMethod::Ebsi => Self::Ebsi(document),
            DidMethod::Iota => Self::Iota(document),
            DidMethod::Cheqd => Self::Cheqd(document),
            DidMethod::Jwk => Self::Jwk(document),
        }
    }

    /// The method that produced the document.
    #[must_use]
    pub const fn method(&self) -> DidMethod {
        match self {
            Self::Key(_) => DidMethod::Key,
            Self::Web(_) => DidMethod::Web,
            Self::Ebsi(_) => DidMethod::Ebsi,
            Self::Iota(_) => DidMethod::Iota,
            Self::Cheqd(_) => DidMethod::Cheqd,
            Self::Jwk(_) => DidMethod::Jwk,
        }
    }

    /// The wrapped document.
    #[must_use]
    pub const fn document(&self) -> &Document {
        match self {
            Self::Key(doc)
            | Self::Web(doc)
            | Self::Ebsi(doc)
            | Self::Iota(doc)
            | Self::Cheqd(doc)
            | Self::Jwk(doc) => doc,
        }
    }

    /// Unwrap the document.
    #[must_use]
    pub fn into_document(self) -> Document {
        match self {
            Self::Key(doc)
            | Self::Web(doc)
            | Self::Ebsi(doc)
            | Self::Iota(doc)
            | Self::Cheqd(doc)
            | Self::Jwk(doc) => doc,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parse_relationships() {
        let doc: Document = serde_json::from_value(json!({
            "@context": "https://www.w3.org/ns/did/v1",
            "id": "did:example:123",
            "verificationMethod": [{
                "id": "did:example:123#key-1",
                "type": "Ed25519VerificationKey2018",
                "controller": "did:example:123",
                "publicKeyBase58": "H3C2AVvLMv6gmMNam3uVAjZpfkcJCwDwnZn6z3wXmqPV"
            }],
            "authentication": [
                "#key-1",
                {
                    "id": "did:example:123#key-2",
                    "type": "SomeFutureKey2030",
                    "controller": "did:example:123",
                    "publicKeyMultibase": "zabc"
                }
            ],
            "assertionMethod": ["did:example:123#missing"]
        }))
        .expect("should deserialize");

        let auth = doc.authentication_methods();
        assert_eq!(auth.len(), 2);
        assert_eq!(auth[0].id, "did:example:123#key-1");
        assert_eq!(auth[1].type_, MethodType::Other("SomeFutureKey2030".to_string()));
        assert!(doc.assertion_methods().is_empty());
        assert!(doc.verification_method("did:example:123#key-2").is_some());

        let json = serde_json::to_value(&doc).expect("should serialize");
        assert_eq!(json["authentication"][1]["type"], "SomeFutureKey2030");
    }

    #[test]
    fn base58_public_key() {
        let signing = ed25519_dalek::SigningKey::generate(&mut rand::rngs::OsRng);
        let encoded = multibase::Base::Base58Btc.encode(signing.verifying_key().as_bytes());

        let doc: Document = serde_json::from_value(json!({
            "id": "did:example:123",
            "verificationMethod": [{
                "id": "did:example:123#key-1",
                "type": "Ed25519VerificationKey2018",
                "controller": "did:example:123",
                "publicKeyBase58": encoded
            }]
        }))
        .expect("should deserialize");

        let vm = doc.verification_method("#key-1").expect("should find");
        let key = vm.public_key().expect("should decode");
        assert_eq!(key.algorithm(), KeyAlgorithm::Ed25519);
        assert_eq!(key.public_key_bytes().expect("should encode"), signing.verifying_key().to_bytes());
    }

    #[test]
    fn agreement_key_cannot_sign() {
        let vm = VerificationMethod {
            id: "did:example:123#x".to_string(),
            type_: MethodType::X25519KeyAgreementKey2019,
            controller: "did:example:123".to_string(),
            key: PublicKeyFormat::PublicKeyBase58 {
                public_key_base58: "JhNWeSVLMYccCk7iopQW4guaSJTojqpMEELgSLhKwRr".to_string(),
            },
        };
        let err = vm.public_key().expect_err("should fail");
        assert!(err.is(Err::UnsupportedAlgorithm));
    }
}
