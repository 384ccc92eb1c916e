//! # Credential Proofs
//!
//! Signing and verification of credentials and presentations, either as
//! embedded Linked-Data proofs or as JWTs. [`CredentialService`] is the
//! entry point; the [`ld`] and [`jwt`] modules hold the encodings.
//!
//! Verification distinguishes "could not verify" from "not verified": a
//! resolution failure, an unsupported algorithm or malformed input is an
//! error, while a signature that does not match yields a
//! [`VerificationResult`] with `verified` set to `false`.

pub mod jws;
pub mod jwt;
pub mod ld;
mod loader;
mod service;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use self::loader::DocumentLoader;
pub use self::service::CredentialService;

/// Proof purpose used when none is configured.
pub const ASSERTION_METHOD: &str = "assertionMethod";

/// Proof purpose of presentations.
pub const AUTHENTICATION: &str = "authentication";

/// How a credential is secured.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProofType {
    /// Embedded Linked-Data proof.
    #[default]
    LdProof,

    /// Compact JWT.
    Jwt,
}

/// Parameters for signing a credential or presentation.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProofConfig {
    /// DID of the signer.
    pub issuer_did: String,

    /// DID of the subject (`sub` claim).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_did: Option<String>,

    /// DID of the intended verifier (`aud` claim).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verifier_did: Option<String>,

    /// Verification method to sign with. Defaults to the issuer DID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer_verification_method: Option<String>,

    /// Proof encoding.
    #[serde(default)]
    pub proof_type: ProofType,

    /// Proof purpose.
    #[serde(default = "default_purpose")]
    pub proof_purpose: String,

    /// Security domain for Linked-Data proofs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    /// Nonce, or the verifier's challenge for presentations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    /// Proof creator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,

    /// Credential id (`jti` claim).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_id: Option<String>,

    /// Issuance date (`iat` claim).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue_date: Option<DateTime<Utc>>,

    /// Start of validity (`nbf` claim).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_date: Option<DateTime<Utc>>,

    /// Expiry (`exp` claim).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<DateTime<Utc>>,
}

impl ProofConfig {
    /// A Linked-Data proof configuration for `issuer_did` with the
    /// `assertionMethod` purpose.
    #[must_use]
    pub fn new(issuer_did: impl Into<String>) -> Self {
        Self {
            issuer_did: issuer_did.into(),
            subject_did: None,
            verifier_did: None,
            issuer_verification_method: None,
            proof_type: ProofType::LdProof,
            proof_purpose: default_purpose(),
            domain: None,
            nonce: None,
            creator: None,
            credential_id: None,
            issue_date: None,
            valid_date: None,
            expiration_date: None,
        }
    }

    /// The verification method used to sign: the configured method, or the
    /// issuer DID.
    #[must_use]
    pub fn verification_method(&self) -> &str {
        self.issuer_verification_method.as_deref().unwrap_or(&self.issuer_did)
    }
}

fn default_purpose() -> String {
    ASSERTION_METHOD.to_string()
}

/// Parameters for creating a presentation.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PresentOptions {
    /// Holder DID. Defaults to the subject of the first credential.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub holder_did: Option<String>,

    /// Intended verifier (`aud` claim of JWT presentations).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verifier_did: Option<String>,

    /// Security domain of Linked-Data presentations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    /// Verifier-supplied challenge.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub challenge: Option<String>,

    /// Presentation expiry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<DateTime<Utc>>,

    /// Proof encoding.
    #[serde(default)]
    pub proof_type: ProofType,
}

/// What was verified.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationType {
    /// A credential.
    VerifiableCredential,

    /// A presentation.
    VerifiablePresentation,
}

/// Outcome of a verification that could be carried out.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    /// Whether the signature is valid.
    pub verified: bool,

    /// Whether a credential or a presentation was verified.
    pub verification_type: VerificationType,
}

impl VerificationResult {
    pub(crate) const fn new(verified: bool, is_presentation: bool) -> Self {
        let verification_type = if is_presentation {
            VerificationType::VerifiablePresentation
        } else {
            VerificationType::VerifiableCredential
        };
        Self {
            verified,
            verification_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_json() {
        let config: ProofConfig = serde_json::from_str(
            r#"{"issuerDid": "did:example:issuer", "proofType": "JWT", "issueDate": "2024-01-01T00:00:00Z"}"#,
        )
        .expect("should parse");

        assert_eq!(config.proof_type, ProofType::Jwt);
        assert_eq!(config.proof_purpose, ASSERTION_METHOD);
        assert_eq!(config.verification_method(), "did:example:issuer");
        assert_eq!(config.issue_date.map(|d| d.timestamp()), Some(1_704_067_200));
    }

    #[test]
    fn result_json() {
        let result = VerificationResult::new(true, true);
        assert_eq!(
            serde_json::to_value(result).expect("should serialize"),
            serde_json::json!({"verified": true, "verificationType": "VERIFIABLE_PRESENTATION"})
        );
    }
}
