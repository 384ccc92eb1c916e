//! # Credential Data Model
//!
//! See [Verifiable Credentials Data Model v1.1](https://www.w3.org/TR/vc-data-model).

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::VP_TYPE;
use crate::core::{Kind, OneMany};
use crate::error::{Err, OrKind};
use crate::proof::jws::{self, Jws};
use crate::proof::jwt::Claims;
use crate::{tracerr, Result};

/// A JSON-LD context: a URL or an inline context definition.
pub type Context = Kind<Map<String, Value>>;

/// A Verifiable Credential.
///
/// Members not modelled explicitly are kept in `extra` so that a credential
/// serializes back to the JSON it was parsed from.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VerifiableCredential {
    /// JSON-LD contexts, as a single value or an array.
    #[serde(rename = "@context", skip_serializing_if = "Option::is_none")]
    pub context: Option<OneMany<Context>>,

    /// Credential types, as a single value or an array.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<OneMany<String>>,

    /// Credential identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Issuer DID, or an object carrying the DID and issuer claims.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<Kind<Issuer>>,

    /// Issuance date (v1.1).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuance_date: Option<String>,

    /// Date the credential was issued, as used by EBSI credentials.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issued: Option<String>,

    /// Date from which the credential is valid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<String>,

    /// Expiration date.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<String>,

    /// Schema the subject claims conform to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_schema: Option<CredentialSchema>,

    /// Claims about the subject.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_subject: Option<CredentialSubject>,

    /// Embedded Linked-Data proof.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof: Option<Proof>,

    /// Any other members.
    #[serde(flatten)]
    pub extra: Map<String, Value>,

    /// The compact token the credential was decoded from, if JWT-encoded.
    #[serde(skip)]
    pub jwt: Option<String>,
}

impl VerifiableCredential {
    /// Parse a JSON-encoded credential.
    ///
    /// # Errors
    ///
    /// Returns [`Err::MalformedCredential`] if the JSON is not a credential.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).or_kind(Err::MalformedCredential)
    }

    /// Decode a JWT-encoded credential, restoring the members carried by
    /// registered claims. The signature is not checked.
    ///
    /// # Errors
    ///
    /// Returns [`Err::MalformedCredential`] if the token cannot be decoded or
    /// has no `vc` claim.
    pub fn from_jwt(token: &str) -> Result<Self> {
        let claims: Claims = serde_json::from_value(Jws::parse(token)?.payload)
            .or_kind(Err::MalformedCredential)?;
        let Some(vc) = &claims.vc else {
            tracerr!(Err::MalformedCredential, "token has no vc claim");
        };

        let mut credential: Self =
            serde_json::from_value(vc.clone()).or_kind(Err::MalformedCredential)?;
        credential.rehydrate(&claims);
        credential.jwt = Some(token.to_string());
        Ok(credential)
    }

    /// Parse a credential in either encoding.
    ///
    /// # Errors
    ///
    /// Returns [`Err::MalformedCredential`] if the data is neither a JSON
    /// credential nor a credential JWT.
    pub fn parse(data: &str) -> Result<Self> {
        if jws::is_compact(data) {
            Self::from_jwt(data)
        } else {
            Self::from_json(data)
        }
    }

    /// Serialize to JSON. The LD form is always produced, even for a
    /// JWT-encoded credential.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// The credential in the encoding it was received in: the token for a
    /// JWT-encoded credential, JSON otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode(&self) -> Result<String> {
        match &self.jwt {
            Some(token) => Ok(token.clone()),
            None => self.to_json(),
        }
    }

    /// The issuer DID.
    #[must_use]
    pub fn issuer_id(&self) -> Option<&str> {
        let id = match self.issuer.as_ref()? {
            Kind::String(id) => id,
            Kind::Object(issuer) => &issuer.id,
        };
        Some(id.as_str()).filter(|id| !id.is_empty())
    }

    /// The subject DID.
    #[must_use]
    pub fn subject_id(&self) -> Option<&str> {
        self.credential_subject.as_ref()?.id.as_deref()
    }

    /// Whether the type list names a presentation.
    #[must_use]
    pub fn is_presentation(&self) -> bool {
        self.type_.as_ref().is_some_and(|types| types.iter().any(|t| t == VP_TYPE))
    }

    /// Set the issuer DID, keeping any issuer claims.
    pub fn set_issuer_id(&mut self, did: impl Into<String>) {
        match &mut self.issuer {
            Some(Kind::Object(issuer)) => issuer.id = did.into(),
            issuer => *issuer = Some(Kind::String(did.into())),
        }
    }

    fn rehydrate(&mut self, claims: &Claims) {
        if self.id.is_none() {
            self.id.clone_from(&claims.jti);
        }
        if let Some(iss) = &claims.iss {
            if self.issuer_id().is_none() {
                self.set_issuer_id(iss);
            }
        }
        if let Some(sub) = &claims.sub {
            let subject = self.credential_subject.get_or_insert_with(CredentialSubject::default);
            if subject.id.is_none() {
                subject.id = Some(sub.clone());
            }
        }
        if self.issuance_date.is_none() && self.issued.is_none() {
            self.issuance_date = claims.iat.and_then(from_epoch);
        }
        if self.valid_from.is_none() && claims.nbf != claims.iat {
            self.valid_from = claims.nbf.and_then(from_epoch);
        }
        if self.expiration_date.is_none() {
            self.expiration_date = claims.exp.and_then(from_epoch);
        }
    }
}

/// A Verifiable Presentation.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VerifiablePresentation {
    /// JSON-LD contexts, as a single value or an array.
    #[serde(rename = "@context", skip_serializing_if = "Option::is_none")]
    pub context: Option<OneMany<Context>>,

    /// Presentation types.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<OneMany<String>>,

    /// Presentation identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// DID of the entity presenting the credentials.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub holder: Option<String>,

    /// Presented credentials: JWT strings or LD objects.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verifiable_credential: Option<Vec<Kind<VerifiableCredential>>>,

    /// Embedded Linked-Data proof.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof: Option<Proof>,

    /// Any other members.
    #[serde(flatten)]
    pub extra: Map<String, Value>,

    /// The compact token the presentation was decoded from, if JWT-encoded.
    #[serde(skip)]
    pub jwt: Option<String>,
}

impl VerifiablePresentation {
    /// Parse a JSON-encoded presentation.
    ///
    /// # Errors
    ///
    /// Returns [`Err::MalformedCredential`] if the JSON is not a
    /// presentation.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).or_kind(Err::MalformedCredential)
    }

    /// Decode a JWT-encoded presentation. The signature is not checked.
    ///
    /// # Errors
    ///
    /// Returns [`Err::MalformedCredential`] if the token cannot be decoded or
    /// has no `vp` claim.
    pub fn from_jwt(token: &str) -> Result<Self> {
        let claims: Claims = serde_json::from_value(Jws::parse(token)?.payload)
            .or_kind(Err::MalformedCredential)?;
        let Some(vp) = &claims.vp else {
            tracerr!(Err::MalformedCredential, "token has no vp claim");
        };

        let mut presentation: Self =
            serde_json::from_value(vp.clone()).or_kind(Err::MalformedCredential)?;
        if presentation.id.is_none() {
            presentation.id.clone_from(&claims.jti);
        }
        if presentation.holder.is_none() {
            presentation.holder.clone_from(&claims.iss);
        }
        presentation.jwt = Some(token.to_string());
        Ok(presentation)
    }

    /// Serialize to JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// The presentation in the encoding it was received in.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode(&self) -> Result<String> {
        match &self.jwt {
            Some(token) => Ok(token.clone()),
            None => self.to_json(),
        }
    }

    /// Decoded copies of the presented credentials.
    ///
    /// # Errors
    ///
    /// Returns [`Err::MalformedCredential`] if a JWT item cannot be decoded.
    pub fn credentials(&self) -> Result<Vec<VerifiableCredential>> {
        let Some(items) = &self.verifiable_credential else {
            return Ok(Vec::new());
        };
        items
            .iter()
            .map(|item| match item {
                Kind::String(token) => VerifiableCredential::from_jwt(token),
                Kind::Object(vc) => Ok(vc.clone()),
            })
            .collect()
    }
}

/// Either a credential or a presentation, told apart by the `type` list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnyCredential {
    /// A Verifiable Credential.
    Credential(VerifiableCredential),

    /// A Verifiable Presentation.
    Presentation(VerifiablePresentation),
}

impl AnyCredential {
    /// Parse a credential or presentation, JSON- or JWT-encoded.
    ///
    /// # Errors
    ///
    /// Returns [`Err::MalformedCredential`] if the data cannot be decoded.
    pub fn parse(data: &str) -> Result<Self> {
        if jws::is_compact(data) {
            let claims: Claims = serde_json::from_value(Jws::parse(data)?.payload)
                .or_kind(Err::MalformedCredential)?;
            let is_vp = claims.vp.as_ref().is_some_and(|vp| has_type(vp, VP_TYPE));
            if is_vp {
                return Ok(Self::Presentation(VerifiablePresentation::from_jwt(data)?));
            }
            return Ok(Self::Credential(VerifiableCredential::from_jwt(data)?));
        }

        let value: Value = serde_json::from_str(data).or_kind(Err::MalformedCredential)?;
        Self::from_value(value)
    }

    /// Interpret a JSON value as a credential or presentation.
    ///
    /// # Errors
    ///
    /// Returns [`Err::MalformedCredential`] if the value does not match the
    /// data model.
    pub fn from_value(value: Value) -> Result<Self> {
        if !value.is_object() {
            tracerr!(Err::MalformedCredential, "credential must be a JSON object");
        }
        if has_type(&value, VP_TYPE) {
            let vp = serde_json::from_value(value).or_kind(Err::MalformedCredential)?;
            return Ok(Self::Presentation(vp));
        }
        let vc = serde_json::from_value(value).or_kind(Err::MalformedCredential)?;
        Ok(Self::Credential(vc))
    }

    /// Whether this is a presentation.
    #[must_use]
    pub const fn is_presentation(&self) -> bool {
        matches!(self, Self::Presentation(_))
    }

    /// The DID that secures the document: the issuer of a credential or the
    /// holder of a presentation.
    #[must_use]
    pub fn signer_id(&self) -> Option<&str> {
        match self {
            Self::Credential(vc) => vc.issuer_id(),
            Self::Presentation(vp) => vp.holder.as_deref(),
        }
    }

    /// The embedded Linked-Data proof.
    #[must_use]
    pub const fn proof(&self) -> Option<&Proof> {
        match self {
            Self::Credential(vc) => vc.proof.as_ref(),
            Self::Presentation(vp) => vp.proof.as_ref(),
        }
    }
}

/// The issuer of a credential, when expressed as an object.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Issuer {
    /// Issuer DID.
    #[serde(default)]
    pub id: String,

    /// Issuer claims, such as a name.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Claims about the credential subject.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct CredentialSubject {
    /// Subject DID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Claims about the subject.
    #[serde(flatten)]
    pub claims: Map<String, Value>,
}

/// Reference to the schema credential subject claims must conform to.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct CredentialSchema {
    /// Schema location.
    pub id: String,

    /// Schema type, for example `FullJsonSchemaValidator2021`.
    #[serde(rename = "type")]
    pub type_: String,

    /// Any other members.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A Linked-Data proof built on a detached JWS.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Proof {
    /// Signature suite, such as `Ed25519Signature2018`.
    #[serde(rename = "type")]
    pub type_: String,

    /// DID or key that created the proof.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,

    /// Creation date-time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,

    /// Security domain the proof is bound to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    /// Purpose, such as `assertionMethod` or `authentication`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof_purpose: Option<String>,

    /// Verification method the proof can be checked with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_method: Option<String>,

    /// Detached compact JWS.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jws: Option<String>,

    /// Nonce or presentation challenge.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    /// Any other members.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Whether a JSON document's `type` (string or array) includes `type_`.
pub(crate) fn has_type(value: &Value, type_: &str) -> bool {
    match value.get("type") {
        Some(Value::String(t)) => t == type_,
        Some(Value::Array(types)) => types.iter().any(|t| t.as_str() == Some(type_)),
        _ => false,
    }
}

/// ISO-8601 UTC, seconds precision.
pub(crate) fn to_iso(datetime: &DateTime<Utc>) -> String {
    datetime.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse an RFC 3339 date-time into UTC.
pub(crate) fn from_iso(datetime: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(datetime)?.with_timezone(&Utc))
}

fn from_epoch(secs: i64) -> Option<String> {
    DateTime::from_timestamp(secs, 0).map(|dt| to_iso(&dt))
}
