//! # Credential Builders
//!
//! Builders for default credential and presentation shells. Shells start with
//! the base credentials context and type, and are completed by a template or
//! by the caller before signing.

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::model::{to_iso, Context, CredentialSchema, CredentialSubject};
use super::{VerifiableCredential, VerifiablePresentation, CREDENTIALS_CONTEXT, VC_TYPE, VP_TYPE};
use crate::core::{Kind, OneMany};

/// A builder for creating a Verifiable Credential.
pub struct CredentialBuilder {
    vc: VerifiableCredential,
}

impl Default for CredentialBuilder {
    fn default() -> Self {
        Self {
            vc: VerifiableCredential {
                context: Some(base_context()),
                type_: Some(OneMany::Many(vec![VC_TYPE.to_string()])),
                ..VerifiableCredential::default()
            },
        }
    }
}

impl CredentialBuilder {
    /// A builder for a default credential shell.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing credential, such as a template.
    #[must_use]
    pub const fn from_template(vc: VerifiableCredential) -> Self {
        Self { vc }
    }

    /// Add a context.
    ///
    /// Chain to add multiple contexts.
    #[must_use]
    pub fn context(mut self, context: Context) -> Self {
        let contexts = self.vc.context.get_or_insert_with(base_context);
        if !contexts.contains(&context) {
            contexts.add(context);
        }
        self
    }

    /// Add a type after `VerifiableCredential`.
    ///
    /// Chain to add multiple types.
    #[must_use]
    pub fn add_type(mut self, type_: impl Into<String>) -> Self {
        let type_ = type_.into();
        let types = self.vc.type_.get_or_insert_with(|| OneMany::Many(vec![VC_TYPE.to_string()]));
        if !types.contains(&type_) {
            types.add(type_);
        }
        self
    }

    /// Set the credential id.
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.vc.id = Some(id.into());
        self
    }

    /// Set the issuer DID. Issuer claims from a template are kept.
    #[must_use]
    pub fn issuer(mut self, did: impl Into<String>) -> Self {
        self.vc.set_issuer_id(did);
        self
    }

    /// Set the issuance date.
    #[must_use]
    pub fn issuance_date(mut self, date: &DateTime<Utc>) -> Self {
        self.vc.issuance_date = Some(to_iso(date));
        self
    }

    /// Set the date from which the credential is valid.
    #[must_use]
    pub fn valid_from(mut self, date: &DateTime<Utc>) -> Self {
        self.vc.valid_from = Some(to_iso(date));
        self
    }

    /// Set the expiration date.
    #[must_use]
    pub fn expiration_date(mut self, date: &DateTime<Utc>) -> Self {
        self.vc.expiration_date = Some(to_iso(date));
        self
    }

    /// Set the subject DID.
    #[must_use]
    pub fn subject(mut self, did: impl Into<String>) -> Self {
        self.vc.credential_subject.get_or_insert_with(CredentialSubject::default).id = Some(did.into());
        self
    }

    /// Add a claim about the subject.
    ///
    /// Chain to add multiple claims.
    #[must_use]
    pub fn claim(mut self, name: impl Into<String>, value: Value) -> Self {
        self.vc
            .credential_subject
            .get_or_insert_with(CredentialSubject::default)
            .claims
            .insert(name.into(), value);
        self
    }

    /// Set the credential schema.
    #[must_use]
    pub fn schema(mut self, id: impl Into<String>, type_: impl Into<String>) -> Self {
        self.vc.credential_schema = Some(CredentialSchema {
            id: id.into(),
            type_: type_.into(),
            ..CredentialSchema::default()
        });
        self
    }

    /// Add a top-level property outside the core data model.
    #[must_use]
    pub fn property(mut self, name: impl Into<String>, value: Value) -> Self {
        self.vc.extra.insert(name.into(), value);
        self
    }

    /// Build the credential, defaulting the issuance date to now.
    #[must_use]
    pub fn build(mut self) -> VerifiableCredential {
        if self.vc.issuance_date.is_none() && self.vc.issued.is_none() {
            self.vc.issuance_date = Some(to_iso(&Utc::now()));
        }
        self.vc
    }
}

/// A builder for creating a Verifiable Presentation.
pub struct PresentationBuilder {
    vp: VerifiablePresentation,
}

impl Default for PresentationBuilder {
    fn default() -> Self {
        Self {
            vp: VerifiablePresentation {
                context: Some(base_context()),
                type_: Some(OneMany::Many(vec![VP_TYPE.to_string()])),
                ..VerifiablePresentation::default()
            },
        }
    }
}

impl PresentationBuilder {
    /// A builder for a default presentation shell.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the presentation id.
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.vp.id = Some(id.into());
        self
    }

    /// Set the holder DID.
    #[must_use]
    pub fn holder(mut self, did: impl Into<String>) -> Self {
        self.vp.holder = Some(did.into());
        self
    }

    /// Add a credential. JWT-encoded credentials are presented as their
    /// token, others as LD objects.
    ///
    /// Chain to add multiple credentials.
    #[must_use]
    pub fn credential(mut self, vc: VerifiableCredential) -> Self {
        let item = match &vc.jwt {
            Some(token) => Kind::String(token.clone()),
            None => Kind::Object(vc),
        };
        self.vp.verifiable_credential.get_or_insert_with(Vec::new).push(item);
        self
    }

    /// Build the presentation.
    #[must_use]
    pub fn build(self) -> VerifiablePresentation {
        self.vp
    }
}

fn base_context() -> OneMany<Context> {
    OneMany::Many(vec![Kind::String(CREDENTIALS_CONTEXT.to_string())])
}
