//! # Credential Templates
//!
//! Named credential shells that issuers complete with subject claims before
//! signing. Three templates are built in; more can be registered at runtime.

use dashmap::DashMap;

use super::{VerifiableCredential, VC_TYPE};
use crate::core::Kind;
use crate::error::Err;
use crate::{tracerr, Result};

const BUILT_IN: [(&str, &str); 3] = [
    ("VerifiableAttestation", include_str!("templates/VerifiableAttestation.json")),
    (VC_TYPE, include_str!("templates/VerifiableCredential.json")),
    ("VerifiableId", include_str!("templates/VerifiableId.json")),
];

/// Registry of credential templates.
#[derive(Debug, Default)]
pub struct TemplateService {
    registered: DashMap<String, VerifiableCredential>,
}

impl TemplateService {
    /// A registry holding only the built-in templates.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template, replacing any template with the same name.
    ///
    /// Instance data is removed: the proof, the credential id, the issuer id
    /// and the subject id.
    pub fn register(&self, name: impl Into<String>, vc: &VerifiableCredential) {
        let mut template = vc.clone();
        template.proof = None;
        template.id = None;
        template.jwt = None;
        match &mut template.issuer {
            Some(Kind::Object(issuer)) => issuer.id.clear(),
            issuer => *issuer = None,
        }
        if let Some(subject) = &mut template.credential_subject {
            subject.id = None;
        }

        let name = name.into();
        tracing::debug!("registered template {name}");
        self.registered.insert(name, template);
    }

    /// A copy of the named template. Registered templates shadow built-in
    /// ones.
    ///
    /// # Errors
    ///
    /// Returns [`Err::TemplateNotFound`] if no template has the name.
    pub fn get(&self, name: &str) -> Result<VerifiableCredential> {
        if let Some(template) = self.registered.get(name) {
            return Ok(template.value().clone());
        }
        let Some((_, json)) = BUILT_IN.iter().find(|(builtin, _)| *builtin == name) else {
            tracerr!(Err::TemplateNotFound, "no template named {name}")
        };
        VerifiableCredential::from_json(json)
    }

    /// The default template, `VerifiableCredential`.
    ///
    /// # Errors
    ///
    /// Returns an error if the built-in template cannot be parsed.
    pub fn default_template(&self) -> Result<VerifiableCredential> {
        self.get(VC_TYPE)
    }

    /// Names of all available templates, sorted.
    #[must_use]
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = BUILT_IN.iter().map(|(name, _)| (*name).to_string()).collect();
        names.extend(self.registered.iter().map(|entry| entry.key().clone()));
        names.sort();
        names.dedup();
        names
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_json_snapshot as assert_snapshot;

    use super::*;
    use crate::credential::{CredentialBuilder, Proof};

    #[test]
    fn built_in() {
        let service = TemplateService::new();
        assert_eq!(service.list(), ["VerifiableAttestation", "VerifiableCredential", "VerifiableId"]);

        for name in service.list() {
            let template = service.get(&name).expect("should parse");
            assert!(template.type_.as_ref().is_some_and(|types| types.contains(&name)));
            assert!(template.proof.is_none());
        }
        assert_snapshot!("verifiable_id", service.get("VerifiableId").expect("should parse"));
    }

    #[test]
    fn register_strips_instance_data() {
        let mut vc = CredentialBuilder::new()
            .id("urn:uuid:1234")
            .add_type("ProofOfResidence")
            .issuer("did:example:issuer")
            .subject("did:example:subject")
            .claim("city", serde_json::json!("Lille"))
            .build();
        vc.proof = Some(Proof {
            type_: "Ed25519Signature2018".to_string(),
            ..Proof::default()
        });

        let service = TemplateService::new();
        service.register("ProofOfResidence", &vc);

        let template = service.get("ProofOfResidence").expect("should find");
        assert!(template.proof.is_none());
        assert!(template.id.is_none());
        assert!(template.issuer_id().is_none());
        assert!(template.subject_id().is_none());
        assert_eq!(
            template.credential_subject.expect("should have subject").claims["city"],
            "Lille"
        );
        assert_eq!(service.list().len(), 4);
    }

    #[test]
    fn unknown_template() {
        let err = TemplateService::new().get("Diploma").expect_err("should fail");
        assert!(err.is(Err::TemplateNotFound));
    }
}
