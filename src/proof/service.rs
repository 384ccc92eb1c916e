//! # Credential Service
//!
//! Signs, verifies and presents credentials using keys bound to DIDs.

use chrono::Utc;
use serde_json::Value;
use tracing::instrument;
use uuid::Uuid;

use super::jws::{self, Jws};
use super::{
    jwt, ld, DocumentLoader, PresentOptions, ProofConfig, ProofType, VerificationResult, ASSERTION_METHOD,
    AUTHENTICATION,
};
use crate::config::Config;
use crate::credential::{has_type, to_iso, AnyCredential, PresentationBuilder, Proof, VerifiableCredential, VP_TYPE};
use crate::did::{ebsi, DidMethod, DidService, DidUrl, EbsiVersion};
use crate::error::{Err, OrKind};
use crate::key::jwk::Jwk;
use crate::key::{Key, KeyId, KeyMaterial, KeyType};
use crate::provider::{HttpClient, LedgerClient, RegistryClient, ReqwestClient};
use crate::{tracerr, Result};

/// Credential signing and verification facade.
#[derive(Debug)]
pub struct CredentialService<H: HttpClient, L: LedgerClient> {
    dids: DidService<H, L>,
    loader: DocumentLoader<H>,
}

impl CredentialService<ReqwestClient, RegistryClient<ReqwestClient>> {
    /// Create a service from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the key store or HTTP client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        let dids = DidService::from_config(config)?;
        let loader = DocumentLoader::new(ReqwestClient::new()?, config.proof.remote_contexts);
        Ok(Self::new(dids, loader))
    }
}

impl<H: HttpClient, L: LedgerClient> CredentialService<H, L> {
    /// Create a service over a DID service and a context loader.
    #[must_use]
    pub const fn new(dids: DidService<H, L>, loader: DocumentLoader<H>) -> Self {
        Self { dids, loader }
    }

    /// The DID service keys are resolved through.
    #[must_use]
    pub const fn dids(&self) -> &DidService<H, L> {
        &self.dids
    }

    /// Sign a JSON credential or presentation, returning the signed JSON for
    /// Linked-Data proofs or the compact token for JWTs.
    ///
    /// # Errors
    ///
    /// Returns [`Err::MalformedCredential`] if the input is not JSON,
    /// [`Err::KeyNotFound`] if no private key is bound to the verification
    /// method, and [`Err::UnsupportedSignatureAlgorithm`] if a Linked-Data
    /// proof is requested for a key without a suite.
    #[instrument(level = "debug", skip(self, credential))]
    pub async fn sign(&self, credential: &str, config: &ProofConfig) -> Result<String> {
        let mut document: Value = serde_json::from_str(credential).or_kind(Err::MalformedCredential)?;
        let vm = config.verification_method();
        let key = self.dids.keys().load(vm, KeyType::Private)?;
        let crypto = self.dids.keys().crypto();

        match config.proof_type {
            ProofType::LdProof => {
                self.loader.load_contexts(&document).await?;
                let proof = Proof {
                    creator: config.creator.clone(),
                    created: Some(to_iso(&Utc::now())),
                    domain: config.domain.clone(),
                    nonce: config.nonce.clone(),
                    proof_purpose: Some(config.proof_purpose.clone()),
                    verification_method: Some(vm.to_string()),
                    ..Proof::default()
                };
                ld::sign(&mut document, proof, &key, crypto)?;
                tracing::debug!("signed Linked-Data proof with {vm}");
                Ok(serde_json::to_string(&document)?)
            }
            ProofType::Jwt => {
                let jwk = ebsi_v2_jwk(&config.issuer_did, &key)?;
                let token = jwt::sign(&document, config, &key, crypto, jwk)?;
                tracing::debug!("signed JWT with {vm}");
                Ok(token)
            }
        }
    }

    /// Verify a credential or presentation. Compact tokens are verified as
    /// JWTs, anything else as a Linked-Data proof.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is malformed, the signer's DID cannot be
    /// resolved, or the signer's key cannot be used for the proof.
    #[instrument(level = "debug", skip(self, vc_or_vp))]
    pub async fn verify(&self, vc_or_vp: &str) -> Result<VerificationResult> {
        let result = if jws::is_compact(vc_or_vp) {
            self.verify_jwt(vc_or_vp.trim()).await?
        } else {
            self.verify_ld(vc_or_vp).await?
        };
        tracing::info!("verified: {}", result.verified);
        Ok(result)
    }

    async fn verify_ld(&self, json: &str) -> Result<VerificationResult> {
        let document: Value = serde_json::from_str(json).or_kind(Err::MalformedCredential)?;
        let credential = AnyCredential::from_value(document.clone())?;
        let Some(signer) = credential.signer_id() else {
            tracerr!(Err::MalformedCredential, "document has no issuer or holder")
        };
        let Some(proof) = credential.proof() else {
            tracerr!(Err::MalformedCredential, "document has no proof")
        };

        self.loader.load_contexts(&document).await?;
        self.import_keys(signer).await?;

        let is_vp = credential.is_presentation();
        let purpose =
            if is_vp { AUTHENTICATION } else { proof.proof_purpose.as_deref().unwrap_or(ASSERTION_METHOD) };
        let vm = proof.verification_method.as_deref().unwrap_or(signer);
        let Some(key) = self.signer_key(signer, vm, purpose).await? else {
            return Ok(VerificationResult::new(false, is_vp));
        };
        let verified = ld::verify(&document, &key, self.dids.keys().crypto())?;
        Ok(VerificationResult::new(verified, is_vp))
    }

    async fn verify_jwt(&self, token: &str) -> Result<VerificationResult> {
        let jws = Jws::parse(token)?;
        let (iss, kid) = jwt::signer(&jws)?;
        let url = DidUrl::parse(&iss)?;

        match &jws.header.jwk {
            Some(jwk) if is_ebsi_v2(&url) => self.dids.import_ebsi_v2_key(&iss, jwk)?,
            _ => self.import_keys(&iss).await?,
        }

        let is_vp = jws.payload.get("vp").is_some_and(|vp| has_type(vp, VP_TYPE));
        let purpose = if is_vp { AUTHENTICATION } else { ASSERTION_METHOD };
        let Some(key) = self.signer_key(&iss, &kid, purpose).await? else {
            return Ok(VerificationResult::new(false, is_vp));
        };
        let verified = jwt::verify(&jws, &key, self.dids.keys().crypto())?;
        Ok(VerificationResult::new(verified, is_vp))
    }

    // The public key of verification method `vm`, provided `vm` belongs to
    // `signer` and is listed under the relationship matching `purpose`. A bare
    // DID selects the first usable method of the relationship.
    async fn signer_key(&self, signer: &str, vm: &str, purpose: &str) -> Result<Option<Key>> {
        let url = DidUrl::parse(vm)?;
        if url.did() != signer {
            tracing::warn!("{vm} is not a verification method of {signer}");
            return Ok(None);
        }

        let document = self.dids.resolve(signer).await?.into_document();
        let methods = match purpose {
            AUTHENTICATION => document.authentication_methods(),
            ASSERTION_METHOD => document.assertion_methods(),
            _ => tracerr!(Err::MalformedCredential, "unsupported proof purpose: {purpose}"),
        };
        let found = methods.into_iter().find(|method| match url.fragment {
            Some(_) => method.id == vm || (method.id.starts_with('#') && vm.ends_with(&method.id)),
            None => method.public_key().is_ok(),
        });
        let Some(method) = found else {
            tracing::warn!("{vm} is not an {purpose} method of {signer}");
            return Ok(None);
        };

        let native = method.public_key()?;
        Ok(Some(Key::new(KeyId::from(method.id), KeyMaterial::Native(native))))
    }

    async fn import_keys(&self, did: &str) -> Result<()> {
        if !self.dids.import_keys(did).await? {
            tracerr!(Err::ResolutionFailed, "{did} has no verification keys");
        }
        Ok(())
    }

    /// Wrap credentials in a presentation signed by the holder's first
    /// authentication method.
    ///
    /// # Errors
    ///
    /// Returns [`Err::MalformedCredential`] if a credential cannot be parsed
    /// or no holder can be determined, and [`Err::KeyNotFound`] if the holder
    /// has no authentication method.
    #[instrument(level = "debug", skip(self, credentials))]
    pub async fn present(&self, credentials: &[String], options: &PresentOptions) -> Result<String> {
        let credentials =
            credentials.iter().map(|vc| VerifiableCredential::parse(vc)).collect::<Result<Vec<_>>>()?;

        let holder = match &options.holder_did {
            Some(holder) => holder.clone(),
            None => match credentials.first().and_then(VerifiableCredential::subject_id) {
                Some(subject) => subject.to_string(),
                None => tracerr!(Err::MalformedCredential, "no holder given and no credential subject"),
            },
        };
        let Some(vm) = self.dids.authentication_methods(&holder).await?.into_iter().next() else {
            tracerr!(Err::KeyNotFound, "{holder} has no authentication method")
        };

        let id = format!("urn:uuid:{}", Uuid::new_v4());
        let vp = credentials
            .into_iter()
            .fold(PresentationBuilder::new().id(&id).holder(&holder), PresentationBuilder::credential)
            .build();

        let config = ProofConfig {
            subject_did: Some(holder.clone()),
            verifier_did: options.verifier_did.clone(),
            issuer_verification_method: Some(vm.id),
            proof_type: options.proof_type,
            proof_purpose: AUTHENTICATION.to_string(),
            domain: options.domain.clone(),
            nonce: options.challenge.clone(),
            credential_id: Some(id),
            expiration_date: options.expiration_date,
            ..ProofConfig::new(holder)
        };
        self.sign(&vp.to_json()?, &config).await
    }
}

fn is_ebsi_v2(url: &DidUrl) -> bool {
    matches!(url.did_method(), Ok(DidMethod::Ebsi)) && matches!(ebsi::version(url), Ok(EbsiVersion::V2))
}

// did:ebsi v2 subjects cannot be resolved without their key, so tokens carry
// it in the header.
fn ebsi_v2_jwk(issuer: &str, key: &Key) -> Result<Option<Jwk>> {
    let Ok(url) = DidUrl::parse(issuer) else {
        return Ok(None);
    };
    if !is_ebsi_v2(&url) {
        return Ok(None);
    }
    let mut jwk = key.to_jwk(KeyType::Public)?;
    jwk.kid = None;
    Ok(Some(jwk))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::config::DidConfig;
    use crate::credential::{CredentialBuilder, TemplateService};
    use crate::did::{DidOptions, Document};
    use crate::key::{KeyAlgorithm, KeyService};
    use crate::proof::VerificationType;

    #[derive(Clone)]
    struct Offline;

    impl HttpClient for Offline {
        async fn get(&self, url: &str) -> Result<Value> {
            tracerr!(Err::RequestError, "offline: {url}")
        }

        async fn post_json(&self, url: &str, _: &Value) -> Result<Value> {
            tracerr!(Err::RequestError, "offline: {url}")
        }
    }

    struct NoLedger;

    impl LedgerClient for NoLedger {
        async fn create(&self, _: DidMethod, _: &Key, _: &DidOptions) -> Result<Document> {
            tracerr!(Err::UnsupportedOperationKind)
        }

        async fn register(&self, _: &Document) -> Result<()> {
            tracerr!(Err::UnsupportedOperationKind)
        }

        async fn resolve(&self, _: &str) -> Result<Document> {
            tracerr!(Err::ResolutionFailed)
        }
    }

    fn offline_service() -> CredentialService<Offline, NoLedger> {
        let dids = DidService::new(KeyService::in_memory(), Offline, NoLedger, DidConfig::default());
        CredentialService::new(dids, DocumentLoader::new(Offline, false))
    }

    async fn credential(service: &CredentialService<Offline, NoLedger>, issuer: &str) -> String {
        let subject = service.dids().create(DidMethod::Key, None, None).await.expect("should create");
        let template = TemplateService::new().default_template().expect("should load");
        CredentialBuilder::from_template(template)
            .id("urn:uuid:1234")
            .issuer(issuer)
            .subject(subject)
            .claim("givenName", json!("Alice"))
            .build()
            .to_json()
            .expect("should serialize")
    }

    #[tokio::test]
    async fn ld_round_trip() {
        let service = offline_service();
        let issuer = service.dids().create(DidMethod::Key, None, None).await.expect("should create");
        let vc = credential(&service, &issuer).await;

        let signed = service.sign(&vc, &ProofConfig::new(&issuer)).await.expect("should sign");
        let result = service.verify(&signed).await.expect("should verify");
        assert!(result.verified);
        assert_eq!(result.verification_type, VerificationType::VerifiableCredential);

        // a verifier with its own key store resolves the issuer's did:key
        assert!(offline_service().verify(&signed).await.expect("should verify").verified);
    }

    #[tokio::test]
    async fn jwt_round_trip() {
        let service = offline_service();
        let issuer = service.dids().create(DidMethod::Jwk, None, None).await.expect("should create");
        let vc = credential(&service, &issuer).await;

        let config = ProofConfig {
            proof_type: ProofType::Jwt,
            ..ProofConfig::new(&issuer)
        };
        let token = service.sign(&vc, &config).await.expect("should sign");
        assert!(jws::is_compact(&token));
        assert!(offline_service().verify(&token).await.expect("should verify").verified);

        let decoded = VerifiableCredential::parse(&token).expect("should decode");
        assert_eq!(decoded.issuer_id(), Some(issuer.as_str()));
        assert_eq!(decoded.id.as_deref(), Some("urn:uuid:1234"));
    }

    #[tokio::test]
    async fn ebsi_v2_embeds_key() {
        let service = offline_service();
        let options = DidOptions::Ebsi {
            version: EbsiVersion::V2,
        };
        let issuer = service.dids().create(DidMethod::Ebsi, None, Some(options)).await.expect("should create");
        let vc = credential(&service, &issuer).await;

        let config = ProofConfig {
            proof_type: ProofType::Jwt,
            ..ProofConfig::new(&issuer)
        };
        let token = service.sign(&vc, &config).await.expect("should sign");
        let header = Jws::parse(&token).expect("should parse").header;
        assert!(header.jwk.is_some());

        // resolvable only through the embedded key
        assert!(offline_service().verify(&token).await.expect("should verify").verified);
    }

    #[tokio::test]
    async fn presentations() {
        let service = offline_service();
        let issuer = service.dids().create(DidMethod::Key, None, None).await.expect("should create");
        let vc = credential(&service, &issuer).await;
        let signed = service.sign(&vc, &ProofConfig::new(&issuer)).await.expect("should sign");

        let options = PresentOptions {
            domain: Some("https://verifier.example.com".to_string()),
            challenge: Some("d1c3a2".to_string()),
            ..PresentOptions::default()
        };
        let vp = service.present(&[signed.clone()], &options).await.expect("should present");

        let value: Value = serde_json::from_str(&vp).expect("should parse");
        assert!(value["id"].as_str().expect("should have id").starts_with("urn:uuid:"));
        assert_eq!(value["proof"]["proofPurpose"], AUTHENTICATION);
        assert_eq!(value["proof"]["nonce"], "d1c3a2");
        assert_eq!(value["proof"]["domain"], "https://verifier.example.com");

        let result = service.verify(&vp).await.expect("should verify");
        assert!(result.verified);
        assert_eq!(result.verification_type, VerificationType::VerifiablePresentation);

        let options = PresentOptions {
            proof_type: ProofType::Jwt,
            verifier_did: Some("did:example:verifier".to_string()),
            ..PresentOptions::default()
        };
        let token = service.present(&[signed], &options).await.expect("should present");
        let result = service.verify(&token).await.expect("should verify");
        assert!(result.verified);
        assert_eq!(result.verification_type, VerificationType::VerifiablePresentation);
    }

    #[tokio::test]
    async fn unresolvable_issuer() {
        let service = offline_service();
        let issuer = service.dids().create(DidMethod::Key, None, None).await.expect("should create");
        let vc = credential(&service, &issuer).await;
        let signed = service.sign(&vc, &ProofConfig::new(&issuer)).await.expect("should sign");

        let mut document: Value = serde_json::from_str(&signed).expect("should parse");
        document["issuer"] = json!("did:web:example.com");
        document["proof"]["verificationMethod"] = json!("did:web:example.com#key-1");
        let err = service.verify(&document.to_string()).await.expect_err("should fail");
        assert!(err.is(Err::ResolutionFailed));
    }

    // A credential naming another DID as issuer but signed with the signer's
    // own key must not verify, even once the verifier holds the signer's key.
    #[tokio::test]
    async fn foreign_issuer() {
        let service = offline_service();
        let issuer = service.dids().create(DidMethod::Key, None, None).await.expect("should create");
        let signer = service.dids().create(DidMethod::Key, None, None).await.expect("should create");
        let signer_vm = service.dids().authentication_methods(&signer).await.expect("should resolve").remove(0).id;

        for proof_type in [ProofType::LdProof, ProofType::Jwt] {
            let verifier = offline_service();
            let genuine = service
                .sign(
                    &credential(&service, &signer).await,
                    &ProofConfig {
                        proof_type,
                        ..ProofConfig::new(&signer)
                    },
                )
                .await
                .expect("should sign");
            assert!(verifier.verify(&genuine).await.expect("should verify").verified);

            let config = ProofConfig {
                proof_type,
                issuer_verification_method: Some(signer_vm.clone()),
                ..ProofConfig::new(&issuer)
            };
            let forged = service.sign(&credential(&service, &issuer).await, &config).await.expect("should sign");
            let result = verifier.verify(&forged).await.expect("should verify");
            assert!(!result.verified, "{proof_type:?} proof by {signer} accepted for {issuer}");
        }
    }

    #[tokio::test]
    async fn unlisted_method() {
        let service = offline_service();
        let issuer = service.dids().create(DidMethod::Key, None, None).await.expect("should create");
        let vc = credential(&service, &issuer).await;
        let signed = service.sign(&vc, &ProofConfig::new(&issuer)).await.expect("should sign");

        let mut document: Value = serde_json::from_str(&signed).expect("should parse");
        document["proof"]["verificationMethod"] = json!(format!("{issuer}#missing"));
        let result = offline_service().verify(&document.to_string()).await.expect("should verify");
        assert!(!result.verified);
    }

    #[tokio::test]
    async fn no_suite() {
        let service = offline_service();
        let key = service.dids().keys().generate(KeyAlgorithm::Secp256r1).expect("should generate");
        let issuer =
            service.dids().create(DidMethod::Key, Some(key.as_str()), None).await.expect("should create");
        let vc = credential(&service, &issuer).await;

        let err = service.sign(&vc, &ProofConfig::new(&issuer)).await.expect_err("should fail");
        assert!(err.is(Err::UnsupportedSignatureAlgorithm));
    }
}
