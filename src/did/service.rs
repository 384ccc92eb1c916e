//! # DID Service
//!
//! Entry point for creating, resolving and managing DIDs. Created documents
//! are kept for the life of the service; resolved documents are cached.

use dashmap::DashMap;
use tracing::instrument;

use super::{ebsi, jwk, key, web, DidMethod, DidOptions, DidUrl, DidVariant, Document, EbsiVersion, Factory, VerificationMethod};
use crate::config::{Config, DidConfig};
use crate::error::Err;
use crate::key::jwk::Jwk;
use crate::key::{Key, KeyAlgorithm, KeyId, KeyMaterial, KeyService, KeyType};
use crate::provider::{HttpClient, LedgerClient, RegistryClient, ReqwestClient};
use crate::{tracerr, Result};

/// DID management facade.
#[derive(Debug)]
pub struct DidService<H: HttpClient, L: LedgerClient> {
    keys: KeyService,
    http: H,
    ledger: L,
    config: DidConfig,
    created: DashMap<String, Document>,
    cache: DashMap<String, Document>,
}

impl DidService<ReqwestClient, RegistryClient<ReqwestClient>> {
    /// Create a service using the configured key store, HTTP transport and
    /// public registries.
    ///
    /// # Errors
    ///
    /// Returns an error if the key store or HTTP client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        let keys = KeyService::new(config.key_store()?);
        let http = ReqwestClient::new()?;
        let ledger = RegistryClient::new(http.clone(), config.did.clone());
        Ok(Self::new(keys, http, ledger, config.did.clone()))
    }
}

impl<H: HttpClient, L: LedgerClient> DidService<H, L> {
    /// Create a DID service over existing collaborators.
    #[must_use]
    pub fn new(keys: KeyService, http: H, ledger: L, config: DidConfig) -> Self {
        Self {
            keys,
            http,
            ledger,
            config,
            created: DashMap::new(),
            cache: DashMap::new(),
        }
    }

    /// The key service DIDs are bound to.
    #[must_use]
    pub const fn keys(&self) -> &KeyService {
        &self.keys
    }

    /// Create a DID, returning its string form.
    ///
    /// When `key_alias` is `None` a key is generated: secp256k1 for
    /// `did:ebsi`, Ed25519 otherwise. The key is aliased to the DID and to
    /// every verification method in the new document.
    ///
    /// # Errors
    ///
    /// Returns [`Err::KeyNotFound`] if `key_alias` is unknown, and any
    /// error raised by the method's factory.
    #[instrument(level = "debug", skip(self))]
    pub async fn create(
        &self, method: DidMethod, key_alias: Option<&str>, options: Option<DidOptions>,
    ) -> Result<String> {
        let key_id = match key_alias {
            Some(alias) => self.keys.key_id(alias)?,
            None => self.keys.generate(default_algorithm(method))?,
        };
        let key = self.keys.load(key_id.as_str(), KeyType::Public)?;
        let options = options.unwrap_or_else(|| DidOptions::default_for(method));

        let document = Factory::new(method).create(&key, &options, &self.ledger, &self.config).await?;

        self.keys.add_alias(&key_id, &document.id)?;
        for vm in document.methods() {
            self.keys.add_alias(&key_id, &vm.id)?;
        }

        let did = document.id.clone();
        tracing::info!("created {did}");
        self.created.insert(did.clone(), document);
        Ok(did)
    }

    /// Resolve a DID or DID URL to its document.
    ///
    /// Documents created or previously resolved by this service are returned
    /// without a lookup.
    ///
    /// # Errors
    ///
    /// Returns [`Err::UnsupportedMethod`] for unknown methods and
    /// [`Err::ResolutionFailed`] if a hosted document cannot be fetched.
    #[instrument(level = "debug", skip(self))]
    pub async fn resolve(&self, did_or_url: &str) -> Result<DidVariant> {
        let url = DidUrl::parse(did_or_url)?;
        let method = url.did_method()?;
        let did = url.did();

        if let Some(document) = self.cached(&did) {
            return Ok(DidVariant::new(method, document));
        }

        let document = match method {
            DidMethod::Key => key::resolve(&url)?,
            DidMethod::Jwk => jwk::resolve(&url)?,
            DidMethod::Web => web::resolve(&url, &self.http).await?,
            DidMethod::Ebsi => match ebsi::version(&url)? {
                EbsiVersion::V1 => self.ledger.resolve(&did).await?,
                EbsiVersion::V2 => self.resolve_ebsi_v2(&did, None)?,
            },
            DidMethod::Iota | DidMethod::Cheqd => self.ledger.resolve(&did).await?,
        };

        self.cache.insert(did, document.clone());
        Ok(DidVariant::new(method, document))
    }

    fn cached(&self, did: &str) -> Option<Document> {
        self.created
            .get(did)
            .or_else(|| self.cache.get(did))
            .map(|entry| entry.value().clone())
    }

    /// Compose a `did:ebsi` v2 document from `jwk`, or from the key aliased
    /// to the DID when no JWK is supplied.
    ///
    /// # Errors
    ///
    /// Returns [`Err::KeyNotFound`] if no key is available and
    /// [`Err::ResolutionFailed`] if the key does not match the identifier.
    pub fn resolve_ebsi_v2(&self, did: &str, jwk: Option<&Jwk>) -> Result<Document> {
        let url = DidUrl::parse(did)?;
        match jwk {
            Some(jwk) => ebsi::compose_v2(&url, jwk),
            None => {
                let key = self.keys.load(&url.did(), KeyType::Public)?;
                ebsi::compose_v2(&url, &key.to_jwk(KeyType::Public)?)
            }
        }
    }

    /// Store the public key of a `did:ebsi` v2 subject, aliased by the DID and
    /// by its verification method id.
    ///
    /// # Errors
    ///
    /// Returns [`Err::InvalidDidUrl`] if the DID is not `did:ebsi` v2 and
    /// [`Err::InvalidKeyFormat`] if the key does not match the identifier.
    pub fn import_ebsi_v2_key(&self, did: &str, jwk: &Jwk) -> Result<()> {
        let url = DidUrl::parse(did)?;
        if url.did_method()? != DidMethod::Ebsi || ebsi::version(&url)? != EbsiVersion::V2 {
            tracerr!(Err::InvalidDidUrl, "{did} is not did:ebsi version 2");
        }
        if ebsi::v2_identifier(jwk)? != url.identifier {
            tracerr!(Err::InvalidKeyFormat, "key does not match {did}");
        }

        let vm_id = format!("{}#{}", url.did(), jwk.thumbprint()?);
        if self.keys.has_key(&vm_id)? {
            return Ok(());
        }
        let key = KeyService::key_from_jwk(&Jwk { kid: None, ..jwk.public() })?;
        self.keys.store(&key)?;
        self.keys.add_alias(&key.key_id, &url.did())?;
        self.keys.add_alias(&key.key_id, &vm_id)?;
        Ok(())
    }

    /// Resolve a DID and store every signature-capable verification method
    /// key, aliased by method id and by the DID.
    ///
    /// Returns `true` if at least one key is available afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the DID cannot be resolved or a method's key is
    /// malformed.
    #[instrument(level = "debug", skip(self))]
    pub async fn import_keys(&self, did: &str) -> Result<bool> {
        let document = self.resolve(did).await?.into_document();
        let mut imported = false;

        for vm in document.methods() {
            let native = match vm.public_key() {
                Ok(native) => native,
                Err(e) if e.is(Err::UnsupportedAlgorithm) => {
                    tracing::debug!("skipping {}: {e}", vm.id);
                    continue;
                }
                Err(e) => return Err(e),
            };
            imported = true;
            if self.keys.has_key(&vm.id)? {
                continue;
            }

            let key = Key::new(KeyId::from(vm.id.clone()), KeyMaterial::Native(native));
            self.keys.store(&key)?;
            self.keys.add_alias(&key.key_id, &document.id)?;
            tracing::debug!("imported {} key {}", key.algorithm, vm.id);
        }

        Ok(imported)
    }

    /// Resolved authentication methods of a DID.
    ///
    /// # Errors
    ///
    /// Returns an error if the DID cannot be resolved.
    pub async fn authentication_methods(&self, did: &str) -> Result<Vec<VerificationMethod>> {
        Ok(self.resolve(did).await?.document().authentication_methods())
    }

    /// DIDs created by this service, sorted.
    #[must_use]
    pub fn list_dids(&self) -> Vec<String> {
        let mut dids: Vec<String> = self.created.iter().map(|entry| entry.key().clone()).collect();
        dids.sort();
        dids
    }

    /// Forget a DID and delete the keys bound to its verification methods.
    ///
    /// # Errors
    ///
    /// Returns an error if the DID cannot be resolved or the key store cannot
    /// be written.
    #[instrument(level = "debug", skip(self))]
    pub async fn delete_did(&self, did: &str) -> Result<()> {
        let document = self.resolve(did).await?.into_document();
        self.created.remove(&document.id);
        self.cache.remove(&document.id);

        for vm in document.methods() {
            if self.keys.has_key(&vm.id)? {
                self.keys.delete(&vm.id)?;
            }
        }
        tracing::info!("deleted {}", document.id);
        Ok(())
    }
}

const fn default_algorithm(method: DidMethod) -> KeyAlgorithm {
    match method {
        DidMethod::Ebsi => KeyAlgorithm::Secp256k1,
        _ => KeyAlgorithm::Ed25519,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;

    #[derive(Clone, Default)]
    struct Offline;

    impl HttpClient for Offline {
        async fn get(&self, url: &str) -> Result<Value> {
            tracerr!(Err::RequestError, "offline: {url}")
        }

        async fn post_json(&self, url: &str, _: &Value) -> Result<Value> {
            tracerr!(Err::RequestError, "offline: {url}")
        }
    }

    fn service() -> DidService<Offline, RegistryClient<Offline>> {
        DidService::new(
            KeyService::in_memory(),
            Offline,
            RegistryClient::new(Offline, DidConfig::default()),
            DidConfig::default(),
        )
    }

    #[tokio::test]
    async fn create_key_did() {
        let service = service();
        let did = service.create(DidMethod::Key, None, None).await.expect("should create");
        assert!(did.starts_with("did:key:z6Mk"));

        let resolved = service.resolve(&did).await.expect("should resolve");
        assert_eq!(resolved.method(), DidMethod::Key);

        // the key is reachable by DID and by method id
        let key = service.keys().load(&did, KeyType::Private).expect("should load");
        assert_eq!(key.algorithm, KeyAlgorithm::Ed25519);
        let vm_id = format!("{did}#{}", &did[8..]);
        assert!(service.keys().has_key(&vm_id).expect("should read"));
        assert_eq!(service.list_dids(), [did]);
    }

    #[tokio::test]
    async fn existing_key() {
        let service = service();
        let key_id = service.keys().generate(KeyAlgorithm::Secp256r1).expect("should generate");
        let did = service
            .create(DidMethod::Jwk, Some(key_id.as_str()), None)
            .await
            .expect("should create");
        assert!(did.starts_with("did:jwk:"));
        assert_eq!(service.keys().key_id(&did).expect("should find"), key_id);

        let err = service.create(DidMethod::Key, Some("missing"), None).await.expect_err("should fail");
        assert!(err.is(Err::KeyNotFound));
    }

    #[tokio::test]
    async fn import_other_keys() {
        let issuer = service();
        let did = issuer.create(DidMethod::Key, None, None).await.expect("should create");

        let verifier = service();
        assert!(verifier.import_keys(&did).await.expect("should import"));
        let key = verifier.keys().load(&did, KeyType::Public).expect("should load");
        assert_eq!(key.algorithm, KeyAlgorithm::Ed25519);
        assert!(!key.has_private());
        assert!(verifier.list_dids().is_empty());
    }

    #[tokio::test]
    async fn ebsi_v2_lifecycle() {
        let service = service();
        let did = service
            .create(DidMethod::Ebsi, None, Some(DidOptions::Ebsi { version: EbsiVersion::V2 }))
            .await
            .expect("should create");
        let jwk = service.keys().load(&did, KeyType::Public).expect("should load").to_jwk(KeyType::Public).expect("should convert");

        let other = self::service();
        other.import_ebsi_v2_key(&did, &jwk).expect("should import");
        let doc = other.resolve(&did).await.expect("should resolve");
        assert_eq!(doc.method(), DidMethod::Ebsi);

        let key_did = other.create(DidMethod::Key, None, None).await.expect("should create");
        let err = other.import_ebsi_v2_key(&key_did, &jwk).expect_err("should fail");
        assert!(err.is(Err::UnsupportedMethod) || err.is(Err::InvalidDidUrl));
    }

    #[tokio::test]
    async fn web_resolution_fails_offline() {
        let service = service();
        let err = service.resolve("did:web:example.com").await.expect_err("should fail");
        assert!(err.is(Err::ResolutionFailed));

        let err = service.resolve("did:example:123").await.expect_err("should fail");
        assert!(err.is(Err::UnsupportedMethod));
    }

    #[tokio::test]
    async fn delete() {
        let service = service();
        let did = service.create(DidMethod::Key, None, None).await.expect("should create");
        service.delete_did(&did).await.expect("should delete");
        assert!(service.list_dids().is_empty());
        assert!(!service.keys().has_key(&did).expect("should read"));
    }
}
