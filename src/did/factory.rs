//! # DID Factories
//!
//! Each supported method has a factory that turns a key and per-method
//! options into a new DID document. Methods anchored on a ledger delegate to
//! the [`LedgerClient`].

use serde::{Deserialize, Serialize};

use super::{ebsi, jwk, key, web, DidMethod, Document};
use crate::config::DidConfig;
use crate::error::Err;
use crate::key::{Key, KeyAlgorithm};
use crate::provider::LedgerClient;
use crate::{tracerr, Result};

/// `did:ebsi` versions.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum EbsiVersion {
    /// Legal entities, anchored in the EBSI registry.
    #[default]
    V1,

    /// Natural persons, derived from the key thumbprint.
    V2,
}

/// Per-method creation options.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum DidOptions {
    /// `did:key`
    Key {
        /// Encode the identifier with the `jwk_jcs-pub` multicodec.
        #[serde(default)]
        jwk_jcs_pub: bool,
    },

    /// `did:web`
    Web {
        /// Hosting domain, optionally with a port. Falls back to the
        /// configured default domain.
        domain: Option<String>,

        /// Path below the domain, segments separated by `/` or `:`.
        path: Option<String>,
    },

    /// `did:ebsi`
    Ebsi {
        /// Identifier version.
        #[serde(default)]
        version: EbsiVersion,
    },

    /// `did:jwk`
    Jwk,

    /// `did:iota`
    Iota,

    /// `did:cheqd`
    Cheqd {
        /// Network name, such as `mainnet` or `testnet`.
        network: String,
    },
}

impl DidOptions {
    /// Default options for a method.
    #[must_use]
    pub fn default_for(method: DidMethod) -> Self {
        match method {
            DidMethod::Key => Self::Key { jwk_jcs_pub: false },
            DidMethod::Web => Self::Web {
                domain: None,
                path: None,
            },
            DidMethod::Ebsi => Self::Ebsi {
                version: EbsiVersion::V1,
            },
            DidMethod::Jwk => Self::Jwk,
            DidMethod::Iota => Self::Iota,
            DidMethod::Cheqd => Self::Cheqd {
                network: "testnet".to_string(),
            },
        }
    }
}

/// Method factories.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Factory {
    /// Composes `did:key` documents locally.
    Key,

    /// Composes `did:web` documents locally.
    Web,

    /// Composes `did:ebsi` documents, registering v1 documents.
    Ebsi,

    /// Composes `did:jwk` documents locally.
    Jwk,

    /// Creates `did:iota` DIDs through the ledger client.
    Iota,

    /// Creates `did:cheqd` DIDs through the ledger client.
    Cheqd,
}

impl Factory {
    /// The factory for a method.
    #[must_use]
    pub const fn new(method: DidMethod) -> Self {
        match method {
            DidMethod::Key => Self::Key,
            DidMethod::Web => Self::Web,
            DidMethod::Ebsi => Self::Ebsi,
            DidMethod::Jwk => Self::Jwk,
            DidMethod::Iota => Self::Iota,
            DidMethod::Cheqd => Self::Cheqd,
        }
    }

    /// The method this factory creates.
    #[must_use]
    pub const fn method(&self) -> DidMethod {
        match self {
            Self::Key => DidMethod::Key,
            Self::Web => DidMethod::Web,
            Self::Ebsi => DidMethod::Ebsi,
            Self::Jwk => DidMethod::Jwk,
            Self::Iota => DidMethod::Iota,
            Self::Cheqd => DidMethod::Cheqd,
        }
    }

    /// Create a DID document for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`Err::UnsupportedOperationKind`] if `options` are for a
    /// different method, [`Err::UnsupportedAlgorithm`] if the key cannot be
    /// used with the method, and [`Err::RegistrationFailed`] if a `did:ebsi`
    /// v1 document cannot be registered.
    pub async fn create(
        &self, key: &Key, options: &DidOptions, ledger: &impl LedgerClient, config: &DidConfig,
    ) -> Result<Document> {
        match (self, options) {
            (Self::Key, DidOptions::Key { jwk_jcs_pub }) => key::create(key, *jwk_jcs_pub),
            (Self::Web, DidOptions::Web { domain, path }) => {
                let domain = domain.as_deref().unwrap_or(&config.web_default_domain);
                web::create(key, domain, path.as_deref())
            }
            (Self::Ebsi, DidOptions::Ebsi { version }) => match version {
                EbsiVersion::V1 => {
                    let document = ebsi::create_v1(key)?;
                    ebsi::register(ledger, &document, config.ebsi_registration_attempts).await?;
                    Ok(document)
                }
                EbsiVersion::V2 => ebsi::create_v2(key),
            },
            (Self::Jwk, DidOptions::Jwk) => jwk::create(key),
            (Self::Iota, DidOptions::Iota) => {
                if key.algorithm != KeyAlgorithm::Ed25519 {
                    tracerr!(Err::UnsupportedAlgorithm, "did:iota requires an Ed25519 key, not {}", key.algorithm);
                }
                ledger.create(DidMethod::Iota, key, options).await
            }
            (Self::Cheqd, DidOptions::Cheqd { .. }) => ledger.create(DidMethod::Cheqd, key, options).await,
            (factory, options) => {
                tracerr!(
                    Err::UnsupportedOperationKind,
                    "options {options:?} cannot be used with did:{}",
                    factory.method()
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DidConfig;
    use crate::key::CryptoService;

    struct NoLedger;

    impl LedgerClient for NoLedger {
        async fn create(&self, _: DidMethod, _: &Key, _: &DidOptions) -> Result<Document> {
            Ok(Document {
                id: "did:iota:created".to_string(),
                ..Document::default()
            })
        }

        async fn register(&self, _: &Document) -> Result<()> {
            Ok(())
        }

        async fn resolve(&self, _: &str) -> Result<Document> {
            tracerr!(Err::ResolutionFailed)
        }
    }

    #[tokio::test]
    async fn mismatched_options() {
        let key = CryptoService::new().generate(KeyAlgorithm::Ed25519).expect("should generate");
        let err = Factory::new(DidMethod::Key)
            .create(&key, &DidOptions::Jwk, &NoLedger, &DidConfig::default())
            .await
            .expect_err("should fail");
        assert!(err.is(Err::UnsupportedOperationKind));
    }

    #[tokio::test]
    async fn web_default_domain() {
        let key = CryptoService::new().generate(KeyAlgorithm::Ed25519).expect("should generate");
        let doc = Factory::new(DidMethod::Web)
            .create(&key, &DidOptions::default_for(DidMethod::Web), &NoLedger, &DidConfig::default())
            .await
            .expect("should create");
        assert_eq!(doc.id, "did:web:walt.id");
    }

    #[tokio::test]
    async fn iota_requires_ed25519() {
        let config = DidConfig::default();
        let key = CryptoService::new().generate(KeyAlgorithm::Secp256k1).expect("should generate");
        let err = Factory::new(DidMethod::Iota)
            .create(&key, &DidOptions::Iota, &NoLedger, &config)
            .await
            .expect_err("should fail");
        assert!(err.is(Err::UnsupportedAlgorithm));

        let key = CryptoService::new().generate(KeyAlgorithm::Ed25519).expect("should generate");
        let doc = Factory::new(DidMethod::Iota)
            .create(&key, &DidOptions::Iota, &NoLedger, &config)
            .await
            .expect("should create");
        assert_eq!(doc.id, "did:iota:created");
    }

    #[test]
    fn options_json() {
        let options: DidOptions =
            serde_json::from_str(r#"{"method": "ebsi", "version": "V2"}"#).expect("should parse");
        assert_eq!(options, DidOptions::Ebsi { version: EbsiVersion::V2 });
    }
}
