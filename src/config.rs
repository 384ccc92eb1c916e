//! # Configuration
//!
//! Runtime settings for the key store, DID methods and proof engine. Every
//! field has a default so an empty configuration is valid. Values can be
//! overridden from the environment using [`Config::from_env`]:
//!
//! | Variable                                 | Setting                               |
//! |------------------------------------------|---------------------------------------|
//! | `VERCRE_SSI_KEYSTORE`                    | `memory` or `file`                    |
//! | `VERCRE_SSI_KEYSTORE_PATH`               | directory for the file key store      |
//! | `VERCRE_SSI_WEB_DOMAIN`                  | default `did:web` domain              |
//! | `VERCRE_SSI_EBSI_REGISTRY`               | EBSI DID registry base URL            |
//! | `VERCRE_SSI_EBSI_REGISTRATION_ATTEMPTS`  | EBSI v1 registration attempts         |
//! | `VERCRE_SSI_CHEQD_RESOLVER`              | cheqd universal resolver base URL     |
//! | `VERCRE_SSI_REMOTE_CONTEXTS`             | `true` to fetch unknown JSON-LD contexts |

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Err;
use crate::key::store::{FileKeyStore, InMemoryKeyStore, KeyStore};
use crate::{tracerr, Result};

const ENV_PREFIX: &str = "VERCRE_SSI_";

/// Top-level configuration.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Key store backend.
    pub key_store: KeyStoreConfig,

    /// DID method settings.
    pub did: DidConfig,

    /// Credential proof settings.
    pub proof: ProofSettings,
}

/// Key store backend selection.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct KeyStoreConfig {
    /// Which backend to use.
    pub backend: Backend,

    /// Root directory for the file backend.
    pub path: PathBuf,
}

impl Default for KeyStoreConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Memory,
            path: PathBuf::from("data/keystore"),
        }
    }
}

/// Supported key store backends.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Volatile, process-local storage.
    #[default]
    Memory,

    /// JSON files on the local file system.
    File,
}

/// DID method settings.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct DidConfig {
    /// Domain used for `did:web` when none is supplied.
    pub web_default_domain: String,

    /// Base URL of the EBSI DID registry.
    pub ebsi_registry_url: String,

    /// Number of times EBSI v1 registration is attempted before failing.
    pub ebsi_registration_attempts: u32,

    /// Base URL of the cheqd resolver.
    pub cheqd_resolver_url: String,
}

impl Default for DidConfig {
    fn default() -> Self {
        Self {
            web_default_domain: "walt.id".to_string(),
            ebsi_registry_url: "https://api-pilot.ebsi.eu/did-registry/v3".to_string(),
            ebsi_registration_attempts: 5,
            cheqd_resolver_url: "https://resolver.cheqd.net/1.0/identifiers".to_string(),
        }
    }
}

/// Credential proof settings.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct ProofSettings {
    /// Allow JSON-LD contexts that are not preloaded to be fetched over HTTP.
    pub remote_contexts: bool,
}

impl Default for ProofSettings {
    fn default() -> Self {
        Self { remote_contexts: true }
    }
}

impl Config {
    /// Build configuration from defaults overlaid with `VERCRE_SSI_*`
    /// environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`Err::InvalidConfig`] if a variable is set to a value that
    /// cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| std::env::var(format!("{ENV_PREFIX}{name}")).ok())
    }

    // Overlay values from a variable lookup onto the defaults.
    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(backend) = var("KEYSTORE") {
            config.key_store.backend = match backend.to_lowercase().as_str() {
                "memory" => Backend::Memory,
                "file" => Backend::File,
                other => tracerr!(Err::InvalidConfig, "unknown key store backend: {other}"),
            };
        }
        if let Some(path) = var("KEYSTORE_PATH") {
            config.key_store.path = PathBuf::from(path);
        }
        if let Some(domain) = var("WEB_DOMAIN") {
            config.did.web_default_domain = domain;
        }
        if let Some(url) = var("EBSI_REGISTRY") {
            config.did.ebsi_registry_url = url;
        }
        if let Some(attempts) = var("EBSI_REGISTRATION_ATTEMPTS") {
            let Ok(attempts) = attempts.parse::<u32>() else {
                tracerr!(Err::InvalidConfig, "invalid registration attempts: {attempts}")
            };
            if attempts == 0 {
                tracerr!(Err::InvalidConfig, "registration attempts must be at least 1");
            }
            config.did.ebsi_registration_attempts = attempts;
        }
        if let Some(url) = var("CHEQD_RESOLVER") {
            config.did.cheqd_resolver_url = url;
        }
        if let Some(remote) = var("REMOTE_CONTEXTS") {
            let Ok(remote) = remote.parse::<bool>() else {
                tracerr!(Err::InvalidConfig, "invalid remote contexts flag: {remote}")
            };
            config.proof.remote_contexts = remote;
        }

        Ok(config)
    }

    /// Construct the configured key store backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the file backend directory cannot be created.
    pub fn key_store(&self) -> Result<Arc<dyn KeyStore>> {
        let store: Arc<dyn KeyStore> = match self.key_store.backend {
            Backend::Memory => Arc::new(InMemoryKeyStore::new()),
            Backend::File => Arc::new(FileKeyStore::open(&self.key_store.path)?),
        };
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults() {
        let config = Config::from_vars(lookup(&[])).expect("should build");
        assert_eq!(config, Config::default());
        assert_eq!(config.did.ebsi_registration_attempts, 5);
        assert!(config.proof.remote_contexts);
    }

    #[test]
    fn overrides() {
        let config = Config::from_vars(lookup(&[
            ("KEYSTORE", "file"),
            ("KEYSTORE_PATH", "/tmp/keys"),
            ("EBSI_REGISTRATION_ATTEMPTS", "3"),
            ("REMOTE_CONTEXTS", "false"),
        ]))
        .expect("should build");

        assert_eq!(config.key_store.backend, Backend::File);
        assert_eq!(config.key_store.path, PathBuf::from("/tmp/keys"));
        assert_eq!(config.did.ebsi_registration_attempts, 3);
        assert!(!config.proof.remote_contexts);
    }

    #[test]
    fn invalid_value() {
        let err = Config::from_vars(lookup(&[("EBSI_REGISTRATION_ATTEMPTS", "many")]))
            .expect_err("should fail");
        assert!(err.is(Err::InvalidConfig));
    }

    #[test]
    fn from_json() {
        let config: Config = serde_json::from_str(r#"{"did": {"webDefaultDomain": "example.com"}}"#)
            .expect("should deserialize");
        assert_eq!(config.did.web_default_domain, "example.com");
        assert_eq!(config.key_store.backend, Backend::Memory);
    }
}
