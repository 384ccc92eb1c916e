//! # Key Store
//!
//! Durable mapping from key id to key material, plus an alias table mapping
//! alternative names (a DID, a verification method URL) to key ids.
//!
//! Aliases are last-write-wins and never copy key material. Every stored key
//! is aliased to its own id in the same write.

use std::collections::HashMap;
use std::fmt::{Debug, Write as _};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use base64ct::{Base64UrlUnpadded, Encoding};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{CryptoProvider, Key, KeyAlgorithm, KeyId, KeyMaterial, KeyType, NativeKeyPair};
use crate::error::{Context, Err};
use crate::{tracerr, Result};

/// Persisted form of a key.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct KeyRecord {
    /// Canonical key id.
    pub key_id: KeyId,

    /// Key algorithm.
    pub algorithm: KeyAlgorithm,

    /// Backend representation the key was produced from.
    pub provider: CryptoProvider,

    /// Base64url-encoded canonical public key bytes.
    pub public_key: String,

    /// Base64url-encoded canonical private key bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
}

impl KeyRecord {
    /// Build a record from a key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key bytes cannot be encoded.
    pub fn from_key(key: &Key) -> Result<Self> {
        Ok(Self {
            key_id: key.key_id.clone(),
            algorithm: key.algorithm,
            provider: key.provider,
            public_key: Base64UrlUnpadded::encode_string(&key.public_key_bytes()?),
            private_key: key.private_key_bytes()?.map(|d| Base64UrlUnpadded::encode_string(&d)),
        })
    }

    /// Rebuild the key, with or without its private half.
    ///
    /// # Errors
    ///
    /// Returns [`Err::InvalidKeyFormat`] if the stored bytes are corrupt, or
    /// [`Err::KeyNotFound`] if a private key is requested but none is stored.
    pub fn to_key(&self, key_type: KeyType) -> Result<Key> {
        let public = Base64UrlUnpadded::decode_vec(&self.public_key)?;
        let private = match (key_type, &self.private_key) {
            (KeyType::Public, _) => None,
            (KeyType::Private, Some(private)) => Some(Base64UrlUnpadded::decode_vec(private)?),
            (KeyType::Private, None) => {
                tracerr!(Err::KeyNotFound, "no private key stored for {}", self.key_id)
            }
        };

        let material = match self.provider {
            CryptoProvider::Native => KeyMaterial::Native(NativeKeyPair::from_bytes(
                self.algorithm,
                &public,
                private.as_deref(),
            )?),
            CryptoProvider::Raw => KeyMaterial::RawBytes {
                algorithm: self.algorithm,
                public,
                private,
            },
        };
        Ok(Key::new(self.key_id.clone(), material))
    }
}

/// Storage contract for key records and their aliases.
pub trait KeyStore: Send + Sync + Debug {
    /// Persist a key record and alias it to its own id.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn store(&self, record: KeyRecord) -> Result<()>;

    /// Load a key record by canonical id.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn load(&self, key_id: &KeyId) -> Result<Option<KeyRecord>>;

    /// Delete a key and every alias pointing at it.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn delete(&self, key_id: &KeyId) -> Result<()>;

    /// Ids of all stored keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn list(&self) -> Result<Vec<KeyId>>;

    /// Map `alias` to `key_id`, replacing any previous mapping.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn add_alias(&self, key_id: &KeyId, alias: &str) -> Result<()>;

    /// Resolve an alias to its key id.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn key_id(&self, alias: &str) -> Result<Option<KeyId>>;
}

/// Process-local key store.
#[derive(Debug, Default)]
pub struct InMemoryKeyStore {
    keys: DashMap<KeyId, KeyRecord>,
    aliases: DashMap<String, KeyId>,
}

impl InMemoryKeyStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyStore for InMemoryKeyStore {
    fn store(&self, record: KeyRecord) -> Result<()> {
        let key_id = record.key_id.clone();
        self.keys.insert(key_id.clone(), record);
        self.aliases.insert(key_id.to_string(), key_id);
        Ok(())
    }

    fn load(&self, key_id: &KeyId) -> Result<Option<KeyRecord>> {
        Ok(self.keys.get(key_id).map(|r| r.value().clone()))
    }

    fn delete(&self, key_id: &KeyId) -> Result<()> {
        self.keys.remove(key_id);
        self.aliases.retain(|_, id| id != key_id);
        Ok(())
    }

    fn list(&self) -> Result<Vec<KeyId>> {
        let mut ids: Vec<KeyId> = self.keys.iter().map(|r| r.key().clone()).collect();
        ids.sort();
        Ok(ids)
    }

    fn add_alias(&self, key_id: &KeyId, alias: &str) -> Result<()> {
        self.aliases.insert(alias.to_string(), key_id.clone());
        Ok(())
    }

    fn key_id(&self, alias: &str) -> Result<Option<KeyId>> {
        Ok(self.aliases.get(alias).map(|r| r.value().clone()))
    }
}

const KEYS_DIR: &str = "keys";
const ALIASES_FILE: &str = "aliases.json";

/// Key store persisting JSON files under a root directory.
///
/// Each key is written to `keys/<hex(sha256(id))>.json` so that file names
/// have a fixed length however long the id. The id itself is kept in the
/// record. The alias table is
/// `aliases.json`. Files are replaced atomically by writing a temporary file
/// and renaming it.
#[derive(Debug)]
pub struct FileKeyStore {
    root: PathBuf,
    aliases: Mutex<HashMap<String, KeyId>>,
}

impl FileKeyStore {
    /// Open (or create) a store rooted at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or an existing
    /// alias table cannot be read.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        fs::create_dir_all(root.join(KEYS_DIR))
            .context(format!("creating key store at {}", root.display()))?;

        let aliases_path = root.join(ALIASES_FILE);
        let aliases = if aliases_path.exists() {
            let bytes = fs::read(&aliases_path).context("reading alias table")?;
            serde_json::from_slice(&bytes)?
        } else {
            HashMap::new()
        };

        tracing::debug!("opened file key store at {}", root.display());
        Ok(Self {
            root,
            aliases: Mutex::new(aliases),
        })
    }

    fn key_path(&self, key_id: &KeyId) -> PathBuf {
        let name = Sha256::digest(key_id.as_str().as_bytes()).iter().fold(
            String::with_capacity(64),
            |mut name, b| {
                let _ = write!(name, "{b:02x}");
                name
            },
        );
        self.root.join(KEYS_DIR).join(format!("{name}.json"))
    }

    fn save_aliases(&self, aliases: &HashMap<String, KeyId>) -> Result<()> {
        write_atomic(&self.root.join(ALIASES_FILE), &serde_json::to_vec_pretty(aliases)?)
    }
}

impl KeyStore for FileKeyStore {
    fn store(&self, record: KeyRecord) -> Result<()> {
        let mut aliases = self.aliases.lock().unwrap_or_else(PoisonError::into_inner);
        write_atomic(&self.key_path(&record.key_id), &serde_json::to_vec_pretty(&record)?)?;
        aliases.insert(record.key_id.to_string(), record.key_id.clone());
        self.save_aliases(&aliases)
    }

    fn load(&self, key_id: &KeyId) -> Result<Option<KeyRecord>> {
        let path = self.key_path(key_id);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path).context(format!("reading {}", path.display()))?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    fn delete(&self, key_id: &KeyId) -> Result<()> {
        let mut aliases = self.aliases.lock().unwrap_or_else(PoisonError::into_inner);
        let path = self.key_path(key_id);
        if path.exists() {
            fs::remove_file(&path).context(format!("deleting {}", path.display()))?;
        }
        aliases.retain(|_, id| id != key_id);
        self.save_aliases(&aliases)
    }

    fn list(&self) -> Result<Vec<KeyId>> {
        let mut ids = vec![];
        for entry in fs::read_dir(self.root.join(KEYS_DIR)).context("listing keys")? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                let record: KeyRecord = serde_json::from_slice(&fs::read(&path)?)?;
                ids.push(record.key_id);
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn add_alias(&self, key_id: &KeyId, alias: &str) -> Result<()> {
        let mut aliases = self.aliases.lock().unwrap_or_else(PoisonError::into_inner);
        aliases.insert(alias.to_string(), key_id.clone());
        self.save_aliases(&aliases)
    }

    fn key_id(&self, alias: &str) -> Result<Option<KeyId>> {
        let aliases = self.aliases.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(aliases.get(alias).cloned())
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes).context(format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, path).context(format!("replacing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::CryptoService;

    fn record(algorithm: KeyAlgorithm) -> KeyRecord {
        let key = CryptoService::new().generate(algorithm).expect("should generate");
        KeyRecord::from_key(&key).expect("should encode")
    }

    #[test]
    fn memory_aliases() {
        let store = InMemoryKeyStore::new();
        let rec = record(KeyAlgorithm::Ed25519);
        let id = rec.key_id.clone();

        store.store(rec).expect("should store");
        store.add_alias(&id, "did:key:z6Mk").expect("should alias");

        assert_eq!(store.key_id(id.as_str()).expect("should read"), Some(id.clone()));
        assert_eq!(store.key_id("did:key:z6Mk").expect("should read"), Some(id.clone()));

        store.delete(&id).expect("should delete");
        assert!(store.load(&id).expect("should read").is_none());
        assert!(store.key_id("did:key:z6Mk").expect("should read").is_none());
    }

    #[test]
    fn alias_last_write_wins() {
        let store = InMemoryKeyStore::new();
        let one = record(KeyAlgorithm::Ed25519);
        let two = record(KeyAlgorithm::Secp256k1);
        let (id1, id2) = (one.key_id.clone(), two.key_id.clone());
        store.store(one).expect("should store");
        store.store(two).expect("should store");

        store.add_alias(&id1, "shared").expect("should alias");
        store.add_alias(&id2, "shared").expect("should alias");
        assert_eq!(store.key_id("shared").expect("should read"), Some(id2));
    }

    #[test]
    fn file_persists_across_open() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let rec = record(KeyAlgorithm::Secp256r1);
        let id = rec.key_id.clone();

        {
            let store = FileKeyStore::open(dir.path()).expect("should open");
            store.store(rec.clone()).expect("should store");
            store.add_alias(&id, "did:web:example.com#key-1").expect("should alias");
        }

        let store = FileKeyStore::open(dir.path()).expect("should reopen");
        assert_eq!(store.load(&id).expect("should read"), Some(rec));
        assert_eq!(
            store.key_id("did:web:example.com#key-1").expect("should read"),
            Some(id.clone())
        );
        assert_eq!(store.list().expect("should list"), vec![id.clone()]);

        store.delete(&id).expect("should delete");
        assert!(store.list().expect("should list").is_empty());
        assert!(store.key_id(id.as_str()).expect("should read").is_none());
    }

    #[test]
    fn file_long_key_id() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let store = FileKeyStore::open(dir.path()).expect("should open");

        let mut rec = record(KeyAlgorithm::Secp256r1);
        rec.key_id = KeyId::from(format!("did:jwk:{}#0", "e".repeat(300)));
        let id = rec.key_id.clone();
        store.store(rec.clone()).expect("should store");

        assert_eq!(store.load(&id).expect("should read"), Some(rec));
        assert_eq!(store.list().expect("should list"), vec![id]);
    }

    #[test]
    fn record_round_trip() {
        let rec = record(KeyAlgorithm::Ed25519);
        let key = rec.to_key(KeyType::Private).expect("should decode");
        assert!(key.has_private());

        let public = rec.to_key(KeyType::Public).expect("should decode");
        assert!(!public.has_private());

        let public_rec = KeyRecord::from_key(&public).expect("should encode");
        let err = public_rec.to_key(KeyType::Private).expect_err("should fail");
        assert!(err.is(Err::KeyNotFound));
    }
}
