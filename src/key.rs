//! # Key Management
//!
//! Key generation, storage, format conversion and signing for the supported
//! algorithms. [`KeyService`] is the entry point: it composes the stateless
//! [`CryptoService`] with a [`KeyStore`] backend.
//!
//! A [`Key`] exposes its public and private bytes the same way whether it was
//! built from a native key pair or from raw bytes, so callers never need to
//! know how the key is held.

mod algorithm;
pub mod crypto;
pub mod jwk;
pub mod material;
pub mod pem;
pub mod service;
pub mod store;

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

pub use self::algorithm::{CryptoProvider, KeyAlgorithm};
pub use self::crypto::CryptoService;
pub use self::jwk::Jwk;
pub use self::material::{KeyMaterial, NativeKeyPair};
pub use self::service::KeyService;
pub use self::store::{FileKeyStore, InMemoryKeyStore, KeyRecord, KeyStore};
use crate::Result;

/// Canonical key identifier.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct KeyId(String);

impl KeyId {
    /// Generate a new random key id.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for KeyId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for KeyId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for KeyId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl AsRef<str> for KeyId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Which half of a key pair to load or export.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum KeyType {
    /// Public key only.
    #[default]
    Public,

    /// Private key (with its public key).
    Private,
}

/// Serialization formats for key export.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum KeyFormat {
    /// JSON Web Key.
    #[default]
    Jwk,

    /// PEM-encoded PKCS#8 / SubjectPublicKeyInfo.
    Pem,
}

/// A key with its metadata.
#[derive(Clone, Debug)]
pub struct Key {
    /// Canonical id.
    pub key_id: KeyId,

    /// Signature algorithm.
    pub algorithm: KeyAlgorithm,

    /// Backend representation the key was produced from.
    pub provider: CryptoProvider,

    material: KeyMaterial,
}

impl Key {
    /// Wrap key material with an id.
    #[must_use]
    pub fn new(key_id: KeyId, material: KeyMaterial) -> Self {
        let provider = match material {
            KeyMaterial::Native(_) => CryptoProvider::Native,
            KeyMaterial::RawBytes { .. } => CryptoProvider::Raw,
        };
        Self {
            key_id,
            algorithm: material.algorithm(),
            provider,
            material,
        }
    }

    /// The underlying key material.
    #[must_use]
    pub const fn material(&self) -> &KeyMaterial {
        &self.material
    }

    /// Canonical public key bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if an RSA key cannot be DER encoded.
    pub fn public_key_bytes(&self) -> Result<Vec<u8>> {
        self.material.public_key_bytes()
    }

    /// Canonical private key bytes, or `None` for a public-only key.
    ///
    /// # Errors
    ///
    /// Returns an error if an RSA key cannot be DER encoded.
    pub fn private_key_bytes(&self) -> Result<Option<Vec<u8>>> {
        self.material.private_key_bytes()
    }

    /// Returns `true` if the key holds private material.
    #[must_use]
    pub const fn has_private(&self) -> bool {
        self.material.has_private()
    }

    /// Native key handle for use with a signing library.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Err::InvalidKeyFormat`] if raw bytes do not
    /// decode to a valid key.
    pub fn native(&self) -> Result<NativeKeyPair> {
        self.material.native()
    }

    /// A copy of the key without private material.
    #[must_use]
    pub fn to_public(&self) -> Self {
        Self {
            material: self.material.to_public(),
            ..self.clone()
        }
    }

    /// Convert to a JWK with `kid` set to the key id.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Err::KeyNotFound`] if `key_type` is private
    /// and the key has no private material.
    pub fn to_jwk(&self, key_type: KeyType) -> Result<Jwk> {
        let mut jwk = self.native()?.to_jwk(key_type == KeyType::Private)?;
        jwk.kid = Some(self.key_id.to_string());
        Ok(jwk)
    }

    /// Convert to PEM.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Err::KeyNotFound`] if `key_type` is private
    /// and the key has no private material.
    pub fn to_pem(&self, key_type: KeyType) -> Result<String> {
        pem::encode(&self.native()?, key_type)
    }
}
