//! # Key Service
//!
//! Entry point for key management. Composes the [`CryptoService`] with a
//! [`KeyStore`] so that every generated or imported key is persisted before
//! its id is returned.

use std::fmt::Write as _;
use std::sync::Arc;

use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use sha3::{Digest, Keccak256};

use super::jwk::Jwk;
use super::material::NativeKeyPair;
use super::{
    pem, CryptoService, InMemoryKeyStore, Key, KeyAlgorithm, KeyFormat, KeyId, KeyMaterial,
    KeyRecord, KeyStore, KeyType,
};
use crate::error::{Err, OrKind};
use crate::{tracerr, Result};

/// Key management facade.
#[derive(Clone, Debug)]
pub struct KeyService {
    crypto: CryptoService,
    store: Arc<dyn KeyStore>,
}

impl KeyService {
    /// Create a key service over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn KeyStore>) -> Self {
        Self {
            crypto: CryptoService::new(),
            store,
        }
    }

    /// Create a key service backed by a fresh in-memory store.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryKeyStore::new()))
    }

    /// The underlying crypto service.
    #[must_use]
    pub const fn crypto(&self) -> &CryptoService {
        &self.crypto
    }

    /// Generate and persist a new key.
    ///
    /// # Errors
    ///
    /// Returns an error if generation fails or the key cannot be stored.
    pub fn generate(&self, algorithm: KeyAlgorithm) -> Result<KeyId> {
        let key = self.crypto.generate(algorithm)?;
        self.store(&key)?;
        Ok(key.key_id)
    }

    /// Persist a key under its own id.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be encoded or stored.
    pub fn store(&self, key: &Key) -> Result<()> {
        self.store.store(KeyRecord::from_key(key)?)
    }

    /// Resolve an alias (or canonical id) to a key id.
    ///
    /// # Errors
    ///
    /// Returns [`Err::KeyNotFound`] if nothing is registered under `alias`.
    pub fn key_id(&self, alias: &str) -> Result<KeyId> {
        let Some(key_id) = self.store.key_id(alias)? else {
            tracerr!(Err::KeyNotFound, "no key for alias: {alias}")
        };
        Ok(key_id)
    }

    /// Returns `true` if a key is registered under `alias`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn has_key(&self, alias: &str) -> Result<bool> {
        Ok(self.store.key_id(alias)?.is_some())
    }

    /// Register an additional alias for a key.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub fn add_alias(&self, key_id: &KeyId, alias: &str) -> Result<()> {
        tracing::debug!("aliasing {key_id} as {alias}");
        self.store.add_alias(key_id, alias)
    }

    /// Load a key by alias.
    ///
    /// # Errors
    ///
    /// Returns [`Err::KeyNotFound`] if no key is registered under `alias`, or
    /// if the private key is requested and not held.
    pub fn load(&self, alias: &str, key_type: KeyType) -> Result<Key> {
        let key_id = self.key_id(alias)?;
        let Some(record) = self.store.load(&key_id)? else {
            tracerr!(Err::KeyNotFound, "key {key_id} is aliased but not stored")
        };
        record.to_key(key_type)
    }

    /// Export a key as a JWK or PEM string.
    ///
    /// # Errors
    ///
    /// Returns [`Err::KeyNotFound`] if the key (or requested private half) is
    /// not available.
    pub fn export(&self, alias: &str, format: KeyFormat, key_type: KeyType) -> Result<String> {
        let key = self.load(alias, key_type)?;
        match format {
            KeyFormat::Jwk => Ok(serde_json::to_string(&self.to_jwk(&key, key_type)?)?),
            KeyFormat::Pem => self.to_pem(&key, key_type),
        }
    }

    /// Import a serialized key and persist it.
    ///
    /// Accepts a JWK (JSON object) or a PEM document. A JWK `kid` is used as
    /// the key id; otherwise a new id is generated.
    ///
    /// # Errors
    ///
    /// Returns [`Err::InvalidKeyFormat`] if the input is not a recognizable
    /// key.
    pub fn import_key(&self, serialized: &str) -> Result<KeyId> {
        let serialized = serialized.trim();

        let key = if serialized.starts_with('{') {
            let jwk: Jwk = serde_json::from_str(serialized).or_kind(Err::InvalidKeyFormat)?;
            Self::key_from_jwk(&jwk)?
        } else if serialized.contains("-----BEGIN") {
            Key::new(KeyId::generate(), KeyMaterial::Native(pem::decode(serialized)?))
        } else {
            tracerr!(Err::InvalidKeyFormat, "key is neither JWK nor PEM")
        };

        self.store(&key)?;
        tracing::debug!("imported {} key {}", key.algorithm, key.key_id);
        Ok(key.key_id)
    }

    /// Build a key from a JWK without persisting it.
    ///
    /// Ed25519 and secp256k1 keys are held as raw bytes. The JWK is still
    /// decoded natively to validate it.
    ///
    /// # Errors
    ///
    /// Returns [`Err::InvalidKeyFormat`] if the JWK does not describe a valid
    /// key.
    pub fn key_from_jwk(jwk: &Jwk) -> Result<Key> {
        let native = NativeKeyPair::from_jwk(jwk)?;
        let key_id = jwk.kid.clone().map_or_else(KeyId::generate, KeyId::from);

        let material = match native.algorithm() {
            KeyAlgorithm::Ed25519 | KeyAlgorithm::Secp256k1 => KeyMaterial::RawBytes {
                algorithm: native.algorithm(),
                public: native.public_key_bytes()?,
                private: native.private_key_bytes()?,
            },
            KeyAlgorithm::Secp256r1 | KeyAlgorithm::Rsa => KeyMaterial::Native(native),
        };
        Ok(Key::new(key_id, material))
    }

    /// Convert a key to a JWK.
    ///
    /// # Errors
    ///
    /// Returns [`Err::KeyNotFound`] if the private half is requested and not
    /// held.
    pub fn to_jwk(&self, key: &Key, key_type: KeyType) -> Result<Jwk> {
        key.to_jwk(key_type)
    }

    /// Convert a key to PEM.
    ///
    /// # Errors
    ///
    /// Returns [`Err::KeyNotFound`] if the private half is requested and not
    /// held.
    pub fn to_pem(&self, key: &Key, key_type: KeyType) -> Result<String> {
        key.to_pem(key_type)
    }

    /// Convert an ECDSA key to an EC JWK.
    ///
    /// # Errors
    ///
    /// Returns [`Err::UnsupportedOperationKind`] for non-ECDSA keys.
    pub fn to_secp256_jwk(&self, key: &Key, key_type: KeyType) -> Result<Jwk> {
        if !matches!(key.algorithm, KeyAlgorithm::Secp256k1 | KeyAlgorithm::Secp256r1) {
            tracerr!(Err::UnsupportedOperationKind, "{} key is not an EC key", key.algorithm);
        }
        key.to_jwk(key_type)
    }

    /// Convert an Ed25519 key to an OKP JWK.
    ///
    /// # Errors
    ///
    /// Returns [`Err::UnsupportedOperationKind`] for non-Ed25519 keys.
    pub fn to_ed25519_jwk(&self, key: &Key, key_type: KeyType) -> Result<Jwk> {
        if key.algorithm != KeyAlgorithm::Ed25519 {
            tracerr!(Err::UnsupportedOperationKind, "{} key is not an Ed25519 key", key.algorithm);
        }
        key.to_jwk(key_type)
    }

    /// Sign `data` with the private key registered under `alias`.
    ///
    /// # Errors
    ///
    /// Returns [`Err::KeyNotFound`] if the private key is not available.
    pub fn sign(&self, alias: &str, data: &[u8]) -> Result<Vec<u8>> {
        let key = self.load(alias, KeyType::Private)?;
        self.crypto.sign(&key, data)
    }

    /// Verify a signature against the key registered under `alias`.
    ///
    /// # Errors
    ///
    /// Returns [`Err::KeyNotFound`] if no key is registered under `alias`.
    pub fn verify(&self, alias: &str, data: &[u8], signature: &[u8]) -> Result<bool> {
        let key = self.load(alias, KeyType::Public)?;
        self.crypto.verify(&key, data, signature)
    }

    /// Delete the key registered under `alias`, with all its aliases.
    ///
    /// # Errors
    ///
    /// Returns [`Err::KeyNotFound`] if no key is registered under `alias`.
    pub fn delete(&self, alias: &str) -> Result<()> {
        let key_id = self.key_id(alias)?;
        tracing::debug!("deleting key {key_id}");
        self.store.delete(&key_id)
    }

    /// Public halves of all stored keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn list_keys(&self) -> Result<Vec<Key>> {
        let mut keys = vec![];
        for key_id in self.store.list()? {
            if let Some(record) = self.store.load(&key_id)? {
                keys.push(record.to_key(KeyType::Public)?);
            }
        }
        Ok(keys)
    }

    /// EIP-55 checksummed Ethereum address of a secp256k1 key.
    ///
    /// # Errors
    ///
    /// Returns [`Err::UnsupportedAlgorithm`] for keys of other algorithms.
    pub fn get_ethereum_address(&self, alias: &str) -> Result<String> {
        let key = self.load(alias, KeyType::Public)?;
        let NativeKeyPair::Secp256k1 { verifying, .. } = key.native()? else {
            tracerr!(Err::UnsupportedAlgorithm, "{} key has no Ethereum address", key.algorithm)
        };
        Ok(ethereum_address(&verifying))
    }

    /// Sign the Keccak-256 digest of `data` as an Ethereum transaction
    /// signature (`r || s`).
    ///
    /// # Errors
    ///
    /// Returns [`Err::UnsupportedAlgorithm`] for keys other than secp256k1.
    pub fn sign_ethereum(&self, alias: &str, data: &[u8]) -> Result<Vec<u8>> {
        let key = self.load(alias, KeyType::Private)?;
        let NativeKeyPair::Secp256k1 {
            signing: Some(signing),
            ..
        } = key.native()?
        else {
            tracerr!(Err::UnsupportedAlgorithm, "{} key cannot sign Ethereum data", key.algorithm)
        };
        let digest = Keccak256::digest(data);
        let (signature, _) =
            signing.sign_prehash_recoverable(&digest).or_kind(Err::SigningError)?;
        Ok(signature.to_bytes().to_vec())
    }

    /// Find the recovery id (0 to 3) that recovers the key's address from a
    /// signature over the Keccak-256 digest of `data`.
    ///
    /// The signature may be the 64-byte `r || s` encoding or DER.
    ///
    /// # Errors
    ///
    /// Returns [`Err::IrrecoverableSignature`] if no candidate recovers the
    /// key's address.
    pub fn get_recovery_id(&self, alias: &str, data: &[u8], signature: &[u8]) -> Result<u8> {
        let address = self.get_ethereum_address(alias)?;
        let signature = Signature::from_slice(signature)
            .or_else(|_| Signature::from_der(signature))
            .or_kind(Err::IrrecoverableSignature)?;
        let digest = Keccak256::digest(data);

        for id in 0..4 {
            let Some(recovery_id) = RecoveryId::from_byte(id) else {
                continue;
            };
            let Ok(recovered) = VerifyingKey::recover_from_prehash(&digest, &signature, recovery_id)
            else {
                continue;
            };
            if ethereum_address(&recovered) == address {
                return Ok(id);
            }
        }

        tracerr!(Err::IrrecoverableSignature, "signature does not recover the address of {alias}")
    }
}

// Last 20 bytes of Keccak-256 over the uncompressed point (without prefix),
// hex encoded with the EIP-55 mixed-case checksum.
fn ethereum_address(verifying: &VerifyingKey) -> String {
    let point = verifying.to_encoded_point(false);
    let hash = Keccak256::digest(&point.as_bytes()[1..]);
    let lower = hex(&hash[12..]);
    let checksum = Keccak256::digest(lower.as_bytes());

    let mut address = String::from("0x");
    for (i, c) in lower.chars().enumerate() {
        let nibble = if i % 2 == 0 { checksum[i / 2] >> 4 } else { checksum[i / 2] & 0x0f };
        if c.is_ascii_alphabetic() && nibble >= 8 {
            address.push(c.to_ascii_uppercase());
        } else {
            address.push(c);
        }
    }
    address
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_load_export() {
        let service = KeyService::in_memory();

        for (algorithm, kty, crv) in [
            (KeyAlgorithm::Ed25519, "OKP", Some("Ed25519")),
            (KeyAlgorithm::Secp256k1, "EC", Some("secp256k1")),
            (KeyAlgorithm::Secp256r1, "EC", Some("P-256")),
            (KeyAlgorithm::Rsa, "RSA", None),
        ] {
            let key_id = service.generate(algorithm).expect("should generate");
            let key = service.load(key_id.as_str(), KeyType::Private).expect("should load");
            assert_eq!(key.algorithm, algorithm);

            let exported =
                service.export(key_id.as_str(), KeyFormat::Jwk, KeyType::Private).expect("should export");
            let jwk: Jwk = serde_json::from_str(&exported).expect("should parse");
            assert_eq!(jwk.kty, kty);
            assert_eq!(jwk.crv.as_deref(), crv);
            assert!(jwk.d.is_some());
            assert_eq!(jwk.algorithm().expect("should infer"), algorithm);
        }
    }

    #[test]
    fn missing_alias() {
        let service = KeyService::in_memory();
        let err = service.load("nope", KeyType::Public).expect_err("should fail");
        assert!(err.is(Err::KeyNotFound));
    }

    #[test]
    fn import_jwk_uses_kid() {
        let service = KeyService::in_memory();
        let jwk = r#"{"kty":"OKP","crv":"Ed25519","kid":"bob-key","x":"11qYAYKxCrfVS_7TyWQHOg7hcvPapiMlrwIaaPcHURo","d":"nWGxne_9WmC6hEr0kuwsxERJxWl7MmkZcDusAxyuf2A"}"#;

        let key_id = service.import_key(jwk).expect("should import");
        assert_eq!(key_id.as_str(), "bob-key");

        let key = service.load("bob-key", KeyType::Private).expect("should load");
        assert_eq!(key.provider, crate::key::CryptoProvider::Raw);
        assert!(key.has_private());
    }

    #[test]
    fn import_garbage() {
        let service = KeyService::in_memory();
        let err = service.import_key("not a key").expect_err("should fail");
        assert!(err.is(Err::InvalidKeyFormat));

        let err = service.import_key(r#"{"kty":"oct","k":"abc"}"#).expect_err("should fail");
        assert!(err.is(Err::InvalidKeyFormat));
    }

    #[test]
    fn pem_round_trip() {
        let service = KeyService::in_memory();

        for algorithm in [KeyAlgorithm::Ed25519, KeyAlgorithm::Secp256k1, KeyAlgorithm::Secp256r1, KeyAlgorithm::Rsa] {
            let key_id = service.generate(algorithm).expect("should generate");
            let original = service.load(key_id.as_str(), KeyType::Public).expect("should load");

            for key_type in [KeyType::Private, KeyType::Public] {
                let pem = service.export(key_id.as_str(), KeyFormat::Pem, key_type).expect("should export");
                let imported = service.import_key(&pem).expect("should import");
                let key = service.load(imported.as_str(), key_type).expect("should load");

                assert_eq!(key.algorithm, algorithm);
                assert_eq!(
                    key.public_key_bytes().expect("should encode"),
                    original.public_key_bytes().expect("should encode"),
                    "{algorithm} {key_type:?}"
                );
            }
        }
    }

    #[test]
    fn typed_jwk_conversions() {
        let service = KeyService::in_memory();
        let key_id = service.generate(KeyAlgorithm::Ed25519).expect("should generate");
        let key = service.load(key_id.as_str(), KeyType::Public).expect("should load");

        assert!(service.to_ed25519_jwk(&key, KeyType::Public).is_ok());
        let err = service.to_secp256_jwk(&key, KeyType::Public).expect_err("should fail");
        assert!(err.is(Err::UnsupportedOperationKind));

        let err = service.to_jwk(&key, KeyType::Private).expect_err("should fail");
        assert!(err.is(Err::KeyNotFound));
    }

    #[test]
    fn ethereum_address_format() {
        let service = KeyService::in_memory();
        let key_id = service.generate(KeyAlgorithm::Secp256k1).expect("should generate");

        let address = service.get_ethereum_address(key_id.as_str()).expect("should derive");
        assert_eq!(address.len(), 42);
        assert!(address.starts_with("0x"));

        let ed = service.generate(KeyAlgorithm::Ed25519).expect("should generate");
        let err = service.get_ethereum_address(ed.as_str()).expect_err("should fail");
        assert!(err.is(Err::UnsupportedAlgorithm));
    }

    // Private key 1 has a well-known address.
    #[test]
    fn ethereum_address_vector() {
        let signing = k256::ecdsa::SigningKey::from_slice(&{
            let mut one = [0u8; 32];
            one[31] = 1;
            one
        })
        .expect("should build");
        assert_eq!(
            ethereum_address(signing.verifying_key()),
            "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf"
        );
    }

    #[test]
    fn recovery_id() {
        let service = KeyService::in_memory();
        let key_id = service.generate(KeyAlgorithm::Secp256k1).expect("should generate");
        let other = service.generate(KeyAlgorithm::Secp256k1).expect("should generate");

        let data = b"Test data";
        let signature = service.sign_ethereum(key_id.as_str(), data).expect("should sign");

        let id = service.get_recovery_id(key_id.as_str(), data, &signature).expect("should recover");
        assert!(id < 4);

        let err = service.get_recovery_id(other.as_str(), data, &signature).expect_err("should fail");
        assert!(err.is(Err::IrrecoverableSignature));

        let err = service.get_recovery_id(key_id.as_str(), b"Bad data", &signature).expect_err("should fail");
        assert!(err.is(Err::IrrecoverableSignature));
    }

    #[test]
    fn delete_removes_aliases() {
        let service = KeyService::in_memory();
        let key_id = service.generate(KeyAlgorithm::Ed25519).expect("should generate");
        service.add_alias(&key_id, "did:example:123").expect("should alias");

        service.delete("did:example:123").expect("should delete");
        assert!(!service.has_key(key_id.as_str()).expect("should read"));
        assert!(service.list_keys().expect("should list").is_empty());
    }
}
