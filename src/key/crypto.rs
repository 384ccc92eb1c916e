//! # Crypto Service
//!
//! Algorithm-specific key generation, signing and verification. The service
//! is stateless: keys are passed in and returned by value.

use ecdsa::signature::{SignatureEncoding, Signer, Verifier};
use rand::rngs::OsRng;
use rsa::pkcs1v15;
use rsa::RsaPrivateKey;
use sha2::Sha256;

use super::{Key, KeyAlgorithm, KeyId, KeyMaterial, NativeKeyPair};
use crate::error::{Err, OrKind};
use crate::{tracerr, Result};

const RSA_BITS: usize = 2048;

/// Stateless cryptographic operations over [`Key`]s.
#[derive(Clone, Copy, Debug, Default)]
pub struct CryptoService;

impl CryptoService {
    /// Create a new crypto service.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Generate a new key pair with a random id.
    ///
    /// # Errors
    ///
    /// Returns [`Err::SigningError`] if RSA key generation fails.
    pub fn generate(&self, algorithm: KeyAlgorithm) -> Result<Key> {
        let native = match algorithm {
            KeyAlgorithm::Ed25519 => {
                let signing = ed25519_dalek::SigningKey::generate(&mut OsRng);
                NativeKeyPair::Ed25519 {
                    verifying: signing.verifying_key(),
                    signing: Some(signing),
                }
            }
            KeyAlgorithm::Secp256k1 => {
                let signing = k256::ecdsa::SigningKey::random(&mut OsRng);
                NativeKeyPair::Secp256k1 {
                    verifying: *signing.verifying_key(),
                    signing: Some(signing),
                }
            }
            KeyAlgorithm::Secp256r1 => {
                let signing = p256::ecdsa::SigningKey::random(&mut OsRng);
                NativeKeyPair::Secp256r1 {
                    verifying: *signing.verifying_key(),
                    signing: Some(signing),
                }
            }
            KeyAlgorithm::Rsa => {
                let private = RsaPrivateKey::new(&mut OsRng, RSA_BITS).or_kind(Err::SigningError)?;
                NativeKeyPair::Rsa {
                    public: private.to_public_key(),
                    private: Some(private),
                }
            }
        };

        let key = Key::new(KeyId::generate(), KeyMaterial::Native(native));
        tracing::debug!("generated {algorithm} key {}", key.key_id);
        Ok(key)
    }

    /// Sign `data` with the key's private half.
    ///
    /// ECDSA signatures are the fixed-size `r || s` encoding over a SHA-256
    /// digest. RSA signatures are PKCS#1 v1.5 with SHA-256.
    ///
    /// # Errors
    ///
    /// Returns [`Err::KeyNotFound`] if the key has no private material.
    pub fn sign(&self, key: &Key, data: &[u8]) -> Result<Vec<u8>> {
        let signature = match key.native()? {
            NativeKeyPair::Ed25519 {
                signing: Some(signing),
                ..
            } => signing.sign(data).to_vec(),
            NativeKeyPair::Secp256k1 {
                signing: Some(signing),
                ..
            } => {
                let sig: k256::ecdsa::Signature =
                    signing.try_sign(data).or_kind(Err::SigningError)?;
                sig.normalize_s().unwrap_or(sig).to_vec()
            }
            NativeKeyPair::Secp256r1 {
                signing: Some(signing),
                ..
            } => {
                let sig: p256::ecdsa::Signature =
                    signing.try_sign(data).or_kind(Err::SigningError)?;
                sig.normalize_s().unwrap_or(sig).to_vec()
            }
            NativeKeyPair::Rsa {
                private: Some(private),
                ..
            } => {
                let signer = pkcs1v15::SigningKey::<Sha256>::new(private);
                signer.try_sign(data).or_kind(Err::SigningError)?.to_vec()
            }
            _ => tracerr!(Err::KeyNotFound, "no private key for {}", key.key_id),
        };
        Ok(signature)
    }

    /// Verify a signature produced by [`CryptoService::sign`].
    ///
    /// A signature that cannot be decoded is reported as `false`.
    ///
    /// # Errors
    ///
    /// Returns [`Err::InvalidKeyFormat`] if the key material is invalid.
    pub fn verify(&self, key: &Key, data: &[u8], signature: &[u8]) -> Result<bool> {
        let verified = match key.native()? {
            NativeKeyPair::Ed25519 { verifying, .. } => {
                ed25519_dalek::Signature::from_slice(signature)
                    .is_ok_and(|sig| verifying.verify(data, &sig).is_ok())
            }
            NativeKeyPair::Secp256k1 { verifying, .. } => k256::ecdsa::Signature::from_slice(signature)
                .is_ok_and(|sig| verifying.verify(data, &sig).is_ok()),
            NativeKeyPair::Secp256r1 { verifying, .. } => p256::ecdsa::Signature::from_slice(signature)
                .is_ok_and(|sig| verifying.verify(data, &sig).is_ok()),
            NativeKeyPair::Rsa { public, .. } => {
                let verifier = pkcs1v15::VerifyingKey::<Sha256>::new(public);
                pkcs1v15::Signature::try_from(signature)
                    .is_ok_and(|sig| verifier.verify(data, &sig).is_ok())
            }
        };

        if !verified {
            tracing::debug!("signature did not verify for {}", key.key_id);
        }
        Ok(verified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_verify() {
        let crypto = CryptoService::new();

        for algorithm in [KeyAlgorithm::Ed25519, KeyAlgorithm::Secp256k1, KeyAlgorithm::Secp256r1] {
            let key = crypto.generate(algorithm).expect("should generate");
            let sig = crypto.sign(&key, b"hello").expect("should sign");

            assert!(crypto.verify(&key, b"hello", &sig).expect("should verify"));
            assert!(!crypto.verify(&key, b"goodbye", &sig).expect("should verify"));
            assert!(!crypto.verify(&key, b"hello", &sig[1..]).expect("should verify"));
        }
    }

    #[test]
    fn rsa_sign_verify() {
        let crypto = CryptoService::new();
        let key = crypto.generate(KeyAlgorithm::Rsa).expect("should generate");
        let sig = crypto.sign(&key, b"hello").expect("should sign");

        assert_eq!(sig.len(), 256);
        assert!(crypto.verify(&key.to_public(), b"hello", &sig).expect("should verify"));
    }

    #[test]
    fn public_key_cannot_sign() {
        let crypto = CryptoService::new();
        let key = crypto.generate(KeyAlgorithm::Ed25519).expect("should generate");

        let err = crypto.sign(&key.to_public(), b"hello").expect_err("should fail");
        assert!(err.is(Err::KeyNotFound));
    }

    #[test]
    fn ecdsa_signature_is_compact() {
        let crypto = CryptoService::new();
        let key = crypto.generate(KeyAlgorithm::Secp256k1).expect("should generate");
        let sig = crypto.sign(&key, b"data").expect("should sign");
        assert_eq!(sig.len(), 64);
    }
}
