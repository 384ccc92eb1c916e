//! # Key Material
//!
//! Keys are held either as native key-pair handles from the RustCrypto and
//! dalek crates, or as raw byte buffers. Callers use the accessors on
//! [`KeyMaterial`] and never branch on the representation: raw bytes are
//! converted to a native handle at the point a library needs one.
//!
//! Canonical byte encodings:
//!
//! | Algorithm | Public                  | Private           |
//! |-----------|-------------------------|-------------------|
//! | Ed25519   | 32-byte key             | 32-byte seed      |
//! | secp256k1 | 33-byte compressed SEC1 | 32-byte scalar    |
//! | P-256     | 33-byte compressed SEC1 | 32-byte scalar    |
//! | RSA       | PKCS#1 DER              | PKCS#8 DER        |

use base64ct::{Base64UrlUnpadded, Encoding};
use rsa::pkcs1::{DecodeRsaPublicKey, EncodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey};
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::{BigUint, RsaPrivateKey, RsaPublicKey};

use super::jwk::Jwk;
use super::KeyAlgorithm;
use crate::error::{Err, OrKind};
use crate::{tracerr, Result};

/// Key material in one of its two representations.
#[derive(Clone, Debug)]
pub enum KeyMaterial {
    /// A native key pair (or public key only).
    Native(NativeKeyPair),

    /// Canonical byte encodings of the key.
    RawBytes {
        /// Algorithm the bytes belong to.
        algorithm: KeyAlgorithm,

        /// Public key bytes.
        public: Vec<u8>,

        /// Private key bytes, if held.
        private: Option<Vec<u8>>,
    },
}

impl KeyMaterial {
    /// The key's algorithm.
    #[must_use]
    pub const fn algorithm(&self) -> KeyAlgorithm {
        match self {
            Self::Native(native) => native.algorithm(),
            Self::RawBytes { algorithm, .. } => *algorithm,
        }
    }

    /// Canonical public key bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if an RSA key cannot be DER encoded.
    pub fn public_key_bytes(&self) -> Result<Vec<u8>> {
        match self {
            Self::Native(native) => native.public_key_bytes(),
            Self::RawBytes { public, .. } => Ok(public.clone()),
        }
    }

    /// Canonical private key bytes, or `None` for a public-only key.
    ///
    /// # Errors
    ///
    /// Returns an error if an RSA key cannot be DER encoded.
    pub fn private_key_bytes(&self) -> Result<Option<Vec<u8>>> {
        match self {
            Self::Native(native) => native.private_key_bytes(),
            Self::RawBytes { private, .. } => Ok(private.clone()),
        }
    }

    /// Returns `true` if private material is held.
    #[must_use]
    pub const fn has_private(&self) -> bool {
        match self {
            Self::Native(native) => native.has_private(),
            Self::RawBytes { private, .. } => private.is_some(),
        }
    }

    /// Native key pair for use with a signing library.
    ///
    /// # Errors
    ///
    /// Returns [`Err::InvalidKeyFormat`] if raw bytes do not decode to a valid
    /// key.
    pub fn native(&self) -> Result<NativeKeyPair> {
        match self {
            Self::Native(native) => Ok(native.clone()),
            Self::RawBytes {
                algorithm,
                public,
                private,
            } => NativeKeyPair::from_bytes(*algorithm, public, private.as_deref()),
        }
    }

    /// A copy with any private material removed.
    #[must_use]
    pub fn to_public(&self) -> Self {
        match self {
            Self::Native(native) => Self::Native(native.to_public()),
            Self::RawBytes {
                algorithm, public, ..
            } => Self::RawBytes {
                algorithm: *algorithm,
                public: public.clone(),
                private: None,
            },
        }
    }
}

/// Native key handles.
#[derive(Clone, Debug)]
pub enum NativeKeyPair {
    /// Ed25519 key pair.
    Ed25519 {
        /// Public key.
        verifying: ed25519_dalek::VerifyingKey,
        /// Private key.
        signing: Option<ed25519_dalek::SigningKey>,
    },

    /// secp256k1 key pair.
    Secp256k1 {
        /// Public key.
        verifying: k256::ecdsa::VerifyingKey,
        /// Private key.
        signing: Option<k256::ecdsa::SigningKey>,
    },

    /// P-256 key pair.
    Secp256r1 {
        /// Public key.
        verifying: p256::ecdsa::VerifyingKey,
        /// Private key.
        signing: Option<p256::ecdsa::SigningKey>,
    },

    /// RSA key pair.
    Rsa {
        /// Public key.
        public: RsaPublicKey,
        /// Private key.
        private: Option<RsaPrivateKey>,
    },
}

impl NativeKeyPair {
    /// The key's algorithm.
    #[must_use]
    pub const fn algorithm(&self) -> KeyAlgorithm {
        match self {
            Self::Ed25519 { .. } => KeyAlgorithm::Ed25519,
            Self::Secp256k1 { .. } => KeyAlgorithm::Secp256k1,
            Self::Secp256r1 { .. } => KeyAlgorithm::Secp256r1,
            Self::Rsa { .. } => KeyAlgorithm::Rsa,
        }
    }

    /// Returns `true` if the private key is held.
    #[must_use]
    pub const fn has_private(&self) -> bool {
        match self {
            Self::Ed25519 { signing, .. } => signing.is_some(),
            Self::Secp256k1 { signing, .. } => signing.is_some(),
            Self::Secp256r1 { signing, .. } => signing.is_some(),
            Self::Rsa { private, .. } => private.is_some(),
        }
    }

    /// A copy holding only the public key.
    #[must_use]
    pub fn to_public(&self) -> Self {
        match self {
            Self::Ed25519 { verifying, .. } => Self::Ed25519 {
                verifying: *verifying,
                signing: None,
            },
            Self::Secp256k1 { verifying, .. } => Self::Secp256k1 {
                verifying: *verifying,
                signing: None,
            },
            Self::Secp256r1 { verifying, .. } => Self::Secp256r1 {
                verifying: *verifying,
                signing: None,
            },
            Self::Rsa { public, .. } => Self::Rsa {
                public: public.clone(),
                private: None,
            },
        }
    }

    /// Canonical public key bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if an RSA key cannot be DER encoded.
    pub fn public_key_bytes(&self) -> Result<Vec<u8>> {
        match self {
            Self::Ed25519 { verifying, .. } => Ok(verifying.to_bytes().to_vec()),
            Self::Secp256k1 { verifying, .. } => {
                Ok(verifying.to_encoded_point(true).as_bytes().to_vec())
            }
            Self::Secp256r1 { verifying, .. } => {
                Ok(verifying.to_encoded_point(true).as_bytes().to_vec())
            }
            Self::Rsa { public, .. } => {
                Ok(public.to_pkcs1_der().or_kind(Err::InvalidKeyFormat)?.as_bytes().to_vec())
            }
        }
    }

    /// Canonical private key bytes, or `None` for a public-only key.
    ///
    /// # Errors
    ///
    /// Returns an error if an RSA key cannot be DER encoded.
    pub fn private_key_bytes(&self) -> Result<Option<Vec<u8>>> {
        let bytes = match self {
            Self::Ed25519 { signing, .. } => signing.as_ref().map(|s| s.to_bytes().to_vec()),
            Self::Secp256k1 { signing, .. } => signing.as_ref().map(|s| s.to_bytes().to_vec()),
            Self::Secp256r1 { signing, .. } => signing.as_ref().map(|s| s.to_bytes().to_vec()),
            Self::Rsa { private, .. } => match private {
                Some(private) => {
                    let der = private.to_pkcs8_der().or_kind(Err::InvalidKeyFormat)?;
                    Some(der.as_bytes().to_vec())
                }
                None => None,
            },
        };
        Ok(bytes)
    }

    /// Rebuild a native key from canonical byte encodings.
    ///
    /// The private bytes for Ed25519 may be either the bare 32-byte seed or
    /// the seed still wrapped in its PKCS#8 OCTET STRING.
    ///
    /// # Errors
    ///
    /// Returns [`Err::InvalidKeyFormat`] if the bytes are not a valid key, or
    /// if the public and private parts do not belong together.
    pub fn from_bytes(algorithm: KeyAlgorithm, public: &[u8], private: Option<&[u8]>) -> Result<Self> {
        let native = match algorithm {
            KeyAlgorithm::Ed25519 => {
                let signing =
                    private.map(|d| ed25519_scalar(d).map(|s| ed25519_dalek::SigningKey::from_bytes(&s)));
                let signing = signing.transpose()?;
                let verifying = match &signing {
                    Some(s) if public.is_empty() => s.verifying_key(),
                    _ => ed25519_verifying_key(public)?,
                };
                Self::Ed25519 { verifying, signing }
            }
            KeyAlgorithm::Secp256k1 => {
                let signing =
                    private.map(k256::ecdsa::SigningKey::from_slice).transpose().or_kind(Err::InvalidKeyFormat)?;
                let verifying = match &signing {
                    Some(s) if public.is_empty() => *s.verifying_key(),
                    _ => k256::ecdsa::VerifyingKey::from_sec1_bytes(public)
                        .or_kind(Err::InvalidKeyFormat)?,
                };
                Self::Secp256k1 { verifying, signing }
            }
            KeyAlgorithm::Secp256r1 => {
                let signing =
                    private.map(p256::ecdsa::SigningKey::from_slice).transpose().or_kind(Err::InvalidKeyFormat)?;
                let verifying = match &signing {
                    Some(s) if public.is_empty() => *s.verifying_key(),
                    _ => p256::ecdsa::VerifyingKey::from_sec1_bytes(public)
                        .or_kind(Err::InvalidKeyFormat)?,
                };
                Self::Secp256r1 { verifying, signing }
            }
            KeyAlgorithm::Rsa => {
                let private =
                    private.map(RsaPrivateKey::from_pkcs8_der).transpose().or_kind(Err::InvalidKeyFormat)?;
                let public = match &private {
                    Some(p) if public.is_empty() => p.to_public_key(),
                    _ => RsaPublicKey::from_pkcs1_der(public).or_kind(Err::InvalidKeyFormat)?,
                };
                Self::Rsa { public, private }
            }
        };

        native.check_pair()?;
        Ok(native)
    }

    // Private and public halves must belong to the same key.
    fn check_pair(&self) -> Result<()> {
        let matches = match self {
            Self::Ed25519 {
                verifying,
                signing: Some(signing),
            } => signing.verifying_key() == *verifying,
            Self::Secp256k1 {
                verifying,
                signing: Some(signing),
            } => signing.verifying_key() == verifying,
            Self::Secp256r1 {
                verifying,
                signing: Some(signing),
            } => signing.verifying_key() == verifying,
            Self::Rsa {
                public,
                private: Some(private),
            } => private.to_public_key() == *public,
            _ => true,
        };
        if !matches {
            tracerr!(Err::InvalidKeyFormat, "public key does not match private key");
        }
        Ok(())
    }

    /// Convert to a JWK, including private members when requested and held.
    ///
    /// # Errors
    ///
    /// Returns [`Err::KeyNotFound`] if private members are requested but the
    /// private key is not held.
    pub fn to_jwk(&self, include_private: bool) -> Result<Jwk> {
        if include_private && !self.has_private() {
            tracerr!(Err::KeyNotFound, "private key is not available");
        }
        let algorithm = self.algorithm();

        let mut jwk = Jwk {
            crv: algorithm.curve().map(ToString::to_string),
            alg: Some(algorithm.jws_algorithm().to_string()),
            use_: Some("sig".to_string()),
            ..Jwk::default()
        };

        match self {
            Self::Ed25519 { verifying, signing } => {
                jwk.kty = "OKP".to_string();
                jwk.x = Some(encode(verifying.as_bytes()));
                if include_private {
                    jwk.d = signing.as_ref().map(|s| encode(s.as_bytes()));
                }
            }
            Self::Secp256k1 { verifying, signing } => {
                let point = verifying.to_encoded_point(false);
                jwk.kty = "EC".to_string();
                jwk.x = point.x().map(|x| encode(x));
                jwk.y = point.y().map(|y| encode(y));
                if include_private {
                    jwk.d = signing.as_ref().map(|s| encode(&s.to_bytes()));
                }
            }
            Self::Secp256r1 { verifying, signing } => {
                let point = verifying.to_encoded_point(false);
                jwk.kty = "EC".to_string();
                jwk.x = point.x().map(|x| encode(x));
                jwk.y = point.y().map(|y| encode(y));
                if include_private {
                    jwk.d = signing.as_ref().map(|s| encode(&s.to_bytes()));
                }
            }
            Self::Rsa { public, private } => {
                jwk.kty = "RSA".to_string();
                jwk.n = Some(encode(&public.n().to_bytes_be()));
                jwk.e = Some(encode(&public.e().to_bytes_be()));
                if let (true, Some(private)) = (include_private, private) {
                    jwk.d = Some(encode(&private.d().to_bytes_be()));
                    if let [p, q, ..] = private.primes() {
                        jwk.p = Some(encode(&p.to_bytes_be()));
                        jwk.q = Some(encode(&q.to_bytes_be()));
                    }
                }
            }
        }
        Ok(jwk)
    }

    /// Build a native key from a JWK.
    ///
    /// # Errors
    ///
    /// Returns [`Err::InvalidKeyFormat`] if the JWK is incomplete or does not
    /// describe a valid key.
    pub fn from_jwk(jwk: &Jwk) -> Result<Self> {
        let algorithm = jwk.algorithm()?;
        let d = jwk.d.as_ref().map(|d| Jwk::decode_member(Some(d), "d")).transpose()?;

        match algorithm {
            KeyAlgorithm::Ed25519 => {
                let x = Jwk::decode_member(jwk.x.as_ref(), "x")?;
                Self::from_bytes(algorithm, &x, d.as_deref())
            }
            KeyAlgorithm::Secp256k1 | KeyAlgorithm::Secp256r1 => {
                let mut sec1 = vec![0x04];
                sec1.extend(Jwk::decode_member(jwk.x.as_ref(), "x")?);
                sec1.extend(Jwk::decode_member(jwk.y.as_ref(), "y")?);
                Self::from_bytes(algorithm, &sec1, d.as_deref())
            }
            KeyAlgorithm::Rsa => {
                let n = BigUint::from_bytes_be(&Jwk::decode_member(jwk.n.as_ref(), "n")?);
                let e = BigUint::from_bytes_be(&Jwk::decode_member(jwk.e.as_ref(), "e")?);
                let public = RsaPublicKey::new(n.clone(), e.clone()).or_kind(Err::InvalidKeyFormat)?;
                let private = match d {
                    Some(d) => {
                        let p = BigUint::from_bytes_be(&Jwk::decode_member(jwk.p.as_ref(), "p")?);
                        let q = BigUint::from_bytes_be(&Jwk::decode_member(jwk.q.as_ref(), "q")?);
                        let private =
                            RsaPrivateKey::from_components(n, e, BigUint::from_bytes_be(&d), vec![p, q])
                                .or_kind(Err::InvalidKeyFormat)?;
                        Some(private)
                    }
                    None => None,
                };
                let native = Self::Rsa { public, private };
                native.check_pair()?;
                Ok(native)
            }
        }
    }
}

/// Extract the 32-byte Ed25519 seed from private key bytes.
///
/// Some encoders hand back the PKCS#8 `privateKey` field still wrapped in its
/// inner OCTET STRING (`04 20 || seed`), so the wrapper is removed when
/// present.
///
/// # Errors
///
/// Returns [`Err::InvalidKeyFormat`] if no 32-byte seed can be found.
pub fn ed25519_scalar(bytes: &[u8]) -> Result<[u8; 32]> {
    let seed = if bytes.len() > 32 && bytes[0] == 0x04 && bytes[1] == 0x20 {
        bytes.get(2..34).unwrap_or_default()
    } else {
        bytes
    };
    let Ok(seed) = <[u8; 32]>::try_from(seed) else {
        tracerr!(Err::InvalidKeyFormat, "Ed25519 private key is {} bytes, expected 32", seed.len())
    };
    Ok(seed)
}

fn encode(bytes: &[u8]) -> String {
    Base64UrlUnpadded::encode_string(bytes)
}

fn ed25519_verifying_key(bytes: &[u8]) -> Result<ed25519_dalek::VerifyingKey> {
    let Ok(bytes) = <[u8; 32]>::try_from(bytes) else {
        tracerr!(Err::InvalidKeyFormat, "Ed25519 public key is {} bytes, expected 32", bytes.len())
    };
    ed25519_dalek::VerifyingKey::from_bytes(&bytes).or_kind(Err::InvalidKeyFormat)
}
