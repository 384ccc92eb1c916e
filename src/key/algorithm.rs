//! # Key Algorithms

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Err, Error};

/// Signature algorithms supported for key generation, storage and signing.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub enum KeyAlgorithm {
    /// EdDSA over Curve25519.
    #[serde(rename = "EdDSA_Ed25519")]
    Ed25519,

    /// ECDSA over the secp256k1 curve.
    #[serde(rename = "ECDSA_Secp256k1")]
    Secp256k1,

    /// ECDSA over the NIST P-256 (secp256r1) curve.
    #[serde(rename = "ECDSA_Secp256r1")]
    Secp256r1,

    /// RSA with PKCS#1 v1.5 signatures.
    #[serde(rename = "RSA")]
    Rsa,
}

impl KeyAlgorithm {
    /// JWS `alg` value for signatures produced with this algorithm.
    #[must_use]
    pub const fn jws_algorithm(&self) -> &'static str {
        match self {
            Self::Ed25519 => "EdDSA",
            Self::Secp256k1 => "ES256K",
            Self::Secp256r1 => "ES256",
            Self::Rsa => "RS256",
        }
    }

    /// Map a JWS `alg` value to the key algorithm that produces it.
    ///
    /// # Errors
    ///
    /// Returns [`Err::UnsupportedAlgorithm`] for unrecognized values.
    pub fn from_jws_algorithm(alg: &str) -> crate::Result<Self> {
        match alg {
            "EdDSA" => Ok(Self::Ed25519),
            "ES256K" => Ok(Self::Secp256k1),
            "ES256" => Ok(Self::Secp256r1),
            "RS256" => Ok(Self::Rsa),
            _ => Err(Err::UnsupportedAlgorithm.into()),
        }
    }

    /// JWK `crv` value, where the algorithm is curve-based.
    #[must_use]
    pub const fn curve(&self) -> Option<&'static str> {
        match self {
            Self::Ed25519 => Some("Ed25519"),
            Self::Secp256k1 => Some("secp256k1"),
            Self::Secp256r1 => Some("P-256"),
            Self::Rsa => None,
        }
    }
}

impl Display for KeyAlgorithm {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ed25519 => write!(f, "EdDSA_Ed25519"),
            Self::Secp256k1 => write!(f, "ECDSA_Secp256k1"),
            Self::Secp256r1 => write!(f, "ECDSA_Secp256r1"),
            Self::Rsa => write!(f, "RSA"),
        }
    }
}

impl FromStr for KeyAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "eddsa_ed25519" | "ed25519" | "eddsa" => Ok(Self::Ed25519),
            "ecdsa_secp256k1" | "secp256k1" | "es256k" => Ok(Self::Secp256k1),
            "ecdsa_secp256r1" | "secp256r1" | "p-256" | "es256" => Ok(Self::Secp256r1),
            "rsa" | "rs256" => Ok(Self::Rsa),
            _ => {
                tracing::error!("unsupported key algorithm: {s}");
                Err(Err::UnsupportedAlgorithm.into())
            }
        }
    }
}

/// The backend representation a key was produced from.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum CryptoProvider {
    /// Key material held as a native key-pair handle.
    #[default]
    Native,

    /// Key material held as raw byte buffers.
    Raw,
}
