//! # JSON Web Key
//!
//! A single JWK type covers the OKP, EC and RSA key types used by this crate.
//! See <https://www.rfc-editor.org/rfc/rfc7517> and
//! <https://www.rfc-editor.org/rfc/rfc7638> for thumbprints.

use base64ct::{Base64UrlUnpadded, Encoding};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};

use super::KeyAlgorithm;
use crate::error::Err;
use crate::{tracerr, Result};

/// JSON Web Key.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Jwk {
    /// Key type: `OKP`, `EC` or `RSA`.
    pub kty: String,

    /// Curve for `OKP` and `EC` keys.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,

    /// Intended signature algorithm.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,

    /// Intended use (`sig` or `enc`).
    #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
    pub use_: Option<String>,

    /// Key id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// Public key x-coordinate (EC) or public key (OKP).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,

    /// Public key y-coordinate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,

    /// RSA modulus.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,

    /// RSA public exponent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,

    /// Private scalar (EC, OKP) or private exponent (RSA).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d: Option<String>,

    /// RSA first prime factor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p: Option<String>,

    /// RSA second prime factor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
}

impl Jwk {
    /// Infer the key algorithm from the declared `alg`, falling back to
    /// `kty`/`crv`.
    ///
    /// # Errors
    ///
    /// Returns [`Err::InvalidKeyFormat`] if no supported algorithm matches.
    pub fn algorithm(&self) -> Result<KeyAlgorithm> {
        if let Some(alg) = &self.alg {
            if let Ok(algorithm) = KeyAlgorithm::from_jws_algorithm(alg) {
                return Ok(algorithm);
            }
        }
        match (self.kty.as_str(), self.crv.as_deref()) {
            ("OKP", Some("Ed25519")) => Ok(KeyAlgorithm::Ed25519),
            ("EC", Some("secp256k1")) => Ok(KeyAlgorithm::Secp256k1),
            ("EC", Some("P-256")) => Ok(KeyAlgorithm::Secp256r1),
            ("RSA", _) => Ok(KeyAlgorithm::Rsa),
            (kty, crv) => {
                tracerr!(Err::InvalidKeyFormat, "unsupported JWK type {kty} with curve {crv:?}")
            }
        }
    }

    /// A copy of the key with private members removed.
    #[must_use]
    pub fn public(&self) -> Self {
        Self {
            d: None,
            p: None,
            q: None,
            ..self.clone()
        }
    }

    /// Returns `true` if the key carries private material.
    #[must_use]
    pub const fn is_private(&self) -> bool {
        self.d.is_some()
    }

    /// Decode a base64url member, failing with [`Err::InvalidKeyFormat`] if it
    /// is missing.
    pub(crate) fn decode_member(value: Option<&String>, name: &str) -> Result<Vec<u8>> {
        let Some(value) = value else {
            tracerr!(Err::InvalidKeyFormat, "JWK is missing member '{name}'")
        };
        Ok(Base64UrlUnpadded::decode_vec(value)?)
    }

    /// JSON of the members required for a thumbprint, in canonical order.
    ///
    /// # Errors
    ///
    /// Returns [`Err::InvalidKeyFormat`] if a required member is missing.
    pub fn required_members(&self) -> Result<String> {
        let missing = || crate::Error::from(Err::InvalidKeyFormat);
        let members = match self.kty.as_str() {
            "EC" => json!({
                "crv": self.crv.as_ref().ok_or_else(missing)?,
                "kty": self.kty,
                "x": self.x.as_ref().ok_or_else(missing)?,
                "y": self.y.as_ref().ok_or_else(missing)?,
            }),
            "OKP" => json!({
                "crv": self.crv.as_ref().ok_or_else(missing)?,
                "kty": self.kty,
                "x": self.x.as_ref().ok_or_else(missing)?,
            }),
            "RSA" => json!({
                "e": self.e.as_ref().ok_or_else(missing)?,
                "kty": self.kty,
                "n": self.n.as_ref().ok_or_else(missing)?,
            }),
            kty => tracerr!(Err::InvalidKeyFormat, "unsupported JWK type: {kty}"),
        };
        Ok(serde_json_canonicalizer::to_string(&members)?)
    }

    /// SHA-256 thumbprint of the key as raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Err::InvalidKeyFormat`] if a required member is missing.
    pub fn thumbprint_bytes(&self) -> Result<Vec<u8>> {
        Ok(Sha256::digest(self.required_members()?.as_bytes()).to_vec())
    }

    /// SHA-256 thumbprint of the key, base64url encoded.
    ///
    /// # Errors
    ///
    /// Returns [`Err::InvalidKeyFormat`] if a required member is missing.
    pub fn thumbprint(&self) -> Result<String> {
        Ok(Base64UrlUnpadded::encode_string(&self.thumbprint_bytes()?))
    }
}
