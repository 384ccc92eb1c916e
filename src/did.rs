//! # Decentralized Identifiers
//!
//! Creation and resolution of DIDs for the `key`, `web`, `ebsi`, `jwk`,
//! `iota` and `cheqd` methods.
//!
//! Documents for `did:key`, `did:jwk`, `did:web` and `did:ebsi` are composed
//! locally from key material. `did:web`, `did:ebsi` (v1), `did:iota` and
//! `did:cheqd` documents are fetched from the network or a ledger client when
//! resolved.
//!
//! See [DID resolution](https://www.w3.org/TR/did-core/#did-resolution) for
//! more.

mod document;
pub mod ebsi;
pub mod factory;
pub mod jwk;
pub mod key;
pub mod service;
mod url;
pub mod web;

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use self::document::*;
pub use self::factory::{DidOptions, EbsiVersion, Factory};
pub use self::service::DidService;
pub use self::url::DidUrl;
use crate::error::{Err, Error};

/// Multicodec prefix for an Ed25519 public key.
pub const ED25519_CODEC: [u8; 2] = [0xed, 0x01];

/// Multicodec prefix for an X25519 public key.
pub const X25519_CODEC: [u8; 2] = [0xec, 0x01];

/// Multicodec prefix for a compressed secp256k1 public key.
pub const SECP256K1_CODEC: [u8; 2] = [0xe7, 0x01];

/// Multicodec prefix for a compressed P-256 public key.
pub const P256_CODEC: [u8; 2] = [0x80, 0x24];

/// Multicodec prefix for a DER-encoded RSA public key.
pub const RSA_CODEC: [u8; 2] = [0x85, 0x24];

/// Multicodec prefix for the JCS of a public JWK (`jwk_jcs-pub`).
pub const JWK_JCS_PUB_CODEC: [u8; 3] = [0xd1, 0xd6, 0x03];

/// DID methods supported by this crate.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DidMethod {
    /// `did:key`
    #[default]
    Key,

    /// `did:web`
    Web,

    /// `did:ebsi`
    Ebsi,

    /// `did:jwk`
    Jwk,

    /// `did:iota`
    Iota,

    /// `did:cheqd`
    Cheqd,
}

impl FromStr for DidMethod {
    type Err = Error;

    /// Parse a string into a [`DidMethod`].
    ///
    /// # Errors
    ///
    /// Returns [`Err::UnsupportedMethod`] if the method is not supported.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "key" => Ok(Self::Key),
            "web" => Ok(Self::Web),
            "ebsi" => Ok(Self::Ebsi),
            "jwk" => Ok(Self::Jwk),
            "iota" => Ok(Self::Iota),
            "cheqd" => Ok(Self::Cheqd),
            _ => {
                tracing::error!("method not supported: {s}");
                Err(Err::UnsupportedMethod.into())
            }
        }
    }
}

impl Display for DidMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key => write!(f, "key"),
            Self::Web => write!(f, "web"),
            Self::Ebsi => write!(f, "ebsi"),
            Self::Jwk => write!(f, "jwk"),
            Self::Iota => write!(f, "iota"),
            Self::Cheqd => write!(f, "cheqd"),
        }
    }
}
