//! # Vercre SSI
//!
//! A self-sovereign identity toolkit: key management, DID creation and
//! resolution, and signing and verification of W3C Verifiable Credentials.
//!
//! * [`key`]: key generation, storage under aliases, conversion to and from
//!   JWK and PEM, signing and verification.
//! * [`did`]: DIDs for the `key`, `web`, `ebsi`, `jwk`, `iota` and `cheqd`
//!   methods, bound to keys in the key store.
//! * [`credential`]: the credential and presentation data model, builders
//!   and templates.
//! * [`proof`]: Linked-Data proofs and JWTs for credentials and
//!   presentations.
//!
//! Services are constructed explicitly and passed to their consumers:
//!
//! ```rust,no_run
//! use vercre_ssi::config::Config;
//! use vercre_ssi::did::DidMethod;
//! use vercre_ssi::proof::{CredentialService, ProofConfig};
//!
//! # async fn run(credential: &str) -> vercre_ssi::Result<()> {
//! let service = CredentialService::from_config(&Config::from_env()?)?;
//! let issuer = service.dids().create(DidMethod::Key, None, None).await?;
//! let signed = service.sign(credential, &ProofConfig::new(issuer)).await?;
//! assert!(service.verify(&signed).await?.verified);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod credential;
pub mod did;
pub mod error;
pub mod key;
pub mod proof;
pub mod provider;

pub use self::error::Error;

/// Result type used throughout the crate.
pub type Result<T, E = Error> = ::core::result::Result<T, E>;
