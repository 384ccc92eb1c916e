//! # Verifiable Credentials
//!
//! Data model for W3C Verifiable Credentials and Presentations, builders for
//! default credential shells, and a registry of credential templates.
//!
//! Credentials round-trip through JSON without losing unknown properties and
//! may alternatively be carried as compact JWTs, in which case the token is
//! kept alongside the decoded model.

mod builder;
mod model;
mod template;

pub use self::builder::{CredentialBuilder, PresentationBuilder};
pub use self::model::*;
pub(crate) use self::model::{from_iso, has_type, to_iso};
pub use self::template::TemplateService;

/// Base context of every credential and presentation.
pub const CREDENTIALS_CONTEXT: &str = "https://www.w3.org/2018/credentials/v1";

/// Type every credential carries.
pub const VC_TYPE: &str = "VerifiableCredential";

/// Type every presentation carries.
pub const VP_TYPE: &str = "VerifiablePresentation";
