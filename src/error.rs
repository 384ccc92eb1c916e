//! # Errors
//!
//! Error types used across key management, DID handling and credential
//! proofs. Expected failure modes are reported as an [`Err`] kind wrapped in
//! an [`Error`] that carries additional context.

use std::fmt::Display;

use thiserror::Error;

/// Simplify creation of errors with tracing.
///
/// # Example
/// ```
/// use vercre_ssi::error::Err;
/// use vercre_ssi::{tracerr, Result};
///
/// fn with_msg() -> Result<()> {
///     tracerr!(Err::KeyNotFound, "no key for alias: {}", "abc")
/// }
///
/// fn no_msg() -> Result<()> {
///     tracerr!(Err::UnsupportedMethod)
/// }
/// ```
#[macro_export]
macro_rules! tracerr {
    // with context
    ($code:expr, $($msg:tt)*) => {
        {
        use $crate::error::Context as _;
        tracing::error!($($msg)*);
        return Err($code).context(format!($($msg)*));
        }
    };
    // no context
    ($code:expr) => {
        {
        tracing::error!("{}", $code);
        return Err($code.into());
        }
    }
}

/// Public error type.
#[derive(Error, Debug)]
#[error(transparent)]
pub struct Error(#[from] anyhow::Error);

impl Error {
    /// Render the error as a JSON object with the error kind and its
    /// description.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "error": self.0.root_cause().to_string(),
            "error_description": self.to_string(),
        })
    }

    /// Returns true if `err` is the kind held by this error object.
    #[must_use]
    pub fn is(&self, err: Err) -> bool {
        self.kind() == Some(err)
    }

    /// The typed error kind, if the error originated from one.
    #[must_use]
    pub fn kind(&self) -> Option<Err> {
        self.0.downcast_ref::<Err>().copied()
    }
}

/// Typed error kinds.
#[derive(Clone, Copy, Error, Debug, PartialEq, Eq)]
pub enum Err {
    /// The key algorithm is not one of the supported algorithms, or is not
    /// valid for the requested operation.
    #[error("unsupported_algorithm")]
    UnsupportedAlgorithm,

    /// The DID method is unknown or not supported.
    #[error("unsupported_method")]
    UnsupportedMethod,

    /// No Linked-Data signature suite exists for the key algorithm.
    #[error("unsupported_signature_algorithm")]
    UnsupportedSignatureAlgorithm,

    /// The requested conversion or operation is not supported for the key or
    /// DID method.
    #[error("unsupported_operation_kind")]
    UnsupportedOperationKind,

    /// No key exists for the requested id or alias, or the key lacks the
    /// requested private material.
    #[error("key_not_found")]
    KeyNotFound,

    /// Serialized key material is malformed or of an unrecognized algorithm.
    #[error("invalid_key_format")]
    InvalidKeyFormat,

    /// A DID or related resource could not be resolved.
    #[error("resolution_failed")]
    ResolutionFailed,

    /// None of the candidate recovery ids reproduce the signer's address.
    #[error("irrecoverable_signature")]
    IrrecoverableSignature,

    /// A credential, presentation or token is structurally invalid.
    #[error("malformed_credential")]
    MalformedCredential,

    /// No credential template is registered under the requested name.
    #[error("template_not_found")]
    TemplateNotFound,

    /// The string is not a valid DID URL.
    #[error("invalid_did_url")]
    InvalidDidUrl,

    /// A ledger registration failed after all retries.
    #[error("registration_failed")]
    RegistrationFailed,

    /// Configuration could not be resolved.
    #[error("invalid_config")]
    InvalidConfig,

    /// A request to a downstream service failed.
    #[error("request_error")]
    RequestError,

    /// Data could not be serialized or deserialized.
    #[error("serialization_error")]
    SerializationError,

    /// Failure to produce a signature.
    #[error("signing_error")]
    SigningError,
}

/// Context is used to decorate errors with useful context information.
pub trait Context<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Adds context to the error.
    ///
    /// # Errors
    ///
    /// * Original error with context appended.
    fn context<C>(self, context: C) -> Result<T, Error>
    where
        C: Display + Send + Sync + 'static;
}

impl<T, E> Context<T, E> for core::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context<C>(self, context: C) -> Result<T, Error>
    where
        C: Display + Send + Sync + 'static,
    {
        match self {
            Ok(ok) => Ok(ok),
            Err(e) => Err(Error(anyhow::Error::from(e).context(context))),
        }
    }
}

/// Re-tag a foreign error as one of our kinds, keeping its message as
/// context.
pub(crate) trait OrKind<T> {
    fn or_kind(self, kind: Err) -> Result<T, Error>;
}

impl<T, E: Display> OrKind<T> for core::result::Result<T, E> {
    fn or_kind(self, kind: Err) -> Result<T, Error> {
        self.map_err(|e| Error(anyhow::Error::from(kind).context(e.to_string())))
    }
}

impl From<Err> for Error {
    fn from(error: Err) -> Self {
        Self(error.into())
    }
}

impl From<base64ct::Error> for Error {
    fn from(err: base64ct::Error) -> Self {
        Self(anyhow::Error::from(Err::InvalidKeyFormat).context(err.to_string()))
    }
}

impl From<ecdsa::Error> for Error {
    fn from(err: ecdsa::Error) -> Self {
        Self(anyhow::Error::from(Err::InvalidKeyFormat).context(err.to_string()))
    }
}

impl From<chrono::ParseError> for Error {
    fn from(err: chrono::ParseError) -> Self {
        Self(anyhow::Error::from(Err::MalformedCredential).context(err.to_string()))
    }
}

impl From<multibase::Error> for Error {
    fn from(err: multibase::Error) -> Self {
        Self(anyhow::Error::from(Err::InvalidKeyFormat).context(err.to_string()))
    }
}

impl From<pkcs8::Error> for Error {
    fn from(err: pkcs8::Error) -> Self {
        Self(anyhow::Error::from(Err::InvalidKeyFormat).context(err.to_string()))
    }
}

impl From<pkcs8::spki::Error> for Error {
    fn from(err: pkcs8::spki::Error) -> Self {
        Self(anyhow::Error::from(Err::InvalidKeyFormat).context(err.to_string()))
    }
}

impl From<rsa::Error> for Error {
    fn from(err: rsa::Error) -> Self {
        Self(anyhow::Error::from(Err::InvalidKeyFormat).context(err.to_string()))
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Self(err.into())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self(anyhow::Error::from(Err::RequestError).context(err.to_string()))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self(anyhow::Error::from(Err::SerializationError).context(err.to_string()))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self(err.into())
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(err: std::string::FromUtf8Error) -> Self {
        Self(anyhow::Error::from(Err::SerializationError).context(err.to_string()))
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self(anyhow::Error::from(Err::InvalidDidUrl).context(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tracing::Level;
    use tracing_subscriber::FmtSubscriber;

    use super::*;
    use crate::Result;

    #[test]
    fn base_err() {
        let err: Error = Err::KeyNotFound.into();

        assert_eq!(err.to_json(), json!({"error":"key_not_found","error_description":"key_not_found"}));
        assert!(err.is(Err::KeyNotFound));
    }

    #[test]
    fn context_err() {
        let res: Result<()> = Err(Err::InvalidKeyFormat).context("bad JWK");
        let err = res.expect_err("expected error");

        assert_eq!(
            err.to_json(),
            json!({"error":"invalid_key_format","error_description":"bad JWK"})
        );
        assert_eq!(err.kind(), Some(Err::InvalidKeyFormat));
    }

    #[test]
    fn foreign_err_kind() {
        let res: Result<serde_json::Value> = serde_json::from_str("{").map_err(Into::into);
        let err = res.expect_err("expected error");
        assert!(err.is(Err::SerializationError));
    }

    #[test]
    fn test_macro() {
        let subscriber = FmtSubscriber::builder().with_max_level(Level::ERROR).finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let Err(e) = run_macro() else {
            panic!("expected error");
        };

        assert_eq!(e.to_string(), "test me");
        assert!(e.is(Err::UnsupportedMethod));
    }

    fn run_macro() -> Result<()> {
        tracerr!(Err::UnsupportedMethod, "test {}", "me")
    }
}
