//! Destructure DID URLs into typed components.
//!
//! A DID URL here is of the form `did:<method>:<identifier>[#<fragment>]`
//! where the method is a run of lowercase ASCII letters.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::DidMethod;
use crate::error::{Err, Error};
use crate::{tracerr, Result};

static DID_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("^did:([a-z]+):([^#]+)(?:#(.+))?$").expect("should compile")
});

/// Parsed DID URL.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DidUrl {
    /// DID method name.
    ///
    /// Kept as text so that any DID matching the grammar parses, whether or
    /// not the method is supported. Use [`DidUrl::did_method`] to map it to a
    /// supported method.
    pub method: String,

    /// Method-specific identifier.
    pub identifier: String,

    /// Fragment, typically naming a verification method.
    pub fragment: Option<String>,
}

impl DidUrl {
    /// Parse a DID or DID URL.
    ///
    /// # Errors
    ///
    /// Returns [`Err::InvalidDidUrl`] if the string does not match the DID URL
    /// grammar.
    pub fn parse(url: &str) -> Result<Self> {
        let Some(caps) = DID_URL.captures(url) else {
            tracerr!(Err::InvalidDidUrl, "invalid DID URL: {url}")
        };
        Ok(Self {
            method: caps[1].to_string(),
            identifier: caps[2].to_string(),
            fragment: caps.get(3).map(|m| m.as_str().to_string()),
        })
    }

    /// The DID part of the URL: `did:<method>:<identifier>`.
    #[must_use]
    pub fn did(&self) -> String {
        format!("did:{}:{}", self.method, self.identifier)
    }

    /// The supported DID method named by the URL.
    ///
    /// # Errors
    ///
    /// Returns [`Err::UnsupportedMethod`] if the method is not supported.
    pub fn did_method(&self) -> Result<DidMethod> {
        self.method.parse()
    }

    /// A copy of the URL with the given fragment.
    #[must_use]
    pub fn with_fragment(&self, fragment: impl Into<String>) -> Self {
        Self {
            fragment: Some(fragment.into()),
            ..self.clone()
        }
    }
}

impl Display for DidUrl {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "did:{}:{}", self.method, self.identifier)?;
        if let Some(fragment) = &self.fragment {
            write!(f, "#{fragment}")?;
        }
        Ok(())
    }
}

impl FromStr for DidUrl {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for DidUrl {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DidUrl {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
