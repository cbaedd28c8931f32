//! Decentralized identifiers.

use crate::error::DidParseError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};

const SCHEME: &str = "did:";

/// A syntactically valid DID of the form `did:<method>:<identifier>`.
///
/// The same principal may be spelled in more than one way (a verification
/// method fragment, a query, an upper-cased method). Compare identities with
/// [`Did::normalized`] or through a [`PrincipalParser`](crate::PrincipalParser),
/// never with raw string equality.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Did(String);

impl Did {
    /// Wraps a DID produced by a key encoder in this crate. Key encodings
    /// only emit `did:key:z<base58>`, which always passes [`Did::from_str`].
    pub(crate) fn from_encoded_key(did: String) -> Self {
        Did(did)
    }

    /// The DID method, e.g. `key` for `did:key:z6Mk...`.
    pub fn method(&self) -> &str {
        let rest = &self.0[SCHEME.len()..];
        rest.split_once(':').map(|(method, _)| method).unwrap_or(rest)
    }

    /// The method-specific identifier, including any fragment or query.
    pub fn identifier(&self) -> &str {
        let rest = &self.0[SCHEME.len()..];
        rest.split_once(':').map(|(_, id)| id).unwrap_or("")
    }

    /// The DID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the canonical spelling of this DID.
    ///
    /// Drops any `#fragment` or `?query` suffix and lower-cases the method
    /// name, so that `did:KEY:zAbc#zAbc` and `did:key:zAbc` compare equal.
    pub fn normalized(&self) -> Did {
        let identifier = self.identifier();
        let end = identifier.find(['#', '?']).unwrap_or(identifier.len());
        Did(format!(
            "{SCHEME}{}:{}",
            self.method().to_ascii_lowercase(),
            &identifier[..end]
        ))
    }
}

impl FromStr for Did {
    type Err = DidParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix(SCHEME)
            .ok_or_else(|| DidParseError::MissingScheme(s.to_string()))?;
        let (method, identifier) = rest
            .split_once(':')
            .ok_or_else(|| DidParseError::MissingIdentifier(s.to_string()))?;

        if method.is_empty() || !method.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(DidParseError::InvalidMethod(s.to_string()));
        }
        if identifier.is_empty() || identifier.starts_with(['#', '?']) {
            return Err(DidParseError::MissingIdentifier(s.to_string()));
        }
        if s.chars().any(char::is_whitespace) {
            return Err(DidParseError::Whitespace(s.to_string()));
        }

        Ok(Did(s.to_string()))
    }
}

impl TryFrom<&str> for Did {
    type Error = DidParseError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Did {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for Did {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Did {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl Serialize for Did {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Did {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}
