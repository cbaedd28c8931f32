//! Error types for DID parsing and principal resolution.

use crate::did::Did;
use thiserror::Error;

/// Errors that can occur when parsing a [`Did`] from a string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DidParseError {
    /// The string does not start with `did:`.
    #[error("'{0}' is not a DID: missing 'did:' scheme")]
    MissingScheme(String),

    /// The method name is empty or contains illegal characters.
    #[error("'{0}' has an invalid DID method")]
    InvalidMethod(String),

    /// The method-specific identifier is missing.
    #[error("'{0}' has no method-specific identifier")]
    MissingIdentifier(String),

    /// The DID contains whitespace.
    #[error("'{0}' contains whitespace")]
    Whitespace(String),
}

/// Errors that can occur when parsing an Ed25519 `did:key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum Ed25519DidFromStrError {
    /// The DID header is invalid.
    #[error("invalid did header")]
    InvalidDidHeader,

    /// The base58 prefix 'z' is missing.
    #[error("missing base58 prefix 'z'")]
    MissingBase58Prefix,

    /// The base58 encoding is invalid.
    #[error("invalid base58 encoding")]
    InvalidBase58,

    /// The key bytes are invalid.
    #[error("invalid key bytes")]
    InvalidKey,
}

/// Errors returned by a [`PrincipalParser`](crate::PrincipalParser).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrincipalError {
    /// The DID method is not supported by this parser.
    #[error("unsupported DID method '{method}' in {did}")]
    UnsupportedMethod {
        /// The offending DID.
        did: Did,
        /// Its method.
        method: String,
    },

    /// The DID uses a supported method but its key material is invalid.
    #[error("invalid key material in {did}: {cause}")]
    InvalidKey {
        /// The offending DID.
        did: Did,
        /// Why the key could not be decoded.
        cause: Ed25519DidFromStrError,
    },
}

/// Errors that can occur when creating an Ed25519 signer.
#[derive(Debug, Error)]
pub enum Ed25519SignerError {
    /// Random number generation failed.
    #[error("RNG error: {0}")]
    Rng(#[from] getrandom::Error),
}
