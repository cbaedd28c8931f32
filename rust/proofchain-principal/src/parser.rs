//! DID-to-verifier parsing.

use crate::{
    did::Did,
    ed25519::Ed25519Verifier,
    error::PrincipalError,
    principal::{Principal, Verifier},
};
use std::{fmt::Debug, sync::Arc};

/// Parses a DID into a [`Verifier`] for that principal.
///
/// Parsing is pure and synchronous. The DID of the returned verifier is the
/// canonical identity of the principal: two DIDs denote the same principal
/// exactly when their parsed verifiers report the same DID.
pub trait PrincipalParser: Debug + Send + Sync {
    /// Resolve `did` into a verifier.
    fn parse(&self, did: &Did) -> Result<Arc<dyn Verifier>, PrincipalError>;
}

/// A principal known only by its DID.
///
/// Identifies, but never verifies: every signature is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpaqueVerifier(pub Did);

impl Principal for OpaqueVerifier {
    fn did(&self) -> Did {
        self.0.clone()
    }
}

impl Verifier for OpaqueVerifier {
    fn verify(&self, _payload: &[u8], _signature: &[u8]) -> Result<(), signature::Error> {
        Err(signature::Error::new())
    }
}

/// The default [`PrincipalParser`].
///
/// `did:key` Ed25519 keys become [`Ed25519Verifier`]s. In lenient mode (the
/// default) every other DID becomes an [`OpaqueVerifier`] over its normalized
/// form; in strict mode they are rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct DidKeyParser {
    strict: bool,
}

impl DidKeyParser {
    /// A parser that only accepts Ed25519 `did:key` principals.
    pub const fn strict() -> Self {
        Self { strict: true }
    }
}

impl PrincipalParser for DidKeyParser {
    fn parse(&self, did: &Did) -> Result<Arc<dyn Verifier>, PrincipalError> {
        let did = did.normalized();
        match did.as_str().parse::<Ed25519Verifier>() {
            Ok(verifier) => Ok(Arc::new(verifier)),
            Err(cause) if self.strict && did.method() == "key" => {
                Err(PrincipalError::InvalidKey { did, cause })
            }
            Err(_) if self.strict => Err(PrincipalError::UnsupportedMethod {
                method: did.method().to_string(),
                did,
            }),
            Err(_) => Ok(Arc::new(OpaqueVerifier(did))),
        }
    }
}

/// Returns `true` when `left` and `right` denote the same principal.
///
/// A DID the parser rejects has no established identity and never matches.
pub fn same_principal(parser: &dyn PrincipalParser, left: &Did, right: &Did) -> bool {
    match (parser.parse(left), parser.parse(right)) {
        (Ok(left), Ok(right)) => left.did() == right.did(),
        _ => false,
    }
}
