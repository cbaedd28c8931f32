//! Principal, verifier and signer traits.

use crate::did::Did;
use std::fmt::Debug;

/// An entity identified by a [DID].
///
/// Implemented by anything that has a DID: key types, signers, opaque
/// identities. Does not imply any cryptographic capability.
///
/// [DID]: https://www.w3.org/TR/did-core/
pub trait Principal {
    /// Returns this entity's DID.
    fn did(&self) -> Did;
}

impl Principal for Did {
    fn did(&self) -> Did {
        self.clone()
    }
}

/// Verifies that a signature over a payload was produced by this principal.
pub trait Verifier: Principal + Debug + Send + Sync {
    /// Verify that `signature` is valid for `payload`.
    fn verify(&self, payload: &[u8], signature: &[u8]) -> Result<(), signature::Error>;
}

/// Produces signatures on behalf of a principal.
pub trait Signer: Principal + Debug + Send + Sync {
    /// Sign the given payload.
    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, signature::Error>;
}
