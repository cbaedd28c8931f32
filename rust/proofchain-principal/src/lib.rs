//! Principals taking part in a delegation chain.
//!
//! Every delegation names an issuer and an audience by [DID]. This crate
//! provides the [`Did`] type, the [`Principal`], [`Verifier`] and [`Signer`]
//! traits, and the [`PrincipalParser`] seam the validator uses to turn a DID
//! into a [`Verifier`] and to compare identities in their normalized form.
//!
//! A reference `did:key` Ed25519 principal is included in [`ed25519`].
//!
//! [DID]: https://www.w3.org/TR/did-core/

#![warn(missing_docs)]

pub mod did;
pub mod ed25519;
pub mod error;
pub mod parser;
pub mod principal;

pub use did::*;
pub use ed25519::{Ed25519Signer, Ed25519Verifier};
pub use error::*;
pub use parser::*;
pub use principal::*;
