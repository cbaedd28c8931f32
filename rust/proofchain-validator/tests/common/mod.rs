//! Shared fixtures for the validator integration tests.

#![allow(dead_code)]

use proofchain_capability::{
    BuildError, Capability, CaveatKind, CaveatSpec, Delegation, Descriptor, Narrowing,
    ResourceSchema, Timestamp, capability,
};
use proofchain_principal::{Did, Ed25519Signer};
use proofchain_validator::{ValidationOptions, ValidationOptionsBuilder};
use std::{sync::Arc, time::Duration};

/// The clock every fixture is pinned to.
pub const NOW: Timestamp = Timestamp::from_unix(1_700_000_000);

pub fn signer(seed: u8) -> Ed25519Signer {
    Ed25519Signer::from_seed(&[seed; 32])
}

pub fn space() -> Did {
    "did:key:space1".parse().expect("valid did")
}

pub fn in_an_hour() -> Timestamp {
    NOW.after(Duration::from_secs(3600))
}

/// `store/add` on a DID, optionally bounded in `size`.
pub fn store_add() -> Descriptor {
    capability("store/add")
        .with(ResourceSchema::Did)
        .caveat(
            "size",
            CaveatSpec::unconstrained(CaveatKind::Bound).narrowed_by(Narrowing::AtMost),
        )
        .build()
}

pub fn store_remove() -> Descriptor {
    capability("store/remove").with(ResourceSchema::Did).build()
}

pub fn add(with: &Did) -> Capability {
    Capability::new("store/add", with)
}

/// Delegates `capabilities` from `issuer` to `audience`, with `proofs`
/// attached inline.
pub fn delegate(
    issuer: &Ed25519Signer,
    audience: &Did,
    capabilities: Vec<Capability>,
    proofs: Vec<Arc<Delegation>>,
) -> Result<Arc<Delegation>, BuildError> {
    let builder = capabilities
        .into_iter()
        .fold(Delegation::builder().audience(audience.clone()), |builder, c| {
            builder.capability(c)
        });
    let builder = proofs
        .into_iter()
        .fold(builder, |builder, proof| builder.proof(proof));
    Ok(Arc::new(builder.sign(issuer)?))
}

/// Options registering `store/add`, pinned to [`NOW`].
pub fn options() -> ValidationOptionsBuilder {
    ValidationOptions::builder()
        .capability(store_add())
        .now(NOW)
}
