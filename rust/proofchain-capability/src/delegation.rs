//! Delegations: signed grants of capabilities from one principal to another.

pub mod builder;

pub use builder::*;

use crate::{
    capability::Capability,
    cid::{CidError, to_dagcbor, to_dagcbor_cid},
    time::{TimeRange, Timestamp},
};
use ipld_core::{cid::Cid, ipld::Ipld};
use proofchain_principal::{Did, Verifier};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use std::{collections::BTreeMap, fmt, sync::Arc};
use thiserror::Error;

/// Arbitrary data attached to a delegation. Carried, never interpreted.
pub type Fact = BTreeMap<String, Ipld>;

/// The signed part of a delegation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelegationPayload {
    /// The principal granting the capabilities.
    #[serde(rename = "iss")]
    pub issuer: Did,

    /// The principal receiving them.
    #[serde(rename = "aud")]
    pub audience: Did,

    /// The capabilities granted.
    #[serde(rename = "att")]
    pub capabilities: Vec<Capability>,

    /// First instant at which the delegation is no longer valid. Absent
    /// means it never expires.
    #[serde(rename = "exp", default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<Timestamp>,

    /// Instant before which the delegation is not yet valid.
    #[serde(rename = "nbf", default, skip_serializing_if = "Option::is_none")]
    pub not_before: Option<Timestamp>,

    /// Makes otherwise identical delegations distinct.
    #[serde(rename = "nnc", default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    /// Attached facts.
    #[serde(rename = "fct", default, skip_serializing_if = "Vec::is_empty")]
    pub facts: Vec<Fact>,

    /// Links to the delegations this one is derived from.
    #[serde(rename = "prf", default, skip_serializing_if = "Vec::is_empty")]
    pub proofs: Vec<Cid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Envelope(#[serde(with = "serde_bytes")] Vec<u8>, DelegationPayload);

/// A proof backing a delegation.
#[derive(Debug, Clone)]
pub enum Proof {
    /// The proof delegation itself, shipped alongside.
    Inline(Arc<Delegation>),

    /// A reference that must be resolved before it carries any authority.
    Link(Cid),
}

impl Proof {
    /// The content address of the proof.
    pub fn link(&self) -> Cid {
        match self {
            Proof::Inline(delegation) => *delegation.cid(),
            Proof::Link(cid) => *cid,
        }
    }
}

impl From<Delegation> for Proof {
    fn from(delegation: Delegation) -> Self {
        Proof::Inline(Arc::new(delegation))
    }
}

impl From<Arc<Delegation>> for Proof {
    fn from(delegation: Arc<Delegation>) -> Self {
        Proof::Inline(delegation)
    }
}

impl From<Cid> for Proof {
    fn from(cid: Cid) -> Self {
        Proof::Link(cid)
    }
}

/// Errors checking a delegation's signature.
#[derive(Debug, Clone, Error)]
pub enum SignatureError {
    /// The payload could not be encoded for verification.
    #[error(transparent)]
    Encoding(#[from] CidError),

    /// The signature does not verify against the issuer's key.
    #[error("signature does not verify against issuer {0}")]
    Mismatch(Did),
}

/// A signed delegation, identified by the CID of its envelope.
///
/// In the signed payload every proof is a link. A delegation received with
/// some of those proofs attached keeps them as [`Proof::Inline`].
#[derive(Clone)]
pub struct Delegation {
    envelope: Envelope,
    cid: Cid,
    proofs: Vec<Proof>,
}

impl Delegation {
    /// Creates a blank [`DelegationBuilder`].
    #[must_use]
    pub fn builder() -> DelegationBuilder {
        DelegationBuilder::default()
    }

    /// Assembles a delegation from a payload and the signature over it.
    ///
    /// The signature is not checked here; see [`Delegation::verify_signature`].
    pub fn new(payload: DelegationPayload, signature: Vec<u8>) -> Result<Self, CidError> {
        let envelope = Envelope(signature, payload);
        let cid = to_dagcbor_cid(&envelope)?;
        let proofs = envelope.1.proofs.iter().copied().map(Proof::Link).collect();
        Ok(Self {
            envelope,
            cid,
            proofs,
        })
    }

    /// Attaches a proof block, turning the matching link into
    /// [`Proof::Inline`]. Blocks this delegation does not link to are ignored.
    #[must_use]
    pub fn attach(mut self, proof: Arc<Delegation>) -> Self {
        for slot in self.proofs.iter_mut() {
            if slot.link() == proof.cid {
                *slot = Proof::Inline(proof.clone());
            }
        }
        self
    }

    /// The content address of this delegation.
    pub const fn cid(&self) -> &Cid {
        &self.cid
    }

    /// The signed payload.
    pub const fn payload(&self) -> &DelegationPayload {
        &self.envelope.1
    }

    /// The raw signature bytes.
    pub fn signature(&self) -> &[u8] {
        &self.envelope.0
    }

    /// Getter for the `issuer` field.
    pub const fn issuer(&self) -> &Did {
        &self.payload().issuer
    }

    /// Getter for the `audience` field.
    pub const fn audience(&self) -> &Did {
        &self.payload().audience
    }

    /// Getter for the `capabilities` field.
    pub fn capabilities(&self) -> &[Capability] {
        &self.payload().capabilities
    }

    /// Getter for the `expiration` field.
    pub const fn expiration(&self) -> Option<Timestamp> {
        self.payload().expiration
    }

    /// Getter for the `not_before` field.
    pub const fn not_before(&self) -> Option<Timestamp> {
        self.payload().not_before
    }

    /// Getter for the `nonce` field.
    pub fn nonce(&self) -> Option<&str> {
        self.payload().nonce.as_deref()
    }

    /// Getter for the `facts` field.
    pub fn facts(&self) -> &[Fact] {
        &self.payload().facts
    }

    /// The proofs, inline where attached.
    pub fn proofs(&self) -> &[Proof] {
        &self.proofs
    }

    /// The window in which this delegation is valid.
    pub const fn time_range(&self) -> TimeRange {
        TimeRange::new(self.not_before(), self.expiration())
    }

    /// Returns `true` when `now` is at or past the expiration.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.time_range().is_expired(now)
    }

    /// Returns `true` when `now` is before `not_before`.
    pub fn is_too_early(&self, now: Timestamp) -> bool {
        self.time_range().is_too_early(now)
    }

    /// The bytes the issuer signs: the DAG-CBOR encoding of the payload.
    pub fn signing_payload(&self) -> Result<Vec<u8>, CidError> {
        to_dagcbor(self.payload())
    }

    /// Checks the signature against the issuer's verifier.
    pub fn verify_signature(&self, verifier: &dyn Verifier) -> Result<(), SignatureError> {
        let payload = self.signing_payload()?;
        verifier
            .verify(&payload, self.signature())
            .map_err(|_| SignatureError::Mismatch(self.issuer().clone()))
    }
}

impl PartialEq for Delegation {
    fn eq(&self, other: &Self) -> bool {
        self.cid == other.cid
    }
}

impl Eq for Delegation {}

impl fmt::Debug for Delegation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delegation")
            .field("cid", &self.cid.to_string())
            .field("issuer", self.issuer())
            .field("audience", self.audience())
            .field("capabilities", &self.capabilities())
            .field("expiration", &self.expiration())
            .field("proofs", &self.payload().proofs.len())
            .finish()
    }
}

impl Serialize for Delegation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.envelope.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Delegation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let Envelope(signature, payload) = Envelope::deserialize(deserializer)?;
        Delegation::new(payload, signature).map_err(de::Error::custom)
    }
}
