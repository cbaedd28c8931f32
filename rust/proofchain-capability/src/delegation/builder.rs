//! Delegation builder.

use super::{Delegation, DelegationPayload, Fact, Proof};
use crate::{capability::Capability, cid::CidError, time::Timestamp};
use proofchain_principal::{Did, Principal, Signer};
use thiserror::Error;

/// Errors building a delegation.
#[derive(Debug, Clone, Error)]
pub enum BuildError {
    /// No audience was given.
    #[error("delegation has no audience")]
    MissingAudience,

    /// The payload could not be encoded.
    #[error(transparent)]
    Encoding(#[from] CidError),

    /// The signer refused or failed to sign.
    #[error("failed to sign delegation: {0}")]
    Signing(String),
}

/// Typesafe builder for [`Delegation`].
///
/// The issuer is always the signer passed to [`DelegationBuilder::sign`].
#[derive(Debug, Clone, Default)]
pub struct DelegationBuilder {
    audience: Option<Did>,
    capabilities: Vec<Capability>,
    expiration: Option<Timestamp>,
    not_before: Option<Timestamp>,
    nonce: Option<String>,
    facts: Vec<Fact>,
    proofs: Vec<Proof>,
}

impl DelegationBuilder {
    /// Sets the `audience` field.
    #[must_use]
    pub fn audience(mut self, audience: Did) -> Self {
        self.audience = Some(audience);
        self
    }

    /// Adds a capability to the `capabilities` field.
    #[must_use]
    pub fn capability(mut self, capability: Capability) -> Self {
        self.capabilities.push(capability);
        self
    }

    /// Sets the `expiration` field.
    #[must_use]
    pub const fn expiration(mut self, expiration: Timestamp) -> Self {
        self.expiration = Some(expiration);
        self
    }

    /// Sets the `not_before` field.
    #[must_use]
    pub const fn not_before(mut self, not_before: Timestamp) -> Self {
        self.not_before = Some(not_before);
        self
    }

    /// Sets the `nonce` field.
    #[must_use]
    pub fn nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    /// Adds a fact.
    #[must_use]
    pub fn fact(mut self, fact: Fact) -> Self {
        self.facts.push(fact);
        self
    }

    /// Adds a proof. Inline proofs stay attached to the built delegation.
    #[must_use]
    pub fn proof(mut self, proof: impl Into<Proof>) -> Self {
        self.proofs.push(proof.into());
        self
    }

    /// Signs the payload as `issuer` and builds the delegation.
    pub fn sign(self, issuer: &dyn Signer) -> Result<Delegation, BuildError> {
        let audience = self.audience.ok_or(BuildError::MissingAudience)?;
        let payload = DelegationPayload {
            issuer: issuer.did(),
            audience,
            capabilities: self.capabilities,
            expiration: self.expiration,
            not_before: self.not_before,
            nonce: self.nonce,
            facts: self.facts,
            proofs: self.proofs.iter().map(Proof::link).collect(),
        };
        let bytes = crate::cid::to_dagcbor(&payload)?;
        let signature = issuer
            .sign(&bytes)
            .map_err(|error| BuildError::Signing(error.to_string()))?;

        let mut delegation = Delegation::new(payload, signature)?;
        for proof in self.proofs {
            if let Proof::Inline(attached) = proof {
                delegation = delegation.attach(attached);
            }
        }
        Ok(delegation)
    }
}
