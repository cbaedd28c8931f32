//! The proof of a successful validation.

use proofchain_capability::{Delegation, Match, ParsedCapability, TimeRange};
use proofchain_principal::Did;
use std::sync::Arc;

/// A claim together with the chain of proofs that justifies it.
///
/// `proofs` is empty when the claim was issued by a root authority, and holds
/// the single authorization of the proof that justified it otherwise.
#[derive(Debug, Clone)]
pub struct Authorization {
    /// The delegation carrying the claim.
    pub delegation: Arc<Delegation>,
    /// The claimed capability.
    pub capability: ParsedCapability,
    /// The authorization of the proof that justified the claim.
    pub proofs: Vec<Authorization>,
    /// Issuer of `delegation`.
    pub issuer: Did,
    /// Audience of `delegation`.
    pub audience: Did,
    matched: Match,
}

impl Authorization {
    pub(crate) fn new(matched: Match, proofs: Vec<Authorization>) -> Self {
        let delegation = matched.source().delegation.clone();
        Self {
            capability: matched.value().clone(),
            issuer: delegation.issuer().clone(),
            audience: delegation.audience().clone(),
            delegation,
            proofs,
            matched,
        }
    }

    /// The match this authorization proves.
    pub fn matched(&self) -> &Match {
        &self.matched
    }

    /// Every authorized capability; more than one for conjunctions.
    pub fn capabilities(&self) -> Vec<&ParsedCapability> {
        self.matched.values()
    }

    /// Every delegation carrying an authorized capability.
    pub fn delegations(&self) -> Vec<Arc<Delegation>> {
        self.matched.delegations()
    }

    /// Number of proof levels between the claim and its root authority.
    pub fn depth(&self) -> usize {
        self.proofs
            .iter()
            .map(|proof| proof.depth() + 1)
            .max()
            .unwrap_or(0)
    }

    /// The window in which every delegation along the chain is valid.
    pub fn time_range(&self) -> TimeRange {
        let own = self
            .delegations()
            .iter()
            .fold(TimeRange::unbounded(), |range, delegation| {
                range.intersect(delegation.time_range())
            });
        self.proofs
            .iter()
            .fold(own, |range, proof| range.intersect(proof.time_range()))
    }

    /// The root authorization at the end of the chain.
    pub fn root(&self) -> &Authorization {
        let mut current = self;
        while let Some(proof) = current.proofs.first() {
            current = proof;
        }
        current
    }
}
