//! Errors produced while parsing and matching capabilities.
//!
//! None of these abort validation. They are collected into
//! [`Select`](crate::Select) results and, eventually, into the validator's
//! diagnosis.

use crate::capability::{Capability, ParsedCapability};
use ipld_core::cid::Cid;
use std::fmt;
use thiserror::Error;

/// A capability whose ability no descriptor recognizes.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("unknown capability {capability}")]
pub struct UnknownCapability {
    /// The capability as written.
    pub capability: Capability,
}

/// A recognized capability that fails its descriptor's schema.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("malformed capability {capability}: {cause}")]
pub struct MalformedCapability {
    /// The capability as written.
    pub capability: Capability,
    /// What is wrong with it.
    pub cause: String,
}

/// Why a capability could not be parsed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidCapability {
    /// See [`UnknownCapability`].
    #[error(transparent)]
    Unknown(#[from] UnknownCapability),

    /// See [`MalformedCapability`].
    #[error(transparent)]
    Malformed(#[from] MalformedCapability),
}

/// A claim asking for more than the proof capability it was matched against
/// grants.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{claimed} escalates {delegated} granted by {delegation}: {cause}")]
pub struct EscalatedDelegation {
    /// What was claimed.
    pub claimed: ParsedCapability,
    /// What the proof grants.
    pub delegated: ParsedCapability,
    /// The proof delegation.
    pub delegation: Cid,
    /// Which part escalates, and how.
    pub cause: String,
}

/// Any failure to match one source capability.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MatchError {
    /// The capability is unknown or malformed.
    #[error(transparent)]
    Invalid(#[from] InvalidCapability),

    /// The capability is recognized but grants less than claimed.
    #[error(transparent)]
    Escalated(#[from] EscalatedDelegation),

    /// Several alternatives failed.
    #[error(transparent)]
    Delegation(#[from] DelegationError),
}

impl MatchError {
    /// Returns `true` when the failure is only that the capability is not
    /// recognized.
    pub fn is_unknown(&self) -> bool {
        matches!(self, MatchError::Invalid(InvalidCapability::Unknown(_)))
    }
}

impl From<UnknownCapability> for MatchError {
    fn from(error: UnknownCapability) -> Self {
        MatchError::Invalid(error.into())
    }
}

impl From<MalformedCapability> for MatchError {
    fn from(error: MalformedCapability) -> Self {
        MatchError::Invalid(error.into())
    }
}

/// A proof capability that could not justify the claim, with every reason
/// why.
#[derive(Debug, Clone, PartialEq, Error)]
pub struct DelegationError {
    /// The proof capability.
    pub capability: Capability,
    /// The delegation carrying it.
    pub delegation: Cid,
    /// Each reason the capability failed.
    pub causes: Vec<MatchError>,
}

impl fmt::Display for DelegationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cannot derive claim from {} in {}",
            self.capability, self.delegation
        )?;
        for cause in &self.causes {
            write!(f, "; {cause}")?;
        }
        Ok(())
    }
}
