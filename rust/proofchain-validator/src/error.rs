//! Validation failures.
//!
//! A failed validation is ordinary data: [`Unauthorized`] holds every reason
//! every path failed, nested by proof level through [`InvalidClaim`]. Only
//! [`ConfigError`] signals a programming mistake.

use ipld_core::cid::Cid;
use proofchain_capability::{
    Capability, DelegationError, EscalatedDelegation, InvalidCapability, MatchError,
    ParsedCapability, Timestamp,
};
use proofchain_principal::Did;
use serde::Serialize;
use std::{collections::HashSet, fmt, sync::Arc};
use thiserror::Error;

/// A linked proof the resolver could not produce.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unable to resolve proof {link}: {cause}")]
pub struct UnavailableProof {
    /// The unresolved link.
    pub link: Cid,
    /// Why resolution failed.
    pub cause: String,
}

/// A proof addressed to someone other than the issuer relying on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("delegation {delegation} is addressed to {audience} but is used by {issuer}")]
pub struct InvalidAudience {
    /// The proof delegation.
    pub delegation: Cid,
    /// Its audience.
    pub audience: Did,
    /// The issuer of the delegation that cites it.
    pub issuer: Did,
}

/// Why a single proof was rejected before its capabilities were examined.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidProof {
    /// See [`UnavailableProof`].
    #[error(transparent)]
    Unavailable(#[from] UnavailableProof),

    /// See [`InvalidAudience`].
    #[error(transparent)]
    Audience(#[from] InvalidAudience),

    /// The proof expired.
    #[error("proof {delegation} has expired on {expiration}")]
    Expired {
        /// The proof delegation.
        delegation: Cid,
        /// Its expiration.
        expiration: Timestamp,
    },

    /// The proof is not yet valid.
    #[error("proof {delegation} is not valid before {not_before}")]
    NotValidBefore {
        /// The proof delegation.
        delegation: Cid,
        /// Its `nbf`.
        not_before: Timestamp,
    },

    /// The proof's signature does not verify.
    #[error("proof {delegation} does not have a valid signature from {issuer}: {cause}")]
    InvalidSignature {
        /// The proof delegation.
        delegation: Cid,
        /// Its claimed issuer.
        issuer: Did,
        /// What went wrong.
        cause: String,
    },

    /// The proof already appears between itself and the claim.
    #[error("proof {delegation} cites itself through its own chain")]
    Cyclic {
        /// The proof delegation.
        delegation: Cid,
    },

    /// The chain is longer than allowed.
    #[error("proof {delegation} exceeds the maximum chain depth of {max_depth}")]
    DepthExceeded {
        /// The proof delegation.
        delegation: Cid,
        /// The configured bound.
        max_depth: usize,
    },

    /// The resolver answered a link with a different delegation.
    #[error("proof {link} resolved to a different delegation {received}")]
    LinkMismatch {
        /// The link that was cited.
        link: Cid,
        /// The CID of what the resolver returned.
        received: Cid,
    },

    /// The chain ends at an issuer the root policy does not accept, with no
    /// further proof to examine.
    #[error("{issuer} has no authority of its own and delegation {delegation} cites no proof")]
    UntrustedIssuer {
        /// The delegation whose issuer was rejected.
        delegation: Cid,
        /// Its issuer.
        issuer: Did,
    },
}

impl InvalidProof {
    /// The proof delegation this failure is about.
    pub fn delegation(&self) -> Cid {
        match self {
            InvalidProof::Unavailable(error) => error.link,
            InvalidProof::Audience(error) => error.delegation,
            InvalidProof::Expired { delegation, .. }
            | InvalidProof::NotValidBefore { delegation, .. }
            | InvalidProof::InvalidSignature { delegation, .. }
            | InvalidProof::Cyclic { delegation }
            | InvalidProof::DepthExceeded { delegation, .. }
            | InvalidProof::UntrustedIssuer { delegation, .. } => *delegation,
            InvalidProof::LinkMismatch { link, .. } => *link,
        }
    }

    /// The error code for this failure.
    pub fn code(&self) -> ErrorCode {
        match self {
            InvalidProof::Unavailable(_) => ErrorCode::ProofUnavailable,
            InvalidProof::Audience(_) => ErrorCode::AudienceMismatch,
            InvalidProof::Expired { .. } => ErrorCode::ProofExpired,
            InvalidProof::NotValidBefore { .. } => ErrorCode::ProofNotYetValid,
            InvalidProof::InvalidSignature { .. } => ErrorCode::SignatureInvalid,
            InvalidProof::Cyclic { .. } => ErrorCode::CyclicProof,
            InvalidProof::DepthExceeded { .. } => ErrorCode::DepthExceeded,
            InvalidProof::LinkMismatch { .. } => ErrorCode::LinkMismatch,
            InvalidProof::UntrustedIssuer { .. } => ErrorCode::UntrustedIssuer,
        }
    }
}

/// Everything that went wrong proving one claim from one delegation's
/// proofs.
#[derive(Debug, Clone, PartialEq, Error)]
pub struct InvalidClaim {
    /// The claim being proven.
    pub claim: ParsedCapability,
    /// The delegation whose proofs were examined.
    pub delegation: Cid,
    /// Proof capabilities that were recognized but could not justify the
    /// claim.
    pub delegation_errors: Vec<DelegationError>,
    /// Proof capabilities nothing recognized.
    pub unknown_capabilities: Vec<Capability>,
    /// Proofs rejected outright.
    pub invalid_proofs: Vec<InvalidProof>,
    /// Proofs that matched but could not themselves be proven. A subtree
    /// reached along several paths is shared.
    pub failed_proofs: Vec<Arc<InvalidClaim>>,
}

/// The claim could not be authorized.
#[derive(Debug, Clone, PartialEq, Error)]
pub struct Unauthorized {
    /// The claimed capability.
    pub capability: Capability,
    /// The delegation the claim was made on.
    pub delegation: Cid,
    /// Capabilities that were recognized but could not be matched.
    pub delegation_errors: Vec<DelegationError>,
    /// Capabilities nothing recognized.
    pub unknown_capabilities: Vec<Capability>,
    /// Delegations rejected outright.
    pub invalid_proofs: Vec<InvalidProof>,
    /// Matches that could not be proven.
    pub failed_proofs: Vec<Arc<InvalidClaim>>,
}

/// A leaf reason in a diagnosis tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cause<'a> {
    /// A capability not known to any descriptor.
    Unknown(&'a Capability),
    /// A capability a descriptor rejected.
    Invalid(&'a InvalidCapability),
    /// A capability granting less than claimed.
    Escalated(&'a EscalatedDelegation),
    /// A proof rejected outright.
    Proof(&'a InvalidProof),
}

impl Cause<'_> {
    /// The error code for this cause.
    pub fn code(&self) -> ErrorCode {
        match self {
            Cause::Unknown(_) | Cause::Invalid(InvalidCapability::Unknown(_)) => {
                ErrorCode::UnknownCapability
            }
            Cause::Invalid(InvalidCapability::Malformed(_)) => ErrorCode::MalformedCapability,
            Cause::Escalated(_) => ErrorCode::EscalatedDelegation,
            Cause::Proof(proof) => proof.code(),
        }
    }
}

impl fmt::Display for Cause<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cause::Unknown(capability) => write!(f, "unknown capability {capability}"),
            Cause::Invalid(error) => write!(f, "{error}"),
            Cause::Escalated(error) => write!(f, "{error}"),
            Cause::Proof(error) => write!(f, "{error}"),
        }
    }
}

struct Report<'a> {
    delegation_errors: &'a [DelegationError],
    unknown_capabilities: &'a [Capability],
    invalid_proofs: &'a [InvalidProof],
    failed_proofs: &'a [Arc<InvalidClaim>],
}

/// Shared subtrees already reported, by address.
type Seen = HashSet<*const InvalidClaim>;

impl<'a> Report<'a> {
    fn collect(&self, causes: &mut Vec<Cause<'a>>, seen: &mut Seen) {
        for error in self.delegation_errors {
            collect_delegation_error(error, causes);
        }
        causes.extend(self.unknown_capabilities.iter().map(Cause::Unknown));
        causes.extend(self.invalid_proofs.iter().map(Cause::Proof));
        for claim in self.failed_proofs {
            if seen.insert(Arc::as_ptr(claim)) {
                claim.report().collect(causes, seen);
            }
        }
    }

    fn write(&self, f: &mut fmt::Formatter<'_>, depth: usize, seen: &mut Seen) -> fmt::Result {
        let indent = "  ".repeat(depth);
        for error in self.delegation_errors {
            writeln!(f, "{indent}- {error}")?;
        }
        for capability in self.unknown_capabilities {
            writeln!(f, "{indent}- unknown capability {capability}")?;
        }
        for proof in self.invalid_proofs {
            writeln!(f, "{indent}- {proof}")?;
        }
        for claim in self.failed_proofs {
            if !seen.insert(Arc::as_ptr(claim)) {
                writeln!(
                    f,
                    "{indent}- {} via {} is not authorized, as reported above",
                    claim.claim, claim.delegation
                )?;
                continue;
            }
            writeln!(
                f,
                "{indent}- {} via {} is not authorized because:",
                claim.claim, claim.delegation
            )?;
            claim.report().write(f, depth + 1, seen)?;
        }
        Ok(())
    }
}

fn collect_delegation_error<'a>(error: &'a DelegationError, causes: &mut Vec<Cause<'a>>) {
    for cause in &error.causes {
        match cause {
            MatchError::Invalid(invalid) => causes.push(Cause::Invalid(invalid)),
            MatchError::Escalated(escalated) => causes.push(Cause::Escalated(escalated)),
            MatchError::Delegation(nested) => collect_delegation_error(nested, causes),
        }
    }
}

impl InvalidClaim {
    fn report(&self) -> Report<'_> {
        Report {
            delegation_errors: &self.delegation_errors,
            unknown_capabilities: &self.unknown_capabilities,
            invalid_proofs: &self.invalid_proofs,
            failed_proofs: &self.failed_proofs,
        }
    }

    /// Every leaf cause in this subtree, depth first. A shared subtree
    /// contributes its causes once.
    pub fn causes(&self) -> Vec<Cause<'_>> {
        let mut causes = Vec::new();
        self.report().collect(&mut causes, &mut Seen::new());
        causes
    }
}

impl fmt::Display for InvalidClaim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} via {} is not authorized because:",
            self.claim, self.delegation
        )?;
        self.report().write(f, 1, &mut Seen::new())
    }
}

impl Unauthorized {
    fn report(&self) -> Report<'_> {
        Report {
            delegation_errors: &self.delegation_errors,
            unknown_capabilities: &self.unknown_capabilities,
            invalid_proofs: &self.invalid_proofs,
            failed_proofs: &self.failed_proofs,
        }
    }

    /// Every leaf cause in the diagnosis, depth first. A shared subtree
    /// contributes its causes once.
    pub fn causes(&self) -> Vec<Cause<'_>> {
        let mut causes = Vec::new();
        self.report().collect(&mut causes, &mut Seen::new());
        causes
    }

    /// Returns `true` if some leaf cause has `code`.
    pub fn has_cause(&self, code: ErrorCode) -> bool {
        self.causes().iter().any(|cause| cause.code() == code)
    }
}

impl fmt::Display for Unauthorized {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "claim {} on {} is not authorized because:",
            self.capability, self.delegation
        )?;
        self.report().write(f, 1, &mut Seen::new())
    }
}

/// Why a validation stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The caller's cancellation token fired.
    Cancellation,
    /// The configured timeout elapsed.
    DeadlineElapsed,
}

/// The validation was abandoned before reaching a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("validation cancelled: {reason:?}")]
pub struct Cancelled {
    /// What stopped it.
    pub reason: CancelReason,
}

/// The outcome of a validation that did not authorize the claim.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// The claim is not authorized.
    #[error(transparent)]
    Unauthorized(Box<Unauthorized>),

    /// No decision was reached.
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

impl ValidationError {
    /// The error code for this outcome.
    pub fn code(&self) -> ErrorCode {
        match self {
            ValidationError::Unauthorized(_) => ErrorCode::Unauthorized,
            ValidationError::Cancelled(Cancelled {
                reason: CancelReason::Cancellation,
            }) => ErrorCode::Cancelled,
            ValidationError::Cancelled(Cancelled {
                reason: CancelReason::DeadlineElapsed,
            }) => ErrorCode::DeadlineElapsed,
        }
    }

    /// The diagnosis, if the claim was decided unauthorized.
    pub fn unauthorized(&self) -> Option<&Unauthorized> {
        match self {
            ValidationError::Unauthorized(unauthorized) => Some(&**unauthorized),
            ValidationError::Cancelled(_) => None,
        }
    }
}

impl From<Unauthorized> for ValidationError {
    fn from(error: Unauthorized) -> Self {
        ValidationError::Unauthorized(Box::new(error))
    }
}

/// Misconfiguration of [`ValidationOptions`](crate::ValidationOptions).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// No capability selector was registered.
    #[error("no capability selector was registered")]
    MissingCapability,

    /// Resolver concurrency must be at least one.
    #[error("resolver concurrency must be at least 1")]
    ZeroConcurrency,

    /// Maximum chain depth must be at least one.
    #[error("maximum chain depth must be at least 1")]
    ZeroDepth,
}

/// Error codes for services embedding the validator.
///
/// Each code maps to an HTTP status via [`ErrorCode::status_code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // 401 Unauthorized
    /// A signature does not verify.
    SignatureInvalid,
    /// A proof is addressed to someone else.
    AudienceMismatch,
    /// A proof could not be resolved.
    ProofUnavailable,
    /// A link resolved to a different delegation.
    LinkMismatch,
    /// A proof has expired.
    ProofExpired,
    /// A proof is not yet valid.
    ProofNotYetValid,

    // 403 Forbidden
    /// The claim is not authorized.
    Unauthorized,
    /// A chain ends at an issuer with no authority.
    UntrustedIssuer,
    /// A capability is not recognized.
    UnknownCapability,
    /// A capability does not fit its schema.
    MalformedCapability,
    /// A claim asks for more than a proof grants.
    EscalatedDelegation,
    /// A proof cites itself.
    CyclicProof,
    /// The chain is too deep.
    DepthExceeded,

    // 499 / 504
    /// The caller cancelled.
    Cancelled,
    /// The timeout elapsed.
    DeadlineElapsed,

    // 500 Internal Server Error
    /// The validator is misconfigured.
    InvalidConfig,
}

impl ErrorCode {
    /// The stable name of this code.
    pub fn name(&self) -> &'static str {
        match self {
            ErrorCode::SignatureInvalid => "SIGNATURE_INVALID",
            ErrorCode::AudienceMismatch => "AUDIENCE_MISMATCH",
            ErrorCode::ProofUnavailable => "PROOF_UNAVAILABLE",
            ErrorCode::LinkMismatch => "LINK_MISMATCH",
            ErrorCode::ProofExpired => "PROOF_EXPIRED",
            ErrorCode::ProofNotYetValid => "PROOF_NOT_YET_VALID",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::UntrustedIssuer => "UNTRUSTED_ISSUER",
            ErrorCode::UnknownCapability => "UNKNOWN_CAPABILITY",
            ErrorCode::MalformedCapability => "MALFORMED_CAPABILITY",
            ErrorCode::EscalatedDelegation => "ESCALATED_DELEGATION",
            ErrorCode::CyclicProof => "CYCLIC_PROOF",
            ErrorCode::DepthExceeded => "DEPTH_EXCEEDED",
            ErrorCode::Cancelled => "CANCELLED",
            ErrorCode::DeadlineElapsed => "DEADLINE_ELAPSED",
            ErrorCode::InvalidConfig => "INVALID_CONFIG",
        }
    }

    /// The HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorCode::SignatureInvalid
            | ErrorCode::AudienceMismatch
            | ErrorCode::ProofUnavailable
            | ErrorCode::LinkMismatch
            | ErrorCode::ProofExpired
            | ErrorCode::ProofNotYetValid => 401,

            ErrorCode::Unauthorized
            | ErrorCode::UntrustedIssuer
            | ErrorCode::UnknownCapability
            | ErrorCode::MalformedCapability
            | ErrorCode::EscalatedDelegation
            | ErrorCode::CyclicProof
            | ErrorCode::DepthExceeded => 403,

            ErrorCode::Cancelled => 499,
            ErrorCode::DeadlineElapsed => 504,

            ErrorCode::InvalidConfig => 500,
        }
    }
}

/// An error code with a human-readable message, for services to render.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}: {message}", .code.name())]
pub struct ServiceError {
    /// The error code.
    pub code: ErrorCode,
    /// The message.
    pub message: String,
}

impl ServiceError {
    /// The HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        self.code.status_code()
    }
}

impl From<ValidationError> for ServiceError {
    fn from(error: ValidationError) -> Self {
        ServiceError {
            code: error.code(),
            message: error.to_string(),
        }
    }
}

impl From<ConfigError> for ServiceError {
    fn from(error: ConfigError) -> Self {
        ServiceError {
            code: ErrorCode::InvalidConfig,
            message: error.to_string(),
        }
    }
}
