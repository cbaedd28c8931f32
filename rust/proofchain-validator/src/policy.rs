//! Root authority policy.

pub use proofchain_capability::{CanIssue, SelfIssued};

use proofchain_capability::ParsedCapability;
use proofchain_principal::{Did, PrincipalParser, same_principal};
use std::{fmt, sync::Arc};

/// Accepts configured root authorities for every capability and defers to
/// an inner policy for everyone else.
#[derive(Clone)]
pub struct TrustedRoots {
    roots: Vec<Did>,
    policy: Arc<dyn CanIssue>,
    parser: Arc<dyn PrincipalParser>,
}

impl TrustedRoots {
    /// Trusts `roots` on top of `policy`, comparing principals through
    /// `parser`.
    pub fn new(roots: Vec<Did>, policy: Arc<dyn CanIssue>, parser: Arc<dyn PrincipalParser>) -> Self {
        Self {
            roots,
            policy,
            parser,
        }
    }

    /// The configured roots.
    pub fn roots(&self) -> &[Did] {
        &self.roots
    }
}

impl CanIssue for TrustedRoots {
    fn can_issue(&self, capability: &ParsedCapability, issuer: &Did) -> bool {
        self.roots
            .iter()
            .any(|root| same_principal(self.parser.as_ref(), root, issuer))
            || self.policy.can_issue(capability, issuer)
    }
}

impl fmt::Debug for TrustedRoots {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustedRoots")
            .field("roots", &self.roots)
            .field("parser", &self.parser)
            .finish_non_exhaustive()
    }
}
