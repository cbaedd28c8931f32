//! Root authority policy.

use crate::capability::ParsedCapability;
use proofchain_principal::{Did, DidKeyParser, PrincipalParser, same_principal};
use std::sync::Arc;

/// Decides whether `issuer` may grant `capability` without a proof.
///
/// An issuer accepted here is a root of authority for that capability, and
/// the chain walk stops at it.
pub trait CanIssue: Send + Sync {
    /// Returns `true` when `issuer` needs no proof for `capability`.
    fn can_issue(&self, capability: &ParsedCapability, issuer: &Did) -> bool;
}

/// The default policy: a principal has authority over the resource that is
/// its own DID.
///
/// The resource and the issuer are compared as principals through a
/// [`PrincipalParser`], so any spelling the parser maps to the issuer counts.
#[derive(Debug, Clone)]
pub struct SelfIssued {
    parser: Arc<dyn PrincipalParser>,
}

impl SelfIssued {
    /// Compares resources and issuers through `parser`.
    pub fn new(parser: Arc<dyn PrincipalParser>) -> Self {
        Self { parser }
    }
}

impl Default for SelfIssued {
    fn default() -> Self {
        Self::new(Arc::new(DidKeyParser::default()))
    }
}

impl CanIssue for SelfIssued {
    fn can_issue(&self, capability: &ParsedCapability, issuer: &Did) -> bool {
        capability
            .with
            .as_str()
            .parse::<Did>()
            .is_ok_and(|with| same_principal(self.parser.as_ref(), &with, issuer))
    }
}

impl<F> CanIssue for F
where
    F: Fn(&ParsedCapability, &Did) -> bool + Send + Sync,
{
    fn can_issue(&self, capability: &ParsedCapability, issuer: &Did) -> bool {
        self(capability, issuer)
    }
}
