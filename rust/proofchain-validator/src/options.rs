//! Validator configuration.

use crate::{
    error::ConfigError,
    policy::{CanIssue, SelfIssued, TrustedRoots},
    resolver::{ProofResolver, Unresolvable},
};
use proofchain_capability::{Selector, Timestamp};
use proofchain_principal::{Did, DidKeyParser, PrincipalParser};
use serde::Deserialize;
use std::{fmt, sync::Arc, time::Duration};

/// Default bound on the number of delegations between a claim and its root.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Default number of proofs resolved concurrently per validation.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Tunables an embedding service may load from its configuration file.
///
/// Every field has a default, so an empty document is valid.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidatorSettings {
    /// Maximum chain length.
    pub max_depth: usize,
    /// Maximum concurrent resolver calls.
    pub concurrency: usize,
    /// Overall deadline in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Whether to verify every delegation's signature.
    pub verify_signatures: bool,
    /// Principals trusted to issue any capability without proof.
    pub roots: Vec<Did>,
    /// The principal invocations must be addressed to.
    pub authority: Option<Did>,
}

impl Default for ValidatorSettings {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            concurrency: DEFAULT_CONCURRENCY,
            timeout_ms: None,
            verify_signatures: false,
            roots: Vec::new(),
            authority: None,
        }
    }
}

/// Everything a [`Validator`](crate::Validator) needs.
///
/// Build with [`ValidationOptions::builder`].
#[derive(Clone)]
pub struct ValidationOptions {
    pub(crate) capability: Arc<dyn Selector>,
    pub(crate) can_issue: Arc<dyn CanIssue>,
    pub(crate) principal: Arc<dyn PrincipalParser>,
    pub(crate) resolver: Arc<dyn ProofResolver>,
    pub(crate) max_depth: usize,
    pub(crate) concurrency: usize,
    pub(crate) timeout: Option<Duration>,
    pub(crate) verify_signatures: bool,
    pub(crate) authority: Option<Did>,
    pub(crate) now: Option<Timestamp>,
}

impl ValidationOptions {
    /// Starts a builder with defaults for everything but the selector.
    pub fn builder() -> ValidationOptionsBuilder {
        ValidationOptionsBuilder::default()
    }

    /// The registered capability selector.
    pub fn capability(&self) -> &Arc<dyn Selector> {
        &self.capability
    }

    /// The effective root policy, trusted roots included.
    pub fn can_issue(&self) -> &Arc<dyn CanIssue> {
        &self.can_issue
    }

    /// The principal parser.
    pub fn principal(&self) -> &Arc<dyn PrincipalParser> {
        &self.principal
    }

    /// Maximum chain length.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Maximum concurrent resolver calls.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Overall deadline.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Whether signatures are verified.
    pub fn verify_signatures(&self) -> bool {
        self.verify_signatures
    }

    /// The principal invocations must be addressed to, if any.
    pub fn authority(&self) -> Option<&Did> {
        self.authority.as_ref()
    }

    pub(crate) fn now(&self) -> Timestamp {
        self.now.unwrap_or_else(Timestamp::now)
    }
}

impl fmt::Debug for ValidationOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationOptions")
            .field("capability", &self.capability)
            .field("principal", &self.principal)
            .field("max_depth", &self.max_depth)
            .field("concurrency", &self.concurrency)
            .field("timeout", &self.timeout)
            .field("verify_signatures", &self.verify_signatures)
            .field("authority", &self.authority)
            .field("now", &self.now)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ValidationOptions`].
#[derive(Default)]
pub struct ValidationOptionsBuilder {
    capability: Option<Arc<dyn Selector>>,
    can_issue: Option<Arc<dyn CanIssue>>,
    principal: Option<Arc<dyn PrincipalParser>>,
    resolver: Option<Arc<dyn ProofResolver>>,
    settings: ValidatorSettings,
    now: Option<Timestamp>,
}

impl ValidationOptionsBuilder {
    /// Registers the selector for every ability the service understands.
    #[must_use]
    pub fn capability(mut self, selector: impl Selector + 'static) -> Self {
        self.capability = Some(Arc::new(selector));
        self
    }

    /// Sets the root policy. Defaults to [`SelfIssued`] over the principal
    /// parser.
    #[must_use]
    pub fn can_issue(mut self, policy: impl CanIssue + 'static) -> Self {
        self.can_issue = Some(Arc::new(policy));
        self
    }

    /// Sets the principal parser. Defaults to [`DidKeyParser`].
    #[must_use]
    pub fn principal(mut self, parser: impl PrincipalParser + 'static) -> Self {
        self.principal = Some(Arc::new(parser));
        self
    }

    /// Sets the proof resolver. Defaults to [`Unresolvable`].
    #[must_use]
    pub fn resolver(mut self, resolver: impl ProofResolver + 'static) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    /// Replaces every setting at once.
    #[must_use]
    pub fn settings(mut self, settings: ValidatorSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Trusts `root` to issue any capability without proof.
    #[must_use]
    pub fn root(mut self, root: Did) -> Self {
        self.settings.roots.push(root);
        self
    }

    /// Requires invocations to be addressed to `authority`.
    #[must_use]
    pub fn authority(mut self, authority: Did) -> Self {
        self.settings.authority = Some(authority);
        self
    }

    /// Sets the maximum chain length.
    #[must_use]
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.settings.max_depth = max_depth;
        self
    }

    /// Sets the maximum concurrent resolver calls.
    #[must_use]
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.settings.concurrency = concurrency;
        self
    }

    /// Sets an overall deadline.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.settings.timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Turns signature verification on or off.
    #[must_use]
    pub fn verify_signatures(mut self, verify: bool) -> Self {
        self.settings.verify_signatures = verify;
        self
    }

    /// Pins the clock used for time checks.
    #[must_use]
    pub fn now(mut self, now: Timestamp) -> Self {
        self.now = Some(now);
        self
    }

    /// Validates the configuration.
    pub fn build(self) -> Result<ValidationOptions, ConfigError> {
        let capability = self.capability.ok_or(ConfigError::MissingCapability)?;
        let settings = self.settings;
        if settings.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if settings.max_depth == 0 {
            return Err(ConfigError::ZeroDepth);
        }

        let principal = self
            .principal
            .unwrap_or_else(|| Arc::new(DidKeyParser::default()));
        let mut can_issue = self
            .can_issue
            .unwrap_or_else(|| Arc::new(SelfIssued::new(principal.clone())));
        if !settings.roots.is_empty() {
            can_issue = Arc::new(TrustedRoots::new(
                settings.roots,
                can_issue,
                principal.clone(),
            ));
        }

        Ok(ValidationOptions {
            capability,
            can_issue,
            principal,
            resolver: self.resolver.unwrap_or_else(|| Arc::new(Unresolvable)),
            max_depth: settings.max_depth,
            concurrency: settings.concurrency,
            timeout: settings.timeout_ms.map(Duration::from_millis),
            verify_signatures: settings.verify_signatures,
            authority: settings.authority,
            now: self.now,
        })
    }
}
