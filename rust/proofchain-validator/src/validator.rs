//! The proof chain walk.
//!
//! A claim is matched against the registered selector, then proven link by
//! link: each pending match is pruned by the root policy, the proofs of the
//! delegations it still depends on are resolved and checked, and the match
//! is selected against their capabilities. Every narrower match found this
//! way is a candidate for the next link. The first candidate that reaches a
//! root authority wins; if none does, every failure along every path is
//! reported.

use crate::{
    authorization::Authorization,
    error::{
        CancelReason, Cancelled, InvalidAudience, InvalidClaim, InvalidProof, Unauthorized,
        UnavailableProof, ValidationError,
    },
    options::ValidationOptions,
};
use futures::{FutureExt, StreamExt, future::BoxFuture, stream};
use ipld_core::cid::Cid;
use parking_lot::Mutex;
use proofchain_capability::{
    Capability, Delegation, Match, MatchKey, Proof, Select, Source, Timestamp,
};
use proofchain_principal::same_principal;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{OnceCell, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace, warn};

type Resolution = Result<Arc<Delegation>, UnavailableProof>;

/// Validates claims against delegation chains.
///
/// Cheap to clone; clones share the same options.
#[derive(Debug, Clone)]
pub struct Validator {
    options: Arc<ValidationOptions>,
}

impl Validator {
    /// Creates a validator.
    pub fn new(options: ValidationOptions) -> Self {
        Self {
            options: Arc::new(options),
        }
    }

    /// The options this validator was built with.
    pub fn options(&self) -> &ValidationOptions {
        &self.options
    }

    /// Checks that `delegation` authorizes `capability`.
    ///
    /// The claim is made by the issuer of `delegation`, on the authority of
    /// the proofs `delegation` carries.
    pub async fn validate(
        &self,
        capability: &Capability,
        delegation: Arc<Delegation>,
    ) -> Result<Authorization, ValidationError> {
        self.validate_with(capability, delegation, CancellationToken::new())
            .await
    }

    /// Like [`Validator::validate`], abandoning the walk once `token` is
    /// cancelled.
    ///
    /// Abandoning drops every in-flight resolver future.
    #[instrument(
        skip_all,
        fields(
            can = %capability.can,
            with = %capability.with,
            delegation = %delegation.cid(),
        )
    )]
    pub async fn validate_with(
        &self,
        capability: &Capability,
        delegation: Arc<Delegation>,
        token: CancellationToken,
    ) -> Result<Authorization, ValidationError> {
        let sources = vec![Source::claim(capability.clone(), delegation.clone())];
        self.decide(capability.clone(), delegation, sources, token)
            .await
    }

    /// Checks that an invocation is authorized to exercise every capability
    /// it carries.
    ///
    /// The selector is applied to the invocation's capabilities as a whole,
    /// so conjunctions registered with `and` are matched as a group.
    pub async fn access(&self, invocation: Arc<Delegation>) -> Result<Authorization, ValidationError> {
        self.access_with(invocation, CancellationToken::new()).await
    }

    /// Like [`Validator::access`], abandoning the walk once `token` is
    /// cancelled.
    #[instrument(skip_all, fields(invocation = %invocation.cid()))]
    pub async fn access_with(
        &self,
        invocation: Arc<Delegation>,
        token: CancellationToken,
    ) -> Result<Authorization, ValidationError> {
        let sources = Source::all(&invocation);
        let claimed = sources.first().map_or_else(
            || Capability::new(proofchain_capability::ANY_ABILITY, invocation.issuer()),
            |source| source.capability.clone(),
        );
        self.decide(claimed, invocation, sources, token).await
    }

    async fn decide(
        &self,
        claimed: Capability,
        root: Arc<Delegation>,
        sources: Vec<Source>,
        token: CancellationToken,
    ) -> Result<Authorization, ValidationError> {
        let session = Session::new(self.options.clone());
        let deadline = async {
            match self.options.timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending::<()>().await,
            }
        };

        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => Err(Cancelled { reason: CancelReason::Cancellation }),
            _ = deadline => Err(Cancelled { reason: CancelReason::DeadlineElapsed }),
            outcome = session.authorize_root(claimed, root, &sources) => Ok(outcome),
        };

        match outcome {
            Ok(Ok(authorization)) => {
                debug!(
                    capability = %authorization.capability,
                    depth = authorization.depth(),
                    "authorized"
                );
                Ok(authorization)
            }
            Ok(Err(unauthorized)) => {
                debug!(causes = unauthorized.causes().len(), "unauthorized");
                Err(unauthorized.into())
            }
            Err(cancelled) => {
                debug!(reason = ?cancelled.reason, "validation cancelled");
                Err(cancelled.into())
            }
        }
    }
}

/// State shared by one validation: the resolution and failure memos and the
/// resolver permits. Dropped when the validation returns.
struct Session {
    options: Arc<ValidationOptions>,
    now: Timestamp,
    permits: Semaphore,
    resolved: Mutex<HashMap<Cid, Arc<OnceCell<Resolution>>>>,
    /// Matches already shown unprovable at a depth. Successes are not kept:
    /// the first one ends the walk.
    failed: Mutex<HashMap<(MatchKey, usize), Arc<InvalidClaim>>>,
}

impl Session {
    fn new(options: Arc<ValidationOptions>) -> Self {
        Self {
            now: options.now(),
            permits: Semaphore::new(options.concurrency),
            resolved: Mutex::new(HashMap::new()),
            failed: Mutex::new(HashMap::new()),
            options,
        }
    }

    async fn authorize_root(
        &self,
        claimed: Capability,
        root: Arc<Delegation>,
        sources: &[Source],
    ) -> Result<Authorization, Unauthorized> {
        let mut unauthorized = Unauthorized {
            capability: claimed,
            delegation: *root.cid(),
            delegation_errors: Vec::new(),
            unknown_capabilities: Vec::new(),
            invalid_proofs: Vec::new(),
            failed_proofs: Vec::new(),
        };

        if let Err(invalid) = self.check_root(&root) {
            unauthorized.invalid_proofs.push(invalid);
            return Err(unauthorized);
        }

        let Select {
            matches,
            errors,
            unknown,
        } = self.options.capability.select(sources);
        trace!(
            matches = matches.len(),
            errors = errors.len(),
            unknown = unknown.len(),
            "selected claim"
        );
        unauthorized.delegation_errors = errors;
        unauthorized.unknown_capabilities =
            unknown.into_iter().map(|source| source.capability).collect();

        for matched in matches {
            match self.authorize(matched, vec![*root.cid()], 0).await {
                Ok(authorization) => return Ok(authorization),
                Err(failure) => unauthorized.failed_proofs.push(failure),
            }
        }
        Err(unauthorized)
    }

    /// Proves `matched`, whose delegations are the last entries of `lineage`
    /// and sit `depth` proof levels below the claim.
    ///
    /// A match that already failed at this depth fails again without being
    /// walked, so a proof graph with shared ancestors costs one walk per
    /// distinct match.
    fn authorize(
        &self,
        matched: Match,
        lineage: Vec<Cid>,
        depth: usize,
    ) -> BoxFuture<'_, Result<Authorization, Arc<InvalidClaim>>> {
        async move {
            let key = (matched.key(), depth);
            if let Some(failure) = self.failed.lock().get(&key) {
                trace!(claim = %matched, depth, "already failed");
                return Err(failure.clone());
            }
            let failure = match self.prove(matched, lineage, depth).await {
                Ok(authorization) => return Ok(authorization),
                Err(failure) => Arc::new(failure),
            };
            self.failed.lock().insert(key, failure.clone());
            Err(failure)
        }
        .boxed()
    }

    async fn prove(
        &self,
        matched: Match,
        lineage: Vec<Cid>,
        depth: usize,
    ) -> Result<Authorization, InvalidClaim> {
        let Some(pending) = matched.prune(self.options.can_issue.as_ref()) else {
            debug!(claim = %matched, depth, "reached root authority");
            return Ok(Authorization::new(matched, Vec::new()));
        };

        let (sources, invalid_proofs) = self.proofs_of(&pending, &lineage, depth + 1).await;
        let select = pending.select(&sources);
        trace!(
            claim = %pending,
            matches = select.matches.len(),
            errors = select.errors.len(),
            unknown = select.unknown.len(),
            "selected proofs"
        );

        let mut failed_proofs = Vec::new();
        for candidate in select.matches {
            let mut lineage = lineage.clone();
            lineage.extend(candidate.delegations().iter().map(|proof| *proof.cid()));
            match self.authorize(candidate, lineage, depth + 1).await {
                Ok(proof) => return Ok(Authorization::new(matched, vec![proof])),
                Err(failure) => failed_proofs.push(failure),
            }
        }

        let mut failure = InvalidClaim {
            claim: pending.value().clone(),
            delegation: *pending.source().delegation.cid(),
            delegation_errors: select.errors,
            unknown_capabilities: select
                .unknown
                .into_iter()
                .map(|source| source.capability)
                .collect(),
            invalid_proofs,
            failed_proofs,
        };
        if failure.causes().is_empty() {
            // Nothing below to blame: the issuers themselves lack authority.
            failure.invalid_proofs = pending
                .delegations()
                .iter()
                .map(|delegation| {
                    debug!(
                        delegation = %delegation.cid(),
                        issuer = %delegation.issuer(),
                        "untrusted issuer"
                    );
                    InvalidProof::UntrustedIssuer {
                        delegation: *delegation.cid(),
                        issuer: delegation.issuer().clone(),
                    }
                })
                .collect();
        }
        Err(failure)
    }

    /// Resolves and checks the proofs of every delegation `pending` depends
    /// on, returning the capabilities of the valid ones.
    async fn proofs_of(
        &self,
        pending: &Match,
        lineage: &[Cid],
        depth: usize,
    ) -> (Vec<Source>, Vec<InvalidProof>) {
        let mut cited: Vec<(Arc<Delegation>, Proof)> = Vec::new();
        for delegation in pending.delegations() {
            for proof in delegation.proofs() {
                cited.push((delegation.clone(), proof.clone()));
            }
        }

        if depth > self.options.max_depth {
            warn!(depth, max_depth = self.options.max_depth, "proof chain too deep");
            let invalid = cited
                .iter()
                .map(|(_, proof)| InvalidProof::DepthExceeded {
                    delegation: proof.link(),
                    max_depth: self.options.max_depth,
                })
                .collect();
            return (Vec::new(), invalid);
        }

        let resolved: Vec<(Arc<Delegation>, Cid, Resolution)> = stream::iter(cited)
            .map(|(citing, proof)| async move {
                let resolution = self.resolve(&proof).await;
                (citing, proof.link(), resolution)
            })
            .buffered(self.options.concurrency)
            .collect()
            .await;

        let mut sources = Vec::new();
        let mut invalid_proofs = Vec::new();
        for (citing, link, resolution) in resolved {
            let checked = resolution
                .map_err(InvalidProof::from)
                .and_then(|proof| {
                    if proof.cid() == &link {
                        Ok(proof)
                    } else {
                        Err(InvalidProof::LinkMismatch {
                            link,
                            received: *proof.cid(),
                        })
                    }
                })
                .and_then(|proof| self.check_proof(&citing, &proof, lineage).map(|()| proof));
            match checked {
                Ok(proof) => sources.extend(Source::all(&proof)),
                Err(invalid) => {
                    debug!(delegation = %invalid.delegation(), error = %invalid, "rejected proof");
                    invalid_proofs.push(invalid);
                }
            }
        }
        (sources, invalid_proofs)
    }

    /// Resolves a proof at most once per link for the whole session.
    async fn resolve(&self, proof: &Proof) -> Resolution {
        let link = match proof {
            Proof::Inline(delegation) => return Ok(delegation.clone()),
            Proof::Link(link) => *link,
        };
        let cell = self.resolved.lock().entry(link).or_default().clone();
        cell.get_or_init(|| async {
            let Ok(_permit) = self.permits.acquire().await else {
                return Err(UnavailableProof {
                    link,
                    cause: "resolver pool is closed".into(),
                });
            };
            debug!(%link, "resolving proof");
            self.options.resolver.resolve(&link).await
        })
        .await
        .clone()
    }

    fn check_root(&self, root: &Delegation) -> Result<(), InvalidProof> {
        if let Some(authority) = &self.options.authority {
            if !same_principal(self.options.principal.as_ref(), root.audience(), authority) {
                return Err(InvalidAudience {
                    delegation: *root.cid(),
                    audience: root.audience().clone(),
                    issuer: authority.clone(),
                }
                .into());
            }
        }
        self.check_time(root)?;
        self.check_signature(root)
    }

    fn check_proof(
        &self,
        citing: &Delegation,
        proof: &Delegation,
        lineage: &[Cid],
    ) -> Result<(), InvalidProof> {
        if lineage.contains(proof.cid()) {
            warn!(delegation = %proof.cid(), "cyclic proof");
            return Err(InvalidProof::Cyclic {
                delegation: *proof.cid(),
            });
        }
        if !same_principal(
            self.options.principal.as_ref(),
            proof.audience(),
            citing.issuer(),
        ) {
            return Err(InvalidAudience {
                delegation: *proof.cid(),
                audience: proof.audience().clone(),
                issuer: citing.issuer().clone(),
            }
            .into());
        }
        self.check_time(proof)?;
        self.check_signature(proof)
    }

    fn check_time(&self, delegation: &Delegation) -> Result<(), InvalidProof> {
        if let Some(expiration) = delegation
            .expiration()
            .filter(|_| delegation.is_expired(self.now))
        {
            return Err(InvalidProof::Expired {
                delegation: *delegation.cid(),
                expiration,
            });
        }
        if let Some(not_before) = delegation
            .not_before()
            .filter(|_| delegation.is_too_early(self.now))
        {
            return Err(InvalidProof::NotValidBefore {
                delegation: *delegation.cid(),
                not_before,
            });
        }
        Ok(())
    }

    fn check_signature(&self, delegation: &Delegation) -> Result<(), InvalidProof> {
        if !self.options.verify_signatures {
            return Ok(());
        }
        let invalid = |cause: String| InvalidProof::InvalidSignature {
            delegation: *delegation.cid(),
            issuer: delegation.issuer().clone(),
            cause,
        };
        let verifier = self
            .options
            .principal
            .parse(delegation.issuer())
            .map_err(|error| invalid(error.to_string()))?;
        delegation
            .verify_signature(verifier.as_ref())
            .map_err(|error| invalid(error.to_string()))
    }
}
