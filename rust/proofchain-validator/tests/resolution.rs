//! Proof resolution: failures, memoization, fan-out bounds, link integrity
//! and cancellation.

mod common;

use async_trait::async_trait;
use common::*;
use pretty_assertions::assert_eq;
use proofchain_capability::{Cid, Delegation, ParsedCapability};
use proofchain_principal::{Did, Principal};
use proofchain_validator::{
    CancelReason, Cancelled, CancellationToken, ErrorCode, InvalidProof, MemoryResolver,
    ProofResolver, UnavailableProof, ValidationError, Validator,
};
use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};
use testresult::TestResult;

/// Counts calls per link and tracks how many are in flight at once.
#[derive(Debug, Default, Clone)]
struct Counting {
    inner: MemoryResolver,
    calls: Arc<parking_lot::Mutex<HashMap<Cid, usize>>>,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl Counting {
    fn calls(&self, link: &Cid) -> usize {
        self.calls.lock().get(link).copied().unwrap_or(0)
    }
}

#[async_trait]
impl ProofResolver for Counting {
    async fn resolve(&self, link: &Cid) -> Result<Arc<Delegation>, UnavailableProof> {
        *self.calls.lock().entry(*link).or_default() += 1;
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(current, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.inner.resolve(link).await
    }
}

/// Answers links with whatever it was told to, regardless of content.
#[derive(Debug, Default)]
struct Rigged(HashMap<Cid, Arc<Delegation>>);

#[async_trait]
impl ProofResolver for Rigged {
    async fn resolve(&self, link: &Cid) -> Result<Arc<Delegation>, UnavailableProof> {
        self.0.get(link).cloned().ok_or_else(|| UnavailableProof {
            link: *link,
            cause: "not rigged".into(),
        })
    }
}

/// Never answers; records when its pending call is dropped.
#[derive(Debug, Default, Clone)]
struct Hanging {
    dropped: Arc<AtomicBool>,
}

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProofResolver for Hanging {
    async fn resolve(&self, _link: &Cid) -> Result<Arc<Delegation>, UnavailableProof> {
        let _flag = DropFlag(self.dropped.clone());
        std::future::pending().await
    }
}

#[tokio::test]
async fn it_explores_siblings_of_an_unavailable_proof() -> TestResult {
    let (a, b) = (signer(1), signer(2));
    let space = space();

    let missing = delegate(&a, &b.did(), vec![add(&space)], vec![])?;
    let stored = Delegation::builder()
        .audience(b.did())
        .capability(add(&space))
        .nonce("stored")
        .sign(&a)?;
    let resolver = MemoryResolver::new();
    let stored = resolver.insert(stored);

    let claim = add(&space);
    let invocation = Arc::new(
        Delegation::builder()
            .audience(b.did())
            .capability(claim.clone())
            .proof(*missing.cid())
            .proof(stored)
            .sign(&b)?,
    );

    let validator = Validator::new(options().root(a.did()).resolver(resolver).build()?);
    let authorization = validator.validate(&claim, invocation).await?;
    assert_eq!(authorization.proofs[0].delegation.cid(), &stored);
    Ok(())
}

#[tokio::test]
async fn it_reports_every_failed_proof() -> TestResult {
    let (a, b) = (signer(1), signer(2));
    let space = space();

    let missing = delegate(&a, &b.did(), vec![add(&space)], vec![])?;
    let expired = Delegation::builder()
        .audience(b.did())
        .capability(add(&space))
        .expiration(NOW)
        .sign(&a)?;
    let resolver = MemoryResolver::new();
    let expired = resolver.insert(expired);

    let claim = add(&space);
    let invocation = Arc::new(
        Delegation::builder()
            .audience(b.did())
            .capability(claim.clone())
            .proof(*missing.cid())
            .proof(expired)
            .sign(&b)?,
    );

    let validator = Validator::new(options().root(a.did()).resolver(resolver).build()?);
    let error = validator.validate(&claim, invocation).await.err();
    let Some(unauthorized) = error.as_ref().and_then(ValidationError::unauthorized) else {
        panic!("expected unauthorized, got {error:?}");
    };

    let invalid = &unauthorized.failed_proofs[0].invalid_proofs;
    assert_eq!(invalid.len(), 2);
    assert_eq!(invalid[0].code(), ErrorCode::ProofUnavailable);
    assert_eq!(invalid[0].delegation(), *missing.cid());
    assert_eq!(invalid[1].code(), ErrorCode::ProofExpired);
    assert_eq!(invalid[1].delegation(), expired);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn it_resolves_each_link_once_per_validation() -> TestResult {
    let (a, b, c) = (signer(1), signer(2), signer(3));
    let space = space();

    // Both paths share an expired grandparent, so both are walked.
    let shared = Delegation::builder()
        .audience(b.did())
        .capability(add(&space))
        .expiration(NOW)
        .sign(&a)?;
    let counting = Counting::default();
    let shared = counting.inner.insert(shared);

    let left = Delegation::builder()
        .audience(c.did())
        .capability(add(&space))
        .nonce("left")
        .proof(shared)
        .sign(&b)?;
    let right = Delegation::builder()
        .audience(c.did())
        .capability(add(&space))
        .nonce("right")
        .proof(shared)
        .sign(&b)?;
    let claim = add(&space);
    let invocation = delegate(&c, &c.did(), vec![claim.clone()], vec![Arc::new(left), Arc::new(right)])?;

    let validator = Validator::new(
        options()
            .root(a.did())
            .resolver(counting.clone())
            .build()?,
    );
    let error = validator.validate(&claim, invocation.clone()).await.err();
    let Some(unauthorized) = error.as_ref().and_then(ValidationError::unauthorized) else {
        panic!("expected unauthorized, got {error:?}");
    };
    assert_eq!(unauthorized.failed_proofs[0].failed_proofs.len(), 2);
    assert_eq!(counting.calls(&shared), 1);

    // A fresh validation starts with a fresh memo.
    let _ = validator.validate(&claim, invocation).await;
    assert_eq!(counting.calls(&shared), 2);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn it_bounds_concurrent_resolution() -> TestResult {
    let (a, b) = (signer(1), signer(2));
    let space = space();
    let counting = Counting::default();

    let mut builder = Delegation::builder().audience(b.did()).capability(add(&space));
    for nonce in 0..6 {
        let proof = Delegation::builder()
            .audience(b.did())
            .capability(add(&space))
            .nonce(nonce.to_string())
            .sign(&a)?;
        builder = builder.proof(counting.inner.insert(proof));
    }
    let invocation = Arc::new(builder.sign(&b)?);

    let validator = Validator::new(
        options()
            .root(a.did())
            .resolver(counting.clone())
            .concurrency(2)
            .build()?,
    );
    validator.validate(&add(&space), invocation).await?;

    assert_eq!(counting.calls.lock().len(), 6);
    assert_eq!(counting.peak.load(Ordering::SeqCst), 2);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn it_rejects_links_answered_with_another_delegation() -> TestResult {
    let (a, b) = (signer(1), signer(2));
    let space = space();

    // `cited` is what `b` signed over; the resolver answers with `swapped`.
    let cited = delegate(&a, &b.did(), vec![add(&space)], vec![])?;
    let swapped = Arc::new(
        Delegation::builder()
            .audience(b.did())
            .capability(add(&space))
            .nonce("swapped")
            .sign(&a)?,
    );
    let resolver = Rigged(HashMap::from([(*cited.cid(), swapped.clone())]));

    let claim = add(&space);
    let invocation = Arc::new(
        Delegation::builder()
            .audience(b.did())
            .capability(claim.clone())
            .proof(*cited.cid())
            .sign(&b)?,
    );

    let validator = Validator::new(options().root(a.did()).resolver(resolver).build()?);
    let error = validator.validate(&claim, invocation).await.err();
    let Some(unauthorized) = error.as_ref().and_then(ValidationError::unauthorized) else {
        panic!("expected unauthorized, got {error:?}");
    };
    assert_eq!(
        unauthorized.failed_proofs[0].invalid_proofs,
        vec![InvalidProof::LinkMismatch {
            link: *cited.cid(),
            received: *swapped.cid(),
        }]
    );
    assert_eq!(ErrorCode::LinkMismatch.status_code(), 401);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn it_walks_shared_ancestors_once() -> TestResult {
    const LEVELS: u8 = 15;
    let space = space();
    let resolver = MemoryResolver::new();

    // Each level holds two delegations, and each cites both of the level
    // above, so the number of paths doubles per level.
    let mut above: Vec<Cid> = Vec::new();
    for level in 0..LEVELS {
        let (issuer, audience) = (signer(level + 1), signer(level + 2));
        let mut current = Vec::new();
        for side in ["left", "right"] {
            let builder = Delegation::builder()
                .audience(audience.did())
                .capability(add(&space))
                .nonce(side);
            let builder = above
                .iter()
                .fold(builder, |builder, link| builder.proof(*link));
            current.push(resolver.insert(builder.sign(&issuer)?));
        }
        above = current;
    }

    let invoker = signer(LEVELS + 1);
    let claim = add(&space);
    let builder = Delegation::builder()
        .audience(invoker.did())
        .capability(claim.clone());
    let invocation = Arc::new(
        above
            .iter()
            .fold(builder, |builder, link| builder.proof(*link))
            .sign(&invoker)?,
    );

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let validator = Validator::new(
        options()
            .resolver(resolver)
            .can_issue(move |_: &ParsedCapability, _: &Did| {
                counter.fetch_add(1, Ordering::SeqCst);
                false
            })
            .build()?,
    );
    let error = validator.validate(&claim, invocation).await.err();
    let Some(unauthorized) = error.as_ref().and_then(ValidationError::unauthorized) else {
        panic!("expected unauthorized, got {error:?}");
    };

    // One root policy check per distinct delegation.
    assert_eq!(calls.load(Ordering::SeqCst), 1 + 2 * usize::from(LEVELS));
    assert_eq!(unauthorized.causes().len(), 2);
    assert!(unauthorized.has_cause(ErrorCode::UntrustedIssuer));
    Ok(())
}

#[tokio::test]
async fn it_stops_when_cancelled() -> TestResult {
    let (a, b) = (signer(1), signer(2));
    let space = space();
    let hanging = Hanging::default();

    let linked = delegate(&a, &b.did(), vec![add(&space)], vec![])?;
    let claim = add(&space);
    let invocation = Arc::new(
        Delegation::builder()
            .audience(b.did())
            .capability(claim.clone())
            .proof(*linked.cid())
            .sign(&b)?,
    );

    let validator = Validator::new(options().root(a.did()).resolver(hanging.clone()).build()?);
    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        canceller.cancel();
    });

    let result = validator.validate_with(&claim, invocation, token).await;
    assert_eq!(
        result.err(),
        Some(ValidationError::Cancelled(Cancelled {
            reason: CancelReason::Cancellation
        }))
    );
    assert!(hanging.dropped.load(Ordering::SeqCst));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn it_gives_up_at_the_deadline() -> TestResult {
    let (a, b) = (signer(1), signer(2));
    let space = space();

    let linked = delegate(&a, &b.did(), vec![add(&space)], vec![])?;
    let claim = add(&space);
    let invocation = Arc::new(
        Delegation::builder()
            .audience(b.did())
            .capability(claim.clone())
            .proof(*linked.cid())
            .sign(&b)?,
    );

    let validator = Validator::new(
        options()
            .root(a.did())
            .resolver(Hanging::default())
            .timeout(Duration::from_millis(50))
            .build()?,
    );
    let error = validator.validate(&claim, invocation).await.err();
    let Some(error) = error else {
        panic!("expected a deadline");
    };
    assert_eq!(error.code(), ErrorCode::DeadlineElapsed);
    assert_eq!(error.code().status_code(), 504);
    Ok(())
}
