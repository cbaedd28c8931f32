//! Resolving linked proofs.

use crate::error::UnavailableProof;
use async_trait::async_trait;
use ipld_core::cid::Cid;
use parking_lot::RwLock;
use proofchain_capability::Delegation;
use std::{collections::HashMap, sync::Arc};

/// Fetches the delegation behind a proof link.
///
/// Called at most once per distinct link per validation. Caching across
/// validations and retries are the resolver's own business.
#[async_trait]
pub trait ProofResolver: Send + Sync {
    /// Resolve `link` into the delegation it addresses.
    async fn resolve(&self, link: &Cid) -> Result<Arc<Delegation>, UnavailableProof>;
}

/// Resolves nothing: only inline proofs carry authority.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unresolvable;

#[async_trait]
impl ProofResolver for Unresolvable {
    async fn resolve(&self, link: &Cid) -> Result<Arc<Delegation>, UnavailableProof> {
        Err(UnavailableProof {
            link: *link,
            cause: "no resolver configured".into(),
        })
    }
}

/// An in-memory delegation store.
#[derive(Debug, Clone, Default)]
pub struct MemoryResolver {
    delegations: Arc<RwLock<HashMap<Cid, Arc<Delegation>>>>,
}

impl MemoryResolver {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `delegation` under its CID and returns the CID.
    pub fn insert(&self, delegation: impl Into<Arc<Delegation>>) -> Cid {
        let delegation = delegation.into();
        let cid = *delegation.cid();
        self.delegations.write().insert(cid, delegation);
        cid
    }

    /// Removes a delegation.
    pub fn remove(&self, cid: &Cid) -> Option<Arc<Delegation>> {
        self.delegations.write().remove(cid)
    }

    /// Number of stored delegations.
    pub fn len(&self) -> usize {
        self.delegations.read().len()
    }

    /// Returns `true` when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.delegations.read().is_empty()
    }
}

#[async_trait]
impl ProofResolver for MemoryResolver {
    async fn resolve(&self, link: &Cid) -> Result<Arc<Delegation>, UnavailableProof> {
        self.delegations
            .read()
            .get(link)
            .cloned()
            .ok_or_else(|| UnavailableProof {
                link: *link,
                cause: "not found".into(),
            })
    }
}
