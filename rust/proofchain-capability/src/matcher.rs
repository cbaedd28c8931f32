//! The matcher and selector seams.

use crate::{
    capability::Capability,
    delegation::Delegation,
    error::{DelegationError, MatchError},
    matches::Match,
};
use ipld_core::cid::Cid;
use std::{collections::HashSet, fmt::Debug, sync::Arc};

/// A capability together with the delegation that carried it.
#[derive(Debug, Clone)]
pub struct Source {
    /// The capability as written.
    pub capability: Capability,
    /// The delegation carrying it.
    pub delegation: Arc<Delegation>,
    /// Position of the capability in the delegation's `capabilities`. Claims
    /// not carried by the delegation use the first free position.
    pub index: usize,
}

impl Source {
    /// Every capability of `delegation`, in order.
    pub fn all(delegation: &Arc<Delegation>) -> Vec<Source> {
        delegation
            .capabilities()
            .iter()
            .enumerate()
            .map(|(index, capability)| Source {
                capability: capability.clone(),
                delegation: delegation.clone(),
                index,
            })
            .collect()
    }

    /// `capability` claimed on the authority of `delegation`.
    pub fn claim(capability: Capability, delegation: Arc<Delegation>) -> Source {
        let index = delegation
            .capabilities()
            .iter()
            .position(|carried| carried == &capability)
            .unwrap_or(delegation.capabilities().len());
        Source {
            capability,
            delegation,
            index,
        }
    }

    /// Identifies this source within a selection.
    pub fn key(&self) -> (Cid, usize) {
        (*self.delegation.cid(), self.index)
    }
}

/// The partition of a list of sources by a selector.
///
/// Every source lands in exactly one of `matches`, `errors` or `unknown`;
/// selection never stops at the first match.
#[derive(Debug, Clone, Default)]
pub struct Select {
    /// Sources the selector matched.
    pub matches: Vec<Match>,
    /// Sources the selector recognized but could not match.
    pub errors: Vec<DelegationError>,
    /// Sources the selector did not recognize.
    pub unknown: Vec<Source>,
}

impl Select {
    /// Files one match outcome for `source`.
    pub fn record(&mut self, source: &Source, outcome: Result<Match, MatchError>) {
        match outcome {
            Ok(matched) => self.matches.push(matched),
            Err(error) if error.is_unknown() => self.unknown.push(source.clone()),
            Err(MatchError::Delegation(error)) => self.errors.push(error),
            Err(error) => self.errors.push(DelegationError {
                capability: source.capability.clone(),
                delegation: *source.delegation.cid(),
                causes: vec![error],
            }),
        }
    }

    /// Keeps only the unknown sources that are also unknown to `other`.
    pub(crate) fn retain_unknown_in(&mut self, other: &[Source]) {
        let known: HashSet<(Cid, usize)> = other.iter().map(Source::key).collect();
        self.unknown.retain(|source| known.contains(&source.key()));
    }
}

/// Selects matches from a list of sources.
pub trait Selector: Debug + Send + Sync {
    /// Partitions `sources` into matches, errors and unknowns.
    fn select(&self, sources: &[Source]) -> Select;
}

/// Matches a single source capability.
pub trait Matcher: Selector {
    /// Matches `source`, or explains why it cannot be matched.
    fn match_source(&self, source: &Source) -> Result<Match, MatchError>;
}

/// Selects by matching each source in turn.
pub fn select_each<M: Matcher + ?Sized>(matcher: &M, sources: &[Source]) -> Select {
    let mut select = Select::default();
    for source in sources {
        select.record(source, matcher.match_source(source));
    }
    select
}
