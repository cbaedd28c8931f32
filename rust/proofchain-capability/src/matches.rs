//! Matches: a claim recognized by a matcher, ready to be checked against
//! the capabilities of its proofs.

use crate::{
    capability::ParsedCapability,
    delegation::Delegation,
    descriptor::Descriptor,
    error::{DelegationError, EscalatedDelegation, MatchError},
    matcher::{Select, Selector, Source},
    policy::CanIssue,
};
use ipld_core::cid::Cid;
use nonempty::NonEmpty;
use std::{
    collections::HashSet,
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

/// Decides whether a capability matched by the `from` side of a derivation
/// justifies the claimed capability.
pub type DeriveRule = Arc<dyn Fn(&ParsedCapability, &Match) -> Result<(), String> + Send + Sync>;

/// A matched claim.
#[derive(Debug, Clone)]
pub enum Match {
    /// Matched by a single descriptor.
    Direct(DirectMatch),

    /// Matched by the `to` side of a derivation.
    Derived(DerivedMatch),

    /// Matched by every member of a conjunction.
    Group(Box<GroupMatch>),
}

/// A capability matched by a single descriptor.
#[derive(Debug, Clone)]
pub struct DirectMatch {
    /// The descriptor that matched.
    pub descriptor: Descriptor,
    /// Where the capability came from.
    pub source: Source,
    /// The parsed capability.
    pub value: ParsedCapability,
}

/// A capability that proofs may justify either directly or by derivation.
#[derive(Clone)]
pub struct DerivedMatch {
    /// The match of the capability itself.
    pub selected: Box<Match>,
    /// Selects the capabilities it may be derived from.
    pub from: Arc<dyn Selector>,
    /// Checks each derivation.
    pub rule: DeriveRule,
}

/// Matches that must all be proven together.
#[derive(Debug, Clone)]
pub struct GroupMatch {
    /// One match per conjunct.
    pub members: NonEmpty<Match>,
}

impl Match {
    /// The leading parsed capability.
    pub fn value(&self) -> &ParsedCapability {
        match self {
            Match::Direct(direct) => &direct.value,
            Match::Derived(derived) => derived.selected.value(),
            Match::Group(group) => group.members.first().value(),
        }
    }

    /// Every parsed capability, one per conjunct.
    pub fn values(&self) -> Vec<&ParsedCapability> {
        match self {
            Match::Group(group) => group.members.iter().flat_map(Match::values).collect(),
            matched => vec![matched.value()],
        }
    }

    /// The leading source.
    pub fn source(&self) -> &Source {
        match self {
            Match::Direct(direct) => &direct.source,
            Match::Derived(derived) => derived.selected.source(),
            Match::Group(group) => group.members.first().source(),
        }
    }

    /// Every source, one per conjunct.
    pub fn sources(&self) -> Vec<&Source> {
        match self {
            Match::Group(group) => group.members.iter().flat_map(Match::sources).collect(),
            matched => vec![matched.source()],
        }
    }

    /// The distinct delegations carrying the matched capabilities, in order.
    pub fn delegations(&self) -> Vec<Arc<Delegation>> {
        let mut seen: HashSet<Cid> = HashSet::new();
        self.sources()
            .into_iter()
            .filter(|source| seen.insert(*source.delegation.cid()))
            .map(|source| source.delegation.clone())
            .collect()
    }

    /// What this match was built from. See [`MatchKey`].
    pub fn key(&self) -> MatchKey {
        let mut parts = Vec::new();
        self.key_parts(&mut parts);
        MatchKey(parts)
    }

    fn key_parts(&self, parts: &mut Vec<KeyPart>) {
        match self {
            Match::Direct(direct) => parts.push(KeyPart::Direct {
                descriptor: direct.descriptor.clone(),
                source: direct.source.key(),
            }),
            Match::Derived(derived) => {
                parts.push(KeyPart::Derived {
                    from: derived.from.clone(),
                    rule: derived.rule.clone(),
                });
                derived.selected.key_parts(parts);
            }
            Match::Group(group) => {
                parts.push(KeyPart::Group(group.members.len()));
                for member in group.members.iter() {
                    member.key_parts(parts);
                }
            }
        }
    }

    /// Matches this claim against proof capabilities.
    ///
    /// Each resulting match wraps a proof capability that justifies the
    /// claim, and is what the next link of the chain must in turn justify.
    pub fn select(&self, sources: &[Source]) -> Select {
        match self {
            Match::Direct(direct) => direct.select(sources),
            Match::Derived(derived) => derived.select(sources),
            Match::Group(group) => {
                product(group.members.iter().map(|member| member.select(sources)))
            }
        }
    }

    /// Removes every part of this match whose issuer `can_issue` accepts.
    ///
    /// Returns `None` when nothing is left to prove: the match is
    /// self-authorized.
    pub fn prune(&self, can_issue: &dyn CanIssue) -> Option<Match> {
        match self {
            Match::Direct(direct) => {
                let issuer = direct.source.delegation.issuer();
                if can_issue.can_issue(&direct.value, issuer) {
                    None
                } else {
                    Some(self.clone())
                }
            }
            Match::Derived(derived) => derived.selected.prune(can_issue).map(|_| self.clone()),
            Match::Group(group) => {
                let pending = group
                    .members
                    .iter()
                    .filter_map(|member| member.prune(can_issue))
                    .collect();
                NonEmpty::from_vec(pending)
                    .map(|members| Match::Group(Box::new(GroupMatch { members })))
            }
        }
    }
}

/// Identifies a match by the descriptors, rules and sources it was built
/// from.
///
/// Matches with equal keys recognize the same capabilities of the same
/// delegations under the same rules, so they select the same proofs.
/// Descriptors and rules are compared by identity.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct MatchKey(Vec<KeyPart>);

impl fmt::Debug for MatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.0.iter().map(|part| match part {
                KeyPart::Direct { source, .. } => format!("{}#{}", source.0, source.1),
                KeyPart::Derived { .. } => "derived".to_string(),
                KeyPart::Group(members) => format!("group of {members}"),
            }))
            .finish()
    }
}

/// One node of a [`MatchKey`], in prefix order.
#[derive(Clone)]
enum KeyPart {
    Direct {
        descriptor: Descriptor,
        source: (Cid, usize),
    },
    Derived {
        from: Arc<dyn Selector>,
        rule: DeriveRule,
    },
    Group(usize),
}

fn address<T: ?Sized>(shared: &Arc<T>) -> usize {
    Arc::as_ptr(shared).cast::<()>() as usize
}

impl PartialEq for KeyPart {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                KeyPart::Direct { descriptor, source },
                KeyPart::Direct {
                    descriptor: other_descriptor,
                    source: other_source,
                },
            ) => descriptor.address() == other_descriptor.address() && source == other_source,
            (
                KeyPart::Derived { from, rule },
                KeyPart::Derived {
                    from: other_from,
                    rule: other_rule,
                },
            ) => address(from) == address(other_from) && address(rule) == address(other_rule),
            (KeyPart::Group(members), KeyPart::Group(other_members)) => members == other_members,
            _ => false,
        }
    }
}

impl Eq for KeyPart {}

impl Hash for KeyPart {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            KeyPart::Direct { descriptor, source } => {
                state.write_u8(0);
                descriptor.address().hash(state);
                source.hash(state);
            }
            KeyPart::Derived { from, rule } => {
                state.write_u8(1);
                address(from).hash(state);
                address(rule).hash(state);
            }
            KeyPart::Group(members) => {
                state.write_u8(2);
                members.hash(state);
            }
        }
    }
}

impl fmt::Display for Match {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Match::Group(group) => {
                f.write_str("[")?;
                for (index, member) in group.members.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{member}")?;
                }
                f.write_str("]")
            }
            matched => write!(f, "{}", matched.value()),
        }
    }
}

impl DirectMatch {
    fn select(&self, sources: &[Source]) -> Select {
        let mut select = Select::default();
        for source in sources {
            let outcome = match self.descriptor.parse(&source.capability) {
                Err(error) => Err(error.into()),
                Ok(delegated) => match self.descriptor.check(&self.value, &delegated) {
                    Ok(()) => Ok(Match::Direct(DirectMatch {
                        descriptor: self.descriptor.clone(),
                        source: source.clone(),
                        value: delegated,
                    })),
                    Err(cause) => {
                        tracing::trace!(claimed = %self.value, delegated = %delegated, %cause, "escalation");
                        Err(MatchError::from(EscalatedDelegation {
                            claimed: self.value.clone(),
                            delegated,
                            delegation: *source.delegation.cid(),
                            cause,
                        }))
                    }
                },
            };
            select.record(source, outcome);
        }
        select
    }
}

impl DerivedMatch {
    fn value(&self) -> &ParsedCapability {
        self.selected.value()
    }

    fn select(&self, sources: &[Source]) -> Select {
        let mut select = self.selected.select(sources);
        select.matches = select
            .matches
            .into_iter()
            .map(|matched| {
                Match::Derived(DerivedMatch {
                    selected: Box::new(matched),
                    from: self.from.clone(),
                    rule: self.rule.clone(),
                })
            })
            .collect();

        let derived = self.from.select(sources);
        for candidate in derived.matches {
            match (self.rule)(self.value(), &candidate) {
                Ok(()) => select.matches.push(candidate),
                Err(cause) => {
                    let source = candidate.source();
                    let delegation = *source.delegation.cid();
                    select.errors.push(DelegationError {
                        capability: source.capability.clone(),
                        delegation,
                        causes: vec![MatchError::from(EscalatedDelegation {
                            claimed: self.value().clone(),
                            delegated: candidate.value().clone(),
                            delegation,
                            cause,
                        })],
                    });
                }
            }
        }
        select.errors.extend(derived.errors);
        select.retain_unknown_in(&derived.unknown);
        select
    }
}

impl fmt::Debug for DerivedMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedMatch")
            .field("selected", &self.selected)
            .field("from", &self.from)
            .finish_non_exhaustive()
    }
}

/// Combines one selection per conjunct into their cartesian product.
///
/// Errors are concatenated; a source is unknown only if every conjunct
/// failed to recognize it.
pub(crate) fn product(selections: impl IntoIterator<Item = Select>) -> Select {
    let mut combinations: Vec<Vec<Match>> = vec![Vec::new()];
    let mut errors = Vec::new();
    let mut unknown: Option<Vec<Source>> = None;

    for selection in selections {
        errors.extend(selection.errors);
        unknown = Some(match unknown {
            None => selection.unknown,
            Some(previous) => {
                let shared: HashSet<(Cid, usize)> =
                    selection.unknown.iter().map(Source::key).collect();
                previous
                    .into_iter()
                    .filter(|source| shared.contains(&source.key()))
                    .collect()
            }
        });

        let mut next = Vec::with_capacity(combinations.len() * selection.matches.len());
        for combination in &combinations {
            for matched in &selection.matches {
                let mut extended = combination.clone();
                extended.push(matched.clone());
                next.push(extended);
            }
        }
        combinations = next;
    }

    Select {
        matches: combinations
            .into_iter()
            .filter_map(NonEmpty::from_vec)
            .map(|members| Match::Group(Box::new(GroupMatch { members })))
            .collect(),
        errors,
        unknown: unknown.unwrap_or_default(),
    }
}
