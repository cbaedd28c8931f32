//! Combinators over matchers: `or`, `and` and `derive`.

use crate::{
    capability::ParsedCapability,
    error::{DelegationError, MatchError},
    matcher::{Matcher, Select, Selector, Source, select_each},
    matches::{DeriveRule, DerivedMatch, Match, product},
};
use nonempty::NonEmpty;
use std::{fmt, sync::Arc};

/// Left-biased union of two matchers.
#[derive(Debug, Clone)]
pub struct Or {
    left: Arc<dyn Matcher>,
    right: Arc<dyn Matcher>,
}

impl Or {
    /// Tries `left` first, then `right`.
    pub fn new(left: impl Matcher + 'static, right: impl Matcher + 'static) -> Self {
        Self {
            left: Arc::new(left),
            right: Arc::new(right),
        }
    }
}

impl Selector for Or {
    fn select(&self, sources: &[Source]) -> Select {
        select_each(self, sources)
    }
}

impl Matcher for Or {
    fn match_source(&self, source: &Source) -> Result<Match, MatchError> {
        let left = match self.left.match_source(source) {
            Ok(matched) => return Ok(matched),
            Err(error) => error,
        };
        match self.right.match_source(source) {
            Ok(matched) => Ok(matched),
            Err(right) if right.is_unknown() => Err(left),
            Err(right) if left.is_unknown() => Err(right),
            Err(right) => Err(MatchError::Delegation(DelegationError {
                capability: source.capability.clone(),
                delegation: *source.delegation.cid(),
                causes: vec![left, right],
            })),
        }
    }
}

/// Conjunction: every member must match among the same sources.
///
/// Selecting yields the cartesian product of the members' matches, each as a
/// [`Match::Group`].
#[derive(Debug, Clone)]
pub struct And {
    members: NonEmpty<Arc<dyn Matcher>>,
}

impl And {
    /// A conjunction of one member.
    pub fn new(first: impl Matcher + 'static) -> Self {
        Self {
            members: NonEmpty::new(Arc::new(first)),
        }
    }

    /// Adds a member.
    #[must_use]
    pub fn and(mut self, next: impl Matcher + 'static) -> Self {
        self.members.push(Arc::new(next));
        self
    }
}

impl Selector for And {
    fn select(&self, sources: &[Source]) -> Select {
        product(self.members.iter().map(|member| member.select(sources)))
    }
}

/// A matcher whose claims proofs may justify either directly or by
/// derivation from another capability.
#[derive(Clone)]
pub struct Derive {
    to: Arc<dyn Matcher>,
    from: Arc<dyn Selector>,
    rule: DeriveRule,
}

impl Derive {
    /// Matches `to`, derivable from whatever `from` selects when `rule`
    /// accepts.
    pub fn new<F>(to: impl Matcher + 'static, from: impl Selector + 'static, rule: F) -> Self
    where
        F: Fn(&ParsedCapability, &Match) -> Result<(), String> + Send + Sync + 'static,
    {
        Self {
            to: Arc::new(to),
            from: Arc::new(from),
            rule: Arc::new(rule),
        }
    }
}

impl fmt::Debug for Derive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Derive")
            .field("to", &self.to)
            .field("from", &self.from)
            .finish_non_exhaustive()
    }
}

impl Selector for Derive {
    fn select(&self, sources: &[Source]) -> Select {
        select_each(self, sources)
    }
}

impl Matcher for Derive {
    fn match_source(&self, source: &Source) -> Result<Match, MatchError> {
        let selected = self.to.match_source(source)?;
        Ok(Match::Derived(DerivedMatch {
            selected: Box::new(selected),
            from: self.from.clone(),
            rule: self.rule.clone(),
        }))
    }
}

/// Combinator methods on every [`Matcher`].
pub trait MatcherExt: Matcher + Sized + 'static {
    /// See [`Or`].
    fn or(self, other: impl Matcher + 'static) -> Or {
        Or::new(self, other)
    }

    /// See [`And`].
    fn and(self, other: impl Matcher + 'static) -> And {
        And::new(self).and(other)
    }

    /// See [`Derive`].
    fn derive<F>(self, from: impl Selector + 'static, rule: F) -> Derive
    where
        F: Fn(&ParsedCapability, &Match) -> Result<(), String> + Send + Sync + 'static,
    {
        Derive::new(self, from, rule)
    }
}

impl<M: Matcher + 'static> MatcherExt for M {}
