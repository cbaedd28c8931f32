//! Abilities: the `can` field of a capability.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Wildcard standing for every ability.
pub const ANY_ABILITY: &str = "*";

/// The action a capability permits, spelled `namespace/verb`.
///
/// Proofs may also grant `*` (every ability) or `namespace/*` (every verb in a
/// namespace). The value is carried as written; whether it means anything is
/// decided by the descriptor that parses it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ability(String);

impl Ability {
    /// Creates an ability from its string form.
    pub fn new(can: impl Into<String>) -> Self {
        Ability(can.into())
    }

    /// The ability as written.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The part before the last `/`, or the whole value when there is none.
    pub fn namespace(&self) -> &str {
        self.0
            .rsplit_once('/')
            .map(|(namespace, _)| namespace)
            .unwrap_or(&self.0)
    }

    /// Returns `true` for `*` and `namespace/*`.
    pub fn is_wildcard(&self) -> bool {
        self.0 == ANY_ABILITY || self.0.ends_with("/*")
    }

    /// Returns `true` when this ability, read as a pattern, grants `concrete`.
    ///
    /// `*` grants everything, `store/*` grants `store/add` and `store/list`
    /// but not `storage/add`, and a concrete ability only grants itself.
    pub fn grants(&self, concrete: &Ability) -> bool {
        if self.0 == ANY_ABILITY {
            return true;
        }
        match self.0.strip_suffix('*') {
            Some(prefix) if prefix.ends_with('/') => concrete.0.starts_with(prefix),
            _ => self.0 == concrete.0,
        }
    }
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Ability {
    fn from(value: &str) -> Self {
        Ability::new(value)
    }
}

impl From<String> for Ability {
    fn from(value: String) -> Self {
        Ability(value)
    }
}
