//! Raw and parsed capabilities.

use crate::{ability::Ability, resource::Resource};
use ipld_core::ipld::Ipld;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::{collections::BTreeMap, fmt};

/// Caveats restricting a capability, keyed by name.
///
/// An absent `nb` is the same as an empty map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Caveats(BTreeMap<String, Ipld>);

impl Caveats {
    /// An empty caveat map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a caveat, replacing any previous value under `key`.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Ipld>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Looks up a caveat.
    pub fn get(&self, key: &str) -> Option<&Ipld> {
        self.0.get(key)
    }

    /// Iterates over the caveat names in order.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Iterates over the caveats in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Ipld)> {
        self.0.iter()
    }

    /// Returns `true` when no caveats are set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Decodes the caveats into a typed value.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ipld_core::serde::SerdeError> {
        ipld_core::serde::from_ipld(Ipld::Map(self.0.clone()))
    }
}

impl FromIterator<(String, Ipld)> for Caveats {
    fn from_iter<I: IntoIterator<Item = (String, Ipld)>>(iter: I) -> Self {
        Caveats(iter.into_iter().collect())
    }
}

impl From<BTreeMap<String, Ipld>> for Caveats {
    fn from(map: BTreeMap<String, Ipld>) -> Self {
        Caveats(map)
    }
}

/// A capability as it appears inside a delegation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    /// The resource acted upon.
    pub with: Resource,
    /// The action permitted.
    pub can: Ability,
    /// Restrictions on the action.
    #[serde(default, skip_serializing_if = "Caveats::is_empty")]
    pub nb: Caveats,
}

impl Capability {
    /// A capability with no caveats.
    pub fn new(can: impl Into<Ability>, with: impl Into<Resource>) -> Self {
        Self {
            with: with.into(),
            can: can.into(),
            nb: Caveats::default(),
        }
    }

    /// Replaces the caveats.
    pub fn with_caveats(mut self, nb: Caveats) -> Self {
        self.nb = nb;
        self
    }

    /// Adds a single caveat.
    pub fn caveat(mut self, key: impl Into<String>, value: impl Into<Ipld>) -> Self {
        self.nb = self.nb.with(key, value);
        self
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{can: {}, with: {}", self.can, self.with)?;
        write_caveats(f, &self.nb)?;
        f.write_str("}")
    }
}

/// A capability accepted by a descriptor.
///
/// Its `can` is always the descriptor's concrete ability, even when the
/// source spelled it with a wildcard.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCapability {
    /// The concrete ability.
    pub can: Ability,
    /// The resource, validated against the descriptor's schema.
    pub with: Resource,
    /// Every caveat of the source, declared or not.
    pub nb: Caveats,
}

impl ParsedCapability {
    /// Decodes the caveats into a typed value.
    pub fn caveats<T: DeserializeOwned>(&self) -> Result<T, ipld_core::serde::SerdeError> {
        self.nb.decode()
    }

    /// The raw capability this value was parsed into.
    pub fn to_capability(&self) -> Capability {
        Capability {
            with: self.with.clone(),
            can: self.can.clone(),
            nb: self.nb.clone(),
        }
    }
}

impl fmt::Display for ParsedCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{can: {}, with: {}", self.can, self.with)?;
        write_caveats(f, &self.nb)?;
        f.write_str("}")
    }
}

fn write_caveats(f: &mut fmt::Formatter<'_>, nb: &Caveats) -> fmt::Result {
    if nb.is_empty() {
        return Ok(());
    }
    f.write_str(", nb: {")?;
    for (index, (key, value)) in nb.iter().enumerate() {
        if index > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{key}: {}", DisplayIpld(value))?;
    }
    f.write_str("}")
}

/// Renders an IPLD value in a compact JSON-like form.
#[derive(Debug, Clone, Copy)]
pub struct DisplayIpld<'a>(pub &'a Ipld);

impl fmt::Display for DisplayIpld<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Ipld::Null => f.write_str("null"),
            Ipld::Bool(value) => write!(f, "{value}"),
            Ipld::Integer(value) => write!(f, "{value}"),
            Ipld::Float(value) => write!(f, "{value}"),
            Ipld::String(value) => write!(f, "{value:?}"),
            Ipld::Bytes(bytes) => write!(f, "<{} bytes>", bytes.len()),
            Ipld::Link(cid) => write!(f, "{cid}"),
            Ipld::List(items) => {
                f.write_str("[")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", DisplayIpld(item))?;
                }
                f.write_str("]")
            }
            Ipld::Map(entries) => {
                f.write_str("{")?;
                for (index, (key, value)) in entries.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {}", DisplayIpld(value))?;
                }
                f.write_str("}")
            }
        }
    }
}
