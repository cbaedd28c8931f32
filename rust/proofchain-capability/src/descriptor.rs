//! Capability descriptors: the leaves of the matcher algebra.

use crate::{
    ability::Ability,
    capability::{Capability, ParsedCapability},
    error::{InvalidCapability, MalformedCapability, MatchError, UnknownCapability},
    matcher::{Matcher, Select, Selector, Source, select_each},
    matches::{DirectMatch, Match},
    schema::{CaveatSpec, ResourceSchema},
};
use std::{collections::BTreeMap, fmt, sync::Arc};

/// An extra check a descriptor runs on `(claimed, delegated)` once resource,
/// ability and caveats have narrowed.
pub type DescriptorDerives =
    Arc<dyn Fn(&ParsedCapability, &ParsedCapability) -> Result<(), String> + Send + Sync>;

/// Starts describing the ability `can`.
///
/// ```
/// use proofchain_capability::{capability, CaveatKind, CaveatSpec, ResourceSchema};
///
/// let add = capability("store/add")
///     .with(ResourceSchema::Did)
///     .caveat("link", CaveatSpec::required(CaveatKind::Link))
///     .build();
/// ```
pub fn capability(can: impl Into<Ability>) -> DescriptorBuilder {
    DescriptorBuilder {
        can: can.into(),
        with: ResourceSchema::default(),
        caveats: BTreeMap::new(),
        derives: None,
    }
}

/// Builder returned by [`capability`].
pub struct DescriptorBuilder {
    can: Ability,
    with: ResourceSchema,
    caveats: BTreeMap<String, CaveatSpec>,
    derives: Option<DescriptorDerives>,
}

impl DescriptorBuilder {
    /// Sets the resource schema. Defaults to [`ResourceSchema::Any`].
    #[must_use]
    pub fn with(mut self, schema: ResourceSchema) -> Self {
        self.with = schema;
        self
    }

    /// Declares a caveat.
    #[must_use]
    pub fn caveat(mut self, key: impl Into<String>, spec: CaveatSpec) -> Self {
        self.caveats.insert(key.into(), spec);
        self
    }

    /// Adds a check run after the built-in narrowing rules.
    #[must_use]
    pub fn derives<F>(mut self, rule: F) -> Self
    where
        F: Fn(&ParsedCapability, &ParsedCapability) -> Result<(), String> + Send + Sync + 'static,
    {
        self.derives = Some(Arc::new(rule));
        self
    }

    /// Finishes the descriptor.
    pub fn build(self) -> Descriptor {
        Descriptor(Arc::new(DescriptorSpec {
            can: self.can,
            with: self.with,
            caveats: self.caveats,
            derives: self.derives,
        }))
    }
}

struct DescriptorSpec {
    can: Ability,
    with: ResourceSchema,
    caveats: BTreeMap<String, CaveatSpec>,
    derives: Option<DescriptorDerives>,
}

/// Recognizes one ability and knows how it narrows. Cheap to clone.
#[derive(Clone)]
pub struct Descriptor(Arc<DescriptorSpec>);

impl Descriptor {
    /// The ability this descriptor recognizes.
    pub fn can(&self) -> &Ability {
        &self.0.can
    }

    /// Identifies the descriptor; clones share it.
    pub(crate) fn address(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    /// Parses a raw capability.
    ///
    /// Wildcard abilities that grant this descriptor's ability parse as it.
    pub fn parse(&self, capability: &Capability) -> Result<ParsedCapability, InvalidCapability> {
        let spec = &self.0;
        if !capability.can.grants(&spec.can) {
            return Err(UnknownCapability {
                capability: capability.clone(),
            }
            .into());
        }

        let malformed = |cause: String| MalformedCapability {
            capability: capability.clone(),
            cause,
        };
        spec.with.check(&capability.with).map_err(malformed)?;
        for (key, caveat) in &spec.caveats {
            caveat
                .check(key, capability.nb.get(key))
                .map_err(malformed)?;
        }

        Ok(ParsedCapability {
            can: spec.can.clone(),
            with: capability.with.clone(),
            nb: capability.nb.clone(),
        })
    }

    /// Checks that `claimed` is no wider than `delegated`.
    pub fn check(&self, claimed: &ParsedCapability, delegated: &ParsedCapability) -> Result<(), String> {
        if !delegated.with.covers(&claimed.with) {
            return Err(format!(
                "can not derive {} from {}",
                claimed.with, delegated.with
            ));
        }
        if claimed.can != delegated.can {
            return Err(format!(
                "can not derive {} from {}",
                claimed.can, delegated.can
            ));
        }

        let undeclared = CaveatSpec::default();
        let mut keys: Vec<&String> = self.0.caveats.keys().collect();
        keys.extend(claimed.nb.keys().chain(delegated.nb.keys()));
        keys.sort();
        keys.dedup();
        for key in keys {
            let spec = self.0.caveats.get(key).unwrap_or(&undeclared);
            spec.narrows(key, claimed.nb.get(key), delegated.nb.get(key))?;
        }

        match &self.0.derives {
            Some(rule) => rule(claimed, delegated),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("can", &self.0.can)
            .field("with", &self.0.with)
            .field("caveats", &self.0.caveats)
            .field("derives", &self.0.derives.is_some())
            .finish()
    }
}

impl Selector for Descriptor {
    fn select(&self, sources: &[Source]) -> Select {
        select_each(self, sources)
    }
}

impl Matcher for Descriptor {
    fn match_source(&self, source: &Source) -> Result<Match, MatchError> {
        let value = self.parse(&source.capability)?;
        Ok(Match::Direct(DirectMatch {
            descriptor: self.clone(),
            source: source.clone(),
            value,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        capability::Caveats,
        schema::{CaveatKind, Narrowing},
    };
    use pretty_assertions::assert_eq;
    use testresult::TestResult;

    fn add() -> Descriptor {
        capability("store/add")
            .with(ResourceSchema::Did)
            .caveat("link", CaveatSpec::required(CaveatKind::String))
            .caveat(
                "size",
                CaveatSpec::unconstrained(CaveatKind::Integer).narrowed_by(Narrowing::AtMost),
            )
            .build()
    }

    fn parsed(with: &str, nb: Caveats) -> ParsedCapability {
        ParsedCapability {
            can: "store/add".into(),
            with: with.into(),
            nb,
        }
    }

    #[test]
    fn it_parses_known_capabilities() -> TestResult {
        let capability = Capability::new("store/add", "did:key:zAlice").caveat("link", "bafy");
        let value = add().parse(&capability)?;

        assert_eq!(value.can, Ability::from("store/add"));
        assert_eq!(value.nb.get("link"), Some(&"bafy".into()));
        Ok(())
    }

    #[test]
    fn it_resolves_wildcard_abilities() -> TestResult {
        let value = add().parse(&Capability::new("store/*", "did:key:zAlice").caveat("link", "x"))?;
        assert_eq!(value.can, Ability::from("store/add"));

        let value = add().parse(&Capability::new("*", "did:key:zAlice").caveat("link", "x"))?;
        assert_eq!(value.can, Ability::from("store/add"));
        Ok(())
    }

    #[test]
    fn it_separates_unknown_from_malformed() {
        let unknown = add().parse(&Capability::new("store/list", "did:key:zAlice"));
        assert!(matches!(unknown, Err(InvalidCapability::Unknown(_))));

        let missing = add().parse(&Capability::new("store/add", "did:key:zAlice"));
        assert!(matches!(missing, Err(InvalidCapability::Malformed(_))));

        let bad_with =
            add().parse(&Capability::new("store/add", "https://x.com").caveat("link", "x"));
        assert!(matches!(bad_with, Err(InvalidCapability::Malformed(_))));
    }

    #[test]
    fn it_checks_narrowing() {
        let descriptor = add();
        let grant = parsed(
            "did:key:zAlice",
            Caveats::new().with("link", "bafy").with("size", 100),
        );

        let within = parsed("did:key:zAlice", Caveats::new().with("link", "bafy").with("size", 10));
        assert!(descriptor.check(&within, &grant).is_ok());

        let too_big = parsed("did:key:zAlice", Caveats::new().with("link", "bafy").with("size", 101));
        assert!(descriptor.check(&too_big, &grant).is_err());

        let other_link = parsed("did:key:zAlice", Caveats::new().with("link", "bafz"));
        assert!(descriptor.check(&other_link, &grant).is_err());

        let other_space = parsed("did:key:zBob", Caveats::new().with("link", "bafy"));
        assert!(descriptor.check(&other_space, &grant).is_err());

        let unsized_grant = parsed("did:key:zAlice", Caveats::new().with("link", "bafy"));
        assert!(descriptor.check(&too_big, &unsized_grant).is_ok());
    }

    #[test]
    fn it_compares_undeclared_caveats_for_equality() {
        let descriptor = capability("store/list").build();
        let grant = parsed("did:key:zAlice", Caveats::new().with("cursor", "a"));

        let same = parsed("did:key:zAlice", Caveats::new().with("cursor", "a"));
        assert!(descriptor.check(&same, &grant).is_ok());

        let omitted = parsed("did:key:zAlice", Caveats::new());
        assert!(descriptor.check(&omitted, &grant).is_err());

        let added = parsed("did:key:zAlice", Caveats::new().with("limit", 1));
        assert!(descriptor.check(&added, &parsed("did:key:zAlice", Caveats::new())).is_err());
    }

    #[test]
    fn it_runs_extra_derives_check() {
        let descriptor = capability("store/add")
            .derives(|claimed, _| {
                if claimed.with.as_str().ends_with("Mallory") {
                    Err("mallory is banned".into())
                } else {
                    Ok(())
                }
            })
            .build();
        let grant = parsed("*", Caveats::new());

        assert!(descriptor.check(&parsed("did:key:zAlice", Caveats::new()), &grant).is_ok());
        assert!(descriptor.check(&parsed("did:key:zMallory", Caveats::new()), &grant).is_err());
    }
}
