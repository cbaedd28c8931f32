//! The schema a descriptor enforces on a capability, and how each part of it
//! may be narrowed along a delegation chain.

use crate::{capability::DisplayIpld, resource::Resource};
use ipld_core::ipld::Ipld;
use proofchain_principal::Did;
use std::{fmt, sync::Arc};

/// The shape a capability's `with` must have.
///
/// Globs (a `with` ending in `*`) are accepted by every schema: they only
/// appear in proofs and are checked by narrowing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ResourceSchema {
    /// Any URI.
    #[default]
    Any,

    /// A DID.
    Did,

    /// A URL with the given scheme, such as `https`.
    Uri {
        /// The scheme without the trailing `:`.
        scheme: String,
    },
}

impl ResourceSchema {
    /// A URL schema for `scheme`.
    pub fn uri(scheme: impl Into<String>) -> Self {
        ResourceSchema::Uri {
            scheme: scheme.into(),
        }
    }

    /// Checks that `with` conforms.
    pub fn check(&self, with: &Resource) -> Result<(), String> {
        if with.is_glob() {
            return Ok(());
        }
        match self {
            ResourceSchema::Any => Ok(()),
            ResourceSchema::Did => with
                .as_str()
                .parse::<Did>()
                .map(|_| ())
                .map_err(|error| error.to_string()),
            ResourceSchema::Uri { scheme } => {
                let url = url::Url::parse(with.as_str())
                    .map_err(|error| format!("'{with}' is not a URL: {error}"))?;
                if url.scheme() == scheme {
                    Ok(())
                } else {
                    Err(format!("expected a {scheme}: URL, got '{with}'"))
                }
            }
        }
    }
}

/// The type of a caveat value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaveatKind {
    /// Any value.
    #[default]
    Any,
    /// A boolean.
    Bool,
    /// An integer.
    Integer,
    /// A string.
    String,
    /// A byte string.
    Bytes,
    /// A CID.
    Link,
    /// A list.
    List,
    /// A map.
    Map,
    /// An integer, or a `{min, max}` map of integers.
    Bound,
}

impl CaveatKind {
    /// Checks that `value` has this kind.
    pub fn check(&self, value: &Ipld) -> Result<(), String> {
        let ok = match (self, value) {
            (CaveatKind::Any, _)
            | (CaveatKind::Bool, Ipld::Bool(_))
            | (CaveatKind::Integer, Ipld::Integer(_))
            | (CaveatKind::String, Ipld::String(_))
            | (CaveatKind::Bytes, Ipld::Bytes(_))
            | (CaveatKind::Link, Ipld::Link(_))
            | (CaveatKind::List, Ipld::List(_))
            | (CaveatKind::Map, Ipld::Map(_)) => true,
            (CaveatKind::Bound, value) => Interval::of(value).is_some(),
            _ => false,
        };
        if ok {
            Ok(())
        } else {
            Err(format!("expected {self:?}, got {}", DisplayIpld(value)))
        }
    }
}

/// Whether a caveat must be present, and what its absence from a proof
/// means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Presence {
    /// Must be present; parsing fails without it.
    Required,

    /// May be absent. A proof without it grants only claims without it.
    #[default]
    Optional,

    /// May be absent. A proof without it grants any claimed value.
    Unconstrained,
}

/// A caller-supplied narrowing rule over `(claimed, delegated)`.
pub type NarrowingFn = Arc<dyn Fn(&Ipld, &Ipld) -> Result<(), String> + Send + Sync>;

/// How a claimed caveat value must relate to the one a proof grants.
#[derive(Clone, Default)]
pub enum Narrowing {
    /// The values must be equal.
    #[default]
    Equal,

    /// Numeric bound. An integer `n` is the interval `{max: n}`, a map is
    /// `{min, max}` with either end optional. The claimed interval must lie
    /// inside the delegated one.
    AtMost,

    /// Both are lists and every claimed item appears in the proof.
    Subset,

    /// Both are strings and the claim is the proof path or lies beneath it.
    Prefix,

    /// A custom rule.
    Custom(NarrowingFn),
}

impl Narrowing {
    /// A custom rule from a closure.
    pub fn custom<F>(rule: F) -> Self
    where
        F: Fn(&Ipld, &Ipld) -> Result<(), String> + Send + Sync + 'static,
    {
        Narrowing::Custom(Arc::new(rule))
    }

    /// Checks that `claimed` is no wider than `delegated`.
    pub fn check(&self, claimed: &Ipld, delegated: &Ipld) -> Result<(), String> {
        match self {
            Narrowing::Equal if claimed == delegated => Ok(()),
            Narrowing::Equal => Err(format!(
                "{} violates imposed {} constraint",
                DisplayIpld(claimed),
                DisplayIpld(delegated)
            )),
            Narrowing::AtMost => at_most(claimed, delegated),
            Narrowing::Subset => subset(claimed, delegated),
            Narrowing::Prefix => prefix(claimed, delegated),
            Narrowing::Custom(rule) => rule(claimed, delegated),
        }
    }
}

impl fmt::Debug for Narrowing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Narrowing::Equal => f.write_str("Equal"),
            Narrowing::AtMost => f.write_str("AtMost"),
            Narrowing::Subset => f.write_str("Subset"),
            Narrowing::Prefix => f.write_str("Prefix"),
            Narrowing::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Interval {
    min: Option<i128>,
    max: Option<i128>,
}

impl Interval {
    fn of(value: &Ipld) -> Option<Self> {
        match value {
            Ipld::Integer(max) => Some(Interval {
                min: None,
                max: Some(*max),
            }),
            value => Self::of_map(value),
        }
    }

    fn of_map(value: &Ipld) -> Option<Self> {
        let Ipld::Map(entries) = value else {
            return None;
        };
        let mut interval = Interval {
            min: None,
            max: None,
        };
        for (key, value) in entries {
            let Ipld::Integer(n) = value else {
                return None;
            };
            match key.as_str() {
                "min" => interval.min = Some(*n),
                "max" => interval.max = Some(*n),
                _ => return None,
            }
        }
        Some(interval)
    }
}

fn at_most(claimed: &Ipld, delegated: &Ipld) -> Result<(), String> {
    let (Some(claim), Some(grant)) = (Interval::of(claimed), Interval::of(delegated)) else {
        return Err(format!(
            "cannot compare bounds {} and {}",
            DisplayIpld(claimed),
            DisplayIpld(delegated)
        ));
    };
    if let Some(max) = grant.max {
        if claim.max.is_none_or(|claimed| claimed > max) {
            return Err(format!(
                "{} exceeds imposed limit of {max}",
                DisplayIpld(claimed)
            ));
        }
    }
    if let Some(min) = grant.min {
        if claim.min.is_none_or(|claimed| claimed < min) {
            return Err(format!(
                "{} is below imposed minimum of {min}",
                DisplayIpld(claimed)
            ));
        }
    }
    Ok(())
}

fn subset(claimed: &Ipld, delegated: &Ipld) -> Result<(), String> {
    let (Ipld::List(claimed), Ipld::List(delegated)) = (claimed, delegated) else {
        return Err("subset narrowing requires lists".into());
    };
    match claimed.iter().find(|item| !delegated.contains(item)) {
        Some(extra) => Err(format!("{} is not in the granted set", DisplayIpld(extra))),
        None => Ok(()),
    }
}

fn prefix(claimed: &Ipld, delegated: &Ipld) -> Result<(), String> {
    let (Ipld::String(claimed), Ipld::String(delegated)) = (claimed, delegated) else {
        return Err("prefix narrowing requires strings".into());
    };
    let beneath = claimed.strip_prefix(delegated.as_str()).is_some_and(|rest| {
        rest.is_empty() || delegated.ends_with('/') || rest.starts_with('/')
    });
    if beneath {
        Ok(())
    } else {
        Err(format!("{claimed:?} is not beneath {delegated:?}"))
    }
}

/// One row of a descriptor's caveat table.
#[derive(Debug, Clone, Default)]
pub struct CaveatSpec {
    /// Value type.
    pub kind: CaveatKind,
    /// Presence rule.
    pub presence: Presence,
    /// Narrowing rule.
    pub narrowing: Narrowing,
}

impl CaveatSpec {
    /// A required caveat compared for equality.
    pub fn required(kind: CaveatKind) -> Self {
        Self {
            kind,
            presence: Presence::Required,
            narrowing: Narrowing::Equal,
        }
    }

    /// An optional caveat compared for equality.
    pub fn optional(kind: CaveatKind) -> Self {
        Self {
            kind,
            presence: Presence::Optional,
            narrowing: Narrowing::Equal,
        }
    }

    /// An optional caveat that, when absent from a proof, grants anything.
    pub fn unconstrained(kind: CaveatKind) -> Self {
        Self {
            kind,
            presence: Presence::Unconstrained,
            narrowing: Narrowing::Equal,
        }
    }

    /// Replaces the narrowing rule.
    #[must_use]
    pub fn narrowed_by(mut self, narrowing: Narrowing) -> Self {
        self.narrowing = narrowing;
        self
    }

    /// Checks presence and kind of a caveat on a capability being parsed.
    pub fn check(&self, key: &str, value: Option<&Ipld>) -> Result<(), String> {
        match value {
            Some(value) => self
                .kind
                .check(value)
                .map_err(|cause| format!("invalid caveat '{key}': {cause}")),
            None if self.presence == Presence::Required => {
                Err(format!("missing required caveat '{key}'"))
            }
            None => Ok(()),
        }
    }

    /// Checks that the claimed value of caveat `key` is no wider than the
    /// delegated one.
    pub fn narrows(
        &self,
        key: &str,
        claimed: Option<&Ipld>,
        delegated: Option<&Ipld>,
    ) -> Result<(), String> {
        match (claimed, delegated) {
            (_, None) if self.presence == Presence::Unconstrained => Ok(()),
            (None, None) => Ok(()),
            (Some(claimed), None) => Err(format!(
                "{key}: {} is not granted by a proof that leaves it unset",
                DisplayIpld(claimed)
            )),
            (None, Some(delegated)) => Err(format!(
                "{key}: claim omits it but the proof imposes {}",
                DisplayIpld(delegated)
            )),
            (Some(claimed), Some(delegated)) => self
                .narrowing
                .check(claimed, delegated)
                .map_err(|cause| format!("{key}: {cause}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn bound(min: Option<i128>, max: Option<i128>) -> Ipld {
        let mut map = BTreeMap::new();
        if let Some(min) = min {
            map.insert("min".to_string(), Ipld::Integer(min));
        }
        if let Some(max) = max {
            map.insert("max".to_string(), Ipld::Integer(max));
        }
        Ipld::Map(map)
    }

    #[test]
    fn it_checks_resource_schemas() {
        let did = Resource::from("did:key:zAlice");
        let url = Resource::from("https://example.com/a");

        assert!(ResourceSchema::Did.check(&did).is_ok());
        assert!(ResourceSchema::Did.check(&url).is_err());
        assert!(ResourceSchema::uri("https").check(&url).is_ok());
        assert!(ResourceSchema::uri("https").check(&did).is_err());
        assert!(ResourceSchema::Did.check(&Resource::from("*")).is_ok());
    }

    #[test]
    fn it_narrows_numeric_bounds() {
        let at_most = Narrowing::AtMost;

        assert!(at_most.check(&Ipld::Integer(5), &Ipld::Integer(10)).is_ok());
        assert!(at_most.check(&Ipld::Integer(10), &Ipld::Integer(10)).is_ok());
        assert!(at_most.check(&Ipld::Integer(11), &Ipld::Integer(10)).is_err());
        assert!(
            at_most
                .check(&bound(Some(2), Some(4)), &bound(Some(1), Some(5)))
                .is_ok()
        );
        assert!(
            at_most
                .check(&bound(Some(0), Some(4)), &bound(Some(1), Some(5)))
                .is_err()
        );
        assert!(
            at_most
                .check(&bound(Some(2), None), &Ipld::Integer(5))
                .is_err()
        );
    }

    #[test]
    fn it_reads_integers_as_upper_bounds_on_both_sides() {
        let at_most = Narrowing::AtMost;

        assert!(
            at_most
                .check(&Ipld::Integer(3), &bound(Some(1), Some(5)))
                .is_err()
        );
        assert!(
            at_most
                .check(&Ipld::Integer(3), &bound(None, Some(5)))
                .is_ok()
        );
        assert!(
            at_most
                .check(&bound(None, Some(2)), &Ipld::Integer(3))
                .is_ok()
        );
    }

    #[test]
    fn it_narrows_sets_and_paths() {
        let list = |items: &[&str]| Ipld::List(items.iter().map(|s| Ipld::from(*s)).collect());

        assert!(Narrowing::Subset.check(&list(&["a"]), &list(&["a", "b"])).is_ok());
        assert!(Narrowing::Subset.check(&list(&["c"]), &list(&["a", "b"])).is_err());

        let path = |s: &str| Ipld::from(s);
        assert!(Narrowing::Prefix.check(&path("/a/b"), &path("/a")).is_ok());
        assert!(Narrowing::Prefix.check(&path("/a/b"), &path("/a/")).is_ok());
        assert!(Narrowing::Prefix.check(&path("/ab"), &path("/a")).is_err());
        assert!(Narrowing::Prefix.check(&path("/a"), &path("/a/b")).is_err());
    }

    #[test]
    fn it_applies_presence_rules() {
        let optional = CaveatSpec::optional(CaveatKind::Integer);
        let unconstrained = CaveatSpec::unconstrained(CaveatKind::Integer);
        let five = Ipld::Integer(5);

        assert!(optional.narrows("size", Some(&five), None).is_err());
        assert!(unconstrained.narrows("size", Some(&five), None).is_ok());
        assert!(optional.narrows("size", None, Some(&five)).is_err());
        assert!(optional.narrows("size", None, None).is_ok());

        let required = CaveatSpec::required(CaveatKind::String);
        assert!(required.check("link", None).is_err());
        assert!(required.check("link", Some(&five)).is_err());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn arb_bound() -> impl Strategy<Value = Ipld> {
            prop_oneof![
                (-8i128..8).prop_map(Ipld::Integer),
                (
                    proptest::option::of(-8i128..8),
                    proptest::option::of(-8i128..8)
                )
                    .prop_map(|(min, max)| bound(min, max)),
            ]
        }

        fn arb_set() -> impl Strategy<Value = Ipld> {
            proptest::collection::vec(prop::sample::select(vec!["a", "b", "c"]), 0..4)
                .prop_map(|items| Ipld::List(items.into_iter().map(Ipld::from).collect()))
        }

        fn arb_path() -> impl Strategy<Value = Ipld> {
            (
                proptest::collection::vec(prop::sample::select(vec!["a", "b", "ab"]), 0..3),
                any::<bool>(),
            )
                .prop_map(|(segments, trailing)| {
                    let mut path = format!("/{}", segments.join("/"));
                    if trailing && !path.ends_with('/') {
                        path.push('/');
                    }
                    Ipld::String(path)
                })
        }

        /// `a` within `b` within `c` implies `a` within `c`.
        fn transitive(rule: &Narrowing, a: &Ipld, b: &Ipld, c: &Ipld) -> bool {
            let chained = rule.check(a, b).is_ok() && rule.check(b, c).is_ok();
            !chained || rule.check(a, c).is_ok()
        }

        proptest! {
            #[test]
            fn bounds_narrow_transitively(a in arb_bound(), b in arb_bound(), c in arb_bound()) {
                prop_assert!(Narrowing::AtMost.check(&a, &a).is_ok());
                prop_assert!(transitive(&Narrowing::AtMost, &a, &b, &c));
            }

            #[test]
            fn sets_narrow_transitively(a in arb_set(), b in arb_set(), c in arb_set()) {
                prop_assert!(Narrowing::Subset.check(&a, &a).is_ok());
                prop_assert!(transitive(&Narrowing::Subset, &a, &b, &c));
            }

            #[test]
            fn paths_narrow_transitively(a in arb_path(), b in arb_path(), c in arb_path()) {
                prop_assert!(Narrowing::Prefix.check(&a, &a).is_ok());
                prop_assert!(transitive(&Narrowing::Prefix, &a, &b, &c));
            }
        }
    }
}
