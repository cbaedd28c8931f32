//! Resources: the `with` field of a capability.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The URI a capability applies to.
///
/// In proofs the URI may end in `*` to grant every resource sharing the
/// prefix before it, or in `/` to grant everything beneath that path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resource(String);

impl Resource {
    /// Creates a resource from its URI.
    pub fn new(with: impl Into<String>) -> Self {
        Resource(with.into())
    }

    /// The URI as written.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` when the URI ends in `*`.
    pub fn is_glob(&self) -> bool {
        self.0.ends_with('*')
    }

    /// Returns `true` when this resource, granted by a proof, covers `claimed`.
    ///
    /// A claimed glob is compared by the prefix it grants.
    pub fn covers(&self, claimed: &Resource) -> bool {
        if self.0 == claimed.0 {
            return true;
        }
        let claimed = claimed.0.strip_suffix('*').unwrap_or(&claimed.0);
        if let Some(prefix) = self.0.strip_suffix('*') {
            return claimed.starts_with(prefix);
        }
        self.0.ends_with('/') && claimed.starts_with(&self.0)
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Resource {
    fn from(value: &str) -> Self {
        Resource::new(value)
    }
}

impl From<String> for Resource {
    fn from(value: String) -> Self {
        Resource(value)
    }
}

impl From<&proofchain_principal::Did> for Resource {
    fn from(did: &proofchain_principal::Did) -> Self {
        Resource::new(did.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_covers_equal_glob_and_path_prefix() {
        let claimed = Resource::from("https://example.com/photos/cat.png");

        assert!(claimed.covers(&claimed));
        assert!(Resource::from("*").covers(&claimed));
        assert!(Resource::from("https://example.com/*").covers(&claimed));
        assert!(Resource::from("https://example.com/photos/").covers(&claimed));
        assert!(!Resource::from("https://example.com/videos/").covers(&claimed));
        assert!(!Resource::from("https://example.com/photos").covers(&claimed));
        assert!(!claimed.covers(&Resource::from("https://example.com/photos/")));
    }

    #[test]
    fn it_compares_claimed_globs_by_their_prefix() {
        let photos = Resource::from("https://example.com/photos/*");

        assert!(Resource::from("https://example.com/*").covers(&photos));
        assert!(Resource::from("https://example.com/photos/").covers(&photos));
        assert!(!Resource::from("https://example.com/photos/a*").covers(&photos));
        assert!(!Resource::from("x**").covers(&Resource::from("x*")));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn arb_resource() -> impl Strategy<Value = Resource> {
            proptest::collection::vec(prop::sample::select(vec!["a", "b", "/", "*"]), 0..5)
                .prop_map(|parts| Resource::new(parts.concat()))
        }

        proptest! {
            #[test]
            fn covering_is_reflexive(a in arb_resource()) {
                prop_assert!(a.covers(&a));
            }

            #[test]
            fn covering_is_transitive(
                a in arb_resource(),
                b in arb_resource(),
                c in arb_resource(),
            ) {
                if a.covers(&b) && b.covers(&c) {
                    prop_assert!(a.covers(&c), "{a} covers {b} covers {c}");
                }
            }
        }
    }
}
