//! Validity windows.

use super::Timestamp;
use std::{
    fmt,
    ops::{Bound, RangeBounds},
};

/// The half-open window `[not_before, expiration)` in which something is
/// valid.
///
/// For a single delegation the bounds are its `nbf` and `exp`. For a chain
/// the window is the intersection of every delegation's window: the latest
/// `nbf` and the earliest `exp`. Open ends are [`Bound::Unbounded`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    /// Earliest instant at which the range is valid.
    pub not_before: Bound<Timestamp>,

    /// First instant at which the range is no longer valid.
    pub expiration: Bound<Timestamp>,
}

impl TimeRange {
    /// A range with no constraints.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            not_before: Bound::Unbounded,
            expiration: Bound::Unbounded,
        }
    }

    /// Creates a range from an optional `nbf` and an optional `exp`.
    ///
    /// An absent `exp` never expires.
    #[must_use]
    pub const fn new(not_before: Option<Timestamp>, expiration: Option<Timestamp>) -> Self {
        Self {
            not_before: match not_before {
                Some(t) => Bound::Included(t),
                None => Bound::Unbounded,
            },
            expiration: match expiration {
                Some(t) => Bound::Excluded(t),
                None => Bound::Unbounded,
            },
        }
    }

    /// Returns `true` if some instant lies within the range.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        match (self.not_before, self.expiration) {
            (Bound::Included(nbf), Bound::Excluded(exp)) => nbf < exp,
            (Bound::Included(nbf), Bound::Included(exp)) => nbf <= exp,
            (Bound::Excluded(nbf), Bound::Excluded(exp) | Bound::Included(exp)) => nbf < exp,
            _ => true,
        }
    }

    /// Returns `true` when `now` is past the end of the range.
    #[must_use]
    pub fn is_expired(&self, now: Timestamp) -> bool {
        match self.expiration {
            Bound::Excluded(exp) => now >= exp,
            Bound::Included(exp) => now > exp,
            Bound::Unbounded => false,
        }
    }

    /// Returns `true` when `now` is before the start of the range.
    #[must_use]
    pub fn is_too_early(&self, now: Timestamp) -> bool {
        match self.not_before {
            Bound::Included(nbf) => now < nbf,
            Bound::Excluded(nbf) => now <= nbf,
            Bound::Unbounded => false,
        }
    }

    /// The intersection of two ranges: the later lower bound and the earlier
    /// upper bound.
    #[must_use]
    pub fn intersect(self, other: Self) -> Self {
        Self {
            not_before: later_start(self.not_before, other.not_before),
            expiration: earlier_end(self.expiration, other.expiration),
        }
    }
}

impl Default for TimeRange {
    fn default() -> Self {
        Self::unbounded()
    }
}

fn later_start(a: Bound<Timestamp>, b: Bound<Timestamp>) -> Bound<Timestamp> {
    match (a, b) {
        (Bound::Unbounded, other) | (other, Bound::Unbounded) => other,
        (Bound::Included(a), Bound::Included(b)) => Bound::Included(a.max(b)),
        (Bound::Excluded(a), Bound::Excluded(b)) => Bound::Excluded(a.max(b)),
        (Bound::Excluded(a), Bound::Included(b)) | (Bound::Included(b), Bound::Excluded(a)) => {
            if a >= b {
                Bound::Excluded(a)
            } else {
                Bound::Included(b)
            }
        }
    }
}

fn earlier_end(a: Bound<Timestamp>, b: Bound<Timestamp>) -> Bound<Timestamp> {
    match (a, b) {
        (Bound::Unbounded, other) | (other, Bound::Unbounded) => other,
        (Bound::Included(a), Bound::Included(b)) => Bound::Included(a.min(b)),
        (Bound::Excluded(a), Bound::Excluded(b)) => Bound::Excluded(a.min(b)),
        (Bound::Excluded(a), Bound::Included(b)) | (Bound::Included(b), Bound::Excluded(a)) => {
            if a <= b {
                Bound::Excluded(a)
            } else {
                Bound::Included(b)
            }
        }
    }
}

impl RangeBounds<Timestamp> for TimeRange {
    fn start_bound(&self) -> Bound<&Timestamp> {
        self.not_before.as_ref()
    }

    fn end_bound(&self) -> Bound<&Timestamp> {
        self.expiration.as_ref()
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.not_before {
            Bound::Included(nbf) | Bound::Excluded(nbf) => write!(f, "{nbf}")?,
            Bound::Unbounded => {}
        }
        write!(f, "..")?;
        match self.expiration {
            Bound::Included(exp) => write!(f, "={exp}"),
            Bound::Excluded(exp) => write!(f, "{exp}"),
            Bound::Unbounded => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ts(seconds: u64) -> Timestamp {
        Timestamp::from_unix(seconds)
    }

    #[test]
    fn it_treats_expiration_as_exclusive() {
        let range = TimeRange::new(Some(ts(10)), Some(ts(20)));

        assert!(range.is_too_early(ts(9)));
        assert!(range.contains(&ts(10)));
        assert!(range.contains(&ts(19)));
        assert!(range.is_expired(ts(20)));
        assert!(!range.contains(&ts(20)));
    }

    #[test]
    fn it_never_expires_without_exp() {
        let range = TimeRange::new(None, None);
        assert!(!range.is_expired(ts(u64::MAX)));
        assert!(!range.is_too_early(ts(0)));
    }

    #[test]
    fn it_intersects_to_the_narrowest_window() {
        let outer = TimeRange::new(Some(ts(10)), Some(ts(100)));
        let inner = TimeRange::new(Some(ts(20)), None);

        let both = outer.intersect(inner);
        assert_eq!(both, TimeRange::new(Some(ts(20)), Some(ts(100))));
        assert_eq!(both.to_string(), "20..100");
        assert!(both.is_valid());

        let disjoint = both.intersect(TimeRange::new(Some(ts(200)), None));
        assert!(!disjoint.is_valid());
    }
}
