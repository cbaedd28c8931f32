#![warn(missing_docs)]

//! Capabilities, delegations and the algebra for matching one against the
//! other.
//!
//! A [`Descriptor`] recognizes one ability and knows how it may be narrowed.
//! Descriptors compose with [`MatcherExt::or`], [`MatcherExt::and`] and
//! [`MatcherExt::derive`] into a selector over every ability a service
//! understands. Selecting a [`Match`] against the capabilities carried by a
//! proof yields the narrower matches it justifies, together with a full
//! account of what was unknown or escalated.

pub mod ability;
pub mod capability;
pub mod cid;
pub mod combinator;
pub mod delegation;
pub mod descriptor;
pub mod error;
pub mod matcher;
pub mod matches;
pub mod policy;
pub mod resource;
pub mod schema;
pub mod time;

pub use ability::*;
pub use capability::*;
pub use cid::*;
pub use combinator::*;
pub use delegation::*;
pub use descriptor::*;
pub use error::*;
pub use matcher::*;
pub use matches::*;
pub use policy::*;
pub use resource::*;
pub use schema::*;
pub use time::*;

pub use ipld_core::{cid::Cid, ipld::Ipld};
