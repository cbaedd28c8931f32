#![warn(missing_docs)]

//! Validates capability claims against chains of delegations.
//!
//! A [`Validator`] walks from a claim back through the proofs of the
//! delegation carrying it until every part of the claim reaches a principal
//! the [`CanIssue`] policy accepts as a root authority. Linked proofs are
//! fetched through a [`ProofResolver`], at most once per link and with
//! bounded concurrency. The walk either yields an [`Authorization`] or an
//! [`Unauthorized`] listing every reason every path failed.
//!
//! ```no_run
//! # use proofchain_validator::*;
//! # use proofchain_capability::{capability, Capability, ResourceSchema};
//! # use std::sync::Arc;
//! # async fn example(invocation: Arc<proofchain_capability::Delegation>) -> Result<(), Box<dyn std::error::Error>> {
//! let validator = Validator::new(
//!     ValidationOptions::builder()
//!         .capability(capability("store/add").with(ResourceSchema::Did).build())
//!         .resolver(MemoryResolver::new())
//!         .build()?,
//! );
//! let claim = Capability::new("store/add", "did:key:zSpace");
//! let authorization = validator.validate(&claim, invocation).await?;
//! println!("authorized through {} proofs", authorization.depth());
//! # Ok(())
//! # }
//! ```

pub mod authorization;
pub mod error;
pub mod options;
pub mod policy;
pub mod resolver;
pub mod validator;

pub use authorization::*;
pub use error::*;
pub use options::*;
pub use policy::*;
pub use resolver::*;
pub use validator::*;

pub use tokio_util::sync::CancellationToken;
