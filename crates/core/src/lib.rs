//! `jobmesh-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! strongly-typed identifiers, the domain error taxonomy and the aggregate
//! decide/evolve contract used by the marketplace model.

pub mod aggregate;
pub mod error;
pub mod id;

pub use aggregate::{execute, Aggregate, AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use id::{ApplicationId, CompanyId, JobId, NotificationId, UserId};
