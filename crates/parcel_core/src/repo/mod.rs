//! Repository layer for parcel persistence.
//!
//! # Responsibility
//! - Define the parcel data access contract.
//! - Keep SQL details out of the service layer.
//!
//! # Invariants
//! - Semantic outcomes (`NotFound`, `NotRegistered`) are distinct from
//!   storage failures so callers can branch on them.

pub mod parcel_repo;
