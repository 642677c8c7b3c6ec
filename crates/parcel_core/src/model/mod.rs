//! Parcel domain model.
//!
//! # Invariants
//! - A parcel is identified by a storage-assigned `ParcelNumber`.
//! - Deletion is physical; there are no tombstones.

pub mod parcel;
