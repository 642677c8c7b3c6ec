//! Use-case services on top of the repository layer.

pub mod parcel_service;
