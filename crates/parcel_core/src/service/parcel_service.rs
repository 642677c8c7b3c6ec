//! Parcel use-case service.
//!
//! # Responsibility
//! - Provide lifecycle entry points (register, dispatch, deliver) for callers.
//! - Emit metadata-only log events for parcel mutations.
//!
//! # Invariants
//! - Never bypasses repository guards.
//! - Never logs addresses.

use crate::model::parcel::{ClientId, Parcel, ParcelNumber, ParcelStatus};
use crate::repo::parcel_repo::{ParcelRepository, PartialListError, RepoError, RepoResult};
use log::{info, warn};

/// Use-case wrapper for parcel operations.
pub struct ParcelService<R: ParcelRepository> {
    repo: R,
}

impl<R: ParcelRepository> ParcelService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Registers a new parcel for `client` and returns it with its number.
    pub fn register(&self, client: ClientId, address: impl Into<String>) -> RepoResult<Parcel> {
        let mut parcel = Parcel::new(client, address);
        parcel.number = self.add(&parcel)?;
        Ok(parcel)
    }

    /// Stores a caller-built parcel as-is.
    pub fn add(&self, parcel: &Parcel) -> RepoResult<ParcelNumber> {
        let result = self.repo.add(parcel);
        match &result {
            Ok(number) => info!(
                "event=parcel_add module=service status=ok number={number} client={} parcel_status={}",
                parcel.client, parcel.status
            ),
            Err(err) => warn!(
                "event=parcel_add module=service status=error client={} error_code=insert_failed error={err}",
                parcel.client
            ),
        }
        result
    }

    pub fn get(&self, number: ParcelNumber) -> RepoResult<Parcel> {
        self.repo.get(number)
    }

    /// Lists a client's parcels, keeping any rows read before a failure.
    pub fn parcels_of_client(&self, client: ClientId) -> Result<Vec<Parcel>, PartialListError> {
        self.repo.get_by_client(client).inspect_err(|err| {
            warn!(
                "event=parcel_list module=service status=error client={client} partial_count={} error_code=list_interrupted error={}",
                err.parcels.len(),
                err.source
            );
        })
    }

    /// Sets an arbitrary status string.
    pub fn set_status(&self, number: ParcelNumber, status: &str) -> RepoResult<()> {
        let result = self.repo.set_status(number, status);
        log_mutation("parcel_set_status", number, &result);
        result
    }

    /// Moves the parcel to `sent`.
    pub fn dispatch(&self, number: ParcelNumber) -> RepoResult<()> {
        self.set_status(number, ParcelStatus::Sent.as_str())
    }

    /// Moves the parcel to `delivered`.
    pub fn deliver(&self, number: ParcelNumber) -> RepoResult<()> {
        self.set_status(number, ParcelStatus::Delivered.as_str())
    }

    /// Corrects the address of a `registered` parcel.
    pub fn set_address(&self, number: ParcelNumber, address: &str) -> RepoResult<()> {
        let result = self.repo.set_address(number, address);
        log_mutation("parcel_set_address", number, &result);
        result
    }

    /// Deletes a `registered` parcel.
    pub fn delete(&self, number: ParcelNumber) -> RepoResult<()> {
        let result = self.repo.delete(number);
        log_mutation("parcel_delete", number, &result);
        result
    }
}

fn log_mutation(event: &str, number: ParcelNumber, result: &RepoResult<()>) {
    match result {
        Ok(()) => info!("event={event} module=service status=ok number={number}"),
        Err(err) => warn!(
            "event={event} module=service status=error number={number} error_code={} error={err}",
            error_code(err)
        ),
    }
}

fn error_code(err: &RepoError) -> &'static str {
    match err {
        RepoError::NotFound(_) => "parcel_not_found",
        RepoError::NotRegistered(_) => "parcel_not_registered",
        _ => "storage_failed",
    }
}
