//! Store backends for VM and disk records.
//!
//! This module provides the `VmStore` trait along with the PostgreSQL-backed
//! `PgStore` and the in-process `MemoryStore`.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use std::future::Future;

use crate::db::{DiskListing, NewVm, StoreError, VmId, VmRecord, VmUpdate};

/// Outcome of checking a password against a stored hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credentials {
    /// The VM exists and the password matches.
    Valid,
    /// The VM exists but the password does not match.
    Invalid,
    /// No VM has the given identifier.
    UnknownVm,
}

/// Persistence operations the server performs.
///
/// # Design Decisions
///
/// 1. **Async trait**: Uses `async fn` in implementations so that query
///    execution suspends the calling task rather than the event loop.
///
/// 2. **Absence is not a fault**: unknown identifiers are reported through
///    return values (`Credentials::UnknownVm`, `false`, empty lists).
///    `StoreError` is reserved for constraint violations and connectivity.
///
/// 3. **Atomic registration**: `create_vm` either stores the VM and all of
///    its disks or nothing.
///
/// 4. **Passwords are write-only**: they are stored as salted hashes and no
///    operation returns them.
pub trait VmStore: Send + Sync {
    /// Inserts a VM and its disks in one transaction and returns the new
    /// VM identifier.
    fn create_vm(&self, vm: &NewVm) -> impl Future<Output = Result<VmId, StoreError>> + Send;

    /// Compares `password` against the stored hash of `vm_id`.
    fn verify_password(
        &self,
        vm_id: VmId,
        password: &str,
    ) -> impl Future<Output = Result<Credentials, StoreError>> + Send;

    /// Lists VMs with their disks, ordered by identifier.
    ///
    /// `None` lists every VM. `Some(ids)` lists only VMs whose identifier is
    /// in `ids`; an empty slice yields an empty list.
    fn list_vms(
        &self,
        ids: Option<&[VmId]>,
    ) -> impl Future<Output = Result<Vec<VmRecord>, StoreError>> + Send;

    /// Applies a partial update to one VM.
    ///
    /// A new password is hashed exactly as at creation. Returns `false` when
    /// no VM has the identifier or the update carries no fields.
    fn update_vm(
        &self,
        vm_id: VmId,
        update: &VmUpdate,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Lists every disk joined with its owning VM's `ram` and `cpu`.
    fn list_disks(&self) -> impl Future<Output = Result<Vec<DiskListing>, StoreError>> + Send;
}
