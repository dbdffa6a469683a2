//! In-process store implementation for testing.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::db::store::{Credentials, VmStore};
use crate::db::{DiskListing, DiskRecord, NewVm, StoreError, VmId, VmRecord, VmUpdate};

/// In-process store implementation for testing.
///
/// Keeps the same observable semantics as `PgStore`: identifiers are
/// assigned from increasing sequences, passwords are kept only as salted
/// SHA-256 hashes, and registration is all-or-nothing. Nothing survives a
/// drop.
///
/// # Concurrency
///
/// Uses `parking_lot::Mutex` because no operation awaits while holding it.
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    /// Optional maximum disk count (for testing failed registrations)
    max_disks: Option<usize>,
}

#[derive(Default)]
struct MemoryState {
    vms: BTreeMap<VmId, StoredVm>,
    disks: BTreeMap<i32, DiskRecord>,
    last_vm_id: VmId,
    last_disk_id: i32,
}

struct StoredVm {
    ram: i32,
    cpu: i32,
    password: PasswordHash,
}

struct PasswordHash {
    salt: [u8; 16],
    digest: [u8; 32],
}

impl PasswordHash {
    fn new(password: &str) -> Self {
        let salt = rand::random::<[u8; 16]>();
        Self {
            salt,
            digest: Self::digest(&salt, password),
        }
    }

    fn matches(&self, password: &str) -> bool {
        Self::digest(&self.salt, password) == self.digest
    }

    fn digest(salt: &[u8], password: &str) -> [u8; 32] {
        Sha256::new()
            .chain_update(salt)
            .chain_update(password.as_bytes())
            .finalize()
            .into()
    }
}

impl MemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            max_disks: None,
        }
    }

    /// Creates a store that rejects disk rows beyond `max_disks` in total.
    ///
    /// This is useful for testing that a failed disk insert leaves no VM
    /// behind.
    pub fn with_max_disks(max_disks: usize) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            max_disks: Some(max_disks),
        }
    }

    fn disks_of(state: &MemoryState, vm_id: VmId) -> Vec<DiskRecord> {
        state
            .disks
            .values()
            .filter(|d| d.vm_id == vm_id)
            .cloned()
            .collect()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl VmStore for MemoryStore {
    async fn create_vm(&self, vm: &NewVm) -> Result<VmId, StoreError> {
        let mut state = self.state.lock();

        // Checked before any mutation so a rejected registration leaves no trace.
        if let Some(max) = self.max_disks
            && state.disks.len() + vm.disks.len() > max
        {
            return Err(StoreError::Constraint(format!(
                "disk limit of {} reached",
                max
            )));
        }

        state.last_vm_id += 1;
        let vm_id = state.last_vm_id;
        state.vms.insert(
            vm_id,
            StoredVm {
                ram: vm.ram,
                cpu: vm.cpu,
                password: PasswordHash::new(&vm.password),
            },
        );

        for disk in &vm.disks {
            state.last_disk_id += 1;
            let id = state.last_disk_id;
            state.disks.insert(
                id,
                DiskRecord {
                    id,
                    size: disk.size,
                    vm_id,
                },
            );
        }
        Ok(vm_id)
    }

    async fn verify_password(&self, vm_id: VmId, password: &str) -> Result<Credentials, StoreError> {
        let state = self.state.lock();
        Ok(match state.vms.get(&vm_id) {
            None => Credentials::UnknownVm,
            Some(vm) if vm.password.matches(password) => Credentials::Valid,
            Some(_) => Credentials::Invalid,
        })
    }

    async fn list_vms(&self, ids: Option<&[VmId]>) -> Result<Vec<VmRecord>, StoreError> {
        let state = self.state.lock();
        let vms = state
            .vms
            .iter()
            .filter(|(id, _)| ids.is_none_or(|ids| ids.contains(*id)))
            .map(|(&id, vm)| VmRecord {
                id,
                ram: vm.ram,
                cpu: vm.cpu,
                disks: Self::disks_of(&state, id),
            })
            .collect();
        Ok(vms)
    }

    async fn update_vm(&self, vm_id: VmId, update: &VmUpdate) -> Result<bool, StoreError> {
        if update.is_empty() {
            return Ok(false);
        }

        let mut state = self.state.lock();
        let Some(vm) = state.vms.get_mut(&vm_id) else {
            return Ok(false);
        };
        if let Some(ram) = update.ram {
            vm.ram = ram;
        }
        if let Some(cpu) = update.cpu {
            vm.cpu = cpu;
        }
        if let Some(password) = &update.password {
            vm.password = PasswordHash::new(password);
        }
        Ok(true)
    }

    async fn list_disks(&self) -> Result<Vec<DiskListing>, StoreError> {
        let state = self.state.lock();
        let disks = state
            .disks
            .values()
            .filter_map(|disk| {
                let vm = state.vms.get(&disk.vm_id)?;
                Some(DiskListing {
                    id: disk.id,
                    size: disk.size,
                    vm_id: disk.vm_id,
                    ram: vm.ram,
                    cpu: vm.cpu,
                })
            })
            .collect();
        Ok(disks)
    }
}
