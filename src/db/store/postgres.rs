//! PostgreSQL-backed store.

use tokio::sync::Mutex;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls, Row};
use tracing::{debug, error, info};

use crate::db::store::{Credentials, VmStore};
use crate::db::{DiskListing, DiskRecord, NewVm, StoreError, VmId, VmRecord, VmUpdate};

const INSERT_VM: &str = "INSERT INTO vms (ram, cpu, password) \
     VALUES ($1, $2, crypt($3, gen_salt('bf'))) RETURNING id";
const INSERT_DISK: &str = "INSERT INTO disks (size, vm_id) VALUES ($1, $2)";
const CHECK_PASSWORD: &str = "SELECT password = crypt($1, password) FROM vms WHERE id = $2";
const SELECT_VMS: &str = "SELECT id, ram, cpu FROM vms ORDER BY id";
const SELECT_VMS_BY_ID: &str = "SELECT id, ram, cpu FROM vms WHERE id = ANY($1) ORDER BY id";
const SELECT_VM_DISKS: &str = "SELECT id, size, vm_id FROM disks WHERE vm_id = $1 ORDER BY id";
const SELECT_DISKS: &str = "SELECT d.id, d.size, d.vm_id, v.ram, v.cpu \
     FROM disks d JOIN vms v ON v.id = d.vm_id ORDER BY d.id";

/// Store backed by a single PostgreSQL connection.
///
/// # Concurrency
///
/// The one `Client` sits behind a `tokio::sync::Mutex`, held for the whole
/// operation. Operations from different connections are therefore strictly
/// serialized: at most one is in flight system-wide, and a transaction is
/// never interleaved with another connection's statements.
///
/// NOTE: A bounded pool would lift the throughput cap. No operation here
/// relies on global ordering beyond its own transaction.
pub struct PgStore {
    client: Mutex<Client>,
}

impl PgStore {
    /// Connects to PostgreSQL and spawns the connection driver task.
    pub async fn connect(config: &tokio_postgres::Config) -> Result<Self, StoreError> {
        let (client, connection) = config.connect(NoTls).await?;

        tokio::spawn(async move {
            match connection.await {
                Ok(()) => info!("database connection closed"),
                Err(e) => error!(error = %e, "database connection failed"),
            }
        });

        Ok(Self::new(client))
    }

    /// Wraps an already connected client.
    pub fn new(client: Client) -> Self {
        Self {
            client: Mutex::new(client),
        }
    }
}

impl VmStore for PgStore {
    async fn create_vm(&self, vm: &NewVm) -> Result<VmId, StoreError> {
        let mut client = self.client.lock().await;

        // Dropping `tx` before commit rolls the VM row back.
        let tx = client.transaction().await?;
        let row = tx
            .query_one(INSERT_VM, &[&vm.ram, &vm.cpu, &vm.password])
            .await?;
        let vm_id: VmId = row.try_get(0)?;

        if !vm.disks.is_empty() {
            let insert_disk = tx.prepare(INSERT_DISK).await?;
            for disk in &vm.disks {
                tx.execute(&insert_disk, &[&disk.size, &vm_id]).await?;
            }
        }
        tx.commit().await?;

        debug!(vm_id, disks = vm.disks.len(), "inserted vm");
        Ok(vm_id)
    }

    async fn verify_password(&self, vm_id: VmId, password: &str) -> Result<Credentials, StoreError> {
        let client = self.client.lock().await;
        let row = client.query_opt(CHECK_PASSWORD, &[&password, &vm_id]).await?;

        let Some(row) = row else {
            return Ok(Credentials::UnknownVm);
        };
        match row.try_get::<_, Option<bool>>(0)? {
            Some(true) => Ok(Credentials::Valid),
            _ => Ok(Credentials::Invalid),
        }
    }

    async fn list_vms(&self, ids: Option<&[VmId]>) -> Result<Vec<VmRecord>, StoreError> {
        let client = self.client.lock().await;

        let rows = match ids {
            None => client.query(SELECT_VMS, &[]).await?,
            Some([]) => return Ok(Vec::new()),
            Some(ids) => client.query(SELECT_VMS_BY_ID, &[&ids]).await?,
        };
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let select_disks = client.prepare(SELECT_VM_DISKS).await?;
        let mut vms = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut vm = vm_from_row(row)?;
            vm.disks = client
                .query(&select_disks, &[&vm.id])
                .await?
                .iter()
                .map(disk_from_row)
                .collect::<Result<_, _>>()?;
            vms.push(vm);
        }
        Ok(vms)
    }

    async fn update_vm(&self, vm_id: VmId, update: &VmUpdate) -> Result<bool, StoreError> {
        // Column names come from this fixed list only; values are always
        // bound as parameters.
        let mut assignments: Vec<String> = Vec::new();
        let mut params: Vec<&(dyn ToSql + Sync)> = Vec::new();

        if let Some(ram) = &update.ram {
            params.push(ram);
            assignments.push(format!("ram = ${}", params.len()));
        }
        if let Some(cpu) = &update.cpu {
            params.push(cpu);
            assignments.push(format!("cpu = ${}", params.len()));
        }
        if let Some(password) = &update.password {
            params.push(password);
            assignments.push(format!("password = crypt(${}, gen_salt('bf'))", params.len()));
        }
        if assignments.is_empty() {
            return Ok(false);
        }

        params.push(&vm_id);
        let sql = format!(
            "UPDATE vms SET {} WHERE id = ${}",
            assignments.join(", "),
            params.len()
        );

        let client = self.client.lock().await;
        let updated = client.execute(sql.as_str(), &params).await?;
        Ok(updated > 0)
    }

    async fn list_disks(&self) -> Result<Vec<DiskListing>, StoreError> {
        let client = self.client.lock().await;
        let rows = client.query(SELECT_DISKS, &[]).await?;
        let disks = rows
            .iter()
            .map(listing_from_row)
            .collect::<Result<_, _>>()?;
        Ok(disks)
    }
}

fn vm_from_row(row: &Row) -> Result<VmRecord, tokio_postgres::Error> {
    Ok(VmRecord {
        id: row.try_get(0)?,
        ram: row.try_get(1)?,
        cpu: row.try_get(2)?,
        disks: Vec::new(),
    })
}

fn disk_from_row(row: &Row) -> Result<DiskRecord, tokio_postgres::Error> {
    Ok(DiskRecord {
        id: row.try_get(0)?,
        size: row.try_get(1)?,
        vm_id: row.try_get(2)?,
    })
}

fn listing_from_row(row: &Row) -> Result<DiskListing, tokio_postgres::Error> {
    Ok(DiskListing {
        id: row.try_get(0)?,
        size: row.try_get(1)?,
        vm_id: row.try_get(2)?,
        ram: row.try_get(3)?,
        cpu: row.try_get(4)?,
    })
}
