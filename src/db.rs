//! Persistence layer for virtual machine and disk records.
//!
//! The persistence layer owns the database connection and knows nothing about
//! sockets or sessions. Every operation the server performs against the
//! backing store goes through the [`VmStore`] trait.
//!
//! # Architecture
//!
//! ```text
//! +-------------------+
//! | Dispatcher        |
//! +-------------------+
//!          |
//!          v
//! +-------------------+
//! | VmStore Trait     |  <- store
//! +-------------------+
//!       /      \
//!      v        v
//! +-------------+ +-------------+
//! | MemoryStore | |   PgStore   |
//! +-------------+ +-------------+
//! ```
//!
//! # Tables
//!
//! `PgStore` expects two pre-existing tables and the `pgcrypto` extension:
//!
//! ```sql
//! CREATE EXTENSION IF NOT EXISTS pgcrypto;
//! CREATE TABLE vms (
//!     id       SERIAL PRIMARY KEY,
//!     ram      INTEGER NOT NULL,
//!     cpu      INTEGER NOT NULL,
//!     password TEXT    NOT NULL
//! );
//! CREATE TABLE disks (
//!     id    SERIAL PRIMARY KEY,
//!     size  INTEGER NOT NULL,
//!     vm_id INTEGER NOT NULL REFERENCES vms (id)
//! );
//! ```

pub mod error;
pub mod model;
pub mod store;

pub use error::{StoreError, ValidationError};
pub use model::{DiskListing, DiskRecord, NewDisk, NewVm, VmId, VmRecord, VmUpdate};
pub use store::{Credentials, MemoryStore, PgStore, VmStore};
