//! Read-mostly datastore collaborator.
//!
//! The panel core owns the billing database; a processing module only reads
//! from it (module rows, item snapshots, params, try counts) and relies on
//! explicit `begin`/`commit`/`rollback` so the dispatcher can discard partial
//! state on failover. All mutation of billing state goes through the host RPC
//! collaborator, never through this crate; the insert helpers here exist for
//! seeding and tests.

mod cipher;
mod db;
mod measure;

pub use cipher::{PlainCipher, SecretCipher};
pub use db::{ItemSnapshot, ModuleRecord, Store};
pub use measure::MeasureMode;
