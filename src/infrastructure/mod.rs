//! Adapters for the domain ports: history storage backends, session storage
//! and the default gateway client.

pub mod file_ledger;
pub mod file_session;
pub mod gateway;
pub mod in_memory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
