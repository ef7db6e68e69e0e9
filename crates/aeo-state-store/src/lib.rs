//! AEO State Store - Durable storage for full agent results
//!
//! Agents keep only a short summary in the per-job context; their full
//! output is offloaded here under `tenant_id/job_id/agent_id`.
//!
//! Backends:
//! - SQLite persistent storage
//! - In-memory map for tests and local runs

pub mod error;
pub mod memory_store;
pub mod sqlite_store;

pub use error::StateStoreError;
pub use memory_store::InMemoryBlobStore;
pub use sqlite_store::SqliteBlobStore;
