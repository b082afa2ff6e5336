//! Resource persisters for Sentinel.
//!
//! A [`Persister`] keeps the latest snapshot of every resource. The
//! broadcaster uses one to serve project snapshots, and the agent writes
//! every delivered update into one so that its local copy can be read
//! back after a restart.

mod error;
mod file;
mod memory;
mod traits;

pub use error::{Result, StorageError};
pub use file::FilePersister;
pub use memory::MemoryPersister;
pub use traits::Persister;
