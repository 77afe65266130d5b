//! Node and user persistence behind the [`NodeRepository`] trait.
//!
//! The simulator, CLI and API all receive an explicitly constructed
//! repository (usually `Arc<dyn NodeRepository>`); there is no global store.

mod json_file;
mod memory;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::devices::{NodeStatus, VirtualUser, WaveNode};

pub use json_file::JsonFileRepository;
pub use memory::MemoryRepository;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("node '{0}' not found")]
    NodeNotFound(String),

    #[error("user '{0}' not found")]
    UserNotFound(String),

    #[error("duplicate node id '{0}'")]
    DuplicateId(String),

    #[error("invalid record in {path}: {message}")]
    InvalidRecord { path: PathBuf, message: String },

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot encode {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Storage operations for nodes and users.
///
/// Implementations serialize concurrent access themselves; every
/// read-modify-write runs under one exclusive lock.
#[cfg_attr(test, mockall::automock)]
pub trait NodeRepository: Send + Sync {
    /// All nodes, in store order.
    fn list_all(&self) -> StorageResult<Vec<WaveNode>>;

    /// Nodes whose status is `ON`, in store order.
    fn list_active(&self) -> StorageResult<Vec<WaveNode>>;

    fn get(&self, id: &str) -> StorageResult<Option<WaveNode>>;

    /// Persists `status` for node `id` and returns the updated node.
    fn set_status(&self, id: &str, status: NodeStatus) -> StorageResult<WaveNode>;

    /// Flips node `id` between `ON` and `OFF` atomically.
    fn switch(&self, id: &str) -> StorageResult<WaveNode>;

    fn update_endpoint(&self, id: &str, endpoint: &str) -> StorageResult<WaveNode>;

    /// Links node `id` to an existing user.
    fn assign_user(&self, id: &str, username: &str) -> StorageResult<WaveNode>;

    fn list_users(&self) -> StorageResult<Vec<VirtualUser>>;

    fn get_user(&self, username: &str) -> StorageResult<Option<VirtualUser>>;
}

/// Rejects fleets where two nodes share an id.
pub(crate) fn ensure_unique_ids(nodes: &[WaveNode]) -> StorageResult<()> {
    let mut seen = std::collections::HashSet::with_capacity(nodes.len());
    for node in nodes {
        if !seen.insert(node.id.as_str()) {
            return Err(StorageError::DuplicateId(node.id.clone()));
        }
    }
    Ok(())
}
