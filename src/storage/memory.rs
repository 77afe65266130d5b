use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::devices::{NodeStatus, VirtualUser, WaveNode};

use super::{NodeRepository, StorageError, StorageResult, ensure_unique_ids};

#[derive(Debug, Default)]
struct Inner {
    nodes: Vec<WaveNode>,
    users: Vec<VirtualUser>,
}

/// In-process repository holding nodes and users in insertion order.
///
/// Used by tests and demos; behaves like [`super::JsonFileRepository`]
/// without touching the filesystem.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    inner: Mutex<Inner>,
}

impl MemoryRepository {
    /// Builds a repository from a fleet and its users.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::DuplicateId`] if two nodes share an id.
    pub fn new(nodes: Vec<WaveNode>, users: Vec<VirtualUser>) -> StorageResult<Self> {
        ensure_unique_ids(&nodes)?;
        Ok(Self {
            inner: Mutex::new(Inner { nodes, users }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update<F>(&self, id: &str, apply: F) -> StorageResult<WaveNode>
    where
        F: FnOnce(&mut WaveNode, &[VirtualUser]) -> StorageResult<()>,
    {
        let mut inner = self.lock();
        let Inner { nodes, users } = &mut *inner;
        let node = nodes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| StorageError::NodeNotFound(id.to_string()))?;
        apply(node, users.as_slice())?;
        Ok(node.clone())
    }
}

impl NodeRepository for MemoryRepository {
    fn list_all(&self) -> StorageResult<Vec<WaveNode>> {
        Ok(self.lock().nodes.clone())
    }

    fn list_active(&self) -> StorageResult<Vec<WaveNode>> {
        Ok(self
            .lock()
            .nodes
            .iter()
            .filter(|n| n.status.is_on())
            .cloned()
            .collect())
    }

    fn get(&self, id: &str) -> StorageResult<Option<WaveNode>> {
        Ok(self.lock().nodes.iter().find(|n| n.id == id).cloned())
    }

    fn set_status(&self, id: &str, status: NodeStatus) -> StorageResult<WaveNode> {
        self.update(id, |node, _| {
            node.status = status;
            Ok(())
        })
    }

    fn switch(&self, id: &str) -> StorageResult<WaveNode> {
        self.update(id, |node, _| {
            node.status = node.status.toggled();
            Ok(())
        })
    }

    fn update_endpoint(&self, id: &str, endpoint: &str) -> StorageResult<WaveNode> {
        self.update(id, |node, _| {
            node.endpoint = endpoint.to_string();
            Ok(())
        })
    }

    fn assign_user(&self, id: &str, username: &str) -> StorageResult<WaveNode> {
        self.update(id, |node, users| {
            if !users.iter().any(|u| u.username == username) {
                return Err(StorageError::UserNotFound(username.to_string()));
            }
            node.assigned_user = Some(username.to_string());
            Ok(())
        })
    }

    fn list_users(&self) -> StorageResult<Vec<VirtualUser>> {
        Ok(self.lock().users.clone())
    }

    fn get_user(&self, username: &str) -> StorageResult<Option<VirtualUser>> {
        Ok(self
            .lock()
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }
}
