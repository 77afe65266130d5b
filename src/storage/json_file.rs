use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::devices::{NodeStatus, VirtualUser, WaveNode};

use super::{NodeRepository, StorageError, StorageResult, ensure_unique_ids};

/// File name of the node store inside the data directory.
pub const NODES_FILE: &str = "nodes.json";
/// File name of the user store inside the data directory.
pub const USERS_FILE: &str = "users.json";

/// Repository backed by `nodes.json` and `users.json` in one directory.
///
/// Every operation re-reads the files under a single lock, so edits made by
/// another process between calls are picked up. Writes go to a temporary
/// sibling file which is synced and then renamed over the original.
#[derive(Debug)]
pub struct JsonFileRepository {
    nodes_file: PathBuf,
    users_file: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileRepository {
    /// Opens the store in `data_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if either file is missing.
    pub fn open(data_dir: impl AsRef<Path>) -> StorageResult<Self> {
        let data_dir = data_dir.as_ref();
        let repo = Self {
            nodes_file: data_dir.join(NODES_FILE),
            users_file: data_dir.join(USERS_FILE),
            lock: Mutex::new(()),
        };
        for path in [&repo.users_file, &repo.nodes_file] {
            if !path.is_file() {
                return Err(StorageError::Io {
                    path: path.clone(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "store file not found"),
                });
            }
        }
        Ok(repo)
    }

    /// Writes a fresh store into `data_dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::DuplicateId`] for a fleet with repeated ids, or
    /// an I/O error if the files cannot be written.
    pub fn create(
        data_dir: impl AsRef<Path>,
        nodes: &[WaveNode],
        users: &[VirtualUser],
    ) -> StorageResult<Self> {
        let data_dir = data_dir.as_ref();
        ensure_unique_ids(nodes)?;
        fs::create_dir_all(data_dir).map_err(|source| StorageError::Io {
            path: data_dir.to_path_buf(),
            source,
        })?;
        write_json_atomic(&data_dir.join(USERS_FILE), users)?;
        write_json_atomic(&data_dir.join(NODES_FILE), nodes)?;
        info!(
            dir = %data_dir.display(),
            nodes = nodes.len(),
            users = users.len(),
            "Created node store"
        );
        Self::open(data_dir)
    }

    fn load_nodes(&self) -> StorageResult<Vec<WaveNode>> {
        let nodes: Vec<WaveNode> = read_json(&self.nodes_file)?;
        ensure_unique_ids(&nodes)?;
        debug!(count = nodes.len(), path = %self.nodes_file.display(), "Loaded nodes");
        Ok(nodes)
    }

    fn load_users(&self) -> StorageResult<Vec<VirtualUser>> {
        let users: Vec<VirtualUser> = read_json(&self.users_file)?;
        debug!(count = users.len(), path = %self.users_file.display(), "Loaded users");
        Ok(users)
    }

    fn save_nodes(&self, nodes: &[WaveNode]) -> StorageResult<()> {
        write_json_atomic(&self.nodes_file, nodes)?;
        debug!(count = nodes.len(), path = %self.nodes_file.display(), "Saved nodes");
        Ok(())
    }

    /// Runs one locked read-modify-write on node `id`.
    fn modify<F>(&self, id: &str, apply: F) -> StorageResult<WaveNode>
    where
        F: FnOnce(&mut WaveNode) -> StorageResult<()>,
    {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut nodes = self.load_nodes()?;
        let node = nodes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| StorageError::NodeNotFound(id.to_string()))?;
        apply(node)?;
        let updated = node.clone();
        self.save_nodes(&nodes)?;
        Ok(updated)
    }
}

impl NodeRepository for JsonFileRepository {
    fn list_all(&self) -> StorageResult<Vec<WaveNode>> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.load_nodes()
    }

    fn list_active(&self) -> StorageResult<Vec<WaveNode>> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut nodes = self.load_nodes()?;
        nodes.retain(|n| n.status.is_on());
        Ok(nodes)
    }

    fn get(&self, id: &str) -> StorageResult<Option<WaveNode>> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.load_nodes()?.into_iter().find(|n| n.id == id))
    }

    fn set_status(&self, id: &str, status: NodeStatus) -> StorageResult<WaveNode> {
        self.modify(id, |node| {
            node.status = status;
            Ok(())
        })
    }

    fn switch(&self, id: &str) -> StorageResult<WaveNode> {
        self.modify(id, |node| {
            node.status = node.status.toggled();
            Ok(())
        })
    }

    fn update_endpoint(&self, id: &str, endpoint: &str) -> StorageResult<WaveNode> {
        let node = self.modify(id, |node| {
            node.endpoint = endpoint.to_string();
            Ok(())
        })?;
        info!(node_id = %id, endpoint = %endpoint, "Updated node endpoint");
        Ok(node)
    }

    fn assign_user(&self, id: &str, username: &str) -> StorageResult<WaveNode> {
        self.modify(id, |node| {
            let users = self.load_users()?;
            if !users.iter().any(|u| u.username == username) {
                return Err(StorageError::UserNotFound(username.to_string()));
            }
            node.assigned_user = Some(username.to_string());
            Ok(())
        })
    }

    fn list_users(&self) -> StorageResult<Vec<VirtualUser>> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.load_users()
    }

    fn get_user(&self, username: &str) -> StorageResult<Option<VirtualUser>> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self
            .load_users()?
            .into_iter()
            .find(|u| u.username == username))
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> StorageResult<T> {
    let content = fs::read_to_string(path).map_err(|source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|e| StorageError::InvalidRecord {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Writes `data` next to `path` and renames it into place once synced.
fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, data: &T) -> StorageResult<()> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let io_err = |source| StorageError::Io {
        path: tmp_path.clone(),
        source,
    };

    let file = File::create(&tmp_path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, data).map_err(|source| StorageError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    writer.flush().map_err(io_err)?;
    writer.get_ref().sync_all().map_err(io_err)?;
    drop(writer);

    fs::rename(&tmp_path, path).map_err(|source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    })
}
