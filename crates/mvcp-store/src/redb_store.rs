use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use mvcp_domain::{MicroVm, VmId};
use redb::{Database, ReadableTable, TableDefinition};

use crate::error::StoreError;
use crate::store::Repository;

const VMS: TableDefinition<&str, &[u8]> = TableDefinition::new("vms");

/// Persistent [`Repository`] backed by a redb database file. Survives
/// process restarts — on startup the daemon reloads every record here and
/// reconciles it.
#[derive(Clone)]
pub struct RedbRepository {
    db: Arc<Database>,
}

impl RedbRepository {
    /// Open (or create) a redb database at `path`. Parent directories are
    /// created automatically.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Internal(e.to_string()))?;
        }
        let db = Database::create(path).map_err(|e| StoreError::Internal(e.to_string()))?;

        let wtxn = db.begin_write().map_err(|e| StoreError::Internal(e.to_string()))?;
        wtxn.open_table(VMS).map_err(|e| StoreError::Internal(e.to_string()))?;
        wtxn.commit().map_err(|e| StoreError::Internal(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }
}

#[async_trait]
impl Repository for RedbRepository {
    async fn save(&self, mut vm: MicroVm) -> Result<MicroVm, StoreError> {
        vm.id.assign_uid();
        let key = vm.id.format();

        let existing_version = {
            let rtxn = self.db.begin_read().map_err(|e| StoreError::Internal(e.to_string()))?;
            let table = rtxn.open_table(VMS).map_err(|e| StoreError::Internal(e.to_string()))?;
            match table.get(key.as_str()).map_err(|e| StoreError::Internal(e.to_string()))? {
                Some(guard) => {
                    let existing: MicroVm = serde_json::from_slice(guard.value())?;
                    Some(existing.version)
                }
                None => None,
            }
        };
        vm.version = existing_version.map(|v| v + 1).unwrap_or(1);

        let bytes = serde_json::to_vec(&vm)?;
        let wtxn = self.db.begin_write().map_err(|e| StoreError::Internal(e.to_string()))?;
        {
            let mut table = wtxn.open_table(VMS).map_err(|e| StoreError::Internal(e.to_string()))?;
            table.insert(key.as_str(), bytes.as_slice()).map_err(|e| StoreError::Internal(e.to_string()))?;
        }
        wtxn.commit().map_err(|e| StoreError::Internal(e.to_string()))?;

        Ok(vm)
    }

    async fn get(&self, id: &VmId) -> Result<Option<MicroVm>, StoreError> {
        let rtxn = self.db.begin_read().map_err(|e| StoreError::Internal(e.to_string()))?;
        let table = rtxn.open_table(VMS).map_err(|e| StoreError::Internal(e.to_string()))?;
        match table.get(id.format().as_str()).map_err(|e| StoreError::Internal(e.to_string()))? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    async fn get_all(&self) -> Result<Vec<MicroVm>, StoreError> {
        let rtxn = self.db.begin_read().map_err(|e| StoreError::Internal(e.to_string()))?;
        let table = rtxn.open_table(VMS).map_err(|e| StoreError::Internal(e.to_string()))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(|e| StoreError::Internal(e.to_string()))? {
            let (_k, v) = entry.map_err(|e| StoreError::Internal(e.to_string()))?;
            results.push(serde_json::from_slice(v.value())?);
        }
        Ok(results)
    }

    async fn delete(&self, id: &VmId) -> Result<(), StoreError> {
        let wtxn = self.db.begin_write().map_err(|e| StoreError::Internal(e.to_string()))?;
        {
            let mut table = wtxn.open_table(VMS).map_err(|e| StoreError::Internal(e.to_string()))?;
            table.remove(id.format().as_str()).map_err(|e| StoreError::Internal(e.to_string()))?;
        }
        wtxn.commit().map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(())
    }
}
