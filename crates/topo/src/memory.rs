//! In-memory topology store
//!
//! Keeps the global and per-cell partitions in process memory. Used by tests
//! and by embedded deployments that have a single control process. Cells and
//! the global partition can be made unreachable or read-only, and lock or
//! unlock calls can be made to fail, to exercise the partial-failure paths of
//! callers.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Result, TopoError};
use crate::server::{shard_path, TopoServer};
use crate::serving::{EndPoints, SrvShard};
use crate::shard::{ShardInfo, ShardReplication};
use crate::tablet::{Cell, Tablet, TabletAlias, TabletType};

type ShardKey = (String, String);

fn shard_key(keyspace: &str, shard: &str) -> ShardKey {
    (keyspace.to_string(), shard.to_string())
}

fn cell_shard_path(cell: &str, keyspace: &str, shard: &str) -> String {
    format!("/cells/{}{}", cell, shard_path(keyspace, shard))
}

/// Action payload recorded when a shard lock is released
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRecord {
    pub keyspace: String,
    pub shard: String,
    pub lock_path: String,
    /// Payload written when the lock was taken
    pub contents: String,
    /// Payload written when the lock was released
    pub results: String,
}

struct HeldLock {
    path: String,
    contents: String,
}

struct CellTopo {
    available: bool,
    read_only: bool,
    tablets: HashMap<u32, Tablet>,
    replication: HashMap<ShardKey, ShardReplication>,
    srv_tablet_types: HashMap<(String, String, TabletType), EndPoints>,
    srv_shards: HashMap<ShardKey, SrvShard>,
}

impl CellTopo {
    fn new() -> Self {
        Self {
            available: true,
            read_only: false,
            tablets: HashMap::new(),
            replication: HashMap::new(),
            srv_tablet_types: HashMap::new(),
            srv_shards: HashMap::new(),
        }
    }
}

#[derive(Default)]
struct TopoState {
    shards: HashMap<ShardKey, ShardInfo>,
    cells: HashMap<Cell, CellTopo>,
    locks: HashMap<ShardKey, HeldLock>,
    action_log: Vec<ActionRecord>,
    next_lock_id: u64,
    lock_failures: u32,
    unlock_failures: u32,
    global_read_only: bool,
}

impl TopoState {
    fn cell(&self, cell: &str) -> Result<&CellTopo> {
        let topo = self
            .cells
            .get(cell)
            .ok_or_else(|| TopoError::UnknownCell(cell.to_string()))?;
        if !topo.available {
            return Err(TopoError::Unavailable {
                cell: cell.to_string(),
            });
        }
        Ok(topo)
    }

    fn cell_mut(&mut self, cell: &str) -> Result<&mut CellTopo> {
        let topo = self
            .cells
            .get_mut(cell)
            .ok_or_else(|| TopoError::UnknownCell(cell.to_string()))?;
        if !topo.available {
            return Err(TopoError::Unavailable {
                cell: cell.to_string(),
            });
        }
        if topo.read_only {
            return Err(TopoError::Backend(format!("topology of cell {} is read-only", cell)));
        }
        Ok(topo)
    }

    fn check_global_writable(&self, keyspace: &str, shard: &str) -> Result<()> {
        if self.global_read_only {
            return Err(TopoError::Backend(format!(
                "global topology is read-only, cannot write {}",
                shard_path(keyspace, shard)
            )));
        }
        Ok(())
    }
}

/// In-memory `TopoServer`
pub struct MemoryTopo {
    state: Mutex<TopoState>,
    /// Woken every time a shard lock is released
    lock_released: Notify,
}

impl MemoryTopo {
    /// Create a store with the given cells, all reachable
    pub fn new<I, S>(cells: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Cell>,
    {
        let topo = Self {
            state: Mutex::new(TopoState::default()),
            lock_released: Notify::new(),
        };
        for cell in cells {
            topo.add_cell(cell);
        }
        topo
    }

    /// Register a cell; no-op if it already exists
    pub fn add_cell(&self, cell: impl Into<Cell>) {
        self.state.lock().cells.entry(cell.into()).or_insert_with(CellTopo::new);
    }

    /// Mark a cell reachable or unreachable
    ///
    /// Returns false if the cell is unknown.
    pub fn set_cell_available(&self, cell: &str, available: bool) -> bool {
        match self.state.lock().cells.get_mut(cell) {
            Some(topo) => {
                debug!(cell, available, "Changing cell availability");
                topo.available = available;
                true
            }
            None => false,
        }
    }

    /// Make every write to a cell fail while reads keep working
    ///
    /// Returns false if the cell is unknown.
    pub fn set_cell_read_only(&self, cell: &str, read_only: bool) -> bool {
        match self.state.lock().cells.get_mut(cell) {
            Some(topo) => {
                debug!(cell, read_only, "Changing cell write access");
                topo.read_only = read_only;
                true
            }
            None => false,
        }
    }

    /// Make every write to the global shard records fail
    ///
    /// Shard locks are not affected; use `fail_next_locks` for those.
    pub fn set_global_read_only(&self, read_only: bool) {
        debug!(read_only, "Changing global write access");
        self.state.lock().global_read_only = read_only;
    }

    /// Make the next `count` lock attempts on existing shards fail
    pub fn fail_next_locks(&self, count: u32) {
        self.state.lock().lock_failures = count;
    }

    /// Make the next `count` unlocks fail
    ///
    /// A failed unlock still frees the lock (as an expired ephemeral lock
    /// would) but does not record the action results.
    pub fn fail_next_unlocks(&self, count: u32) {
        self.state.lock().unlock_failures = count;
    }

    /// Whether the action lock of a shard is currently held
    pub fn is_shard_locked(&self, keyspace: &str, shard: &str) -> bool {
        self.state.lock().locks.contains_key(&shard_key(keyspace, shard))
    }

    /// Payload currently stored in a held shard lock
    pub fn lock_contents(&self, keyspace: &str, shard: &str) -> Option<String> {
        self.state
            .lock()
            .locks
            .get(&shard_key(keyspace, shard))
            .map(|held| held.contents.clone())
    }

    /// Every action recorded by a successful unlock, oldest first
    pub fn action_log(&self) -> Vec<ActionRecord> {
        self.state.lock().action_log.clone()
    }

    fn try_lock(&self, keyspace: &str, shard: &str, contents: &str) -> Result<Option<String>> {
        let mut state = self.state.lock();
        let key = shard_key(keyspace, shard);
        if !state.shards.contains_key(&key) {
            return Err(TopoError::NoNode(shard_path(keyspace, shard)));
        }
        if state.lock_failures > 0 {
            state.lock_failures -= 1;
            return Err(TopoError::Backend(format!(
                "failed to create lock under {}",
                shard_path(keyspace, shard)
            )));
        }
        if state.locks.contains_key(&key) {
            return Ok(None);
        }

        state.next_lock_id += 1;
        let path = format!("{}/action/{:010}", shard_path(keyspace, shard), state.next_lock_id);
        state.locks.insert(
            key,
            HeldLock {
                path: path.clone(),
                contents: contents.to_string(),
            },
        );
        Ok(Some(path))
    }
}

#[async_trait]
impl TopoServer for MemoryTopo {
    async fn create_shard(&self, shard: &ShardInfo) -> Result<()> {
        let mut state = self.state.lock();
        state.check_global_writable(&shard.keyspace, &shard.shard_name)?;
        let key = shard_key(&shard.keyspace, &shard.shard_name);
        if state.shards.contains_key(&key) {
            return Err(TopoError::NodeExists(shard_path(&shard.keyspace, &shard.shard_name)));
        }
        state.shards.insert(key, shard.clone());
        Ok(())
    }

    async fn get_shard(&self, keyspace: &str, shard: &str) -> Result<ShardInfo> {
        self.state
            .lock()
            .shards
            .get(&shard_key(keyspace, shard))
            .cloned()
            .ok_or_else(|| TopoError::NoNode(shard_path(keyspace, shard)))
    }

    async fn update_shard(&self, shard: &ShardInfo) -> Result<()> {
        let mut state = self.state.lock();
        state.check_global_writable(&shard.keyspace, &shard.shard_name)?;
        match state.shards.get_mut(&shard_key(&shard.keyspace, &shard.shard_name)) {
            Some(existing) => {
                *existing = shard.clone();
                Ok(())
            }
            None => Err(TopoError::NoNode(shard_path(&shard.keyspace, &shard.shard_name))),
        }
    }

    async fn delete_shard(&self, keyspace: &str, shard: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.check_global_writable(keyspace, shard)?;
        match state.shards.remove(&shard_key(keyspace, shard)) {
            Some(_) => Ok(()),
            None => Err(TopoError::NoNode(shard_path(keyspace, shard))),
        }
    }

    async fn lock_shard_for_action(
        &self,
        keyspace: &str,
        shard: &str,
        contents: &str,
        timeout: Duration,
        interrupted: &CancellationToken,
    ) -> Result<String> {
        let deadline = Instant::now() + timeout;

        loop {
            if interrupted.is_cancelled() {
                return Err(TopoError::Interrupted(shard_path(keyspace, shard)));
            }

            // Register for the wakeup before looking at the lock table so a
            // release in between is not missed.
            let released = self.lock_released.notified();
            if let Some(path) = self.try_lock(keyspace, shard, contents)? {
                debug!(keyspace, shard, lock_path = %path, "Acquired shard lock");
                return Ok(path);
            }

            tokio::select! {
                _ = released => {}
                _ = tokio::time::sleep_until(deadline) => {
                    return Err(TopoError::Timeout(shard_path(keyspace, shard)));
                }
                _ = interrupted.cancelled() => {
                    return Err(TopoError::Interrupted(shard_path(keyspace, shard)));
                }
            }
        }
    }

    async fn unlock_shard_for_action(
        &self,
        keyspace: &str,
        shard: &str,
        lock_path: &str,
        results: &str,
    ) -> Result<()> {
        let result = {
            let mut state = self.state.lock();
            let key = shard_key(keyspace, shard);
            match state.locks.get(&key).map(|held| held.path == lock_path) {
                None => return Err(TopoError::NoNode(lock_path.to_string())),
                Some(false) => {
                    return Err(TopoError::BadLockPath {
                        path: lock_path.to_string(),
                    })
                }
                Some(true) => {}
            }

            let contents = state
                .locks
                .remove(&key)
                .map(|held| held.contents)
                .unwrap_or_default();
            if state.unlock_failures > 0 {
                state.unlock_failures -= 1;
                Err(TopoError::Backend(format!(
                    "failed to record action results for {}",
                    lock_path
                )))
            } else {
                state.action_log.push(ActionRecord {
                    keyspace: keyspace.to_string(),
                    shard: shard.to_string(),
                    lock_path: lock_path.to_string(),
                    contents,
                    results: results.to_string(),
                });
                Ok(())
            }
        };

        debug!(keyspace, shard, lock_path, "Released shard lock");
        self.lock_released.notify_waiters();
        result
    }

    async fn create_tablet(&self, tablet: &Tablet) -> Result<()> {
        let mut state = self.state.lock();
        let cell = state.cell_mut(&tablet.alias.cell)?;
        if cell.tablets.contains_key(&tablet.alias.uid) {
            return Err(TopoError::NodeExists(format!("/cells/{}/tablets/{}", tablet.alias.cell, tablet.alias)));
        }
        cell.tablets.insert(tablet.alias.uid, tablet.clone());
        Ok(())
    }

    async fn get_tablet(&self, alias: &TabletAlias) -> Result<Tablet> {
        let state = self.state.lock();
        state
            .cell(&alias.cell)?
            .tablets
            .get(&alias.uid)
            .cloned()
            .ok_or_else(|| TopoError::NoNode(format!("/cells/{}/tablets/{}", alias.cell, alias)))
    }

    async fn update_shard_replication(
        &self,
        cell: &str,
        keyspace: &str,
        shard: &str,
        replication: &ShardReplication,
    ) -> Result<()> {
        let mut state = self.state.lock();
        state
            .cell_mut(cell)?
            .replication
            .insert(shard_key(keyspace, shard), replication.clone());
        Ok(())
    }

    async fn get_shard_replication(&self, cell: &str, keyspace: &str, shard: &str) -> Result<ShardReplication> {
        let state = self.state.lock();
        state
            .cell(cell)?
            .replication
            .get(&shard_key(keyspace, shard))
            .cloned()
            .ok_or_else(|| TopoError::NoNode(format!("{}/replication", cell_shard_path(cell, keyspace, shard))))
    }

    async fn delete_shard_replication(&self, cell: &str, keyspace: &str, shard: &str) -> Result<()> {
        let mut state = self.state.lock();
        state
            .cell_mut(cell)?
            .replication
            .remove(&shard_key(keyspace, shard))
            .map(|_| ())
            .ok_or_else(|| TopoError::NoNode(format!("{}/replication", cell_shard_path(cell, keyspace, shard))))
    }

    async fn update_srv_tablet_type(
        &self,
        cell: &str,
        keyspace: &str,
        shard: &str,
        tablet_type: TabletType,
        endpoints: &EndPoints,
    ) -> Result<()> {
        let mut state = self.state.lock();
        state
            .cell_mut(cell)?
            .srv_tablet_types
            .insert((keyspace.to_string(), shard.to_string(), tablet_type), endpoints.clone());
        Ok(())
    }

    async fn get_srv_tablet_type(
        &self,
        cell: &str,
        keyspace: &str,
        shard: &str,
        tablet_type: TabletType,
    ) -> Result<EndPoints> {
        let state = self.state.lock();
        state
            .cell(cell)?
            .srv_tablet_types
            .get(&(keyspace.to_string(), shard.to_string(), tablet_type))
            .cloned()
            .ok_or_else(|| TopoError::NoNode(format!("{}/{}", cell_shard_path(cell, keyspace, shard), tablet_type)))
    }

    async fn delete_srv_tablet_type(
        &self,
        cell: &str,
        keyspace: &str,
        shard: &str,
        tablet_type: TabletType,
    ) -> Result<()> {
        let mut state = self.state.lock();
        state
            .cell_mut(cell)?
            .srv_tablet_types
            .remove(&(keyspace.to_string(), shard.to_string(), tablet_type))
            .map(|_| ())
            .ok_or_else(|| TopoError::NoNode(format!("{}/{}", cell_shard_path(cell, keyspace, shard), tablet_type)))
    }

    async fn update_srv_shard(&self, cell: &str, keyspace: &str, shard: &str, srv_shard: &SrvShard) -> Result<()> {
        let mut state = self.state.lock();
        state
            .cell_mut(cell)?
            .srv_shards
            .insert(shard_key(keyspace, shard), srv_shard.clone());
        Ok(())
    }

    async fn get_srv_shard(&self, cell: &str, keyspace: &str, shard: &str) -> Result<SrvShard> {
        let state = self.state.lock();
        state
            .cell(cell)?
            .srv_shards
            .get(&shard_key(keyspace, shard))
            .cloned()
            .ok_or_else(|| TopoError::NoNode(cell_shard_path(cell, keyspace, shard)))
    }

    async fn delete_srv_shard(&self, cell: &str, keyspace: &str, shard: &str) -> Result<()> {
        let mut state = self.state.lock();
        state
            .cell_mut(cell)?
            .srv_shards
            .remove(&shard_key(keyspace, shard))
            .map(|_| ())
            .ok_or_else(|| TopoError::NoNode(cell_shard_path(cell, keyspace, shard)))
    }
}
