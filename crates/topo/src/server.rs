//! Topology store contract
//!
//! The global topology holds one authoritative record per (keyspace, shard)
//! plus the per-shard action lock. Every cell has its own partition with the
//! tablets, replication graph and serving graph of that cell, and may be
//! unreachable independently of the others.

use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::serving::{EndPoints, SrvShard};
use crate::shard::{ShardInfo, ShardReplication};
use crate::tablet::{Tablet, TabletAlias, TabletType};

/// Path of a shard record, used in error messages and lock paths
pub fn shard_path(keyspace: &str, shard: &str) -> String {
    format!("/keyspaces/{}/shards/{}", keyspace, shard)
}

/// Topology store backend
///
/// Implementations must be shareable across tasks (`Arc<dyn TopoServer>`).
/// Per-cell calls fail with `TopoError::Unavailable` when the cell cannot be
/// reached; deletes of missing records fail with `TopoError::NoNode`.
#[async_trait]
pub trait TopoServer: Send + Sync {
    // ==================== Global shard records ====================

    /// Create a shard record
    async fn create_shard(&self, shard: &ShardInfo) -> Result<()>;

    /// Read a shard record
    async fn get_shard(&self, keyspace: &str, shard: &str) -> Result<ShardInfo>;

    /// Strongly-consistent read, used before changing shard membership
    async fn get_shard_critical(&self, keyspace: &str, shard: &str) -> Result<ShardInfo> {
        self.get_shard(keyspace, shard).await
    }

    /// Overwrite an existing shard record
    async fn update_shard(&self, shard: &ShardInfo) -> Result<()>;

    /// Delete a shard record
    async fn delete_shard(&self, keyspace: &str, shard: &str) -> Result<()>;

    // ==================== Shard action lock ====================

    /// Take the action lock of a shard, storing `contents` as its payload
    ///
    /// Blocks until the lock is free, `timeout` elapses (`Timeout`) or
    /// `interrupted` is cancelled (`Interrupted`). Returns the lock path that
    /// must be presented to `unlock_shard_for_action`.
    async fn lock_shard_for_action(
        &self,
        keyspace: &str,
        shard: &str,
        contents: &str,
        timeout: Duration,
        interrupted: &CancellationToken,
    ) -> Result<String>;

    /// Release a shard lock and durably record `results` for the action
    async fn unlock_shard_for_action(
        &self,
        keyspace: &str,
        shard: &str,
        lock_path: &str,
        results: &str,
    ) -> Result<()>;

    // ==================== Per-cell tablets ====================

    /// Create a tablet record in the tablet's cell
    async fn create_tablet(&self, tablet: &Tablet) -> Result<()>;

    /// Read a tablet record
    async fn get_tablet(&self, alias: &TabletAlias) -> Result<Tablet>;

    // ==================== Per-cell replication graph ====================

    /// Create or overwrite the replication graph of a shard in a cell
    async fn update_shard_replication(
        &self,
        cell: &str,
        keyspace: &str,
        shard: &str,
        replication: &ShardReplication,
    ) -> Result<()>;

    async fn get_shard_replication(&self, cell: &str, keyspace: &str, shard: &str) -> Result<ShardReplication>;

    async fn delete_shard_replication(&self, cell: &str, keyspace: &str, shard: &str) -> Result<()>;

    // ==================== Per-cell serving graph ====================

    /// Create or overwrite the end points of one tablet type
    async fn update_srv_tablet_type(
        &self,
        cell: &str,
        keyspace: &str,
        shard: &str,
        tablet_type: TabletType,
        endpoints: &EndPoints,
    ) -> Result<()>;

    async fn get_srv_tablet_type(
        &self,
        cell: &str,
        keyspace: &str,
        shard: &str,
        tablet_type: TabletType,
    ) -> Result<EndPoints>;

    async fn delete_srv_tablet_type(
        &self,
        cell: &str,
        keyspace: &str,
        shard: &str,
        tablet_type: TabletType,
    ) -> Result<()>;

    /// Create or overwrite the serving summary of a shard
    async fn update_srv_shard(&self, cell: &str, keyspace: &str, shard: &str, srv_shard: &SrvShard) -> Result<()>;

    async fn get_srv_shard(&self, cell: &str, keyspace: &str, shard: &str) -> Result<SrvShard>;

    async fn delete_srv_shard(&self, cell: &str, keyspace: &str, shard: &str) -> Result<()>;
}
