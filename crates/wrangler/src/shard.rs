//! Shard mutations
//!
//! All three operations hold the shard's action lock while they read, check
//! and rewrite the shard. Per-cell failures are fatal except where noted.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use topo::{TabletType, TopoError, ALL_TABLET_TYPES};

use crate::action::ActionNode;
use crate::error::{Result, WranglerError};
use crate::tablet_map::get_tablet_map_for_shard;
use crate::Wrangler;

/// Per-cell record that `delete_shard` tried to remove
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CleanupTarget {
    ShardReplication,
    SrvTabletType(TabletType),
    SrvShard,
}

impl std::fmt::Display for CleanupTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CleanupTarget::ShardReplication => write!(f, "ShardReplication"),
            CleanupTarget::SrvTabletType(tablet_type) => write!(f, "EndPoints/{}", tablet_type),
            CleanupTarget::SrvShard => write!(f, "SrvShard"),
        }
    }
}

/// A per-cell record that could not be removed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupWarning {
    pub cell: String,
    pub target: CleanupTarget,
    pub error: String,
}

/// Outcome of the best-effort per-cell cleanup done by `delete_shard`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardCleanupReport {
    /// Cells that were visited
    pub cells: Vec<String>,
    /// Records left behind
    pub warnings: Vec<CleanupWarning>,
}

impl ShardCleanupReport {
    /// Whether every per-cell record was removed
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    fn record(&mut self, cell: &str, keyspace: &str, shard: &str, target: CleanupTarget, error: TopoError) {
        warn!(cell, keyspace, shard, target = %target, error = %error, "Cannot delete per-cell shard record");
        self.warnings.push(CleanupWarning {
            cell: cell.to_string(),
            target,
            error: error.to_string(),
        });
    }
}

/// Treat a missing record as already deleted
fn ignore_no_node(result: topo::Result<()>) -> topo::Result<()> {
    match result {
        Err(TopoError::NoNode(_)) => Ok(()),
        other => other,
    }
}

impl Wrangler {
    /// Change the served types of a shard
    ///
    /// Does not rebuild the serving graph and does not check the new types
    /// against the rest of the keyspace.
    pub async fn set_shard_served_types(
        &self,
        keyspace: &str,
        shard: &str,
        served_types: Vec<TabletType>,
    ) -> Result<()> {
        let mut node = ActionNode::set_shard_served_types(served_types.clone());
        let lock_path = self.lock_shard(keyspace, shard, &node).await?;

        let result = self.set_shard_served_types_locked(keyspace, shard, served_types).await;
        self.unlock_shard(keyspace, shard, &mut node, &lock_path, result).await
    }

    async fn set_shard_served_types_locked(
        &self,
        keyspace: &str,
        shard: &str,
        served_types: Vec<TabletType>,
    ) -> Result<()> {
        let mut shard_info = self.ts.get_shard(keyspace, shard).await?;
        shard_info.served_types = served_types;
        self.ts.update_shard(&shard_info).await?;
        Ok(())
    }

    /// Remove a shard from the topology
    ///
    /// Only works if the shard has no tablets left. Replication and serving
    /// graph records are removed from every cell of the shard on a
    /// best-effort basis; what could not be removed is listed in the
    /// returned report. Only a failure to delete the shard record itself
    /// fails the call.
    pub async fn delete_shard(&self, keyspace: &str, shard: &str) -> Result<ShardCleanupReport> {
        let mut node = ActionNode::delete_shard();
        let lock_path = self.lock_shard(keyspace, shard, &node).await?;

        let result = self.delete_shard_locked(keyspace, shard).await;
        self.unlock_shard(keyspace, shard, &mut node, &lock_path, result).await
    }

    async fn delete_shard_locked(&self, keyspace: &str, shard: &str) -> Result<ShardCleanupReport> {
        let shard_info = self.ts.get_shard(keyspace, shard).await?;

        let tablets = get_tablet_map_for_shard(&*self.ts, keyspace, shard).await?;
        if !tablets.is_empty() {
            return Err(WranglerError::ShardNotEmpty {
                keyspace: keyspace.to_string(),
                shard: shard.to_string(),
                tablets: tablets.len(),
            });
        }

        // remove the replication graph and serving graph in each cell
        let mut report = ShardCleanupReport::default();
        for cell in &shard_info.cells {
            report.cells.push(cell.clone());

            if let Err(e) = ignore_no_node(self.ts.delete_shard_replication(cell, keyspace, shard).await) {
                report.record(cell, keyspace, shard, CleanupTarget::ShardReplication, e);
            }

            for tablet_type in ALL_TABLET_TYPES {
                if !tablet_type.is_in_serving_graph() {
                    continue;
                }
                let deleted = self
                    .ts
                    .delete_srv_tablet_type(cell, keyspace, shard, tablet_type)
                    .await;
                if let Err(e) = ignore_no_node(deleted) {
                    report.record(cell, keyspace, shard, CleanupTarget::SrvTabletType(tablet_type), e);
                }
            }

            if let Err(e) = ignore_no_node(self.ts.delete_srv_shard(cell, keyspace, shard).await) {
                report.record(cell, keyspace, shard, CleanupTarget::SrvShard, e);
            }
        }

        self.ts.delete_shard(keyspace, shard).await?;
        info!(
            keyspace,
            shard,
            cells = report.cells.len(),
            warnings = report.warnings.len(),
            "Deleted shard"
        );
        Ok(report)
    }

    /// Remove a cell from the cells of a shard
    ///
    /// Refuses if the master is in that cell or if the cell still has tablets
    /// in its replication graph. With `force`, a cell whose topology cannot be
    /// reached at all is removed anyway; this is meant for a datacenter that
    /// is permanently gone.
    pub async fn remove_shard_cell(&self, keyspace: &str, shard: &str, cell: &str, force: bool) -> Result<()> {
        let mut node = ActionNode::update_shard();
        let lock_path = self.lock_shard(keyspace, shard, &node).await?;

        let result = self.remove_shard_cell_locked(keyspace, shard, cell, force).await;
        self.unlock_shard(keyspace, shard, &mut node, &lock_path, result).await
    }

    async fn remove_shard_cell_locked(&self, keyspace: &str, shard: &str, cell: &str, force: bool) -> Result<()> {
        let mut shard_info = self.ts.get_shard_critical(keyspace, shard).await?;

        if !shard_info.in_cell_list(cell) {
            return Err(WranglerError::CellNotPresent {
                keyspace: keyspace.to_string(),
                shard: shard.to_string(),
                cell: cell.to_string(),
            });
        }

        if let Some(master) = &shard_info.master_alias {
            if master.cell == cell {
                return Err(WranglerError::MasterInCell {
                    master: master.clone(),
                    cell: cell.to_string(),
                });
            }
        }

        match self.ts.get_shard_replication(cell, keyspace, shard).await {
            Ok(replication) => {
                if !replication.is_empty() {
                    return Err(WranglerError::ReplicationLinksPresent {
                        cell: cell.to_string(),
                        links: replication.replication_links.len(),
                    });
                }

                // the replication graph is now useless, remove it
                self.ts
                    .delete_shard_replication(cell, keyspace, shard)
                    .await
                    .map_err(|source| WranglerError::DeleteShardReplication {
                        cell: cell.to_string(),
                        source,
                    })?;
            }
            Err(TopoError::NoNode(_)) => {}
            Err(e) => {
                // the cell's topology is unreachable
                if !force {
                    return Err(e.into());
                }
                warn!(
                    cell,
                    keyspace,
                    shard,
                    error = %e,
                    "Cannot get ShardReplication from cell, assuming cell topo server is down, and forcing the removal"
                );
            }
        }

        info!(cell, keyspace, shard, "Removing cell from shard");
        shard_info.remove_cell(cell);
        self.ts.update_shard(&shard_info).await?;
        Ok(())
    }
}
