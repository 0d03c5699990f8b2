//! Tablet discovery for a shard
//!
//! A shard's tablets are found through the replication graph of every cell
//! the shard lists, plus the master alias from the shard record.

use std::collections::{BTreeSet, HashMap};

use tracing::warn;

use topo::{Tablet, TabletAlias, TopoError, TopoServer};

/// Every tablet alias the topology knows for a shard
///
/// Cells without a replication graph for the shard contribute nothing; any
/// other lookup error is returned.
pub async fn find_all_tablet_aliases_in_shard(
    ts: &dyn TopoServer,
    keyspace: &str,
    shard: &str,
) -> topo::Result<Vec<TabletAlias>> {
    let shard_info = ts.get_shard(keyspace, shard).await?;

    let mut aliases = BTreeSet::new();
    if let Some(master) = &shard_info.master_alias {
        aliases.insert(master.clone());
    }

    for cell in &shard_info.cells {
        match ts.get_shard_replication(cell, keyspace, shard).await {
            Ok(replication) => {
                for link in replication.replication_links {
                    aliases.insert(link.tablet_alias);
                    if let Some(parent) = link.parent {
                        aliases.insert(parent);
                    }
                }
            }
            Err(TopoError::NoNode(_)) => {}
            Err(e) => return Err(e),
        }
    }

    Ok(aliases.into_iter().collect())
}

/// Tablet records of a shard, keyed by alias
///
/// Aliases whose tablet record no longer exists are skipped.
pub async fn get_tablet_map_for_shard(
    ts: &dyn TopoServer,
    keyspace: &str,
    shard: &str,
) -> topo::Result<HashMap<TabletAlias, Tablet>> {
    let aliases = find_all_tablet_aliases_in_shard(ts, keyspace, shard).await?;

    let mut tablets = HashMap::with_capacity(aliases.len());
    for alias in aliases {
        match ts.get_tablet(&alias).await {
            Ok(tablet) => {
                tablets.insert(alias, tablet);
            }
            Err(TopoError::NoNode(_)) => {
                warn!(keyspace, shard, tablet = %alias, "Tablet referenced by topology is missing");
            }
            Err(e) => return Err(e),
        }
    }

    Ok(tablets)
}
