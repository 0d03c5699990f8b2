//! Wrangler errors

use topo::{TabletAlias, TopoError};

/// Error returned by shard operations
#[derive(Debug, thiserror::Error)]
pub enum WranglerError {
    // ==================== Lock phase ====================
    #[error("timed out locking shard {keyspace}/{shard}")]
    LockTimeout { keyspace: String, shard: String },
    #[error("interrupted while locking shard {keyspace}/{shard}")]
    LockInterrupted { keyspace: String, shard: String },
    #[error("cannot lock shard {keyspace}/{shard}: {source}")]
    LockStore {
        keyspace: String,
        shard: String,
        #[source]
        source: TopoError,
    },

    // ==================== Store ====================
    #[error(transparent)]
    Topo(#[from] TopoError),

    // ==================== Preconditions ====================
    #[error("shard {keyspace}/{shard} still has {tablets} tablets")]
    ShardNotEmpty {
        keyspace: String,
        shard: String,
        tablets: usize,
    },
    #[error("cell {cell} is not in shard {keyspace}/{shard}")]
    CellNotPresent {
        keyspace: String,
        shard: String,
        cell: String,
    },
    #[error("master {master} is in the cell '{cell}' we want to remove")]
    MasterInCell { master: TabletAlias, cell: String },
    #[error("cell {cell} has {links} possible tablets in replication graph")]
    ReplicationLinksPresent { cell: String, links: usize },

    // ==================== Bookkeeping ====================
    #[error("error deleting ShardReplication object in cell {cell}: {source}")]
    DeleteShardReplication {
        cell: String,
        #[source]
        source: TopoError,
    },
    #[error("cannot unlock shard {keyspace}/{shard}: {source}")]
    Unlock {
        keyspace: String,
        shard: String,
        #[source]
        source: TopoError,
    },
    #[error("action node serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl WranglerError {
    /// Whether the error reports a missing topology record
    pub fn is_not_found(&self) -> bool {
        matches!(self, WranglerError::Topo(e) if e.is_no_node())
    }

    /// Whether the operation was refused by a safety check
    pub fn is_precondition_failed(&self) -> bool {
        matches!(
            self,
            WranglerError::ShardNotEmpty { .. }
                | WranglerError::CellNotPresent { .. }
                | WranglerError::MasterInCell { .. }
                | WranglerError::ReplicationLinksPresent { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, WranglerError>;
