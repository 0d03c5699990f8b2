//! Tablet identity and roles

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Cell (datacenter / availability zone) name
pub type Cell = String;

/// Tablet role
///
/// Only `Master`, `Replica` and `Rdonly` tablets are published in the
/// serving graph; the other roles are maintenance or transient states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabletType {
    /// Not yet assigned to a shard
    Idle,
    /// Accepts writes for the shard
    Master,
    /// Serves reads, eligible for promotion
    Replica,
    /// Serves batch / analytics reads
    Rdonly,
    /// Caught up but not serving
    Spare,
    /// Serving-graph-excluded replica used for experiments
    Experimental,
    /// Applying a schema change
    Schema,
    /// Taking a backup
    Backup,
    /// Restoring from a backup
    Restore,
    /// Used by a background worker
    Worker,
    /// Being decommissioned
    Scrap,
}

/// Every tablet type, in declaration order
pub const ALL_TABLET_TYPES: [TabletType; 11] = [
    TabletType::Idle,
    TabletType::Master,
    TabletType::Replica,
    TabletType::Rdonly,
    TabletType::Spare,
    TabletType::Experimental,
    TabletType::Schema,
    TabletType::Backup,
    TabletType::Restore,
    TabletType::Worker,
    TabletType::Scrap,
];

impl TabletType {
    /// Whether tablets of this type get serving-graph entries
    pub fn is_in_serving_graph(self) -> bool {
        matches!(self, TabletType::Master | TabletType::Replica | TabletType::Rdonly)
    }

    /// Lower-case name, as stored in the topology
    pub fn as_str(self) -> &'static str {
        match self {
            TabletType::Idle => "idle",
            TabletType::Master => "master",
            TabletType::Replica => "replica",
            TabletType::Rdonly => "rdonly",
            TabletType::Spare => "spare",
            TabletType::Experimental => "experimental",
            TabletType::Schema => "schema",
            TabletType::Backup => "backup",
            TabletType::Restore => "restore",
            TabletType::Worker => "worker",
            TabletType::Scrap => "scrap",
        }
    }
}

impl std::fmt::Display for TabletType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown tablet type name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tablet type: {0}")]
pub struct ParseTabletTypeError(pub String);

impl FromStr for TabletType {
    type Err = ParseTabletTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_TABLET_TYPES
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseTabletTypeError(s.to_string()))
    }
}

/// Globally unique tablet identity: the cell it lives in plus a per-cell uid
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TabletAlias {
    pub cell: Cell,
    pub uid: u32,
}

impl TabletAlias {
    pub fn new(cell: impl Into<Cell>, uid: u32) -> Self {
        Self {
            cell: cell.into(),
            uid,
        }
    }
}

impl std::fmt::Display for TabletAlias {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{:010}", self.cell, self.uid)
    }
}

/// Tablet record, stored in the tablet's own cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tablet {
    pub alias: TabletAlias,
    pub keyspace: String,
    pub shard: String,
    pub tablet_type: TabletType,
    /// Host the tablet process runs on
    pub hostname: String,
    /// Named ports ("vt", "mysql", ...)
    #[serde(default)]
    pub port_map: HashMap<String, u16>,
}

impl Tablet {
    /// Create a tablet record with an empty port map
    pub fn new(
        alias: TabletAlias,
        keyspace: impl Into<String>,
        shard: impl Into<String>,
        tablet_type: TabletType,
    ) -> Self {
        Self {
            alias,
            keyspace: keyspace.into(),
            shard: shard.into(),
            tablet_type,
            hostname: String::new(),
            port_map: HashMap::new(),
        }
    }
}
