//! Shard records: the authoritative per-keyspace shard metadata and the
//! per-cell replication graph

use serde::{Deserialize, Serialize};

use crate::tablet::{Cell, TabletAlias, TabletType};

/// Key range `[start, end)` expressed as lower-case hex keyspace ids
///
/// An empty bound is unbounded on that side, so the default value covers the
/// whole keyspace (an unsharded keyspace).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyRange {
    /// Start keyspace id (inclusive)
    pub start: String,
    /// End keyspace id (exclusive)
    pub end: String,
}

/// Shard name that does not describe a key range
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid shard name '{name}': {reason}")]
pub struct InvalidShardName {
    pub name: String,
    pub reason: String,
}

impl KeyRange {
    /// Parse a shard name such as `-80`, `40-80`, `80-` or `0`
    pub fn parse_shard_name(name: &str) -> Result<Self, InvalidShardName> {
        let invalid = |reason: &str| InvalidShardName {
            name: name.to_string(),
            reason: reason.to_string(),
        };

        if name == "0" || name == "-" {
            return Ok(Self::default());
        }

        let (start, end) = name
            .split_once('-')
            .ok_or_else(|| invalid("expected '<start>-<end>'"))?;
        if end.contains('-') {
            return Err(invalid("more than one '-'"));
        }

        for bound in [start, end] {
            if bound.len() % 2 != 0 || !bound.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(invalid("bounds must be even-length hex"));
            }
        }

        let range = Self {
            start: start.to_ascii_lowercase(),
            end: end.to_ascii_lowercase(),
        };
        if !range.start.is_empty() && !range.end.is_empty() && range.start >= range.end {
            return Err(invalid("start must be less than end"));
        }
        Ok(range)
    }

    /// Whether the range covers the whole keyspace
    pub fn is_full(&self) -> bool {
        self.start.is_empty() && self.end.is_empty()
    }
}

impl std::fmt::Display for KeyRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Shard information, owned by the global topology
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardInfo {
    /// Keyspace the shard belongs to
    pub keyspace: String,
    /// Shard name (usually the key range, e.g. `-80`)
    pub shard_name: String,
    /// Responsible key range
    pub key_range: KeyRange,
    /// Current master tablet, if one was elected
    pub master_alias: Option<TabletAlias>,
    /// Roles the shard answers traffic for
    #[serde(default)]
    pub served_types: Vec<TabletType>,
    /// Cells with tablets for this shard, in insertion order
    #[serde(default)]
    pub cells: Vec<Cell>,
}

impl ShardInfo {
    /// Create a shard with no master, no served types and no cells
    pub fn new(keyspace: impl Into<String>, shard_name: impl Into<String>) -> Result<Self, InvalidShardName> {
        let shard_name = shard_name.into();
        let key_range = KeyRange::parse_shard_name(&shard_name)?;
        Ok(Self {
            keyspace: keyspace.into(),
            shard_name,
            key_range,
            master_alias: None,
            served_types: Vec::new(),
            cells: Vec::new(),
        })
    }

    /// Check whether `cell` is listed in the shard's cells
    pub fn in_cell_list(&self, cell: &str) -> bool {
        self.cells.iter().any(|c| c == cell)
    }

    /// Add a cell, keeping the list free of duplicates
    pub fn add_cell(&mut self, cell: impl Into<Cell>) {
        let cell = cell.into();
        if !self.in_cell_list(&cell) {
            self.cells.push(cell);
        }
    }

    /// Remove a cell, preserving the order of the remaining ones
    ///
    /// Returns true if the cell was present.
    pub fn remove_cell(&mut self, cell: &str) -> bool {
        let before = self.cells.len();
        self.cells.retain(|c| c != cell);
        self.cells.len() != before
    }

    /// Cell the master lives in
    pub fn master_cell(&self) -> Option<&str> {
        self.master_alias.as_ref().map(|alias| alias.cell.as_str())
    }
}

/// One master -> replica edge in a cell's replication graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationLink {
    pub tablet_alias: TabletAlias,
    /// Tablet this one replicates from (None for the master itself)
    pub parent: Option<TabletAlias>,
}

/// Replication graph for one shard in one cell
///
/// Only exists while the cell has tablets for the shard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardReplication {
    #[serde(default)]
    pub replication_links: Vec<ReplicationLink>,
}

impl ShardReplication {
    pub fn add_link(&mut self, tablet_alias: TabletAlias, parent: Option<TabletAlias>) {
        self.replication_links.retain(|l| l.tablet_alias != tablet_alias);
        self.replication_links.push(ReplicationLink {
            tablet_alias,
            parent,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.replication_links.is_empty()
    }
}
