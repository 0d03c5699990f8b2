//! Serving graph entries
//!
//! Derived per-cell routing data consumed by query routers. These records are
//! rebuilt from the shard and tablet records and are never authoritative.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::shard::KeyRange;
use crate::tablet::{Cell, TabletType};

/// Address of one serving tablet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndPoint {
    pub uid: u32,
    pub host: String,
    #[serde(default)]
    pub named_port_map: HashMap<String, u16>,
}

/// All serving tablets of one type for a shard in a cell
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndPoints {
    #[serde(default)]
    pub entries: Vec<EndPoint>,
}

/// Per-cell serving summary of a shard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SrvShard {
    pub name: String,
    pub key_range: KeyRange,
    #[serde(default)]
    pub served_types: Vec<TabletType>,
    pub master_cell: Option<Cell>,
}
