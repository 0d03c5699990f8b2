//! Topology - cluster metadata store
//!
//! Data model and store contract for the cluster topology:
//! - Global shard records and the per-shard action lock
//! - Per-cell tablets, replication graph and serving graph
//! - An in-memory backend for tests and embedded use
//!
//! # Usage Example
//! ```ignore
//! use topo::{MemoryTopo, ShardInfo, TopoServer};
//!
//! let topo = MemoryTopo::new(["us_east", "us_west"]);
//! topo.create_shard(&ShardInfo::new("commerce", "-80")?).await?;
//! let shard = topo.get_shard("commerce", "-80").await?;
//! ```

pub mod error;
pub mod memory;
pub mod server;
pub mod serving;
pub mod shard;
pub mod tablet;

// Re-export commonly used types
pub use error::{Result, TopoError};
pub use memory::{ActionRecord, MemoryTopo};
pub use server::{shard_path, TopoServer};
pub use serving::{EndPoint, EndPoints, SrvShard};
pub use shard::{InvalidShardName, KeyRange, ReplicationLink, ShardInfo, ShardReplication};
pub use tablet::{Cell, ParseTabletTypeError, Tablet, TabletAlias, TabletType, ALL_TABLET_TYPES};
