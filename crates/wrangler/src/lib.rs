//! Wrangler - shard metadata mutations
//!
//! Serializes changes to a shard's metadata through the topology's per-shard
//! action lock and records every action in the lock.
//!
//! # Features
//! - Change the served types of a shard
//! - Delete an empty shard together with its per-cell records
//! - Remove a cell from a shard, optionally forcing past an unreachable cell
//!
//! # Usage Example
//! ```ignore
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use topo::{MemoryTopo, TabletType};
//! use wrangler::{Wrangler, WranglerConfig};
//!
//! let ts = Arc::new(MemoryTopo::new(["us_east", "us_west"]));
//! let wr = Wrangler::new(ts, WranglerConfig::default(), CancellationToken::new());
//! wr.set_shard_served_types("commerce", "-80", vec![TabletType::Master]).await?;
//! ```

pub mod action;
pub mod config;
pub mod error;
mod lock;
pub mod shard;
pub mod tablet_map;

// Re-export commonly used types
pub use action::{ActionKind, ActionNode, ActionState};
pub use config::{ConfigError, WranglerConfig};
pub use error::{Result, WranglerError};
pub use shard::{CleanupTarget, CleanupWarning, ShardCleanupReport};
pub use tablet_map::{find_all_tablet_aliases_in_shard, get_tablet_map_for_shard};

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use topo::TopoServer;

/// Shard metadata mutator
///
/// Cheap to clone; clones share the store and the interruption token.
#[derive(Clone)]
pub struct Wrangler {
    ts: Arc<dyn TopoServer>,
    config: WranglerConfig,
    /// Cancelled on shutdown; aborts pending lock waits
    interrupted: CancellationToken,
}

impl Wrangler {
    /// Create a wrangler over a topology store
    pub fn new(ts: Arc<dyn TopoServer>, config: WranglerConfig, interrupted: CancellationToken) -> Self {
        debug!(lock_timeout_ms = config.lock_timeout_ms, "Wrangler initialized");
        Self {
            ts,
            config,
            interrupted,
        }
    }

    /// Get topology store
    pub fn ts(&self) -> &Arc<dyn TopoServer> {
        &self.ts
    }

    /// Get configuration
    pub fn config(&self) -> &WranglerConfig {
        &self.config
    }

    /// Token that aborts pending lock waits when cancelled
    pub fn interrupted(&self) -> &CancellationToken {
        &self.interrupted
    }
}
