//! Shard lock coordination
//!
//! Every shard mutation runs between `lock_shard` and `unlock_shard`. The
//! action node goes into the lock on both ends, so the topology records what
//! ran and how it ended.

use tracing::{info, warn};

use topo::TopoError;

use crate::action::ActionNode;
use crate::error::{Result, WranglerError};
use crate::Wrangler;

impl Wrangler {
    /// Take the action lock of a shard
    ///
    /// Returns the lock path to hand back to `unlock_shard`.
    pub(crate) async fn lock_shard(&self, keyspace: &str, shard: &str, node: &ActionNode) -> Result<String> {
        info!(keyspace, shard, action = %node.action, "Locking shard");
        let contents = node.to_json()?;

        self.ts
            .lock_shard_for_action(
                keyspace,
                shard,
                &contents,
                self.config.lock_timeout(),
                &self.interrupted,
            )
            .await
            .map_err(|e| match e {
                TopoError::Timeout(_) => WranglerError::LockTimeout {
                    keyspace: keyspace.to_string(),
                    shard: shard.to_string(),
                },
                TopoError::Interrupted(_) => WranglerError::LockInterrupted {
                    keyspace: keyspace.to_string(),
                    shard: shard.to_string(),
                },
                TopoError::NoNode(_) => WranglerError::Topo(e),
                source => WranglerError::LockStore {
                    keyspace: keyspace.to_string(),
                    shard: shard.to_string(),
                    source,
                },
            })
    }

    /// Release a shard lock, recording how the action ended
    ///
    /// The action's own error always wins: an unlock failure is only
    /// returned when the action succeeded.
    pub(crate) async fn unlock_shard<T>(
        &self,
        keyspace: &str,
        shard: &str,
        node: &mut ActionNode,
        lock_path: &str,
        result: Result<T>,
    ) -> Result<T> {
        match &result {
            Err(e) => {
                info!(keyspace, shard, action = %node.action, error = %e, "Unlocking shard with error");
                node.finish(Some(e.to_string()));
            }
            Ok(_) => {
                info!(keyspace, shard, action = %node.action, "Unlocking shard for successful action");
                node.finish(None);
            }
        }

        let results = node.to_json().unwrap_or_else(|e| {
            warn!(keyspace, shard, error = %e, "Cannot serialize action node, releasing with a summary");
            node.summary_json()
        });
        let unlocked = self
            .ts
            .unlock_shard_for_action(keyspace, shard, lock_path, &results)
            .await
            .map_err(|source| WranglerError::Unlock {
                keyspace: keyspace.to_string(),
                shard: shard.to_string(),
                source,
            });

        match (result, unlocked) {
            (Err(action_error), Err(unlock_error)) => {
                // masked by the action error
                warn!(keyspace, shard, error = %unlock_error, "UnlockShardForAction failed");
                Err(action_error)
            }
            (Err(action_error), Ok(())) => Err(action_error),
            (Ok(_), Err(unlock_error)) => Err(unlock_error),
            (Ok(value), Ok(())) => Ok(value),
        }
    }
}
