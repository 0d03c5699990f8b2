//! Action nodes
//!
//! An action node describes one mutation of a shard. It is written into the
//! shard lock when the lock is taken and again, with its final state, when
//! the lock is released, which leaves an audit trail in the topology.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use topo::TabletType;

use crate::error::Result;

/// Action kind plus its arguments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "args")]
pub enum ActionKind {
    /// Replace the served types of a shard
    SetShardServedTypes { served_types: Vec<TabletType> },
    /// Generic shard record update (cell membership changes)
    UpdateShard,
    /// Remove the shard and its per-cell records
    DeleteShard,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionKind::SetShardServedTypes { .. } => write!(f, "SetShardServedTypes"),
            ActionKind::UpdateShard => write!(f, "UpdateShard"),
            ActionKind::DeleteShard => write!(f, "DeleteShard"),
        }
    }
}

/// Action state
///
/// An action is `Queued` from construction until its lock is released; it is
/// running for as long as the lock is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionState {
    Queued,
    Done,
    Failed,
}

impl std::fmt::Display for ActionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionState::Queued => write!(f, "queued"),
            ActionState::Done => write!(f, "done"),
            ActionState::Failed => write!(f, "failed"),
        }
    }
}

/// Action node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionNode {
    #[serde(flatten)]
    pub action: ActionKind,
    /// Unique id of this action
    pub action_guid: Uuid,
    pub state: ActionState,
    /// Error text, empty unless `state` is `Failed`
    #[serde(default)]
    pub error: String,
    /// Process that ran the action
    pub pid: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ActionNode {
    fn new(action: ActionKind) -> Self {
        Self {
            action,
            action_guid: Uuid::new_v4(),
            state: ActionState::Queued,
            error: String::new(),
            pid: std::process::id(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn set_shard_served_types(served_types: Vec<TabletType>) -> Self {
        Self::new(ActionKind::SetShardServedTypes { served_types })
    }

    pub fn update_shard() -> Self {
        Self::new(ActionKind::UpdateShard)
    }

    pub fn delete_shard() -> Self {
        Self::new(ActionKind::DeleteShard)
    }

    /// Move to the terminal state: `Failed` with `error`, or `Done`
    pub fn finish(&mut self, error: Option<String>) {
        debug_assert!(
            !self.is_finished(),
            "action {} finished twice",
            self.action_guid
        );
        match error {
            Some(error) => {
                self.state = ActionState::Failed;
                self.error = error;
            }
            None => {
                self.state = ActionState::Done;
                self.error.clear();
            }
        }
        self.finished_at = Some(Utc::now());
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, ActionState::Done | ActionState::Failed)
    }

    /// Lock payload
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Minimal payload naming the action and its outcome
    ///
    /// Built without the serializer, so it is always available for a release.
    pub fn summary_json(&self) -> String {
        let mut summary = serde_json::Map::new();
        summary.insert("action".to_string(), self.action.to_string().into());
        summary.insert("action_guid".to_string(), self.action_guid.to_string().into());
        summary.insert("state".to_string(), self.state.to_string().into());
        summary.insert("error".to_string(), self.error.clone().into());
        serde_json::Value::Object(summary).to_string()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
