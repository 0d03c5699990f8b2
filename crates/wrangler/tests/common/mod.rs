// Shared fixture for wrangler integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use topo::{
    EndPoint, EndPoints, MemoryTopo, ShardInfo, ShardReplication, SrvShard, Tablet, TabletAlias,
    TabletType, TopoServer, ALL_TABLET_TYPES,
};
use wrangler::{ActionNode, Wrangler, WranglerConfig};

pub const KEYSPACE: &str = "commerce";
pub const SHARD: &str = "-80";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub struct TestEnv {
    pub ts: Arc<MemoryTopo>,
    pub wr: Wrangler,
    pub interrupted: CancellationToken,
}

impl TestEnv {
    /// Store with the given cells and a wrangler with a short lock timeout
    pub fn new(cells: &[&str]) -> Self {
        init_tracing();
        let ts = Arc::new(MemoryTopo::new(cells.iter().copied()));
        let interrupted = CancellationToken::new();
        let config = WranglerConfig::default().with_lock_timeout(Duration::from_millis(200));
        let wr = Wrangler::new(ts.clone(), config, interrupted.clone());
        Self { ts, wr, interrupted }
    }

    /// Another wrangler on the same store, as a second process would have
    pub fn second_wrangler(&self) -> Wrangler {
        let config = WranglerConfig::default().with_lock_timeout(Duration::from_secs(5));
        Wrangler::new(self.ts.clone(), config, CancellationToken::new())
    }

    pub async fn create_shard(&self, cells: &[&str], master: Option<TabletAlias>) -> ShardInfo {
        let mut shard = ShardInfo::new(KEYSPACE, SHARD).unwrap();
        for cell in cells {
            shard.add_cell(*cell);
        }
        shard.master_alias = master;
        shard.served_types = vec![TabletType::Master, TabletType::Replica];
        self.ts.create_shard(&shard).await.unwrap();
        shard
    }

    pub async fn shard(&self) -> ShardInfo {
        self.ts.get_shard(KEYSPACE, SHARD).await.unwrap()
    }

    /// Register a tablet and link it into its cell's replication graph
    pub async fn add_tablet(&self, alias: TabletAlias, tablet_type: TabletType, parent: Option<TabletAlias>) {
        let cell = alias.cell.clone();
        self.ts
            .create_tablet(&Tablet::new(alias.clone(), KEYSPACE, SHARD, tablet_type))
            .await
            .unwrap();

        let mut replication = match self.ts.get_shard_replication(&cell, KEYSPACE, SHARD).await {
            Ok(replication) => replication,
            Err(e) if e.is_no_node() => ShardReplication::default(),
            Err(e) => panic!("cannot read replication graph: {}", e),
        };
        replication.add_link(alias, parent);
        self.ts
            .update_shard_replication(&cell, KEYSPACE, SHARD, &replication)
            .await
            .unwrap();
    }

    pub async fn add_empty_replication(&self, cell: &str) {
        self.ts
            .update_shard_replication(cell, KEYSPACE, SHARD, &ShardReplication::default())
            .await
            .unwrap();
    }

    /// Write serving graph entries for every serving tablet type in a cell
    pub async fn populate_serving_graph(&self, cell: &str) {
        let shard = self.shard().await;
        for tablet_type in ALL_TABLET_TYPES.iter().filter(|t| t.is_in_serving_graph()) {
            let endpoints = EndPoints {
                entries: vec![EndPoint {
                    uid: 100,
                    host: format!("{}-host", cell),
                    named_port_map: Default::default(),
                }],
            };
            self.ts
                .update_srv_tablet_type(cell, KEYSPACE, SHARD, *tablet_type, &endpoints)
                .await
                .unwrap();
        }
        let srv_shard = SrvShard {
            name: SHARD.to_string(),
            key_range: shard.key_range.clone(),
            served_types: shard.served_types.clone(),
            master_cell: shard.master_cell().map(str::to_string),
        };
        self.ts
            .update_srv_shard(cell, KEYSPACE, SHARD, &srv_shard)
            .await
            .unwrap();
    }

    /// Final action node recorded by the most recent unlock
    pub fn last_action(&self) -> ActionNode {
        let log = self.ts.action_log();
        let record = log.last().expect("no action recorded");
        ActionNode::from_json(&record.results).unwrap()
    }

    /// Action node written when the most recent recorded lock was taken
    pub fn last_action_at_lock(&self) -> ActionNode {
        let log = self.ts.action_log();
        let record = log.last().expect("no action recorded");
        ActionNode::from_json(&record.contents).unwrap()
    }
}
