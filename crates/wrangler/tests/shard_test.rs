mod common;

use common::{TestEnv, KEYSPACE, SHARD};
use topo::{TabletAlias, TabletType, TopoError, TopoServer};
use wrangler::{ActionKind, ActionState, CleanupTarget, WranglerError};

// ==================== SetShardServedTypes ====================

#[tokio::test]
async fn test_set_shard_served_types() {
    let env = TestEnv::new(&["east", "west"]);
    env.create_shard(&["east"], Some(TabletAlias::new("east", 1))).await;

    env.wr
        .set_shard_served_types(KEYSPACE, SHARD, vec![TabletType::Master])
        .await
        .unwrap();

    assert_eq!(env.shard().await.served_types, vec![TabletType::Master]);
    assert!(!env.ts.is_shard_locked(KEYSPACE, SHARD));

    let action = env.last_action();
    assert_eq!(action.state, ActionState::Done);
    assert!(action.error.is_empty());
    assert_eq!(
        action.action,
        ActionKind::SetShardServedTypes {
            served_types: vec![TabletType::Master]
        }
    );
    assert_eq!(env.last_action_at_lock().state, ActionState::Queued);
}

#[tokio::test]
async fn test_set_shard_served_types_leaves_serving_graph() {
    let env = TestEnv::new(&["east"]);
    env.create_shard(&["east"], None).await;
    env.populate_serving_graph("east").await;

    env.wr.set_shard_served_types(KEYSPACE, SHARD, vec![]).await.unwrap();

    assert!(env.shard().await.served_types.is_empty());
    let srv_shard = env.ts.get_srv_shard("east", KEYSPACE, SHARD).await.unwrap();
    assert_eq!(srv_shard.served_types, vec![TabletType::Master, TabletType::Replica]);
}

#[tokio::test]
async fn test_set_shard_served_types_missing_shard() {
    let env = TestEnv::new(&["east"]);

    let err = env
        .wr
        .set_shard_served_types(KEYSPACE, SHARD, vec![TabletType::Master])
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(env.ts.action_log().is_empty());
}

// ==================== DeleteShard ====================

#[tokio::test]
async fn test_delete_shard_removes_all_records() {
    let env = TestEnv::new(&["east", "west"]);
    env.create_shard(&["east", "west"], None).await;
    for cell in ["east", "west"] {
        env.add_empty_replication(cell).await;
        env.populate_serving_graph(cell).await;
    }

    let report = env.wr.delete_shard(KEYSPACE, SHARD).await.unwrap();
    assert!(report.is_clean());
    assert_eq!(report.cells, vec!["east", "west"]);

    assert!(env.ts.get_shard(KEYSPACE, SHARD).await.unwrap_err().is_no_node());
    for cell in ["east", "west"] {
        assert!(env.ts.get_shard_replication(cell, KEYSPACE, SHARD).await.unwrap_err().is_no_node());
        assert!(env.ts.get_srv_shard(cell, KEYSPACE, SHARD).await.unwrap_err().is_no_node());
        for tablet_type in [TabletType::Master, TabletType::Replica, TabletType::Rdonly] {
            assert!(env
                .ts
                .get_srv_tablet_type(cell, KEYSPACE, SHARD, tablet_type)
                .await
                .unwrap_err()
                .is_no_node());
        }
    }

    let action = env.last_action();
    assert_eq!(action.action, ActionKind::DeleteShard);
    assert_eq!(action.state, ActionState::Done);
}

#[tokio::test]
async fn test_delete_shard_without_per_cell_records() {
    let env = TestEnv::new(&["east"]);
    env.create_shard(&["east"], None).await;

    let report = env.wr.delete_shard(KEYSPACE, SHARD).await.unwrap();
    assert!(report.is_clean());
    assert!(env.ts.get_shard(KEYSPACE, SHARD).await.unwrap_err().is_no_node());
}

#[tokio::test]
async fn test_delete_shard_with_tablets() {
    let env = TestEnv::new(&["east", "west"]);
    let master = TabletAlias::new("east", 1);
    env.create_shard(&["east", "west"], Some(master.clone())).await;
    env.add_tablet(master.clone(), TabletType::Master, None).await;
    env.add_tablet(TabletAlias::new("west", 2), TabletType::Replica, Some(master)).await;
    env.populate_serving_graph("east").await;

    let err = env.wr.delete_shard(KEYSPACE, SHARD).await.unwrap_err();
    assert!(matches!(err, WranglerError::ShardNotEmpty { tablets: 2, .. }));
    assert!(err.is_precondition_failed());

    // nothing was touched
    assert!(env.ts.get_shard(KEYSPACE, SHARD).await.is_ok());
    assert!(env.ts.get_srv_shard("east", KEYSPACE, SHARD).await.is_ok());
    assert!(env.ts.get_shard_replication("west", KEYSPACE, SHARD).await.is_ok());

    let action = env.last_action();
    assert_eq!(action.state, ActionState::Failed);
    assert_eq!(action.error, err.to_string());
    assert!(!env.ts.is_shard_locked(KEYSPACE, SHARD));
}

#[tokio::test]
async fn test_delete_shard_cleanup_failures_are_warnings() {
    let env = TestEnv::new(&["east", "west"]);
    env.create_shard(&["east", "west"], None).await;
    for cell in ["east", "west"] {
        env.add_empty_replication(cell).await;
        env.populate_serving_graph(cell).await;
    }
    env.ts.set_cell_read_only("west", true);

    let report = env.wr.delete_shard(KEYSPACE, SHARD).await.unwrap();
    assert!(!report.is_clean());
    assert!(report.warnings.iter().all(|w| w.cell == "west"));

    let targets: Vec<_> = report.warnings.iter().map(|w| w.target.clone()).collect();
    assert_eq!(
        targets,
        vec![
            CleanupTarget::ShardReplication,
            CleanupTarget::SrvTabletType(TabletType::Master),
            CleanupTarget::SrvTabletType(TabletType::Replica),
            CleanupTarget::SrvTabletType(TabletType::Rdonly),
            CleanupTarget::SrvShard,
        ]
    );

    // the authoritative record is gone even though west kept its records
    assert!(env.ts.get_shard(KEYSPACE, SHARD).await.unwrap_err().is_no_node());
    assert!(env.ts.get_srv_shard("west", KEYSPACE, SHARD).await.is_ok());
    assert!(env.ts.get_srv_shard("east", KEYSPACE, SHARD).await.unwrap_err().is_no_node());
    assert_eq!(env.last_action().state, ActionState::Done);
}

#[tokio::test]
async fn test_delete_shard_record_failure_wins_over_warnings() {
    let env = TestEnv::new(&["east", "west"]);
    env.create_shard(&["east", "west"], None).await;
    for cell in ["east", "west"] {
        env.populate_serving_graph(cell).await;
    }
    env.ts.set_cell_read_only("west", true);
    env.ts.set_global_read_only(true);

    let err = env.wr.delete_shard(KEYSPACE, SHARD).await.unwrap_err();
    match &err {
        WranglerError::Topo(TopoError::Backend(message)) => {
            assert!(message.contains("global topology"), "unexpected error: {}", message)
        }
        other => panic!("unexpected error: {}", other),
    }

    // cleanup still ran where it could
    assert!(env.ts.get_srv_shard("east", KEYSPACE, SHARD).await.unwrap_err().is_no_node());
    assert!(env.ts.get_srv_shard("west", KEYSPACE, SHARD).await.is_ok());
    assert!(env.ts.get_shard(KEYSPACE, SHARD).await.is_ok());

    let action = env.last_action();
    assert_eq!(action.action, ActionKind::DeleteShard);
    assert_eq!(action.state, ActionState::Failed);
    assert_eq!(action.error, err.to_string());
    assert!(!env.ts.is_shard_locked(KEYSPACE, SHARD));
}

#[tokio::test]
async fn test_delete_shard_unreachable_cell_blocks_emptiness_check() {
    let env = TestEnv::new(&["east", "west"]);
    env.create_shard(&["east", "west"], None).await;
    env.ts.set_cell_available("west", false);

    let err = env.wr.delete_shard(KEYSPACE, SHARD).await.unwrap_err();
    assert!(matches!(err, WranglerError::Topo(TopoError::Unavailable { .. })));
    assert!(env.ts.get_shard(KEYSPACE, SHARD).await.is_ok());
}

#[tokio::test]
async fn test_delete_missing_shard() {
    let env = TestEnv::new(&["east"]);
    let err = env.wr.delete_shard(KEYSPACE, SHARD).await.unwrap_err();
    assert!(err.is_not_found());
}

// ==================== RemoveShardCell ====================

#[tokio::test]
async fn test_remove_shard_cell_keeps_order() {
    let env = TestEnv::new(&["a", "b", "c"]);
    env.create_shard(&["a", "b", "c"], Some(TabletAlias::new("a", 1))).await;
    env.add_empty_replication("b").await;

    env.wr.remove_shard_cell(KEYSPACE, SHARD, "b", false).await.unwrap();

    assert_eq!(env.shard().await.cells, vec!["a", "c"]);
    // the empty replication graph was removed with the cell
    assert!(env.ts.get_shard_replication("b", KEYSPACE, SHARD).await.unwrap_err().is_no_node());

    let action = env.last_action();
    assert_eq!(action.action, ActionKind::UpdateShard);
    assert_eq!(action.state, ActionState::Done);
}

#[tokio::test]
async fn test_remove_shard_cell_without_replication_graph() {
    let env = TestEnv::new(&["a", "b"]);
    env.create_shard(&["a", "b"], Some(TabletAlias::new("a", 1))).await;

    env.wr.remove_shard_cell(KEYSPACE, SHARD, "b", false).await.unwrap();
    assert_eq!(env.shard().await.cells, vec!["a"]);
}

#[tokio::test]
async fn test_remove_shard_cell_not_in_shard() {
    let env = TestEnv::new(&["a", "b"]);
    env.create_shard(&["a"], None).await;

    let err = env.wr.remove_shard_cell(KEYSPACE, SHARD, "b", false).await.unwrap_err();
    assert!(matches!(err, WranglerError::CellNotPresent { ref cell, .. } if cell == "b"));
    assert_eq!(env.last_action().state, ActionState::Failed);
}

#[tokio::test]
async fn test_remove_shard_cell_refuses_master_cell() {
    let env = TestEnv::new(&["a", "b"]);
    env.create_shard(&["a", "b"], Some(TabletAlias::new("b", 7))).await;

    for force in [false, true] {
        let err = env.wr.remove_shard_cell(KEYSPACE, SHARD, "b", force).await.unwrap_err();
        assert!(matches!(err, WranglerError::MasterInCell { .. }));
    }
    assert_eq!(env.shard().await.cells, vec!["a", "b"]);
}

#[tokio::test]
async fn test_remove_shard_cell_with_replication_links() {
    let env = TestEnv::new(&["a", "b"]);
    let master = TabletAlias::new("a", 1);
    env.create_shard(&["a", "b"], Some(master.clone())).await;
    env.add_tablet(TabletAlias::new("b", 2), TabletType::Replica, Some(master)).await;

    for force in [false, true] {
        let err = env.wr.remove_shard_cell(KEYSPACE, SHARD, "b", force).await.unwrap_err();
        assert!(matches!(err, WranglerError::ReplicationLinksPresent { links: 1, .. }));
    }
    assert_eq!(env.shard().await.cells, vec!["a", "b"]);
    assert!(env.ts.get_shard_replication("b", KEYSPACE, SHARD).await.is_ok());
}

#[tokio::test]
async fn test_remove_shard_cell_unreachable_without_force() {
    let env = TestEnv::new(&["a", "b"]);
    env.create_shard(&["a", "b"], Some(TabletAlias::new("a", 1))).await;
    env.ts.set_cell_available("b", false);

    let err = env.wr.remove_shard_cell(KEYSPACE, SHARD, "b", false).await.unwrap_err();
    match err {
        WranglerError::Topo(TopoError::Unavailable { cell }) => assert_eq!(cell, "b"),
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(env.shard().await.cells, vec!["a", "b"]);

    let action = env.last_action();
    assert_eq!(action.state, ActionState::Failed);
    assert_eq!(action.error, "topology server for cell 'b' is unavailable");
}

#[tokio::test]
async fn test_remove_shard_cell_unreachable_with_force() {
    let env = TestEnv::new(&["a", "b", "c"]);
    env.create_shard(&["a", "b", "c"], Some(TabletAlias::new("a", 1))).await;
    env.ts.set_cell_available("b", false);

    env.wr.remove_shard_cell(KEYSPACE, SHARD, "b", true).await.unwrap();
    assert_eq!(env.shard().await.cells, vec!["a", "c"]);
    assert_eq!(env.last_action().state, ActionState::Done);
}

#[tokio::test]
async fn test_remove_shard_cell_replication_delete_failure() {
    let env = TestEnv::new(&["a", "b"]);
    env.create_shard(&["a", "b"], Some(TabletAlias::new("a", 1))).await;
    env.add_empty_replication("b").await;
    env.ts.set_cell_read_only("b", true);

    let err = env.wr.remove_shard_cell(KEYSPACE, SHARD, "b", true).await.unwrap_err();
    assert!(matches!(err, WranglerError::DeleteShardReplication { ref cell, .. } if cell == "b"));
    assert_eq!(env.shard().await.cells, vec!["a", "b"]);
}
