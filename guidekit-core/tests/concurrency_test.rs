//! Concurrent lifecycle operations against one installed-state file

mod common;

use common::{FixedProvider, TestWorkspace};
use futures::future::join_all;
use guidekit_core::lifecycle::{ConflictChoice, UpdateChoice};
use guidekit_core::InstallOptions;
use std::collections::HashSet;
use std::sync::Arc;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_installs_of_distinct_ids_are_all_recorded() {
    let ids: Vec<String> = (0..12).map(|i| format!("framework-{i}")).collect();
    let catalog: Vec<(&str, &str)> = ids.iter().map(|id| (id.as_str(), "1.0.0")).collect();
    let ws = TestWorkspace::new(&catalog);
    let manager = Arc::new(ws.manager());

    let handles: Vec<_> = ids
        .iter()
        .cloned()
        .map(|id| {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move {
                manager
                    .install(&id, InstallOptions::default(), &FixedProvider::silent())
                    .await
            })
        })
        .collect();

    for result in join_all(handles).await {
        result.unwrap().unwrap();
    }

    let state = ws.persisted_state();
    let recorded: HashSet<_> = state["frameworks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(recorded, ids.into_iter().collect::<HashSet<_>>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_overwrites_of_same_id_leave_one_record() {
    let ws = TestWorkspace::new(&[("tdd-bdd", "1.0.0")]);
    let manager = Arc::new(ws.manager());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move {
                manager
                    .install("tdd-bdd", InstallOptions::overwrite(), &FixedProvider::silent())
                    .await
            })
        })
        .collect();

    for result in join_all(handles).await {
        result.unwrap().unwrap();
    }

    // Re-parse from disk: the file must be valid and hold exactly one record
    let state = ws.persisted_state();
    let records = state["frameworks"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["id"], "tdd-bdd");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_mixed_install_update_remove_keep_state_consistent() {
    let ws = TestWorkspace::new(&[("a", "1.0.0"), ("b", "1.0.0"), ("c", "1.0.0")]);
    let manager = Arc::new(ws.manager());
    for id in ["a", "b"] {
        manager
            .install(id, InstallOptions::default(), &FixedProvider::silent())
            .await
            .unwrap();
    }
    ws.set_catalog(&[("a", "2.0.0"), ("b", "1.0.0"), ("c", "1.0.0")]);
    manager.catalog().invalidate().await;

    let update = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move {
            manager
                .update(
                    "a",
                    &FixedProvider::new(ConflictChoice::Cancel, UpdateChoice::Update),
                )
                .await
                .map(|_| ())
        })
    };
    let remove = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.remove("b").await.map(|_| ()) })
    };
    let install = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move {
            manager
                .install("c", InstallOptions::default(), &FixedProvider::silent())
                .await
                .map(|_| ())
        })
    };

    for result in join_all([update, remove, install]).await {
        result.unwrap().unwrap();
    }

    manager.state().invalidate().await;
    let installed = manager.get_installed().await.unwrap();
    assert_eq!(installed.get("a").unwrap().version, "2.0.0");
    assert!(!installed.is_installed("b"));
    assert!(installed.is_installed("c"));
    assert_eq!(installed.len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_overwrites_with_backup_keep_original_content() {
    let ws = TestWorkspace::new(&[("tdd-bdd", "1.0.0")]);
    ws.write_target("tdd-bdd", "precious");
    let manager = Arc::new(ws.manager());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move {
                manager
                    .install(
                        "tdd-bdd",
                        InstallOptions::overwrite().with_backup(),
                        &FixedProvider::silent(),
                    )
                    .await
            })
        })
        .collect();

    let mut reported = HashSet::new();
    for result in join_all(handles).await {
        let report = result.unwrap().unwrap();
        assert!(reported.insert(report.backup.unwrap()));
    }

    let backups = manager.list_backups("tdd-bdd").await.unwrap();
    assert_eq!(backups.len(), 4);
    assert!(backups
        .iter()
        .any(|b| std::fs::read_to_string(b).unwrap() == "precious"));
}
