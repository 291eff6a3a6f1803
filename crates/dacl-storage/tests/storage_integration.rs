//! Storage Integration Tests.
//!
//! Exercises the DirectoryStore contract through the trait object so any
//! backend can be plugged into the same checks.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use dacl_storage::{DirectoryStore, GroupRecord, MemoryDirectoryStore, RoleRef, UserRecord};

fn user(principal_id: &str, canonical: &str, common: &str, groups: &[&str]) -> UserRecord {
    UserRecord {
        principal_id: principal_id.to_string(),
        canonical_name: canonical.to_string(),
        common_name: common.to_string(),
        abbreviated_name: common.to_string(),
        groups: groups.iter().map(|g| g.to_string()).collect(),
        updated_at: Utc::now(),
    }
}

fn group(name: &str, children: &[&str]) -> GroupRecord {
    GroupRecord {
        name: name.to_string(),
        group_type: "0".to_string(),
        members: Vec::new(),
        children: children.iter().map(|c| c.to_string()).collect(),
        updated_at: Utc::now(),
    }
}

/// Helper function to run the basic contract against any DirectoryStore.
async fn run_basic_directory_test(store: Arc<dyn DirectoryStore>) {
    assert!(store.is_empty().await.unwrap());

    store.upsert_group(group("Jedi", &["masters"])).await.unwrap();
    store.upsert_group(group("Masters", &[])).await.unwrap();
    store
        .upsert_user(user(
            "obiwan",
            "CN=Obi Wan Kenobi/OU=Council/O=Jedi",
            "Obi Wan Kenobi",
            &["jedi", "masters"],
        ))
        .await
        .unwrap();
    assert!(!store.is_empty().await.unwrap());

    // Lookups by key and by name form
    let by_id = store.get_user("ObiWan").await.unwrap().unwrap();
    let by_name = store
        .find_user_by_name("cn=obi wan kenobi/ou=council/o=jedi")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_id, by_name);

    // Group linkage
    assert_eq!(
        store.parent_groups("masters").await.unwrap(),
        vec!["jedi".to_string()]
    );

    // Roles
    store
        .upsert_role(RoleRef::new("85257608004F5587", "[council]"))
        .await
        .unwrap();
    store
        .set_group_roles(
            "masters",
            "85257608004F5587",
            BTreeSet::from(["[council]".to_string()]),
        )
        .await
        .unwrap();
    assert_eq!(
        store.group_roles("MASTERS").await.unwrap(),
        vec![RoleRef::new("85257608004F5587", "[council]")]
    );

    // Deletion cascades
    assert!(store.delete_group("masters").await.unwrap());
    let obiwan = store.get_user("obiwan").await.unwrap().unwrap();
    assert_eq!(obiwan.groups, BTreeSet::from(["jedi".to_string()]));
    assert!(store.delete_user("obiwan").await.unwrap());
    assert!(store.get_user("obiwan").await.unwrap().is_none());

    // Sync timestamp
    let now = Utc::now();
    store.set_last_sync(now).await.unwrap();
    assert_eq!(store.last_sync().await.unwrap(), Some(now));
}

#[tokio::test]
async fn test_memory_store_basic_directory_contract() {
    run_basic_directory_test(MemoryDirectoryStore::new_shared()).await;
}

#[tokio::test]
async fn test_concurrent_readers_see_whole_records() {
    let store = MemoryDirectoryStore::new_shared();
    store
        .upsert_user(user("luke", "CN=Luke/O=Rebels", "Luke", &["pilots"]))
        .await
        .unwrap();

    let writer = {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            for i in 0..200 {
                let groups = if i % 2 == 0 {
                    vec!["pilots", "rebels"]
                } else {
                    vec!["jedi", "rebels"]
                };
                store
                    .upsert_user(user("luke", "CN=Luke/O=Rebels", "Luke", &groups))
                    .await
                    .unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                for _ in 0..200 {
                    let luke = store.get_user("luke").await.unwrap().unwrap();
                    // Each record is replaced as a whole, never torn
                    assert!(
                        luke.groups.len() == 1 && luke.groups.contains("pilots")
                            || luke.groups.len() == 2 && luke.groups.contains("rebels")
                    );
                }
            })
        })
        .collect();

    writer.await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }
}
