//! End-to-end tests: configuration, synchronization, authorization and
//! authentication over a shared directory cache.

mod common;

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use dacl_domain::Decision;
use dacl_server::{
    AuthenticationHandler, AuthorizationEngine, DirectorySynchronizer, ItemFormulaEvaluator,
    ServerConfig,
};
use dacl_storage::{DirectoryStore, MemoryDirectoryStore};

use common::{
    council_doc, council_metadata, galaxy_directory, InMemoryDirectory, ANAKIN, BATTLE_PLANS,
    CANTINA_MENU, COUNCIL_DB, YODA,
};

const CONFIG_YAML: &str = r#"
directory:
  selection_formula: 'Department = "Council"'
  username_formula: "@LowerCase(ShortName)"
  group_types: ["0", "2", "3"]
sync:
  interval_secs: 600
cache:
  max_size: 100
"#;

fn load_config() -> ServerConfig {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(CONFIG_YAML.as_bytes()).unwrap();
    ServerConfig::load(file.path()).unwrap()
}

struct Deployment {
    directory: Arc<InMemoryDirectory>,
    store: Arc<dyn DirectoryStore>,
    synchronizer: DirectorySynchronizer,
    engine: AuthorizationEngine,
    authn: AuthenticationHandler,
}

/// Wires every component the way a server would from its configuration,
/// then runs a first synchronization and the council role sync.
async fn deploy() -> Deployment {
    let config = load_config();
    let directory = galaxy_directory();
    let metadata = council_metadata();
    let store: Arc<dyn DirectoryStore> = MemoryDirectoryStore::new_shared();

    let evaluator = Arc::new(ItemFormulaEvaluator::from_settings(&config.directory).unwrap());
    let synchronizer = DirectorySynchronizer::new(directory.clone(), evaluator, store.clone())
        .with_resolver_config(config.directory.resolver_config())
        .with_interval(config.sync.interval());
    synchronizer.sync(false).await.unwrap();
    synchronizer
        .sync_resource_roles(metadata.as_ref(), COUNCIL_DB)
        .await
        .unwrap();

    let engine = AuthorizationEngine::with_cache_size(store.clone(), metadata, config.cache.max_size)
        .with_default_entry(&config.authz.default_entry);
    let authn = AuthenticationHandler::new(store.clone()).with_directory(directory.clone());

    Deployment {
        directory,
        store,
        synchronizer,
        engine,
        authn,
    }
}

// ============================================================
// Section 1: End-to-end flow
// ============================================================

#[tokio::test]
async fn test_end_to_end_anakin_flow() {
    let deployment = deploy().await;
    let ids = vec![
        council_doc(BATTLE_PLANS),
        council_doc(CANTINA_MENU),
        "http://jedi.example.com/not-a-document".to_string(),
    ];

    let results = deployment.engine.authorize(&ids, "anakin").await;

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].decision, Decision::Allow);
    assert_eq!(results[1].decision, Decision::Allow);
    assert_eq!(results[2].decision, Decision::Indeterminate);

    let response = deployment
        .authn
        .authenticate("anakin", Some("younglings"))
        .await
        .unwrap();
    assert!(response.valid);
    for expected in [
        "masters",
        "jedi",
        "good guys",
        "*/ou=north/ou=west/o=abc",
        "*/ou=west/o=abc",
        "ou=west/o=abc",
        "85257608004F5587/[tacticsexpert]",
        "85257608004F5587/[holderofopinions]",
    ] {
        assert!(
            response.groups.iter().any(|g| g == expected),
            "missing {expected} in {:?}",
            response.groups
        );
    }
    // Mail-only groups never reach the cache
    assert!(!response.groups.iter().any(|g| g == "holonet newsletter"));
}

#[tokio::test]
async fn test_wildcard_index_shared_across_people() {
    let deployment = deploy().await;

    let index = deployment.synchronizer.domain_index();
    assert!(index.get("*/ou=west/o=abc").is_some());
    assert!(index.get("*/ou=north/ou=west/o=abc").is_some());
    assert!(index.get("*/ou=dagobah/ou=west/o=abc").is_some());

    // The west wildcard itself plus north and dagobah below it
    let west = deployment.synchronizer.sub_domain_names("ou=west/o=abc");
    assert_eq!(west.len(), 3);
}

#[tokio::test]
async fn test_deselected_person_is_unknown() {
    let deployment = deploy().await;

    // Maul is outside the council department and never synchronized
    assert!(deployment.store.find_user_by_name(common::MAUL).await.unwrap().is_none());

    let results = deployment
        .engine
        .authorize(&[council_doc(CANTINA_MENU)], "maul")
        .await;
    assert_eq!(results[0].decision, Decision::Deny);

    let response = deployment.authn.authenticate("maul", None).await.unwrap();
    assert!(!response.valid);
}

// ============================================================
// Section 2: Resynchronization
// ============================================================

#[tokio::test]
async fn test_second_run_within_interval_is_skipped() {
    let deployment = deploy().await;

    let summary = deployment.synchronizer.sync(false).await.unwrap();

    assert!(summary.skipped);
    assert_eq!(deployment.synchronizer.interval(), Duration::from_secs(600));
}

#[tokio::test]
async fn test_membership_change_reaches_cached_decisions() {
    let deployment = deploy().await;
    let ids = vec![council_doc(BATTLE_PLANS)];
    assert_eq!(
        deployment.engine.authorize(&ids, "yoda").await[0].decision,
        Decision::Allow
    );

    // Yoda leaves the masters
    deployment.directory.put_group("Masters", "0", &[ANAKIN]);
    let summary = deployment.synchronizer.sync(true).await.unwrap();
    assert!(summary.has_changes());

    let user = deployment.store.find_user_by_name(YODA).await.unwrap().unwrap();
    assert!(!user.groups.contains("masters"));
    assert!(!user.groups.contains("good guys"));

    assert_eq!(
        deployment.engine.authorize(&ids, "yoda").await[0].decision,
        Decision::Deny
    );

    let groups = deployment.authn.principal_groups("yoda").await.unwrap().unwrap();
    assert!(!groups.iter().any(|g| g.ends_with("[holderofopinions]")));
}

#[tokio::test]
async fn test_repeated_forced_sync_is_idempotent() {
    let deployment = deploy().await;
    let before = deployment.store.list_users().await.unwrap();

    let summary = deployment.synchronizer.sync(true).await.unwrap();

    assert!(!summary.has_changes());
    assert_eq!(deployment.store.list_users().await.unwrap(), before);
}

// ============================================================
// Section 3: Concurrency
// ============================================================

#[tokio::test]
async fn test_authorization_during_sync_sees_consistent_cache() {
    let deployment = deploy().await;
    let ids = vec![council_doc(BATTLE_PLANS), council_doc(CANTINA_MENU)];

    let readers = futures::future::join_all((0..50).map(|i| {
        let principal = if i % 2 == 0 { "anakin" } else { "yoda" };
        deployment.engine.authorize(&ids, principal)
    }));
    let (batches, sync) = tokio::join!(readers, deployment.synchronizer.sync(true));

    sync.unwrap();
    for batch in batches {
        assert_eq!(batch.len(), 2);
        assert!(batch.iter().all(|r| r.decision == Decision::Allow));
    }
}
