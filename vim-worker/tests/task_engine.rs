//! Integration coverage for the dependency-resolution / supersession pipeline
//! against a real (in-memory SQLite) action store.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDateTime;
use diesel_migrations::MigrationHarness;

use vim_driver::{OpenStackDriver, VimConnector, VimEndpoint};
use vim_worker::config::DatabaseConfig;
use vim_worker::db::{Database, MIGRATIONS};
use vim_worker::executor::{self, Outcome};
use vim_worker::loader::group_fresh_batch;
use vim_worker::resolver::resolve_batch;
use vim_worker::store::Store;
use vim_worker::task::{Action, Extra, Item, Status, Task, TaskRef};

/// A fresh in-memory store with the schema applied. `max_conns: Some(1)` keeps
/// every pool checkout on the same connection, since SQLite's `:memory:`
/// database is private to the connection that created it.
async fn test_store() -> Store {
    let db = Database::new(&DatabaseConfig {
        url: ":memory:".to_string(),
        max_conns: Some(1),
    });
    db.run(|conn| conn.run_pending_migrations(MIGRATIONS).map(|_| ()))
        .await
        .expect("migrations applied");
    Store::new(db)
}

fn datetime(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
}

fn task(instance_action_id: &str, task_index: i32, item: Item, item_id: &str, action: Action, status: Status) -> Task {
    Task {
        instance_action_id: instance_action_id.to_string(),
        task_index,
        datacenter_vim_id: "vim-1".to_string(),
        vim_id: None,
        item,
        item_id: item_id.to_string(),
        action,
        status,
        extra: Extra::default(),
        error_msg: None,
        created_at: datetime("2026-01-01 00:00:00"),
        modified_at: datetime("2026-01-01 00:00:00"),
        depends: HashMap::new(),
    }
}

/// Builds a cheap `VimConnector` that never makes a network call in these
/// tests (every scenario here settles before the driver would be dispatched).
fn unreachable_vim() -> Arc<VimConnector> {
    Arc::new(VimConnector::OpenStack(OpenStackDriver::new(VimEndpoint {
        uuid: "vim-1".to_string(),
        name: "test".to_string(),
        url: "http://127.0.0.1:1".to_string(),
        admin_url: None,
        tenant_name: "tenant".to_string(),
        tenant_id: None,
        user: "user".to_string(),
        passwd: "pass".to_string(),
    })))
}

/// S1: a VM CREATE in the same batch as the network CREATE it depends on
/// resolves that network's `vim_id` once the network task carries one,
/// regardless of whether the network was loaded from storage or submitted
/// fresh in the same batch.
#[tokio::test]
async fn vm_create_resolves_its_same_batch_network_dependency_vim_id() {
    let store = test_store().await;

    let mut net = task("batch-1", 0, Item::Nets, "net-1", Action::Create, Status::Done);
    net.vim_id = Some("vim-net-1".to_string());
    net.extra.created = true;

    let mut vm = task("batch-1", 1, Item::Vms, "vm-1", Action::Create, Status::Scheduled);
    vm.extra.depends_on.push(TaskRef::Local(0));

    let groups = group_fresh_batch(vec![net, vm]);
    let resolved = resolve_batch(groups, &store).await.unwrap();

    let vm_task = resolved.iter().find(|t| t.item == Item::Vms).unwrap();
    let dep = vm_task.depends.get("TASK-0").expect("network dependency resolved");
    assert_eq!(dep.status, Status::Done);
    assert_eq!(dep.vim_id.as_deref(), Some("vim-net-1"));
}

/// Cross-batch flavor of the same scenario: the network was already persisted
/// (e.g. resolved on a prior pass) and the VM CREATE references it by its
/// qualified form; resolution must fall back to storage.
#[tokio::test]
async fn vm_create_resolves_a_cross_batch_network_dependency_via_storage() {
    let store = test_store().await;

    let mut net = task("batch-0", 0, Item::Nets, "net-1", Action::Create, Status::Done);
    net.vim_id = Some("vim-net-1".to_string());
    net.extra.created = true;
    store.save_task(net.to_row().unwrap()).await.unwrap();

    let mut vm = task("batch-1", 0, Item::Vms, "vm-1", Action::Create, Status::Scheduled);
    vm.extra.depends_on.push(TaskRef::Qualified {
        parent: "batch-0".to_string(),
        index: 0,
    });

    let groups = group_fresh_batch(vec![vm]);
    let resolved = resolve_batch(groups, &store).await.unwrap();

    let vm_task = &resolved[0];
    let dep = vm_task.depends.get("TASK-batch-0.0").expect("cross-batch dependency resolved");
    assert_eq!(dep.vim_id.as_deref(), Some("vim-net-1"));
}

/// S4: a DELETE queued against a network that was only ever FOUND (not
/// created) this run still has something real to tear down, and inherits the
/// FIND's overlay mirror id for the SDN cleanup pass.
#[tokio::test]
async fn delete_supersedes_a_find_and_can_still_execute() {
    let store = test_store().await;

    let mut find = task("batch-1", 0, Item::Nets, "net-1", Action::Find, Status::Done);
    find.vim_id = Some("vim-net-1".to_string());
    find.extra.sdn_net_id = Some("sdn-net-1".to_string());
    find.extra.created = false;

    let delete = task("batch-1", 1, Item::Nets, "net-1", Action::Delete, Status::Scheduled);

    let groups = group_fresh_batch(vec![find, delete]);
    let resolved = resolve_batch(groups, &store).await.unwrap();

    let find_task = resolved.iter().find(|t| t.action == Action::Find).unwrap();
    let delete_task = resolved.iter().find(|t| t.action == Action::Delete).unwrap();

    assert_eq!(find_task.status, Status::Superseded);
    assert_eq!(delete_task.status, Status::Scheduled);
    assert_eq!(delete_task.vim_id.as_deref(), Some("vim-net-1"));
    assert_eq!(delete_task.extra.sdn_net_id.as_deref(), Some("sdn-net-1"));
}

/// A DELETE whose only candidate is a FIND that never actually matched
/// anything (no `vim_id`) has nothing to tear down and is itself superseded.
#[tokio::test]
async fn delete_with_only_a_failed_find_is_itself_superseded() {
    let store = test_store().await;

    let find = task("batch-1", 0, Item::Nets, "net-1", Action::Find, Status::Failed);
    let delete = task("batch-1", 1, Item::Nets, "net-1", Action::Delete, Status::Scheduled);

    let groups = group_fresh_batch(vec![find, delete]);
    let resolved = resolve_batch(groups, &store).await.unwrap();

    let delete_task = resolved.iter().find(|t| t.action == Action::Delete).unwrap();
    assert_eq!(delete_task.status, Status::Superseded);
}

/// A task whose dependency never settles exhausts its retries and fails with
/// a timeout, never reaching the driver.
#[tokio::test]
async fn a_stuck_dependency_times_out_after_max_retries() {
    let store = test_store().await;
    let vim = unreachable_vim();

    let mut vm = task("batch-1", 1, Item::Vms, "vm-1", Action::Create, Status::Scheduled);
    vm.depends.insert(
        "TASK-0".to_string(),
        vim_worker::task::ResolvedDependency {
            instance_action_id: "batch-1".to_string(),
            task_index: 0,
            status: Status::Build,
            vim_id: None,
        },
    );

    let max_retries = 2;
    let mut current = vm;
    for _ in 0..=max_retries {
        match executor::execute_one(current, Arc::clone(&vim), None, &store, max_retries).await {
            Outcome::Requeue(t) => current = t,
            Outcome::Settled { task, .. } => {
                current = task;
                break;
            }
        }
    }

    assert_eq!(current.status, Status::Failed);
    assert!(current.error_msg.unwrap().contains("timed out"));
}

/// A task whose dependency already failed is failed immediately, without
/// ever being requeued for a retry.
#[tokio::test]
async fn a_failed_dependency_fails_immediately() {
    let store = test_store().await;
    let vim = unreachable_vim();

    let mut vm = task("batch-1", 1, Item::Vms, "vm-1", Action::Create, Status::Scheduled);
    vm.depends.insert(
        "TASK-0".to_string(),
        vim_worker::task::ResolvedDependency {
            instance_action_id: "batch-1".to_string(),
            task_index: 0,
            status: Status::Failed,
            vim_id: None,
        },
    );

    let outcome = executor::execute_one(vm, vim, None, &store, 3).await;
    match outcome {
        Outcome::Settled { task, counts_as_done, .. } => {
            assert_eq!(task.status, Status::Failed);
            assert_eq!(counts_as_done, Some(false));
        }
        Outcome::Requeue(_) => panic!("a permanently failed dependency must not be requeued"),
    }
}

/// A superseded task short-circuits `execute_one` entirely: it never reaches
/// dependency checks or the driver, and does not count toward the parent
/// action's done/failed tally.
#[tokio::test]
async fn a_superseded_task_settles_without_touching_the_driver() {
    let store = test_store().await;
    let vim = unreachable_vim();

    let net = task("batch-1", 0, Item::Nets, "net-1", Action::Create, Status::Superseded);

    let outcome = executor::execute_one(net, vim, None, &store, 3).await;
    match outcome {
        Outcome::Settled { task, counts_as_done, was_create } => {
            assert_eq!(task.status, Status::Superseded);
            assert_eq!(counts_as_done, None);
            assert!(!was_create);
        }
        Outcome::Requeue(_) => panic!("a superseded task must settle immediately"),
    }
}
