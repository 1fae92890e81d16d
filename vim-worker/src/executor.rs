//! Drains the pending-task queue: checks each task's dependencies, dispatches
//! it to the VIM driver (and, for networks, optionally the SDN overlay), and
//! persists the result.
//!
//! Grounded on `_proccess_pending_tasks`: a task whose dependencies are still
//! settling is requeued, up to [`crate::config::RefreshConfig::max_dependency_retries`]
//! times, after which it is failed with a timeout. A task whose dependency
//! failed outright is failed immediately without ever reaching the driver.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;
use vim_driver::error::{Error as DriverError, VimDriverError};
use vim_driver::models::{
    ClassificationSpec, NetworkFilter, NetworkSpec, SfSpec, SfiSpec, SfpSpec, VmInstanceSpec,
};
use vim_driver::{VimConnector, VimDriver};

use crate::error::TaskError;
use crate::sdn::SdnClient;
use crate::store::Store;
use crate::task::{Action, Item, ResolvedDependency, Status, Task};

/// Network types the SDN overlay mirrors (VLAN-segmented networks only).
const SDN_BACKED_NET_TYPES: &[&str] = &["data", "ptp"];

/// What the caller should do with a task after one executor pass.
pub enum Outcome {
    /// Dependencies are not settled yet; try again on a later pass.
    Requeue(Task),
    /// The task reached a terminal or driver-accepted state; persist it.
    Settled {
        task: Task,
        /// `Some(true)`/`Some(false)` bumps the parent action's done/failed
        /// counter; `None` (superseded tasks) leaves it untouched.
        counts_as_done: Option<bool>,
        /// Whether this execution issued a CREATE call to the driver, for the
        /// caller's per-pass creation cap.
        was_create: bool,
    },
}

/// Executes a single task to completion (or to its next retry).
pub async fn execute_one(
    mut task: Task,
    vim: Arc<VimConnector>,
    sdn: Option<Arc<SdnClient>>,
    store: &Store,
    max_retries: u32,
) -> Outcome {
    if task.status == Status::Superseded {
        return Outcome::Settled { task, counts_as_done: None, was_create: false };
    }

    if task.dependencies_failed() {
        task.status = Status::Failed;
        task.error_msg = Some(crate::error::truncate_error_message(&TaskError::DependencyFailed.to_string()));
        return Outcome::Settled { task, counts_as_done: Some(false), was_create: false };
    }

    if !task.dependencies_satisfied() && !task.depends.is_empty() {
        task.extra.tries += 1;
        if task.extra.tries <= max_retries {
            return Outcome::Requeue(task);
        }
        task.status = Status::Failed;
        task.error_msg = Some(crate::error::truncate_error_message(&TaskError::DependencyTimeout.to_string()));
        return Outcome::Settled { task, counts_as_done: Some(false), was_create: false };
    }

    // The per-interface SDN network lookup is async-only, so it runs here,
    // before the blocking driver call, rather than inside `dispatch`.
    let interface_sdn_hints = if task.item == Item::Vms && task.action == Action::Create {
        prefetch_interface_sdn_hints(&task, store).await
    } else {
        Vec::new()
    };

    let was_create = task.action == Action::Create;
    let result = tokio::task::spawn_blocking(move || {
        let outcome = dispatch(&mut task, vim.as_ref(), sdn.as_deref(), &interface_sdn_hints);
        (task, outcome)
    })
    .await
    .expect("executor task panicked");

    let (mut task, outcome) = result;

    // A FIND only learns the VIM-side id from the driver call itself, so its
    // overlay lookup also has to happen out here, after the blocking call.
    if outcome.is_ok() && task.item == Item::Nets && task.action == Action::Find {
        if let Some(vim_id) = task.vim_id.clone() {
            if let Ok(Some(net_row)) = store.fetch_net_by_vim_id(&vim_id).await {
                task.extra.sdn_net_id = net_row.sdn_net_id;
            }
        }
    }

    match outcome {
        Ok(()) => Outcome::Settled { task, counts_as_done: Some(true), was_create },
        Err(err) => {
            apply_failure(&mut task, err);
            Outcome::Settled { task, counts_as_done: Some(false), was_create }
        }
    }
}

/// For each interface a VM CREATE requests, looks up the overlay network id
/// of the network it attaches to (after dependency substitution), so
/// `create_vm` can seed `extra.interfaces` with it.
async fn prefetch_interface_sdn_hints(task: &Task, store: &Store) -> Vec<Option<String>> {
    let spec: VmInstanceSpec = match decode_params(task) {
        Ok(spec) => spec,
        Err(_) => return Vec::new(),
    };

    let mut hints = Vec::with_capacity(spec.interfaces.len());
    for interface in &spec.interfaces {
        let vim_net_id = substitute_dep_id(&interface.net_id, &task.depends);
        let sdn_net_id = store
            .fetch_net_by_vim_id(&vim_net_id)
            .await
            .ok()
            .flatten()
            .and_then(|row| row.sdn_net_id);
        hints.push(sdn_net_id);
    }
    hints
}

/// Replaces `id` with the `vim_id` of the dependency it names (`TASK-<n>` or
/// `TASK-<parent>.<n>`), if it names one and that dependency has a `vim_id`
/// yet. Otherwise `id` is returned unchanged, e.g. when it is already a
/// VIM-side id rather than a dependency placeholder.
fn substitute_dep_id(id: &str, depends: &HashMap<String, ResolvedDependency>) -> String {
    depends
        .get(id)
        .and_then(|dep| dep.vim_id.clone())
        .unwrap_or_else(|| id.to_string())
}

fn dispatch(
    task: &mut Task,
    vim: &VimConnector,
    sdn: Option<&SdnClient>,
    interface_sdn_hints: &[Option<String>],
) -> Result<(), TaskError> {
    match (task.item, task.action) {
        (Item::Vms, Action::Create) => create_vm(task, vim, interface_sdn_hints),
        (Item::Vms, Action::Delete) => delete_vm(task, vim, sdn),
        (Item::Nets, Action::Create) => create_net(task, vim, sdn),
        (Item::Nets, Action::Delete) => delete_net(task, vim, sdn),
        (Item::Nets, Action::Find) => find_net(task, vim),
        (Item::Sfis, Action::Create) => create_sfi(task, vim),
        (Item::Sfis, Action::Delete) => delete_sfi(task, vim),
        (Item::Sfs, Action::Create) => create_sf(task, vim),
        (Item::Sfs, Action::Delete) => delete_sf(task, vim),
        (Item::Classifications, Action::Create) => create_classification(task, vim),
        (Item::Classifications, Action::Delete) => delete_classification(task, vim),
        (Item::Sfps, Action::Create) => create_sfp(task, vim),
        (Item::Sfps, Action::Delete) => delete_sfp(task, vim),
        (item, action) => Err(TaskError::OverlayError(format!(
            "unsupported action {action:?} for item {item:?}"
        ))),
    }
}

fn decode_params<T: serde::de::DeserializeOwned>(task: &Task) -> Result<T, TaskError> {
    serde_yaml::from_value(task.extra.params.clone())
        .map_err(|err| TaskError::OverlayError(format!("malformed task parameters: {err}")))
}

fn apply_failure(task: &mut Task, err: impl std::fmt::Display) {
    task.status = Status::Failed;
    task.vim_id = None;
    task.error_msg = Some(crate::error::truncate_error_message(&err.to_string()));
}

/// NotFound during a DELETE means the object is already gone: treat as success.
fn is_not_found(err: &DriverError) -> bool {
    matches!(err, DriverError::DriverError(VimDriverError::NotFound { .. }))
}

fn create_vm(task: &mut Task, vim: &VimConnector, interface_sdn_hints: &[Option<String>]) -> Result<(), TaskError> {
    let mut spec: VmInstanceSpec = decode_params(task)?;
    for interface in &mut spec.interfaces {
        interface.net_id = substitute_dep_id(&interface.net_id, &task.depends);
    }

    let (vim_id, created_items) = vim.new_vminstance(&spec)?;
    task.vim_id = Some(vim_id);
    task.status = Status::Build;
    task.extra.created = true;
    task.extra.vim_status = Some("BUILD".to_string());
    task.extra.created_items = serde_yaml::to_value(&created_items).unwrap_or(serde_yaml::Value::Null);
    task.extra.interfaces = spec
        .interfaces
        .iter()
        .enumerate()
        .map(|(index, _)| {
            let state = crate::task::InterfaceState {
                sdn_net_id: interface_sdn_hints.get(index).cloned().flatten(),
                ..Default::default()
            };
            (index.to_string(), state)
        })
        .collect();
    Ok(())
}

fn delete_vm(task: &mut Task, vim: &VimConnector, sdn: Option<&SdnClient>) -> Result<(), TaskError> {
    if let Some(client) = sdn {
        for state in task.extra.interfaces.values() {
            if let Some(port_id) = &state.sdn_port_id {
                if let Err(err) = client.delete_external_port(port_id) {
                    warn!(port_id = %port_id, error = %err, "best-effort SDN external port deletion failed");
                }
            }
        }
    }
    if let Some(vim_id) = task.vim_id.clone() {
        let created_items: json::Value = json::to_value(&task.extra.created_items).unwrap_or(json::Value::Null);
        match vim.delete_vminstance(&vim_id, &created_items) {
            Ok(()) => {}
            Err(err) if is_not_found(&err) => {}
            Err(err) => return Err(err.into()),
        }
    }
    task.status = Status::Done;
    Ok(())
}

fn create_net(task: &mut Task, vim: &VimConnector, sdn: Option<&SdnClient>) -> Result<(), TaskError> {
    let spec: NetworkSpec = decode_params(task)?;
    let record = vim.new_network(&spec)?;
    task.vim_id = Some(record.vim_id.clone());
    task.status = Status::Build;
    task.extra.created = true;
    task.extra.vim_status = Some("BUILD".to_string());

    if let Some(client) = sdn {
        if SDN_BACKED_NET_TYPES.contains(&spec.net_type.as_str()) {
            let vlan = record.vlan.ok_or_else(|| {
                TaskError::OverlayError(format!(
                    "VIM did not return a VLAN segmentation for SDN-backed network {}",
                    spec.name
                ))
            })?;
            let overlay = client.create_network(&spec.name, vlan)?;
            task.extra.sdn_net_id = Some(overlay.sdn_net_id.clone());

            if let Some(wim_account_name) = spec.options.get("wim_account_name") {
                if client.wim_external_ports_enabled() {
                    attach_wim_external_port(client, &overlay.sdn_net_id, wim_account_name, vlan)?;
                }
            }
        }
    }

    Ok(())
}

/// Attaches an external port connecting the overlay network to the WAN,
/// trying the named WIM account's compute-node location first and falling
/// back to the bare `"__WIM"` location if the named one is rejected.
fn attach_wim_external_port(
    client: &SdnClient,
    sdn_net_id: &str,
    wim_account_name: &str,
    vlan: u16,
) -> Result<(), TaskError> {
    let named = format!("__WIM:{}", &wim_account_name[..wim_account_name.len().min(58)]);
    if client.create_external_port(sdn_net_id, &named, vlan).is_ok() {
        return Ok(());
    }
    client.create_external_port(sdn_net_id, "__WIM", vlan)?;
    Ok(())
}

fn delete_net(task: &mut Task, vim: &VimConnector, sdn: Option<&SdnClient>) -> Result<(), TaskError> {
    if let (Some(sdn_net_id), Some(client)) = (task.extra.sdn_net_id.clone(), sdn) {
        for port_id in client.list_external_ports(&sdn_net_id)? {
            client.delete_external_port(&port_id)?;
        }
        client.delete_network(&sdn_net_id)?;
    }
    if let Some(vim_id) = task.vim_id.clone() {
        match vim.delete_network(&vim_id) {
            Ok(()) => {}
            Err(err) if is_not_found(&err) => {}
            Err(err) => return Err(err.into()),
        }
    }
    task.status = Status::Done;
    Ok(())
}

fn find_net(task: &mut Task, vim: &VimConnector) -> Result<(), TaskError> {
    let filter: NetworkFilter = match &task.extra.find {
        Some(value) => serde_yaml::from_value(value.clone())
            .map_err(|err| TaskError::OverlayError(format!("malformed find filter: {err}")))?,
        None => NetworkFilter::default(),
    };
    let record = vim.get_network(&filter)?;
    task.vim_id = Some(record.vim_id);
    task.status = Status::Done;
    task.extra.created = false;
    Ok(())
}

fn create_sfi(task: &mut Task, vim: &VimConnector) -> Result<(), TaskError> {
    let mut spec: SfiSpec = decode_params(task)?;
    spec.ingress_port_id = substitute_dep_id(&spec.ingress_port_id, &task.depends);
    spec.egress_port_id = substitute_dep_id(&spec.egress_port_id, &task.depends);
    task.vim_id = Some(vim.new_sfi(&spec)?);
    task.status = Status::Done;
    task.extra.created = true;
    Ok(())
}

fn delete_sfi(task: &mut Task, vim: &VimConnector) -> Result<(), TaskError> {
    if let Some(vim_id) = task.vim_id.clone() {
        match vim.delete_sfi(&vim_id) {
            Ok(()) => {}
            Err(err) if is_not_found(&err) => {}
            Err(err) => return Err(err.into()),
        }
    }
    task.status = Status::Done;
    Ok(())
}

fn create_sf(task: &mut Task, vim: &VimConnector) -> Result<(), TaskError> {
    let mut spec: SfSpec = decode_params(task)?;
    spec.sfi_ids = spec
        .sfi_ids
        .iter()
        .map(|id| substitute_dep_id(id, &task.depends))
        .collect();
    task.vim_id = Some(vim.new_sf(&spec)?);
    task.status = Status::Done;
    task.extra.created = true;
    Ok(())
}

fn delete_sf(task: &mut Task, vim: &VimConnector) -> Result<(), TaskError> {
    if let Some(vim_id) = task.vim_id.clone() {
        match vim.delete_sf(&vim_id) {
            Ok(()) => {}
            Err(err) if is_not_found(&err) => {}
            Err(err) => return Err(err.into()),
        }
    }
    task.status = Status::Done;
    Ok(())
}

fn create_classification(task: &mut Task, vim: &VimConnector) -> Result<(), TaskError> {
    let spec: ClassificationSpec = decode_params(task)?;
    task.vim_id = Some(vim.new_classification(&spec)?);
    task.status = Status::Done;
    task.extra.created = true;
    Ok(())
}

fn delete_classification(task: &mut Task, vim: &VimConnector) -> Result<(), TaskError> {
    if let Some(vim_id) = task.vim_id.clone() {
        match vim.delete_classification(&vim_id) {
            Ok(()) => {}
            Err(err) if is_not_found(&err) => {}
            Err(err) => return Err(err.into()),
        }
    }
    task.status = Status::Done;
    Ok(())
}

fn create_sfp(task: &mut Task, vim: &VimConnector) -> Result<(), TaskError> {
    let mut spec: SfpSpec = decode_params(task)?;
    spec.sf_ids = spec.sf_ids.iter().map(|id| substitute_dep_id(id, &task.depends)).collect();
    spec.classification_ids = spec
        .classification_ids
        .iter()
        .map(|id| substitute_dep_id(id, &task.depends))
        .collect();
    task.vim_id = Some(vim.new_sfp(&spec)?);
    task.status = Status::Done;
    task.extra.created = true;
    Ok(())
}

fn delete_sfp(task: &mut Task, vim: &VimConnector) -> Result<(), TaskError> {
    if let Some(vim_id) = task.vim_id.clone() {
        match vim.delete_sfp(&vim_id) {
            Ok(()) => {}
            Err(err) if is_not_found(&err) => {}
            Err(err) => return Err(err.into()),
        }
    }
    task.status = Status::Done;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Extra, Item};
    use chrono::NaiveDateTime;

    fn pending_task() -> Task {
        Task {
            instance_action_id: "a".into(),
            task_index: 0,
            datacenter_vim_id: "vim-1".into(),
            vim_id: None,
            item: Item::Vms,
            item_id: "vm-1".into(),
            action: Action::Create,
            status: Status::Scheduled,
            extra: Extra::default(),
            error_msg: None,
            created_at: NaiveDateTime::parse_from_str("2026-01-01 00:00:00", "%Y-%m-%d %H:%M:%S").unwrap(),
            modified_at: NaiveDateTime::parse_from_str("2026-01-01 00:00:00", "%Y-%m-%d %H:%M:%S").unwrap(),
            depends: std::collections::HashMap::new(),
        }
    }

    #[test]
    fn a_failed_dependency_fails_immediately_without_retry() {
        let mut task = pending_task();
        task.depends.insert(
            "TASK-1".into(),
            crate::task::ResolvedDependency {
                instance_action_id: "a".into(),
                task_index: 1,
                status: Status::Failed,
                vim_id: None,
            },
        );
        assert!(task.dependencies_failed());
    }

    #[test]
    fn substitute_dep_id_replaces_a_known_dependency_placeholder() {
        let mut depends = HashMap::new();
        depends.insert(
            "TASK-0".to_string(),
            ResolvedDependency {
                instance_action_id: "a".into(),
                task_index: 0,
                status: Status::Done,
                vim_id: Some("vim-net-1".to_string()),
            },
        );
        assert_eq!(substitute_dep_id("TASK-0", &depends), "vim-net-1");
        assert_eq!(substitute_dep_id("already-a-vim-id", &depends), "already-a-vim-id");
    }

    #[test]
    fn substitute_dep_id_leaves_unresolved_dependency_unchanged() {
        let mut depends = HashMap::new();
        depends.insert(
            "TASK-0".to_string(),
            ResolvedDependency {
                instance_action_id: "a".into(),
                task_index: 0,
                status: Status::Build,
                vim_id: None,
            },
        );
        assert_eq!(substitute_dep_id("TASK-0", &depends), "TASK-0");
    }

    #[tokio::test]
    async fn prefetch_interface_sdn_hints_resolves_through_a_substituted_dependency() {
        use vim_driver::models::InterfaceSpec;

        let db = crate::db::Database::new(&crate::config::DatabaseConfig {
            url: ":memory:".to_string(),
            max_conns: Some(1),
        });
        let store = Store::new(db);

        store
            .save_net(crate::db::models::NetRow {
                item_id: "net-1".to_string(),
                vim_net_id: Some("vim-net-1".to_string()),
                sdn_net_id: Some("sdn-net-1".to_string()),
                status: "ACTIVE".to_string(),
                error_msg: None,
                vim_info: None,
                created: true,
            })
            .await
            .unwrap();

        let mut task = pending_task();
        task.extra.params = serde_yaml::to_value(VmInstanceSpec {
            name: "vm-1".to_string(),
            flavor_id: "flavor-1".to_string(),
            image_id: "image-1".to_string(),
            interfaces: vec![InterfaceSpec {
                net_id: "TASK-0".to_string(),
                mac_address: None,
                mgmt: false,
            }],
        })
        .unwrap();
        task.depends.insert(
            "TASK-0".to_string(),
            ResolvedDependency {
                instance_action_id: "a".into(),
                task_index: 0,
                status: Status::Done,
                vim_id: Some("vim-net-1".to_string()),
            },
        );

        let hints = prefetch_interface_sdn_hints(&task, &store).await;
        assert_eq!(hints, vec![Some("sdn-net-1".to_string())]);
    }
}
