//! The refresh scheduler: periodically re-polls the VIM for VMs and networks
//! that are still converging (or whose state might have drifted), in VIM-id
//! batches, and persists whatever changed.
//!
//! Grounded on `_refres_elements`/`_insert_refresh`/`_remove_refresh`: a
//! time-ordered queue holds one entry per `(item, item_id)` task that has
//! reached BUILD or DONE. Each pass drains every entry whose due time has
//! passed, up to [`crate::config::RefreshConfig::max_per_pass`], batches the
//! due VM ids and net ids into one driver call each, and re-inserts every
//! refreshed task at `now + build_interval` (still BUILD) or
//! `now + active_interval` (converged).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::warn;
use vim_driver::models::VimStatus;
use vim_driver::{VimConnector, VimDriver};

use crate::db::models::{InterfaceRow, NetRow, VmRow};
use crate::error::Error;
use crate::sdn::{self, OverlayStatus, SdnClient};
use crate::store::Store;
use crate::task::{Item, Status, Task};

/// One task awaiting its next poll, ordered by `due_at`.
struct Entry {
    due_at: NaiveDateTime,
    task: Task,
}

/// The in-memory refresh queue for one worker.
#[derive(Default)]
pub struct RefreshQueue {
    entries: Vec<Entry>,
}

impl RefreshQueue {
    pub fn new() -> RefreshQueue {
        RefreshQueue::default()
    }

    /// Inserts a task to be polled again at `due_at`, keeping the queue
    /// ordered ascending by due time (mirrors `_insert_refresh`'s linear
    /// insertion into `self.refresh_tasks`).
    pub fn insert(&mut self, task: Task, due_at: NaiveDateTime) {
        let pos = self.entries.partition_point(|e| e.due_at <= due_at);
        self.entries.insert(pos, Entry { due_at, task });
    }

    /// Removes every entry for a task that has been superseded, so a
    /// superseded DELETE never resurrects its own refresh cycle.
    pub fn drop_superseded(&mut self) {
        self.entries.retain(|e| e.task.status != Status::Superseded);
    }

    /// Number of tasks currently awaiting a poll.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Runs one refresh pass: drains due entries (up to `cap`), polls the VIM in
/// batches, combines SDN overlay status for networks, persists results, and
/// reschedules every polled task.
pub async fn run_pass(
    queue: &mut RefreshQueue,
    now: NaiveDateTime,
    vim: Arc<VimConnector>,
    sdn: Option<Arc<SdnClient>>,
    store: &Store,
    cap: usize,
    build_interval: chrono::Duration,
    active_interval: chrono::Duration,
) -> Result<usize, Error> {
    queue.drop_superseded();

    let mut due = Vec::new();
    while due.len() < cap {
        match queue.entries.first() {
            Some(entry) if entry.due_at <= now => {
                due.push(queue.entries.remove(0).task);
            }
            _ => break,
        }
    }

    if due.is_empty() {
        return Ok(0);
    }

    let mut vm_tasks: HashMap<String, Vec<Task>> = HashMap::new();
    let mut net_tasks: HashMap<String, Vec<Task>> = HashMap::new();
    let mut leftover = Vec::new();

    for task in due {
        match (task.item, task.vim_id.clone()) {
            (Item::Vms, Some(vim_id)) => vm_tasks.entry(vim_id).or_default().push(task),
            (Item::Nets, Some(vim_id)) => net_tasks.entry(vim_id).or_default().push(task),
            _ => leftover.push(task),
        }
    }

    let processed = vm_tasks.values().map(Vec::len).sum::<usize>()
        + net_tasks.values().map(Vec::len).sum::<usize>()
        + leftover.len();

    let vm_ids: Vec<String> = vm_tasks.keys().cloned().collect();
    let net_ids: Vec<String> = net_tasks.keys().cloned().collect();
    let vim_for_vms = Arc::clone(&vim);
    let vim_for_nets = Arc::clone(&vim);

    let vm_statuses = tokio::task::spawn_blocking(move || vim_for_vms.refresh_vms_status(&vm_ids))
        .await
        .expect("refresh task panicked");
    let net_statuses = tokio::task::spawn_blocking(move || vim_for_nets.refresh_nets_status(&net_ids))
        .await
        .expect("refresh task panicked");

    match vm_statuses {
        Ok(statuses) => {
            for status in statuses {
                if let Some(tasks) = vm_tasks.remove(&status.vim_id) {
                    for mut task in tasks {
                        let before = task.clone();
                        apply_vm_status(&mut task, &status, sdn.clone()).await;
                        persist_and_requeue(store, queue, before, task, now, build_interval, active_interval).await?;
                    }
                }
            }
        }
        Err(err) => {
            for tasks in vm_tasks.into_values() {
                for mut task in tasks {
                    let before = task.clone();
                    task.extra.vim_status = Some("VIM_ERROR".to_string());
                    task.error_msg = Some(crate::error::truncate_error_message(&err.to_string()));
                    persist_and_requeue(store, queue, before, task, now, build_interval, active_interval).await?;
                }
            }
        }
    }

    match net_statuses {
        Ok(statuses) => {
            for status in statuses {
                if let Some(tasks) = net_tasks.remove(&status.vim_id) {
                    for mut task in tasks {
                        let before = task.clone();
                        apply_net_status(&mut task, &status, sdn.clone()).await?;
                        persist_and_requeue(store, queue, before, task, now, build_interval, active_interval).await?;
                    }
                }
            }
        }
        Err(err) => {
            for tasks in net_tasks.into_values() {
                for mut task in tasks {
                    let before = task.clone();
                    task.extra.vim_status = Some("VIM_ERROR".to_string());
                    task.error_msg = Some(crate::error::truncate_error_message(&err.to_string()));
                    persist_and_requeue(store, queue, before, task, now, build_interval, active_interval).await?;
                }
            }
        }
    }

    for task in leftover {
        let before = task.clone();
        persist_and_requeue(store, queue, before, task, now, build_interval, active_interval).await?;
    }

    Ok(processed)
}

/// Applies a refreshed VM status, keying interfaces by their position in
/// `status.interfaces` (the same order VM CREATE sent them to the driver).
/// When an interface's reported PCI address changes, best-effort tears down
/// its previous SDN external port and stands up a new one against the
/// interface's mirrored overlay network, mirroring the original's per-task
/// `sdn_port_data` reconciliation during VM refresh.
async fn apply_vm_status(task: &mut Task, status: &vim_driver::models::VmStatus, sdn: Option<Arc<SdnClient>>) {
    task.extra.vim_status = Some(status_string(status.status));
    task.error_msg = status.error_msg.clone();

    for (index, interface) in status.interfaces.iter().enumerate() {
        let key = index.to_string();
        let Some(state) = task.extra.interfaces.get_mut(&key) else {
            continue;
        };

        let changed = state.vim_interface_id.as_deref() != Some(interface.vim_interface_id.as_str())
            || state.pci != interface.pci_address;

        if changed {
            if let (Some(port_id), Some(client)) = (state.sdn_port_id.take(), sdn.as_ref()) {
                let client = Arc::clone(client);
                if let Err(err) = tokio::task::spawn_blocking(move || client.delete_external_port(&port_id))
                    .await
                    .expect("sdn task panicked")
                {
                    warn!(error = %err, "best-effort SDN external port teardown failed");
                }
            }

            if let (Some(sdn_net_id), Some(pci), Some(client)) =
                (state.sdn_net_id.clone(), interface.pci_address.clone(), sdn.as_ref())
            {
                let client = Arc::clone(client);
                let vlan = interface.vlan.unwrap_or_default();
                match tokio::task::spawn_blocking(move || client.create_external_port(&sdn_net_id, &pci, vlan))
                    .await
                    .expect("sdn task panicked")
                {
                    Ok(port_id) => state.sdn_port_id = Some(port_id),
                    Err(err) => warn!(error = %err, "best-effort SDN external port creation failed"),
                }
            }
        }

        state.vim_interface_id = Some(interface.vim_interface_id.clone());
        state.mac_address = Some(interface.mac_address.clone());
        state.ip_address = interface.ip_address.clone();
        state.pci = interface.pci_address.clone();
        state.vlan = interface.vlan.map(|v| v as i32);
    }
}

async fn apply_net_status(
    task: &mut Task,
    status: &vim_driver::models::NetStatus,
    sdn: Option<Arc<SdnClient>>,
) -> Result<(), Error> {
    let mut combined_status = status.status;
    let mut combined_error = status.error_msg.clone();

    if let (Some(sdn_net_id), Some(client)) = (task.extra.sdn_net_id.clone(), sdn) {
        let overlay = tokio::task::spawn_blocking(move || client.get_network_status(&sdn_net_id))
            .await
            .expect("sdn poll task panicked");

        if let Ok(overlay) = overlay {
            let combined = sdn::combine_status(vim_status_to_overlay(status.status), status.error_msg.as_deref(), &overlay);
            combined_status = overlay_to_vim_status(combined.status);
            combined_error = combined.error_msg;
        }
    }

    task.extra.vim_status = Some(status_string(combined_status));
    task.error_msg = combined_error;
    Ok(())
}

fn vim_status_to_overlay(status: VimStatus) -> OverlayStatus {
    match status {
        VimStatus::Build => OverlayStatus::Build,
        VimStatus::Active => OverlayStatus::Active,
        VimStatus::Error => OverlayStatus::Error,
    }
}

fn overlay_to_vim_status(status: OverlayStatus) -> VimStatus {
    match status {
        OverlayStatus::Build => VimStatus::Build,
        OverlayStatus::Active => VimStatus::Active,
        OverlayStatus::Error => VimStatus::Error,
    }
}

fn status_string(status: VimStatus) -> String {
    match status {
        VimStatus::Build => "BUILD".to_string(),
        VimStatus::Active => "ACTIVE".to_string(),
        VimStatus::Error => "ERROR".to_string(),
    }
}

/// Whether this pass's refresh actually produced a delta worth writing.
/// Mirrors the original's habit of leaving an unchanged refresh row alone
/// rather than rewriting it (and bumping `modified_at`) every poll.
fn refresh_changed(before: &Task, after: &Task) -> bool {
    before.status != after.status
        || before.vim_id != after.vim_id
        || before.error_msg != after.error_msg
        || before.extra.vim_status != after.extra.vim_status
        || before.extra.sdn_net_id != after.extra.sdn_net_id
        || before.extra.interfaces != after.extra.interfaces
}

async fn persist_and_requeue(
    store: &Store,
    queue: &mut RefreshQueue,
    before: Task,
    task: Task,
    now: NaiveDateTime,
    build_interval: chrono::Duration,
    active_interval: chrono::Duration,
) -> Result<(), Error> {
    if refresh_changed(&before, &task) {
        store.save_task(task.to_row()?).await?;

        match task.item {
            Item::Vms => {
                store
                    .save_vm(VmRow {
                        item_id: task.item_id.clone(),
                        vim_vm_id: task.vim_id.clone(),
                        status: task.extra.vim_status.clone().unwrap_or_default(),
                        error_msg: task.error_msg.clone(),
                        vim_info: None,
                    })
                    .await?;
                for (name, state) in &task.extra.interfaces {
                    store
                        .save_interface(InterfaceRow {
                            item_id: task.item_id.clone(),
                            iface_name: name.clone(),
                            vim_interface_id: state.vim_interface_id.clone(),
                            mac_address: state.mac_address.clone(),
                            ip_address: state.ip_address.clone(),
                            vlan: state.vlan,
                            pci: state.pci.clone(),
                            sdn_port_id: state.sdn_port_id.clone(),
                        })
                        .await?;
                }
            }
            Item::Nets => {
                store
                    .save_net(NetRow {
                        item_id: task.item_id.clone(),
                        vim_net_id: task.vim_id.clone(),
                        sdn_net_id: task.extra.sdn_net_id.clone(),
                        status: task.extra.vim_status.clone().unwrap_or_default(),
                        error_msg: task.error_msg.clone(),
                        vim_info: None,
                        created: task.extra.created,
                    })
                    .await?;
            }
            _ => {}
        }
    }

    let due_at = if task.extra.vim_status.as_deref() == Some("BUILD") {
        now + build_interval
    } else {
        now + active_interval
    };
    queue.insert(task, due_at);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Action, Extra, Item, Status};
    use vim_driver::models::{InterfaceState, VmStatus};

    fn base_task() -> Task {
        Task {
            instance_action_id: "a".into(),
            task_index: 0,
            datacenter_vim_id: "vim-1".into(),
            vim_id: Some("vim-vm-1".into()),
            item: Item::Vms,
            item_id: "vm-1".into(),
            action: Action::Create,
            status: Status::Build,
            extra: Extra::default(),
            error_msg: None,
            created_at: NaiveDateTime::parse_from_str("2026-01-01 00:00:00", "%Y-%m-%d %H:%M:%S").unwrap(),
            modified_at: NaiveDateTime::parse_from_str("2026-01-01 00:00:00", "%Y-%m-%d %H:%M:%S").unwrap(),
            depends: HashMap::new(),
        }
    }

    #[test]
    fn refresh_changed_is_false_when_nothing_moved() {
        let before = base_task();
        let after = before.clone();
        assert!(!refresh_changed(&before, &after));
    }

    #[test]
    fn refresh_changed_detects_a_status_flip() {
        let before = base_task();
        let mut after = before.clone();
        after.status = Status::Done;
        assert!(refresh_changed(&before, &after));
    }

    #[test]
    fn refresh_changed_detects_an_interface_delta() {
        let before = base_task();
        let mut after = before.clone();
        after
            .extra
            .interfaces
            .insert("0".to_string(), crate::task::InterfaceState::default());
        assert!(refresh_changed(&before, &after));
    }

    #[tokio::test]
    async fn apply_vm_status_updates_interface_fields_without_an_sdn_client() {
        let mut task = base_task();
        task.extra
            .interfaces
            .insert("0".to_string(), crate::task::InterfaceState::default());

        let status = VmStatus {
            vim_id: "vim-vm-1".to_string(),
            status: VimStatus::Active,
            error_msg: None,
            interfaces: vec![InterfaceState {
                vim_interface_id: "iface-1".to_string(),
                mac_address: "aa:bb:cc:dd:ee:ff".to_string(),
                ip_address: Some("10.0.0.5".to_string()),
                pci_address: Some("0000:00:05.0".to_string()),
                vlan: Some(42),
            }],
        };

        apply_vm_status(&mut task, &status, None).await;

        let state = task.extra.interfaces.get("0").unwrap();
        assert_eq!(state.vim_interface_id.as_deref(), Some("iface-1"));
        assert_eq!(state.ip_address.as_deref(), Some("10.0.0.5"));
        assert_eq!(state.pci.as_deref(), Some("0000:00:05.0"));
        assert_eq!(state.vlan, Some(42));
        assert_eq!(task.extra.vim_status.as_deref(), Some("ACTIVE"));
    }
}
