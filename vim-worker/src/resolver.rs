//! Wires `depends_on` references into resolved dependencies, and applies the
//! supersession rule that keeps a DELETE from racing its own CREATE.
//!
//! Grounded on `_insert_pending_tasks`'s handling of newly-loaded batches:
//! a DELETE for an object supersedes every earlier CREATE/FIND task queued
//! for that same `(item, item_id)` and inherits whatever VIM-side handle
//! (`vim_id`, `sdn_net_id`, interfaces, `created_items`) that CREATE or FIND
//! had already produced. If none of the superseded tasks actually produced
//! a real resource, the DELETE itself is superseded: there is nothing to tear down.

use crate::loader::LoadedGroup;
use crate::store::Store;
use crate::task::{Action, ResolvedDependency, Status, Task, TaskRef};

/// Applies delete supersession within every group, then resolves every
/// surviving task's dependency references against the rest of the batch
/// (falling back to storage for references outside the loaded set).
pub async fn resolve_batch(groups: Vec<LoadedGroup>, store: &Store) -> Result<Vec<Task>, crate::error::Error> {
    let mut flattened = Vec::new();
    for group in groups {
        flattened.extend(supersede_deletes(group.tasks));
    }

    for i in 0..flattened.len() {
        let deps = collect_dependencies(&flattened, i, store).await?;
        flattened[i].depends = deps;
    }

    Ok(flattened)
}

/// Applies the CREATE/DELETE supersession rule to one `(item, item_id)` group.
fn supersede_deletes(mut tasks: Vec<Task>) -> Vec<Task> {
    let delete_indices: Vec<usize> = tasks
        .iter()
        .enumerate()
        .filter(|(_, t)| t.action == Action::Delete)
        .map(|(i, _)| i)
        .collect();

    for delete_index in delete_indices {
        let mut need_delete_action = false;
        let mut inherited_vim_id = None;
        let mut inherited_sdn_net_id = None;
        let mut inherited_interfaces = None;
        let mut inherited_created_items = None;

        for i in 0..tasks.len() {
            if i == delete_index {
                continue;
            }
            let candidate = &tasks[i];
            if candidate.action == Action::Find && candidate.vim_id.is_some() {
                inherited_vim_id = candidate.vim_id.clone();
                need_delete_action = true;
                if candidate.extra.sdn_net_id.is_some() {
                    inherited_sdn_net_id = candidate.extra.sdn_net_id.clone();
                }
                if !candidate.extra.interfaces.is_empty() {
                    inherited_interfaces = Some(candidate.extra.interfaces.clone());
                }
            }
            let created = candidate.action == Action::Create
                && (candidate.extra.created || candidate.vim_id.is_some() || candidate.extra.sdn_net_id.is_some());
            if candidate.action == Action::Create && created {
                need_delete_action = true;
                inherited_vim_id = candidate.vim_id.clone();
                if candidate.extra.sdn_net_id.is_some() {
                    inherited_sdn_net_id = candidate.extra.sdn_net_id.clone();
                }
                if !candidate.extra.interfaces.is_empty() {
                    inherited_interfaces = Some(candidate.extra.interfaces.clone());
                }
                if !matches!(candidate.extra.created_items, serde_yaml::Value::Null) {
                    inherited_created_items = Some(candidate.extra.created_items.clone());
                }
            }
            if matches!(candidate.action, Action::Create | Action::Find) {
                tasks[i].status = Status::Superseded;
            }
        }

        let delete_task = &mut tasks[delete_index];
        if let Some(vim_id) = inherited_vim_id {
            delete_task.vim_id = Some(vim_id);
        }
        if let Some(sdn_net_id) = inherited_sdn_net_id {
            delete_task.extra.sdn_net_id = Some(sdn_net_id);
        }
        if let Some(interfaces) = inherited_interfaces {
            delete_task.extra.interfaces = interfaces;
        }
        if let Some(created_items) = inherited_created_items {
            delete_task.extra.created_items = created_items;
        }
        if !need_delete_action {
            delete_task.status = Status::Superseded;
        }
    }

    tasks
}

async fn collect_dependencies(
    batch: &[Task],
    index: usize,
    store: &Store,
) -> Result<std::collections::HashMap<String, ResolvedDependency>, crate::error::Error> {
    let mut resolved = std::collections::HashMap::new();
    let owner_parent = batch[index].instance_action_id.clone();
    let refs = batch[index].extra.depends_on.clone();

    for task_ref in refs {
        let (parent, task_index) = match &task_ref {
            TaskRef::Local(i) => (owner_parent.clone(), *i),
            TaskRef::Qualified { parent, index } => (parent.clone(), *index),
        };

        let found = batch
            .iter()
            .find(|t| t.instance_action_id == parent && t.task_index == task_index)
            .map(|t| ResolvedDependency {
                instance_action_id: t.instance_action_id.clone(),
                task_index: t.task_index,
                status: t.status,
                vim_id: t.vim_id.clone(),
            });

        let dependency = match found {
            Some(dep) => dep,
            None => match store.fetch_task(&parent, task_index).await? {
                Some(row) => {
                    let dep_task = Task::from_row(row)?;
                    ResolvedDependency {
                        instance_action_id: dep_task.instance_action_id,
                        task_index: dep_task.task_index,
                        status: dep_task.status,
                        vim_id: dep_task.vim_id,
                    }
                }
                None => continue,
            },
        };

        resolved.insert(format!("TASK-{}", task_index), dependency.clone());
        resolved.insert(format!("TASK-{}.{}", parent, task_index), dependency);
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Extra, Item};
    use chrono::NaiveDateTime;

    fn base_task(action: Action, status: Status, index: i32) -> Task {
        Task {
            instance_action_id: "parent".into(),
            task_index: index,
            datacenter_vim_id: "vim-1".into(),
            vim_id: None,
            item: Item::Nets,
            item_id: "net-1".into(),
            action,
            status,
            extra: Extra::default(),
            error_msg: None,
            created_at: NaiveDateTime::parse_from_str("2026-01-01 00:00:00", "%Y-%m-%d %H:%M:%S").unwrap(),
            modified_at: NaiveDateTime::parse_from_str("2026-01-01 00:00:00", "%Y-%m-%d %H:%M:%S").unwrap(),
            depends: std::collections::HashMap::new(),
        }
    }

    #[test]
    fn delete_supersedes_its_create_and_inherits_vim_id() {
        let mut create = base_task(Action::Create, Status::Done, 0);
        create.vim_id = Some("vim-net-1".to_string());
        create.extra.created = true;
        let delete = base_task(Action::Delete, Status::Scheduled, 1);

        let result = supersede_deletes(vec![create, delete]);

        assert_eq!(result[0].status, Status::Superseded);
        assert_eq!(result[1].status, Status::Scheduled);
        assert_eq!(result[1].vim_id.as_deref(), Some("vim-net-1"));
    }

    #[test]
    fn delete_with_nothing_to_delete_is_itself_superseded() {
        let find = base_task(Action::Find, Status::Failed, 0);
        let delete = base_task(Action::Delete, Status::Scheduled, 1);

        let result = supersede_deletes(vec![find, delete]);

        assert_eq!(result[1].status, Status::Superseded);
    }

    #[test]
    fn delete_supersedes_a_find_and_inherits_its_overlay_state() {
        let mut find = base_task(Action::Find, Status::Done, 0);
        find.vim_id = Some("vim-net-1".to_string());
        find.extra.sdn_net_id = Some("sdn-net-1".to_string());
        find.extra.interfaces.insert("0".to_string(), crate::task::InterfaceState::default());
        let delete = base_task(Action::Delete, Status::Scheduled, 1);

        let result = supersede_deletes(vec![find, delete]);

        assert_eq!(result[0].status, Status::Superseded);
        assert_eq!(result[1].status, Status::Scheduled);
        assert_eq!(result[1].vim_id.as_deref(), Some("vim-net-1"));
        assert_eq!(result[1].extra.sdn_net_id.as_deref(), Some("sdn-net-1"));
        assert_eq!(result[1].extra.interfaces.len(), 1);
    }

    #[tokio::test]
    async fn collect_dependencies_populates_vim_id_from_the_batch() {
        let mut net = base_task(Action::Create, Status::Done, 0);
        net.vim_id = Some("vim-net-1".to_string());
        let mut vm = base_task(Action::Create, Status::Scheduled, 1);
        vm.item = Item::Vms;
        vm.extra.depends_on.push(TaskRef::Local(0));

        let batch = vec![net, vm];
        let db = crate::db::Database::new(&crate::config::DatabaseConfig {
            url: ":memory:".to_string(),
            max_conns: Some(1),
        });
        let store = Store::new(db);

        let deps = collect_dependencies(&batch, 1, &store).await.unwrap();
        let dep = deps.get("TASK-0").expect("dependency resolved");
        assert_eq!(dep.vim_id.as_deref(), Some("vim-net-1"));
    }
}
