//! Loads the backlog of pending tasks for one VIM tenant out of the action
//! table, in 200-row pages ordered by `(item_id, item, created_at)`.
//!
//! A task's local object is identified by `(item, item_id)`. If the most
//! recent row for an object is a DELETE, the object's history is moot: it is
//! gone, and nothing earlier in that group needs to be reloaded into memory.
//! Everything else (any row still `SCHEDULED`, and every CREATE/FIND row
//! regardless of status) is handed to the resolver.

use crate::db::models::ActionRow;
use crate::error::Error;
use crate::store::Store;
use crate::task::{Action, Status, Task};

const PAGE_SIZE: i64 = 200;

/// One `(item, item_id)` group's surviving rows, in storage order.
pub struct LoadedGroup {
    pub tasks: Vec<Task>,
}

/// Reads every row for `datacenter_vim_id`, grouped by local object, with
/// already-deleted objects discarded.
pub async fn load_pending(store: &Store, datacenter_vim_id: &str) -> Result<Vec<LoadedGroup>, Error> {
    let mut groups = Vec::new();
    let mut current_key: Option<(String, String)> = None;
    let mut current_tasks: Vec<Task> = Vec::new();
    let mut current_completed = false;
    let mut after_item_id = String::new();

    loop {
        let page = store.load_page(datacenter_vim_id, &after_item_id, PAGE_SIZE).await?;
        let page_len = page.len();
        let mut last_item_id = None;

        for row in page {
            last_item_id = Some(row.item_id.clone());
            let key = (row.item.clone(), row.item_id.clone());

            if current_key.as_ref() != Some(&key) {
                flush_group(&mut groups, &mut current_tasks, current_completed);
                current_key = Some(key);
                current_completed = false;
            } else if current_completed {
                continue;
            }

            let task = decode_row(row)?;
            if task.action == Action::Delete {
                current_completed = true;
                continue;
            }
            if task.status == Status::Scheduled || matches!(task.action, Action::Create | Action::Find) {
                current_tasks.push(task);
            }
        }

        if page_len < PAGE_SIZE as usize {
            break;
        }
        // Re-request starting at the last seen item_id; the loader tolerates
        // re-reading that row's group because the grouping key dedupes it.
        after_item_id = last_item_id.expect("full page always has a last row");
    }

    flush_group(&mut groups, &mut current_tasks, current_completed);
    Ok(groups)
}

/// Groups a freshly-submitted batch of already-decoded tasks by `(item,
/// item_id)`. Unlike [`load_pending`], DELETE tasks are kept (not discarded):
/// a fresh DELETE must still run the resolver's supersession pass against
/// the CREATE/FIND tasks queued alongside it for the same local object.
pub fn group_fresh_batch(tasks: Vec<Task>) -> Vec<LoadedGroup> {
    let mut by_key: std::collections::BTreeMap<(String, String), Vec<Task>> = std::collections::BTreeMap::new();
    for task in tasks {
        let key = (crate::task::item_column(task.item).to_string(), task.item_id.clone());
        by_key.entry(key).or_default().push(task);
    }

    by_key
        .into_values()
        .map(|mut group_tasks| {
            group_tasks.sort_by_key(|t| t.task_index);
            LoadedGroup { tasks: group_tasks }
        })
        .collect()
}

fn flush_group(groups: &mut Vec<LoadedGroup>, tasks: &mut Vec<Task>, completed: bool) {
    if !completed && !tasks.is_empty() {
        groups.push(LoadedGroup { tasks: std::mem::take(tasks) });
    } else {
        tasks.clear();
    }
}

fn decode_row(row: ActionRow) -> Result<Task, Error> {
    Task::from_row(row)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(item: &str, item_id: &str, action: &str, status: &str, index: i32) -> ActionRow {
        ActionRow {
            instance_action_id: "parent-1".to_string(),
            task_index: index,
            datacenter_vim_id: "vim-1".to_string(),
            vim_id: None,
            item: item.to_string(),
            item_id: item_id.to_string(),
            action: action.to_string(),
            status: status.to_string(),
            extra: String::new(),
            error_msg: None,
            created_at: "2026-01-01 00:00:00".to_string(),
            modified_at: "2026-01-01 00:00:00".to_string(),
        }
    }

    #[test]
    fn a_trailing_delete_discards_the_whole_group() {
        let rows = vec![
            row("vms", "vm-1", "CREATE", "DONE", 0),
            row("vms", "vm-1", "DELETE", "DONE", 1),
        ];
        let mut groups = Vec::new();
        let mut tasks = Vec::new();
        let mut completed = false;
        let mut key = None;
        for r in rows {
            let k = (r.item.clone(), r.item_id.clone());
            if key.as_ref() != Some(&k) {
                flush_group(&mut groups, &mut tasks, completed);
                key = Some(k);
                completed = false;
            }
            let task = decode_row(r).unwrap();
            if task.action == Action::Delete {
                completed = true;
                continue;
            }
            tasks.push(task);
        }
        flush_group(&mut groups, &mut tasks, completed);
        assert!(groups.is_empty());
    }

    #[test]
    fn a_scheduled_create_survives() {
        let rows = vec![row("nets", "net-1", "CREATE", "SCHEDULED", 0)];
        let mut groups = Vec::new();
        let mut tasks = Vec::new();
        for r in rows {
            tasks.push(decode_row(r).unwrap());
        }
        flush_group(&mut groups, &mut tasks, false);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].tasks.len(), 1);
    }
}
