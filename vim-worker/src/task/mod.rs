//! The in-memory task representation: the normalised form of an action-table
//! row, plus the attributes attached by the loader and resolver that never
//! get persisted as their own columns.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::db::models::ActionRow;
use crate::error::Error;

/// What a task does to its `item_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    /// Provision a new VIM-side object.
    Create,
    /// Tear down the VIM-side object.
    Delete,
    /// Look up a pre-existing VIM-side object instead of creating one.
    Find,
}

/// The lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    /// Queued, not yet picked up by the executor.
    Scheduled,
    /// Driver call issued; the VIM-side object is still converging.
    Build,
    /// Terminal: completed successfully.
    Done,
    /// Terminal: completed with an error.
    Failed,
    /// Terminal: replaced by a newer task for the same `(item, item_id)`.
    Superseded,
}

impl Status {
    /// Whether this status can still change.
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Done | Status::Failed | Status::Superseded)
    }
}

/// The category of local object a task operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Item {
    /// A VM instance.
    Vms,
    /// A network.
    Nets,
    /// A service function instance.
    Sfis,
    /// A service function.
    Sfs,
    /// A flow classification.
    Classifications,
    /// A service function path.
    Sfps,
}

/// A reference to a dependency task, as it appears in `depends_on`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskRef {
    /// Index of a task within the same parent action.
    Local(i32),
    /// `<parent>.<index>`, naming a task belonging to a different parent.
    Qualified {
        /// The referenced task's parent action id.
        parent: String,
        /// The referenced task's index within that parent.
        index: i32,
    },
}

/// Per-interface sub-state carried in `extra.interfaces`, keyed by the
/// interface's position in `VmInstanceSpec.interfaces` (stringified), since
/// the spec itself carries no interface name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterfaceState {
    /// The VIM-reported interface id.
    #[serde(default)]
    pub vim_interface_id: Option<String>,
    /// The interface's MAC address.
    #[serde(default)]
    pub mac_address: Option<String>,
    /// The interface's assigned IP address.
    #[serde(default)]
    pub ip_address: Option<String>,
    /// The interface's VLAN tag, if segmented.
    #[serde(default)]
    pub vlan: Option<i32>,
    /// The compute node's PCI address the interface is bound to, if known.
    #[serde(default)]
    pub pci: Option<String>,
    /// The mirrored SDN external port id, if any.
    #[serde(default)]
    pub sdn_port_id: Option<String>,
    /// The SDN overlay network this interface's network is mirrored onto, if any.
    #[serde(default)]
    pub sdn_net_id: Option<String>,
}

/// The structured `extra` payload of a task, round-tripped as YAML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Extra {
    /// Driver-facing parameters for this task's item (VM spec, network spec, ...).
    #[serde(default)]
    pub params: serde_yaml::Value,
    /// FIND filter, when `action == Find` or a CREATE should first attempt a FIND.
    #[serde(default)]
    pub find: Option<serde_yaml::Value>,
    /// Raw dependency references, as read from storage.
    #[serde(default)]
    pub depends_on: Vec<TaskRef>,
    /// Per-interface sub-state, keyed by interface index (stringified).
    #[serde(default)]
    pub interfaces: HashMap<String, InterfaceState>,
    /// Opaque side-artifacts the driver reported at creation time.
    #[serde(default)]
    pub created_items: serde_yaml::Value,
    /// Whether this worker created the backing VIM object (and thus owns its deletion).
    #[serde(default)]
    pub created: bool,
    /// The mirrored SDN overlay network id, if any.
    #[serde(default)]
    pub sdn_net_id: Option<String>,
    /// Last VIM-reported status string.
    #[serde(default)]
    pub vim_status: Option<String>,
    /// Number of dependency-wait retries attempted so far.
    #[serde(default)]
    pub tries: u32,
}

impl Extra {
    /// Decodes a task's `extra` YAML column.
    pub fn decode(yaml: &str) -> Result<Extra, Error> {
        if yaml.trim().is_empty() {
            return Ok(Extra::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Re-encodes the payload back to the YAML form stored in the action table.
    pub fn encode(&self) -> Result<String, Error> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// A fully normalised task, as handed between the loader, resolver, executor
/// and refresh scheduler. Built from an [`ActionRow`] plus decoded `extra`.
#[derive(Debug, Clone)]
pub struct Task {
    /// The parent action this task belongs to.
    pub instance_action_id: String,
    /// The task's index within its parent.
    pub task_index: i32,
    /// Routes this task to exactly one worker.
    pub datacenter_vim_id: String,
    /// The VIM-side identifier, once known.
    pub vim_id: Option<String>,
    /// The category of local object this task operates on.
    pub item: Item,
    /// Opaque id of the logical object in the local store.
    pub item_id: String,
    /// CREATE, DELETE or FIND.
    pub action: Action,
    /// The task's current lifecycle state.
    pub status: Status,
    /// The decoded structured payload.
    pub extra: Extra,
    /// Truncated error message, if the task failed.
    pub error_msg: Option<String>,
    /// Creation timestamp.
    pub created_at: NaiveDateTime,
    /// Last modification timestamp; also the refresh-queue sort key.
    pub modified_at: NaiveDateTime,
    /// Resolved dependency tasks, keyed by every form (`TASK-<index>` and
    /// `TASK-<parent>.<index>`) under which they may be cited.
    pub depends: HashMap<String, ResolvedDependency>,
}

/// The outcome of resolving one entry of `depends_on`.
#[derive(Debug, Clone)]
pub struct ResolvedDependency {
    /// The dependency's parent action id.
    pub instance_action_id: String,
    /// The dependency's index within its parent.
    pub task_index: i32,
    /// The dependency's last known status, as of resolution time.
    pub status: Status,
    /// The dependency's VIM-side id, once it has one. Substituted into a
    /// dependent task's params wherever they reference this dependency.
    pub vim_id: Option<String>,
}

impl Task {
    /// Whether every dependency this task cites has completed successfully.
    pub fn dependencies_satisfied(&self) -> bool {
        self.depends.values().all(|dep| dep.status == Status::Done)
    }

    /// Whether any dependency this task cites has permanently failed.
    pub fn dependencies_failed(&self) -> bool {
        self.depends
            .values()
            .any(|dep| matches!(dep.status, Status::Failed | Status::Superseded))
    }

    /// Whether every dependency has reached a terminal state (failed or done).
    pub fn dependencies_settled(&self) -> bool {
        self.depends.values().all(|dep| dep.status.is_terminal())
    }
}

/// Parses an item category out of its column string (`"vms"`, `"nets"`, ...).
pub fn parse_item(value: &str) -> Result<Item, Error> {
    match value {
        "vms" => Ok(Item::Vms),
        "nets" => Ok(Item::Nets),
        "sfis" => Ok(Item::Sfis),
        "sfs" => Ok(Item::Sfs),
        "classifications" => Ok(Item::Classifications),
        "sfps" => Ok(Item::Sfps),
        other => Err(Error::MalformedRow(format!("unknown item category: '{other}'"))),
    }
}

/// Renders an item category back to its column string.
pub fn item_column(item: Item) -> &'static str {
    match item {
        Item::Vms => "vms",
        Item::Nets => "nets",
        Item::Sfis => "sfis",
        Item::Sfs => "sfs",
        Item::Classifications => "classifications",
        Item::Sfps => "sfps",
    }
}

/// Parses an action discriminant out of its column string.
pub fn parse_action(value: &str) -> Result<Action, Error> {
    match value {
        "CREATE" => Ok(Action::Create),
        "DELETE" => Ok(Action::Delete),
        "FIND" => Ok(Action::Find),
        other => Err(Error::MalformedRow(format!("unknown action: '{other}'"))),
    }
}

/// Parses a status discriminant out of its column string.
pub fn parse_status(value: &str) -> Result<Status, Error> {
    match value {
        "SCHEDULED" => Ok(Status::Scheduled),
        "BUILD" => Ok(Status::Build),
        "DONE" => Ok(Status::Done),
        "FAILED" => Ok(Status::Failed),
        "SUPERSEDED" => Ok(Status::Superseded),
        other => Err(Error::MalformedRow(format!("unknown status: '{other}'"))),
    }
}

impl Task {
    /// Builds a normalised [`Task`] from a raw action-table row.
    pub fn from_row(row: ActionRow) -> Result<Task, Error> {
        Ok(Task {
            instance_action_id: row.instance_action_id,
            task_index: row.task_index,
            datacenter_vim_id: row.datacenter_vim_id,
            vim_id: row.vim_id,
            item: parse_item(&row.item)?,
            item_id: row.item_id,
            action: parse_action(&row.action)?,
            status: parse_status(&row.status)?,
            extra: Extra::decode(&row.extra)?,
            error_msg: row.error_msg,
            created_at: parse_datetime(&row.created_at)?,
            modified_at: parse_datetime(&row.modified_at)?,
            depends: HashMap::new(),
        })
    }

    /// Serialises this task back into its storage row form.
    pub fn to_row(&self) -> Result<ActionRow, Error> {
        Ok(ActionRow {
            instance_action_id: self.instance_action_id.clone(),
            task_index: self.task_index,
            datacenter_vim_id: self.datacenter_vim_id.clone(),
            vim_id: self.vim_id.clone(),
            item: item_column(self.item).to_string(),
            item_id: self.item_id.clone(),
            action: action_column(self.action).to_string(),
            status: status_column(self.status).to_string(),
            extra: self.extra.encode()?,
            error_msg: self.error_msg.clone(),
            created_at: self.created_at.format(crate::db::DATETIME_FORMAT).to_string(),
            modified_at: self.modified_at.format(crate::db::DATETIME_FORMAT).to_string(),
        })
    }
}

fn action_column(action: Action) -> &'static str {
    match action {
        Action::Create => "CREATE",
        Action::Delete => "DELETE",
        Action::Find => "FIND",
    }
}

fn status_column(status: Status) -> &'static str {
    match status {
        Status::Scheduled => "SCHEDULED",
        Status::Build => "BUILD",
        Status::Done => "DONE",
        Status::Failed => "FAILED",
        Status::Superseded => "SUPERSEDED",
    }
}

fn parse_datetime(value: &str) -> Result<NaiveDateTime, Error> {
    NaiveDateTime::parse_from_str(value, crate::db::DATETIME_FORMAT)
        .map_err(|err| Error::MalformedRow(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extra_round_trips_through_yaml() {
        let mut extra = Extra::default();
        extra.tries = 2;
        extra.created = true;
        extra.depends_on.push(TaskRef::Local(0));
        extra.depends_on.push(TaskRef::Qualified {
            parent: "abc-123".to_string(),
            index: 1,
        });

        let encoded = extra.encode().unwrap();
        let decoded = Extra::decode(&encoded).unwrap();

        assert_eq!(decoded.tries, 2);
        assert!(decoded.created);
        assert_eq!(decoded.depends_on.len(), 2);
    }

    #[test]
    fn empty_extra_decodes_to_default() {
        let decoded = Extra::decode("").unwrap();
        assert_eq!(decoded.tries, 0);
        assert!(decoded.depends_on.is_empty());
    }

    #[test]
    fn dependency_satisfaction_requires_all_done() {
        let mut task = Task {
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
            created_at: parse_datetime("2026-01-01 00:00:00").unwrap(),
            modified_at: parse_datetime("2026-01-01 00:00:00").unwrap(),
            depends: HashMap::new(),
        };

        task.depends.insert(
            "TASK-0".to_string(),
            ResolvedDependency {
                instance_action_id: "a".into(),
                task_index: 0,
                status: Status::Build,
                vim_id: None,
            },
        );
        assert!(!task.dependencies_satisfied());
        assert!(!task.dependencies_failed());

        task.depends.get_mut("TASK-0").unwrap().status = Status::Done;
        assert!(task.dependencies_satisfied());

        task.depends.get_mut("TASK-0").unwrap().status = Status::Failed;
        assert!(task.dependencies_failed());
    }
}
