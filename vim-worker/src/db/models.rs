use serde::{Deserialize, Serialize};

use crate::db::schema::*;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Insertable, AsChangeset)]
#[table_name = "instance_actions"]
#[primary_key(uuid)]
/// The parent high-level action a batch of tasks belongs to.
pub struct InstanceAction {
    /// The parent action's opaque identifier.
    pub uuid: String,
    /// Number of child tasks that reached DONE.
    pub number_done: i64,
    /// Number of child tasks that reached FAILED.
    pub number_failed: i64,
    /// Last time any child task of this action changed state.
    pub modified_at: String,
}

#[derive(
    Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Insertable, Identifiable, AsChangeset,
)]
#[table_name = "vim_wim_actions"]
#[primary_key(instance_action_id, task_index)]
/// A single task row, as stored in the action table.
pub struct ActionRow {
    /// The parent action this task belongs to.
    pub instance_action_id: String,
    /// The task's index within its parent, unique per parent.
    pub task_index: i32,
    /// Routes this task to exactly one worker.
    pub datacenter_vim_id: String,
    /// The VIM-side identifier, once known.
    pub vim_id: Option<String>,
    /// The logical item category (`"vms"`, `"nets"`, `"sfis"`, ...).
    pub item: String,
    /// Opaque id of the logical object in the local store.
    pub item_id: String,
    /// CREATE, DELETE or FIND.
    pub action: String,
    /// SCHEDULED, BUILD, DONE, FAILED or SUPERSEDED.
    pub status: String,
    /// The task's structured payload, serialised as YAML.
    pub extra: String,
    /// Truncated error message, if the task failed.
    pub error_msg: Option<String>,
    /// Creation timestamp.
    pub created_at: String,
    /// Last modification timestamp; also the refresh-queue sort key.
    pub modified_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Insertable, AsChangeset)]
#[table_name = "instance_vms"]
#[primary_key(item_id)]
/// Per-item state for a VM instance.
pub struct VmRow {
    /// The logical VM's id in the local store.
    pub item_id: String,
    /// The VIM-side VM id.
    pub vim_vm_id: Option<String>,
    /// BUILD, ACTIVE, ERROR or VIM_ERROR.
    pub status: String,
    /// Last known error message, if any.
    pub error_msg: Option<String>,
    /// Opaque VIM-reported detail blob (JSON).
    pub vim_info: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Insertable, AsChangeset)]
#[table_name = "instance_nets"]
#[primary_key(item_id)]
/// Per-item state for a network.
pub struct NetRow {
    /// The logical network's id in the local store.
    pub item_id: String,
    /// The VIM-side network id.
    pub vim_net_id: Option<String>,
    /// The mirrored SDN overlay network id, if any.
    pub sdn_net_id: Option<String>,
    /// BUILD, ACTIVE, ERROR or VIM_ERROR.
    pub status: String,
    /// Last known error message, if any.
    pub error_msg: Option<String>,
    /// Opaque VIM-reported detail blob (JSON).
    pub vim_info: Option<String>,
    /// Whether this worker created the VIM-side object (and thus owns its deletion).
    pub created: bool,
}

#[derive(
    Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Insertable, Identifiable, AsChangeset,
)]
#[table_name = "instance_interfaces"]
#[primary_key(item_id, iface_name)]
/// Per-interface state, one row per VM NIC.
pub struct InterfaceRow {
    /// The owning VM's logical id.
    pub item_id: String,
    /// The interface's name within its VM.
    pub iface_name: String,
    /// The VIM-reported interface id.
    pub vim_interface_id: Option<String>,
    /// The interface's MAC address.
    pub mac_address: Option<String>,
    /// The interface's assigned IP address.
    pub ip_address: Option<String>,
    /// The interface's VLAN tag, if segmented.
    pub vlan: Option<i32>,
    /// The compute node's PCI address the interface is bound to, if known.
    pub pci: Option<String>,
    /// The mirrored SDN external port id, if any.
    pub sdn_port_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Insertable, AsChangeset)]
#[table_name = "instance_sfis"]
#[primary_key(item_id)]
/// Per-item state for a service function instance.
pub struct SfiRow {
    /// The logical SFI's id in the local store.
    pub item_id: String,
    /// The VIM-side SFI id.
    pub vim_sfi_id: Option<String>,
    /// BUILD, ACTIVE, ERROR or VIM_ERROR.
    pub status: String,
    /// Last known error message, if any.
    pub error_msg: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Insertable, AsChangeset)]
#[table_name = "instance_sfs"]
#[primary_key(item_id)]
/// Per-item state for a service function.
pub struct SfRow {
    /// The logical SF's id in the local store.
    pub item_id: String,
    /// The VIM-side SF id.
    pub vim_sf_id: Option<String>,
    /// BUILD, ACTIVE, ERROR or VIM_ERROR.
    pub status: String,
    /// Last known error message, if any.
    pub error_msg: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Insertable, AsChangeset)]
#[table_name = "instance_classifications"]
#[primary_key(item_id)]
/// Per-item state for a classification.
pub struct ClassificationRow {
    /// The logical classification's id in the local store.
    pub item_id: String,
    /// The VIM-side classification id.
    pub vim_classification_id: Option<String>,
    /// BUILD, ACTIVE, ERROR or VIM_ERROR.
    pub status: String,
    /// Last known error message, if any.
    pub error_msg: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Insertable, AsChangeset)]
#[table_name = "instance_sfps"]
#[primary_key(item_id)]
/// Per-item state for a service function path.
pub struct SfpRow {
    /// The logical SFP's id in the local store.
    pub item_id: String,
    /// The VIM-side SFP id.
    pub vim_sfp_id: Option<String>,
    /// BUILD, ACTIVE, ERROR or VIM_ERROR.
    pub status: String,
    /// Last known error message, if any.
    pub error_msg: Option<String>,
}
