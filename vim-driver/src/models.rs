use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The lifecycle status a VIM reports for a VM, network, or SFC element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VimStatus {
    /// The object is still being provisioned.
    Build,
    /// The object is up and reachable.
    Active,
    /// The VIM reported a failure for this object.
    Error,
}

/// A single virtual network interface attached to a VM, as requested at creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceSpec {
    /// The network this interface is attached to (a VIM-side network id).
    pub net_id: String,
    /// Requested MAC address, if pinned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
    /// Whether this interface should carry the VM's management IP.
    #[serde(default)]
    pub mgmt: bool,
}

/// Parameters for [`crate::VimDriver::new_vminstance`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmInstanceSpec {
    /// Requested display name of the instance.
    pub name: String,
    /// VIM flavor/instance-type id.
    pub flavor_id: String,
    /// VIM image id to boot from.
    pub image_id: String,
    /// Interfaces to attach at boot.
    pub interfaces: Vec<InterfaceSpec>,
}

/// VIM-observed state of one interface, returned by a refresh call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceState {
    /// The VIM-side interface id.
    pub vim_interface_id: String,
    /// Observed MAC address.
    pub mac_address: String,
    /// Observed IP address, if assigned.
    pub ip_address: Option<String>,
    /// Compute-node PCI address backing this interface, if SR-IOV/passthrough.
    pub pci_address: Option<String>,
    /// VLAN tag observed on this interface, if any.
    pub vlan: Option<u16>,
}

/// VIM-observed state of one VM, returned by [`crate::VimDriver::refresh_vms_status`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmStatus {
    /// The VIM-side VM id this status is about.
    pub vim_id: String,
    /// Current lifecycle status.
    pub status: VimStatus,
    /// Error detail, populated when `status == Error`.
    pub error_msg: Option<String>,
    /// Observed interface states, keyed by the interface's local index.
    pub interfaces: Vec<InterfaceState>,
}

/// VIM-observed state of one network, returned by [`crate::VimDriver::refresh_nets_status`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetStatus {
    /// The VIM-side network id this status is about.
    pub vim_id: String,
    /// Current lifecycle status.
    pub status: VimStatus,
    /// Error detail, populated when `status == Error`.
    pub error_msg: Option<String>,
    /// VLAN segmentation id, if the network is of a segmented type.
    pub vlan: Option<u16>,
}

/// Parameters for [`crate::VimDriver::new_network`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSpec {
    /// Requested display name of the network.
    pub name: String,
    /// Network type as understood by the VIM (`bridge`, `data`, `ptp`, ...).
    pub net_type: String,
    /// Whether this network should be reachable outside the VIM tenant.
    #[serde(default)]
    pub shared: bool,
    /// Free-form VIM-specific options (subnet CIDR, provider network name, etc...).
    #[serde(default)]
    pub options: HashMap<String, String>,
}

/// A filter used by [`crate::VimDriver::get_network`] / [`crate::VimDriver::get_network_list`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkFilter {
    /// Match by exact name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Match by VIM-side id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vim_id: Option<String>,
}

/// A network as reported back by a FIND/list query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkRecord {
    /// The VIM-side network id.
    pub vim_id: String,
    /// The network's name, as reported by the VIM.
    pub name: String,
    /// VLAN segmentation id, if the network is of a segmented type.
    pub vlan: Option<u16>,
}

/// Parameters for the Service Function Chaining family of operations (§4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SfiSpec {
    /// Requested display name.
    pub name: String,
    /// VIM-side id of the ingress port.
    pub ingress_port_id: String,
    /// VIM-side id of the egress port.
    pub egress_port_id: String,
}

/// Parameters for creating a service function (a group of one or more SFIs).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SfSpec {
    /// Requested display name.
    pub name: String,
    /// VIM-side ids of the SFIs forming this service function, in order.
    pub sfi_ids: Vec<String>,
}

/// Parameters for creating a traffic classification rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationSpec {
    /// Requested display name.
    pub name: String,
    /// Flow-classifier match parameters (protocol, ports, CIDRs, ...).
    #[serde(default)]
    pub match_params: HashMap<String, String>,
}

/// Parameters for creating a service function path linking classifications to functions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SfpSpec {
    /// Requested display name.
    pub name: String,
    /// VIM-side ids of the service functions forming the chain, in order.
    pub sf_ids: Vec<String>,
    /// VIM-side ids of the classifications steering traffic into this path.
    pub classification_ids: Vec<String>,
}
