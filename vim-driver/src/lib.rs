//! Polymorphic VIM (Virtualized Infrastructure Manager) driver interface.
//!
//! A per-tenant worker talks to exactly one VIM through this interface. The VIM family
//! (OpenStack, OpenVIM, VMware, OpenNebula, AWS) is resolved once at worker start-up from
//! configuration and the rest of the engine only ever sees the [`VimDriver`] trait.

pub mod config;
pub mod error;
pub mod models;

mod backend;

pub use backend::aws::AwsDriver;
pub use backend::opennebula::OpenNebulaDriver;
pub use backend::openstack::OpenStackDriver;
pub use backend::openvim::OpenVimDriver;
pub use backend::vmware::VmwareDriver;

use crate::error::Error;
use crate::models::{
    ClassificationSpec, NetStatus, NetworkFilter, NetworkRecord, NetworkSpec, SfSpec, SfiSpec,
    SfpSpec, VmInstanceSpec, VmStatus,
};

/// Connection parameters common to every VIM backend.
///
/// Mirrors the `(type, uuid, name, url, admin_url, tenant_name, tenant_id, user, passwd,
/// config, persistent_info)` tuple used to construct a VIM connector.
#[derive(Debug, Clone)]
pub struct VimEndpoint {
    /// The datacenter-VIM's own identifier, used to route tasks to this worker.
    pub uuid: String,
    /// A human-readable name for logging.
    pub name: String,
    /// The VIM's public API URL.
    pub url: String,
    /// The VIM's administrative API URL, if distinct from `url`.
    pub admin_url: Option<String>,
    /// The tenant/project name to operate within.
    pub tenant_name: String,
    /// The tenant/project id to operate within, if known ahead of authentication.
    pub tenant_id: Option<String>,
    /// The authentication user.
    pub user: String,
    /// The authentication password.
    pub passwd: String,
}

/// The required trait that any VIM driver must implement.
///
/// Every method is synchronous-looking but is expected to be backed by network I/O;
/// implementations internally use a blocking HTTP/SDK client as appropriate for the
/// backend and are called from the worker's blocking task pool.
pub trait VimDriver {
    /// Creates a new VM instance, returning its VIM-side id and any opaque
    /// driver-specific artifacts that must be kept around to delete it later.
    fn new_vminstance(&self, spec: &VmInstanceSpec) -> Result<(String, json::Value), Error>;
    /// Deletes a previously created VM instance. `NotFound` is treated as success by
    /// the caller.
    fn delete_vminstance(&self, vim_id: &str, created_items: &json::Value) -> Result<(), Error>;
    /// Creates a new network.
    fn new_network(&self, spec: &NetworkSpec) -> Result<NetworkRecord, Error>;
    /// Lists networks matching a filter.
    fn get_network_list(&self, filter: &NetworkFilter) -> Result<Vec<NetworkRecord>, Error>;
    /// Finds exactly one network matching a filter. Returns
    /// [`crate::error::VimDriverError::NotFound`] on zero matches and
    /// [`crate::error::VimDriverError::Ambiguous`] on more than one.
    fn get_network(&self, filter: &NetworkFilter) -> Result<NetworkRecord, Error>;
    /// Deletes a network. `NotFound` is treated as success by the caller.
    fn delete_network(&self, vim_id: &str) -> Result<(), Error>;
    /// Polls the current status of a batch of VMs in one round-trip where the backend
    /// supports it.
    fn refresh_vms_status(&self, vim_ids: &[String]) -> Result<Vec<VmStatus>, Error>;
    /// Polls the current status of a batch of networks in one round-trip where the
    /// backend supports it.
    fn refresh_nets_status(&self, vim_ids: &[String]) -> Result<Vec<NetStatus>, Error>;
    /// Creates a service function instance (one physical/virtual attachment point in a
    /// chain).
    fn new_sfi(&self, spec: &SfiSpec) -> Result<String, Error>;
    /// Deletes a service function instance. `NotFound` is treated as success.
    fn delete_sfi(&self, vim_id: &str) -> Result<(), Error>;
    /// Creates a service function (a named group of SFIs).
    fn new_sf(&self, spec: &SfSpec) -> Result<String, Error>;
    /// Deletes a service function. `NotFound` is treated as success.
    fn delete_sf(&self, vim_id: &str) -> Result<(), Error>;
    /// Creates a traffic classification rule.
    fn new_classification(&self, spec: &ClassificationSpec) -> Result<String, Error>;
    /// Deletes a traffic classification rule. `NotFound` is treated as success.
    fn delete_classification(&self, vim_id: &str) -> Result<(), Error>;
    /// Creates a service function path.
    fn new_sfp(&self, spec: &SfpSpec) -> Result<String, Error>;
    /// Deletes a service function path. `NotFound` is treated as success.
    fn delete_sfp(&self, vim_id: &str) -> Result<(), Error>;
}

/// The VIM driver family currently in use by a worker.
///
/// One variant per supported infrastructure backend; the rest of the engine interacts
/// with this type exclusively through the [`VimDriver`] trait.
pub enum VimConnector {
    /// Drives an OpenStack tenant through its Compute/Network APIs.
    OpenStack(OpenStackDriver),
    /// Drives an OpenVIM deployment through its native REST API.
    OpenVim(OpenVimDriver),
    /// Drives a VMware vCloud Director / vSphere tenant.
    Vmware(VmwareDriver),
    /// Drives an OpenNebula deployment through its XML-RPC API.
    OpenNebula(OpenNebulaDriver),
    /// Drives an AWS account/region through its EC2/VPC APIs.
    Aws(AwsDriver),
}

impl VimDriver for VimConnector {
    fn new_vminstance(&self, spec: &VmInstanceSpec) -> Result<(String, json::Value), Error> {
        match self {
            VimConnector::OpenStack(d) => d.new_vminstance(spec),
            VimConnector::OpenVim(d) => d.new_vminstance(spec),
            VimConnector::Vmware(d) => d.new_vminstance(spec),
            VimConnector::OpenNebula(d) => d.new_vminstance(spec),
            VimConnector::Aws(d) => d.new_vminstance(spec),
        }
    }

    fn delete_vminstance(&self, vim_id: &str, created_items: &json::Value) -> Result<(), Error> {
        match self {
            VimConnector::OpenStack(d) => d.delete_vminstance(vim_id, created_items),
            VimConnector::OpenVim(d) => d.delete_vminstance(vim_id, created_items),
            VimConnector::Vmware(d) => d.delete_vminstance(vim_id, created_items),
            VimConnector::OpenNebula(d) => d.delete_vminstance(vim_id, created_items),
            VimConnector::Aws(d) => d.delete_vminstance(vim_id, created_items),
        }
    }

    fn new_network(&self, spec: &NetworkSpec) -> Result<NetworkRecord, Error> {
        match self {
            VimConnector::OpenStack(d) => d.new_network(spec),
            VimConnector::OpenVim(d) => d.new_network(spec),
            VimConnector::Vmware(d) => d.new_network(spec),
            VimConnector::OpenNebula(d) => d.new_network(spec),
            VimConnector::Aws(d) => d.new_network(spec),
        }
    }

    fn get_network_list(&self, filter: &NetworkFilter) -> Result<Vec<NetworkRecord>, Error> {
        match self {
            VimConnector::OpenStack(d) => d.get_network_list(filter),
            VimConnector::OpenVim(d) => d.get_network_list(filter),
            VimConnector::Vmware(d) => d.get_network_list(filter),
            VimConnector::OpenNebula(d) => d.get_network_list(filter),
            VimConnector::Aws(d) => d.get_network_list(filter),
        }
    }

    fn get_network(&self, filter: &NetworkFilter) -> Result<NetworkRecord, Error> {
        match self {
            VimConnector::OpenStack(d) => d.get_network(filter),
            VimConnector::OpenVim(d) => d.get_network(filter),
            VimConnector::Vmware(d) => d.get_network(filter),
            VimConnector::OpenNebula(d) => d.get_network(filter),
            VimConnector::Aws(d) => d.get_network(filter),
        }
    }

    fn delete_network(&self, vim_id: &str) -> Result<(), Error> {
        match self {
            VimConnector::OpenStack(d) => d.delete_network(vim_id),
            VimConnector::OpenVim(d) => d.delete_network(vim_id),
            VimConnector::Vmware(d) => d.delete_network(vim_id),
            VimConnector::OpenNebula(d) => d.delete_network(vim_id),
            VimConnector::Aws(d) => d.delete_network(vim_id),
        }
    }

    fn refresh_vms_status(&self, vim_ids: &[String]) -> Result<Vec<VmStatus>, Error> {
        match self {
            VimConnector::OpenStack(d) => d.refresh_vms_status(vim_ids),
            VimConnector::OpenVim(d) => d.refresh_vms_status(vim_ids),
            VimConnector::Vmware(d) => d.refresh_vms_status(vim_ids),
            VimConnector::OpenNebula(d) => d.refresh_vms_status(vim_ids),
            VimConnector::Aws(d) => d.refresh_vms_status(vim_ids),
        }
    }

    fn refresh_nets_status(&self, vim_ids: &[String]) -> Result<Vec<NetStatus>, Error> {
        match self {
            VimConnector::OpenStack(d) => d.refresh_nets_status(vim_ids),
            VimConnector::OpenVim(d) => d.refresh_nets_status(vim_ids),
            VimConnector::Vmware(d) => d.refresh_nets_status(vim_ids),
            VimConnector::OpenNebula(d) => d.refresh_nets_status(vim_ids),
            VimConnector::Aws(d) => d.refresh_nets_status(vim_ids),
        }
    }

    fn new_sfi(&self, spec: &SfiSpec) -> Result<String, Error> {
        match self {
            VimConnector::OpenStack(d) => d.new_sfi(spec),
            VimConnector::OpenVim(d) => d.new_sfi(spec),
            VimConnector::Vmware(d) => d.new_sfi(spec),
            VimConnector::OpenNebula(d) => d.new_sfi(spec),
            VimConnector::Aws(d) => d.new_sfi(spec),
        }
    }

    fn delete_sfi(&self, vim_id: &str) -> Result<(), Error> {
        match self {
            VimConnector::OpenStack(d) => d.delete_sfi(vim_id),
            VimConnector::OpenVim(d) => d.delete_sfi(vim_id),
            VimConnector::Vmware(d) => d.delete_sfi(vim_id),
            VimConnector::OpenNebula(d) => d.delete_sfi(vim_id),
            VimConnector::Aws(d) => d.delete_sfi(vim_id),
        }
    }

    fn new_sf(&self, spec: &SfSpec) -> Result<String, Error> {
        match self {
            VimConnector::OpenStack(d) => d.new_sf(spec),
            VimConnector::OpenVim(d) => d.new_sf(spec),
            VimConnector::Vmware(d) => d.new_sf(spec),
            VimConnector::OpenNebula(d) => d.new_sf(spec),
            VimConnector::Aws(d) => d.new_sf(spec),
        }
    }

    fn delete_sf(&self, vim_id: &str) -> Result<(), Error> {
        match self {
            VimConnector::OpenStack(d) => d.delete_sf(vim_id),
            VimConnector::OpenVim(d) => d.delete_sf(vim_id),
            VimConnector::Vmware(d) => d.delete_sf(vim_id),
            VimConnector::OpenNebula(d) => d.delete_sf(vim_id),
            VimConnector::Aws(d) => d.delete_sf(vim_id),
        }
    }

    fn new_classification(&self, spec: &ClassificationSpec) -> Result<String, Error> {
        match self {
            VimConnector::OpenStack(d) => d.new_classification(spec),
            VimConnector::OpenVim(d) => d.new_classification(spec),
            VimConnector::Vmware(d) => d.new_classification(spec),
            VimConnector::OpenNebula(d) => d.new_classification(spec),
            VimConnector::Aws(d) => d.new_classification(spec),
        }
    }

    fn delete_classification(&self, vim_id: &str) -> Result<(), Error> {
        match self {
            VimConnector::OpenStack(d) => d.delete_classification(vim_id),
            VimConnector::OpenVim(d) => d.delete_classification(vim_id),
            VimConnector::Vmware(d) => d.delete_classification(vim_id),
            VimConnector::OpenNebula(d) => d.delete_classification(vim_id),
            VimConnector::Aws(d) => d.delete_classification(vim_id),
        }
    }

    fn new_sfp(&self, spec: &SfpSpec) -> Result<String, Error> {
        match self {
            VimConnector::OpenStack(d) => d.new_sfp(spec),
            VimConnector::OpenVim(d) => d.new_sfp(spec),
            VimConnector::Vmware(d) => d.new_sfp(spec),
            VimConnector::OpenNebula(d) => d.new_sfp(spec),
            VimConnector::Aws(d) => d.new_sfp(spec),
        }
    }

    fn delete_sfp(&self, vim_id: &str) -> Result<(), Error> {
        match self {
            VimConnector::OpenStack(d) => d.delete_sfp(vim_id),
            VimConnector::OpenVim(d) => d.delete_sfp(vim_id),
            VimConnector::Vmware(d) => d.delete_sfp(vim_id),
            VimConnector::OpenNebula(d) => d.delete_sfp(vim_id),
            VimConnector::Aws(d) => d.delete_sfp(vim_id),
        }
    }
}
