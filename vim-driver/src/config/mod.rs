use serde::{Deserialize, Serialize};

use crate::{AwsDriver, OpenNebulaDriver, OpenStackDriver, OpenVimDriver, VimConnector, VimEndpoint, VmwareDriver};

/// The configuration struct selecting and parameterizing a VIM driver.
///
/// ```toml
/// [vim]
/// type = "openstack"
/// uuid = "cc9ae89e-..."
/// name = "site-a"
/// url = "https://keystone.site-a.example.org:5000/v3"
/// tenant-name = "osm"
/// user = "osm"
/// passwd = "secret"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum VimDriverConfig {
    /// Drive an OpenStack tenant.
    OpenStack(VimEndpointConfig),
    /// Drive an OpenVIM deployment.
    OpenVim(VimEndpointConfig),
    /// Drive a VMware tenant.
    Vmware(VimEndpointConfig),
    /// Drive an OpenNebula deployment.
    OpenNebula(VimEndpointConfig),
    /// Drive an AWS account/region.
    Aws(VimEndpointConfig),
}

/// Common connection parameters shared by every VIM backend's configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VimEndpointConfig {
    /// The datacenter-VIM's own identifier, used to route tasks to this worker.
    pub uuid: String,
    /// A human-readable name for logging.
    pub name: String,
    /// The VIM's public API URL.
    pub url: String,
    /// The VIM's administrative API URL, if distinct from `url`.
    #[serde(default)]
    pub admin_url: Option<String>,
    /// The tenant/project name to operate within.
    pub tenant_name: String,
    /// The tenant/project id to operate within, if known ahead of authentication.
    #[serde(default)]
    pub tenant_id: Option<String>,
    /// The authentication user.
    pub user: String,
    /// The authentication password.
    pub passwd: String,
}

impl From<VimEndpointConfig> for VimEndpoint {
    fn from(config: VimEndpointConfig) -> VimEndpoint {
        VimEndpoint {
            uuid: config.uuid,
            name: config.name,
            url: config.url,
            admin_url: config.admin_url,
            tenant_name: config.tenant_name,
            tenant_id: config.tenant_id,
            user: config.user,
            passwd: config.passwd,
        }
    }
}

impl From<VimDriverConfig> for VimConnector {
    fn from(config: VimDriverConfig) -> VimConnector {
        match config {
            VimDriverConfig::OpenStack(endpoint) => {
                VimConnector::OpenStack(OpenStackDriver::new(endpoint.into()))
            }
            VimDriverConfig::OpenVim(endpoint) => {
                VimConnector::OpenVim(OpenVimDriver::new(endpoint.into()))
            }
            VimDriverConfig::Vmware(endpoint) => {
                VimConnector::Vmware(VmwareDriver::new(endpoint.into()))
            }
            VimDriverConfig::OpenNebula(endpoint) => {
                VimConnector::OpenNebula(OpenNebulaDriver::new(endpoint.into()))
            }
            VimDriverConfig::Aws(endpoint) => VimConnector::Aws(AwsDriver::new(endpoint.into())),
        }
    }
}
