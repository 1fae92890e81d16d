//! Minimal client for the SDN overlay controller that stitches VLAN-tagged
//! ports across compute nodes for `data`/`ptp` networks.
//!
//! Unlike the VIM driver, there is exactly one overlay backend, so this is a
//! plain struct rather than a trait/enum pair. Call sites share one client
//! behind an `Arc` and only ever call it from inside a `spawn_blocking`
//! closure that owns a clone, so no internal locking is needed.

use serde::{Deserialize, Serialize};

use crate::config::SdnConfig;
use crate::error::TaskError;

/// The status of an SDN-side network or port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OverlayStatus {
    /// Still converging.
    Build,
    /// Converged and usable.
    Active,
    /// The overlay reported a failure.
    Error,
}

/// A VLAN-tagged overlay network mirrored from a VIM-side network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlayNetwork {
    /// The overlay-side network id.
    pub sdn_net_id: String,
    /// The VLAN segmentation id shared with the VIM-side network.
    pub vlan: u16,
}

/// Combined status for a network that is mirrored on the overlay, merging
/// the VIM-reported status with the overlay's own.
#[derive(Debug, Clone)]
pub struct CombinedStatus {
    /// The resulting status after combination.
    pub status: OverlayStatus,
    /// Concatenated error message, if either side reported one.
    pub error_msg: Option<String>,
}

/// A thin REST client for the SDN overlay controller.
pub struct SdnClient {
    base_url: String,
    user: String,
    passwd: String,
    wim_external_ports: bool,
    client: reqwest::blocking::Client,
}

impl SdnClient {
    /// Builds a client from its configuration.
    pub fn new(config: SdnConfig) -> SdnClient {
        SdnClient {
            base_url: config.url,
            user: config.user,
            passwd: config.passwd,
            wim_external_ports: config.wim_external_ports,
            client: reqwest::blocking::Client::new(),
        }
    }

    /// Whether `data`/`ptp` network CREATE should also attach a WAN-fallback
    /// external port for the network's WIM account, per `[sdn].wim_external_ports`.
    pub fn wim_external_ports_enabled(&self) -> bool {
        self.wim_external_ports
    }

    /// Mirrors a VIM-side network onto the overlay with the given VLAN segmentation.
    pub fn create_network(&self, name: &str, vlan: u16) -> Result<OverlayNetwork, TaskError> {
        #[derive(Serialize)]
        struct Body<'a> {
            name: &'a str,
            vlan: u16,
        }

        let resp = self
            .client
            .post(format!("{}/networks", self.base_url))
            .basic_auth(&self.user, Some(&self.passwd))
            .json(&Body { name, vlan })
            .send()
            .map_err(|err| TaskError::OverlayError(err.to_string()))?;

        if !resp.status().is_success() {
            return Err(TaskError::OverlayError(format!(
                "overlay rejected network creation: HTTP {}",
                resp.status()
            )));
        }

        resp.json().map_err(|err| TaskError::OverlayError(err.to_string()))
    }

    /// Deletes a mirrored overlay network. Missing networks are treated as success.
    pub fn delete_network(&self, sdn_net_id: &str) -> Result<(), TaskError> {
        let resp = self
            .client
            .delete(format!("{}/networks/{}", self.base_url, sdn_net_id))
            .basic_auth(&self.user, Some(&self.passwd))
            .send()
            .map_err(|err| TaskError::OverlayError(err.to_string()))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND || resp.status().is_success() {
            return Ok(());
        }
        Err(TaskError::OverlayError(format!(
            "overlay rejected network deletion: HTTP {}",
            resp.status()
        )))
    }

    /// Creates an external port on the overlay, binding `compute_node` (a
    /// compute-node identifier, or the `"__WIM:<name>"`/`"__WIM"` pseudo
    /// locations used for the WAN fallback) to `sdn_net_id`.
    pub fn create_external_port(
        &self,
        sdn_net_id: &str,
        compute_node: &str,
        vlan: u16,
    ) -> Result<String, TaskError> {
        #[derive(Serialize)]
        struct Body<'a> {
            network: &'a str,
            compute_node: &'a str,
            vlan: u16,
        }
        #[derive(Deserialize)]
        struct PortId {
            id: String,
        }

        let resp = self
            .client
            .post(format!("{}/external-ports", self.base_url))
            .basic_auth(&self.user, Some(&self.passwd))
            .json(&Body { network: sdn_net_id, compute_node, vlan })
            .send()
            .map_err(|err| TaskError::OverlayError(err.to_string()))?;

        if !resp.status().is_success() {
            return Err(TaskError::OverlayError(format!(
                "overlay rejected external port creation: HTTP {}",
                resp.status()
            )));
        }

        let port: PortId = resp.json().map_err(|err| TaskError::OverlayError(err.to_string()))?;
        Ok(port.id)
    }

    /// Deletes an overlay external port. Missing ports are treated as success.
    pub fn delete_external_port(&self, sdn_port_id: &str) -> Result<(), TaskError> {
        let resp = self
            .client
            .delete(format!("{}/external-ports/{}", self.base_url, sdn_port_id))
            .basic_auth(&self.user, Some(&self.passwd))
            .send()
            .map_err(|err| TaskError::OverlayError(err.to_string()))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND || resp.status().is_success() {
            return Ok(());
        }
        Err(TaskError::OverlayError(format!(
            "overlay rejected external port deletion: HTTP {}",
            resp.status()
        )))
    }

    /// Lists every external port currently bound to `sdn_net_id`, so a
    /// network DELETE can clean up ports that were attached to it outside
    /// of a VM interface (e.g. the WAN fallback port, or one attached
    /// manually). Mirrors `ovim.get_ports(filter={name: external_port, net_id})`.
    pub fn list_external_ports(&self, sdn_net_id: &str) -> Result<Vec<String>, TaskError> {
        #[derive(Deserialize)]
        struct Port {
            id: String,
        }

        let resp = self
            .client
            .get(format!("{}/networks/{}/external-ports", self.base_url, sdn_net_id))
            .basic_auth(&self.user, Some(&self.passwd))
            .send()
            .map_err(|err| TaskError::OverlayError(err.to_string()))?;

        if !resp.status().is_success() {
            return Err(TaskError::OverlayError(format!(
                "overlay rejected external port listing: HTTP {}",
                resp.status()
            )));
        }

        let ports: Vec<Port> = resp.json().map_err(|err| TaskError::OverlayError(err.to_string()))?;
        Ok(ports.into_iter().map(|port| port.id).collect())
    }

    /// Polls an overlay network's current status.
    pub fn get_network_status(&self, sdn_net_id: &str) -> Result<CombinedStatus, TaskError> {
        #[derive(Deserialize)]
        struct StatusBody {
            status: OverlayStatus,
            error_msg: Option<String>,
        }

        let resp = self
            .client
            .get(format!("{}/networks/{}/status", self.base_url, sdn_net_id))
            .basic_auth(&self.user, Some(&self.passwd))
            .send()
            .map_err(|err| TaskError::OverlayError(err.to_string()))?;

        if !resp.status().is_success() {
            return Err(TaskError::OverlayError(format!(
                "overlay rejected status query: HTTP {}",
                resp.status()
            )));
        }

        let body: StatusBody = resp.json().map_err(|err| TaskError::OverlayError(err.to_string()))?;
        Ok(CombinedStatus {
            status: body.status,
            error_msg: body.error_msg,
        })
    }
}

/// Combines a VIM-reported status with an overlay status per the rule that
/// any SDN `ERROR` elevates the overall status to `ERROR` (with a concatenated
/// message) and an SDN `BUILD` downgrades an otherwise `ACTIVE` result to `BUILD`.
pub fn combine_status(
    vim_status: OverlayStatus,
    vim_error: Option<&str>,
    overlay: &CombinedStatus,
) -> CombinedStatus {
    if overlay.status == OverlayStatus::Error {
        let message = [vim_error, overlay.error_msg.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join("; ");
        return CombinedStatus {
            status: OverlayStatus::Error,
            error_msg: if message.is_empty() { None } else { Some(message) },
        };
    }

    if vim_status == OverlayStatus::Active && overlay.status == OverlayStatus::Build {
        return CombinedStatus {
            status: OverlayStatus::Build,
            error_msg: vim_error.map(str::to_string),
        };
    }

    CombinedStatus {
        status: vim_status,
        error_msg: vim_error.map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_error_elevates_to_error() {
        let overlay = CombinedStatus {
            status: OverlayStatus::Error,
            error_msg: Some("overlay down".to_string()),
        };
        let combined = combine_status(OverlayStatus::Active, None, &overlay);
        assert_eq!(combined.status, OverlayStatus::Error);
        assert_eq!(combined.error_msg.as_deref(), Some("overlay down"));
    }

    #[test]
    fn overlay_build_downgrades_active() {
        let overlay = CombinedStatus { status: OverlayStatus::Build, error_msg: None };
        let combined = combine_status(OverlayStatus::Active, None, &overlay);
        assert_eq!(combined.status, OverlayStatus::Build);
    }

    #[test]
    fn overlay_active_keeps_vim_status() {
        let overlay = CombinedStatus { status: OverlayStatus::Active, error_msg: None };
        let combined = combine_status(OverlayStatus::Build, None, &overlay);
        assert_eq!(combined.status, OverlayStatus::Build);
    }
}
