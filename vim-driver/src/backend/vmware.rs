use std::time::Duration;

use reqwest::blocking::Client;

use crate::backend::{map_http_error, pick_one};
use crate::error::{Error, VimDriverError};
use crate::models::{
    ClassificationSpec, NetStatus, NetworkFilter, NetworkRecord, NetworkSpec, SfSpec, SfiSpec,
    SfpSpec, VimStatus, VmInstanceSpec, VmStatus,
};
use crate::VimEndpoint;

/// Drives a VMware vCloud Director tenant.
///
/// Service Function Chaining is not modelled by vCloud Director; those methods return
/// [`VimDriverError::Other`].
pub struct VmwareDriver {
    endpoint: VimEndpoint,
    client: Client,
}

impl VmwareDriver {
    /// Builds a driver bound to the given organization/VDC.
    pub fn new(endpoint: VimEndpoint) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build the vCloud Director HTTP client");
        VmwareDriver { endpoint, client }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{path}", self.endpoint.url.trim_end_matches('/'))
    }

    fn unsupported(op: &str) -> Error {
        VimDriverError::Other(format!("{op} is not supported on vCloud Director")).into()
    }
}

impl crate::VimDriver for VmwareDriver {
    fn new_vminstance(&self, spec: &VmInstanceSpec) -> Result<(String, json::Value), Error> {
        let body = json::json!({ "name": spec.name, "vAppTemplate": spec.image_id, "sizingPolicy": spec.flavor_id });
        let resp = self
            .client
            .post(self.url("vApp/action/instantiate"))
            .basic_auth(&self.endpoint.user, Some(&self.endpoint.passwd))
            .json(&body)
            .send()?;
        if !resp.status().is_success() {
            return Err(map_http_error("vm", "", resp.status()));
        }
        let parsed: json::Value = resp.json()?;
        Ok((parsed["id"].as_str().unwrap_or_default().to_string(), json::json!({})))
    }

    fn delete_vminstance(&self, vim_id: &str, _created_items: &json::Value) -> Result<(), Error> {
        let resp = self
            .client
            .delete(self.url(&format!("vApp/{vim_id}")))
            .basic_auth(&self.endpoint.user, Some(&self.endpoint.passwd))
            .send()?;
        if resp.status().is_success() || resp.status() == reqwest::StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(map_http_error("vm", vim_id, resp.status()))
        }
    }

    fn new_network(&self, spec: &NetworkSpec) -> Result<NetworkRecord, Error> {
        let body = json::json!({ "name": spec.name, "isShared": spec.shared });
        let resp = self
            .client
            .post(self.url("admin/network/orgVdcNetwork"))
            .basic_auth(&self.endpoint.user, Some(&self.endpoint.passwd))
            .json(&body)
            .send()?;
        if !resp.status().is_success() {
            return Err(map_http_error("network", "", resp.status()));
        }
        let parsed: json::Value = resp.json()?;
        Ok(NetworkRecord {
            vim_id: parsed["id"].as_str().unwrap_or_default().to_string(),
            name: parsed["name"].as_str().unwrap_or_default().to_string(),
            vlan: None,
        })
    }

    fn get_network_list(&self, filter: &NetworkFilter) -> Result<Vec<NetworkRecord>, Error> {
        let mut req = self
            .client
            .get(self.url("admin/network/orgVdcNetworks"))
            .basic_auth(&self.endpoint.user, Some(&self.endpoint.passwd));
        if let Some(name) = &filter.name {
            req = req.query(&[("filter", format!("name=={name}"))]);
        }
        let resp = req.send()?;
        if !resp.status().is_success() {
            return Err(map_http_error("network", "", resp.status()));
        }
        let parsed: json::Value = resp.json()?;
        Ok(parsed["values"]
            .as_array()
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|n| NetworkRecord {
                vim_id: n["id"].as_str().unwrap_or_default().to_string(),
                name: n["name"].as_str().unwrap_or_default().to_string(),
                vlan: None,
            })
            .collect())
    }

    fn get_network(&self, filter: &NetworkFilter) -> Result<NetworkRecord, Error> {
        pick_one("network", self.get_network_list(filter)?)
    }

    fn delete_network(&self, vim_id: &str) -> Result<(), Error> {
        let resp = self
            .client
            .delete(self.url(&format!("admin/network/orgVdcNetwork/{vim_id}")))
            .basic_auth(&self.endpoint.user, Some(&self.endpoint.passwd))
            .send()?;
        if resp.status().is_success() || resp.status() == reqwest::StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(map_http_error("network", vim_id, resp.status()))
        }
    }

    fn refresh_vms_status(&self, vim_ids: &[String]) -> Result<Vec<VmStatus>, Error> {
        let mut out = Vec::with_capacity(vim_ids.len());
        for vim_id in vim_ids {
            let resp = self
                .client
                .get(self.url(&format!("vApp/{vim_id}")))
                .basic_auth(&self.endpoint.user, Some(&self.endpoint.passwd))
                .send()?;
            if !resp.status().is_success() {
                out.push(VmStatus {
                    vim_id: vim_id.clone(),
                    status: VimStatus::Error,
                    error_msg: Some(format!("status query failed: {}", resp.status())),
                    interfaces: Vec::new(),
                });
                continue;
            }
            let parsed: json::Value = resp.json()?;
            let status = match parsed["status"].as_str() {
                Some("4") | Some("POWERED_ON") => VimStatus::Active,
                Some("-1") | Some("FAILED_CREATION") => VimStatus::Error,
                _ => VimStatus::Build,
            };
            out.push(VmStatus { vim_id: vim_id.clone(), status, error_msg: None, interfaces: Vec::new() });
        }
        Ok(out)
    }

    fn refresh_nets_status(&self, vim_ids: &[String]) -> Result<Vec<NetStatus>, Error> {
        Ok(vim_ids
            .iter()
            .map(|vim_id| NetStatus {
                vim_id: vim_id.clone(),
                status: VimStatus::Active,
                error_msg: None,
                vlan: None,
            })
            .collect())
    }

    fn new_sfi(&self, _spec: &SfiSpec) -> Result<String, Error> {
        Err(Self::unsupported("new_sfi"))
    }

    fn delete_sfi(&self, _vim_id: &str) -> Result<(), Error> {
        Err(Self::unsupported("delete_sfi"))
    }

    fn new_sf(&self, _spec: &SfSpec) -> Result<String, Error> {
        Err(Self::unsupported("new_sf"))
    }

    fn delete_sf(&self, _vim_id: &str) -> Result<(), Error> {
        Err(Self::unsupported("delete_sf"))
    }

    fn new_classification(&self, _spec: &ClassificationSpec) -> Result<String, Error> {
        Err(Self::unsupported("new_classification"))
    }

    fn delete_classification(&self, _vim_id: &str) -> Result<(), Error> {
        Err(Self::unsupported("delete_classification"))
    }

    fn new_sfp(&self, _spec: &SfpSpec) -> Result<String, Error> {
        Err(Self::unsupported("new_sfp"))
    }

    fn delete_sfp(&self, _vim_id: &str) -> Result<(), Error> {
        Err(Self::unsupported("delete_sfp"))
    }
}
