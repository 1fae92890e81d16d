use std::time::Duration;

use reqwest::blocking::Client;

use crate::backend::{map_http_error, pick_one};
use crate::error::{Error, VimDriverError};
use crate::models::{
    ClassificationSpec, NetStatus, NetworkFilter, NetworkRecord, NetworkSpec, SfSpec, SfiSpec,
    SfpSpec, VimStatus, VmInstanceSpec, VmStatus,
};
use crate::VimEndpoint;

/// Drives an OpenNebula deployment through its XML-RPC-over-HTTP API.
///
/// SFC is not modelled by OpenNebula; those methods return [`VimDriverError::Other`].
pub struct OpenNebulaDriver {
    endpoint: VimEndpoint,
    client: Client,
}

impl OpenNebulaDriver {
    /// Builds a driver bound to the given tenant.
    pub fn new(endpoint: VimEndpoint) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build the OpenNebula HTTP client");
        OpenNebulaDriver { endpoint, client }
    }

    fn unsupported(op: &str) -> Error {
        VimDriverError::Other(format!("{op} is not supported on OpenNebula")).into()
    }
}

impl crate::VimDriver for OpenNebulaDriver {
    fn new_vminstance(&self, spec: &VmInstanceSpec) -> Result<(String, json::Value), Error> {
        let body = json::json!({
            "method": "one.vm.allocate",
            "params": [spec.name, spec.flavor_id, spec.image_id],
        });
        let resp = self
            .client
            .post(&self.endpoint.url)
            .basic_auth(&self.endpoint.user, Some(&self.endpoint.passwd))
            .json(&body)
            .send()?;
        if !resp.status().is_success() {
            return Err(map_http_error("vm", "", resp.status()));
        }
        let parsed: json::Value = resp.json()?;
        Ok((parsed["id"].as_i64().unwrap_or_default().to_string(), json::json!({})))
    }

    fn delete_vminstance(&self, vim_id: &str, _created_items: &json::Value) -> Result<(), Error> {
        let body = json::json!({ "method": "one.vm.recover", "params": [vim_id, 3] });
        let resp = self
            .client
            .post(&self.endpoint.url)
            .basic_auth(&self.endpoint.user, Some(&self.endpoint.passwd))
            .json(&body)
            .send()?;
        if resp.status().is_success() || resp.status() == reqwest::StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(map_http_error("vm", vim_id, resp.status()))
        }
    }

    fn new_network(&self, spec: &NetworkSpec) -> Result<NetworkRecord, Error> {
        let body = json::json!({ "method": "one.vn.allocate", "params": [spec.name] });
        let resp = self
            .client
            .post(&self.endpoint.url)
            .basic_auth(&self.endpoint.user, Some(&self.endpoint.passwd))
            .json(&body)
            .send()?;
        if !resp.status().is_success() {
            return Err(map_http_error("network", "", resp.status()));
        }
        let parsed: json::Value = resp.json()?;
        Ok(NetworkRecord {
            vim_id: parsed["id"].as_i64().unwrap_or_default().to_string(),
            name: spec.name.clone(),
            vlan: None,
        })
    }

    fn get_network_list(&self, filter: &NetworkFilter) -> Result<Vec<NetworkRecord>, Error> {
        let body = json::json!({ "method": "one.vnpool.info", "params": [] });
        let resp = self
            .client
            .post(&self.endpoint.url)
            .basic_auth(&self.endpoint.user, Some(&self.endpoint.passwd))
            .json(&body)
            .send()?;
        if !resp.status().is_success() {
            return Err(map_http_error("network", "", resp.status()));
        }
        let parsed: json::Value = resp.json()?;
        let mut records: Vec<NetworkRecord> = parsed["vnets"]
            .as_array()
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|n| NetworkRecord {
                vim_id: n["id"].as_i64().unwrap_or_default().to_string(),
                name: n["name"].as_str().unwrap_or_default().to_string(),
                vlan: n["vlan_id"].as_u64().map(|v| v as u16),
            })
            .collect();
        if let Some(name) = &filter.name {
            records.retain(|r| &r.name == name);
        }
        if let Some(vim_id) = &filter.vim_id {
            records.retain(|r| &r.vim_id == vim_id);
        }
        Ok(records)
    }

    fn get_network(&self, filter: &NetworkFilter) -> Result<NetworkRecord, Error> {
        pick_one("network", self.get_network_list(filter)?)
    }

    fn delete_network(&self, vim_id: &str) -> Result<(), Error> {
        let body = json::json!({ "method": "one.vn.delete", "params": [vim_id] });
        let resp = self
            .client
            .post(&self.endpoint.url)
            .basic_auth(&self.endpoint.user, Some(&self.endpoint.passwd))
            .json(&body)
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
            let body = json::json!({ "method": "one.vm.info", "params": [vim_id] });
            let resp = self
                .client
                .post(&self.endpoint.url)
                .basic_auth(&self.endpoint.user, Some(&self.endpoint.passwd))
                .json(&body)
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
            let status = match parsed["lcm_state"].as_i64() {
                Some(3) => VimStatus::Active,
                Some(36) => VimStatus::Error,
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
