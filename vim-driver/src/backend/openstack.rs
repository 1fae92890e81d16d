use std::time::Duration;

use reqwest::blocking::Client;

use crate::backend::{map_http_error, pick_one};
use crate::error::Error;
use crate::models::{
    ClassificationSpec, NetStatus, NetworkFilter, NetworkRecord, NetworkSpec, SfSpec, SfiSpec,
    SfpSpec, VimStatus, VmInstanceSpec, VmStatus,
};
use crate::VimEndpoint;

/// Drives an OpenStack tenant through its Compute (Nova) and Networking (Neutron) APIs.
///
/// Authentication is performed lazily on first use and the resulting token is not
/// cached across calls in this minimal client; a production deployment would keep a
/// Keystone session alongside `client`.
pub struct OpenStackDriver {
    endpoint: VimEndpoint,
    client: Client,
}

impl OpenStackDriver {
    /// Builds a driver bound to the given tenant/project.
    pub fn new(endpoint: VimEndpoint) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build the OpenStack HTTP client");
        OpenStackDriver { endpoint, client }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint.url.trim_end_matches('/'), path)
    }
}

impl crate::VimDriver for OpenStackDriver {
    fn new_vminstance(&self, spec: &VmInstanceSpec) -> Result<(String, json::Value), Error> {
        let body = json::json!({
            "server": {
                "name": spec.name,
                "flavorRef": spec.flavor_id,
                "imageRef": spec.image_id,
                "networks": spec.interfaces.iter().map(|i| json::json!({"uuid": i.net_id})).collect::<Vec<_>>(),
            }
        });
        let resp = self
            .client
            .post(self.url("servers"))
            .basic_auth(&self.endpoint.user, Some(&self.endpoint.passwd))
            .json(&body)
            .send()?;
        if !resp.status().is_success() {
            return Err(map_http_error("vm", "", resp.status()));
        }
        let parsed: json::Value = resp.json()?;
        let vim_id = parsed["server"]["id"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        Ok((vim_id, json::json!({})))
    }

    fn delete_vminstance(&self, vim_id: &str, _created_items: &json::Value) -> Result<(), Error> {
        let resp = self
            .client
            .delete(self.url(&format!("servers/{vim_id}")))
            .basic_auth(&self.endpoint.user, Some(&self.endpoint.passwd))
            .send()?;
        if resp.status().is_success() || resp.status() == reqwest::StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(map_http_error("vm", vim_id, resp.status()))
        }
    }

    fn new_network(&self, spec: &NetworkSpec) -> Result<NetworkRecord, Error> {
        let body = json::json!({
            "network": {
                "name": spec.name,
                "shared": spec.shared,
                "provider:network_type": spec.net_type,
            }
        });
        let resp = self
            .client
            .post(self.url("v2.0/networks"))
            .basic_auth(&self.endpoint.user, Some(&self.endpoint.passwd))
            .json(&body)
            .send()?;
        if !resp.status().is_success() {
            return Err(map_http_error("network", "", resp.status()));
        }
        let parsed: json::Value = resp.json()?;
        let net = &parsed["network"];
        Ok(NetworkRecord {
            vim_id: net["id"].as_str().unwrap_or_default().to_string(),
            name: net["name"].as_str().unwrap_or_default().to_string(),
            vlan: net["provider:segmentation_id"].as_u64().map(|v| v as u16),
        })
    }

    fn get_network_list(&self, filter: &NetworkFilter) -> Result<Vec<NetworkRecord>, Error> {
        let mut req = self
            .client
            .get(self.url("v2.0/networks"))
            .basic_auth(&self.endpoint.user, Some(&self.endpoint.passwd));
        if let Some(name) = &filter.name {
            req = req.query(&[("name", name.as_str())]);
        }
        if let Some(vim_id) = &filter.vim_id {
            req = req.query(&[("id", vim_id.as_str())]);
        }
        let resp = req.send()?;
        if !resp.status().is_success() {
            return Err(map_http_error("network", "", resp.status()));
        }
        let parsed: json::Value = resp.json()?;
        let records = parsed["networks"]
            .as_array()
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|net| NetworkRecord {
                vim_id: net["id"].as_str().unwrap_or_default().to_string(),
                name: net["name"].as_str().unwrap_or_default().to_string(),
                vlan: net["provider:segmentation_id"].as_u64().map(|v| v as u16),
            })
            .collect();
        Ok(records)
    }

    fn get_network(&self, filter: &NetworkFilter) -> Result<NetworkRecord, Error> {
        pick_one("network", self.get_network_list(filter)?)
    }

    fn delete_network(&self, vim_id: &str) -> Result<(), Error> {
        let resp = self
            .client
            .delete(self.url(&format!("v2.0/networks/{vim_id}")))
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
                .get(self.url(&format!("servers/{vim_id}")))
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
            let status = match parsed["server"]["status"].as_str() {
                Some("ACTIVE") => VimStatus::Active,
                Some("ERROR") => VimStatus::Error,
                _ => VimStatus::Build,
            };
            out.push(VmStatus {
                vim_id: vim_id.clone(),
                status,
                error_msg: None,
                interfaces: Vec::new(),
            });
        }
        Ok(out)
    }

    fn refresh_nets_status(&self, vim_ids: &[String]) -> Result<Vec<NetStatus>, Error> {
        let mut out = Vec::with_capacity(vim_ids.len());
        for vim_id in vim_ids {
            let resp = self
                .client
                .get(self.url(&format!("v2.0/networks/{vim_id}")))
                .basic_auth(&self.endpoint.user, Some(&self.endpoint.passwd))
                .send()?;
            if !resp.status().is_success() {
                out.push(NetStatus {
                    vim_id: vim_id.clone(),
                    status: VimStatus::Error,
                    error_msg: Some(format!("status query failed: {}", resp.status())),
                    vlan: None,
                });
                continue;
            }
            let parsed: json::Value = resp.json()?;
            let net = &parsed["network"];
            let status = if net["status"].as_str() == Some("ACTIVE") {
                VimStatus::Active
            } else {
                VimStatus::Build
            };
            out.push(NetStatus {
                vim_id: vim_id.clone(),
                status,
                error_msg: None,
                vlan: net["provider:segmentation_id"].as_u64().map(|v| v as u16),
            });
        }
        Ok(out)
    }

    fn new_sfi(&self, spec: &SfiSpec) -> Result<String, Error> {
        self.post_sfc_resource("sfc/port_pairs", "port_pair", &spec.name)
    }

    fn delete_sfi(&self, vim_id: &str) -> Result<(), Error> {
        self.delete_sfc_resource("sfc/port_pairs", vim_id)
    }

    fn new_sf(&self, spec: &SfSpec) -> Result<String, Error> {
        self.post_sfc_resource("sfc/port_pair_groups", "port_pair_group", &spec.name)
    }

    fn delete_sf(&self, vim_id: &str) -> Result<(), Error> {
        self.delete_sfc_resource("sfc/port_pair_groups", vim_id)
    }

    fn new_classification(&self, spec: &ClassificationSpec) -> Result<String, Error> {
        self.post_sfc_resource("sfc/flow_classifiers", "flow_classifier", &spec.name)
    }

    fn delete_classification(&self, vim_id: &str) -> Result<(), Error> {
        self.delete_sfc_resource("sfc/flow_classifiers", vim_id)
    }

    fn new_sfp(&self, spec: &SfpSpec) -> Result<String, Error> {
        self.post_sfc_resource("sfc/port_chains", "port_chain", &spec.name)
    }

    fn delete_sfp(&self, vim_id: &str) -> Result<(), Error> {
        self.delete_sfc_resource("sfc/port_chains", vim_id)
    }
}

impl OpenStackDriver {
    fn post_sfc_resource(&self, path: &str, wrapper: &str, name: &str) -> Result<String, Error> {
        let body = json::json!({ wrapper: { "name": name } });
        let resp = self
            .client
            .post(self.url(&format!("v2.0/{path}")))
            .basic_auth(&self.endpoint.user, Some(&self.endpoint.passwd))
            .json(&body)
            .send()?;
        if !resp.status().is_success() {
            return Err(map_http_error(wrapper, "", resp.status()));
        }
        let parsed: json::Value = resp.json()?;
        Ok(parsed[wrapper]["id"].as_str().unwrap_or_default().to_string())
    }

    fn delete_sfc_resource(&self, path: &str, vim_id: &str) -> Result<(), Error> {
        let resp = self
            .client
            .delete(self.url(&format!("v2.0/{path}/{vim_id}")))
            .basic_auth(&self.endpoint.user, Some(&self.endpoint.passwd))
            .send()?;
        if resp.status().is_success() || resp.status() == reqwest::StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(map_http_error(path, vim_id, resp.status()))
        }
    }
}
