use std::time::Duration;

use reqwest::blocking::Client;

use crate::backend::{map_http_error, pick_one};
use crate::error::Error;
use crate::models::{
    ClassificationSpec, NetStatus, NetworkFilter, NetworkRecord, NetworkSpec, SfSpec, SfiSpec,
    SfpSpec, VimStatus, VmInstanceSpec, VmStatus,
};
use crate::VimEndpoint;

/// Drives an OpenVIM deployment through its native (non-OpenStack) REST API.
///
/// OpenVIM is the reference lightweight VIM used throughout the original project and is
/// the one most tasks were historically tested against.
pub struct OpenVimDriver {
    endpoint: VimEndpoint,
    client: Client,
}

impl OpenVimDriver {
    /// Builds a driver bound to the given tenant.
    pub fn new(endpoint: VimEndpoint) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build the OpenVIM HTTP client");
        OpenVimDriver { endpoint, client }
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}/{path}",
            self.endpoint.url.trim_end_matches('/'),
            self.endpoint.tenant_name
        )
    }
}

impl crate::VimDriver for OpenVimDriver {
    fn new_vminstance(&self, spec: &VmInstanceSpec) -> Result<(String, json::Value), Error> {
        let body = json::json!({
            "instance": {
                "name": spec.name,
                "flavor_id": spec.flavor_id,
                "image_id": spec.image_id,
                "networks": spec.interfaces.iter().map(|i| json::json!({"net_id": i.net_id})).collect::<Vec<_>>(),
            }
        });
        let resp = self.client.post(self.url("instances")).json(&body).send()?;
        if !resp.status().is_success() {
            return Err(map_http_error("vm", "", resp.status()));
        }
        let parsed: json::Value = resp.json()?;
        let vim_id = parsed["instance"]["id"].as_str().unwrap_or_default().to_string();
        Ok((vim_id, json::json!({})))
    }

    fn delete_vminstance(&self, vim_id: &str, _created_items: &json::Value) -> Result<(), Error> {
        let resp = self.client.delete(self.url(&format!("instances/{vim_id}"))).send()?;
        if resp.status().is_success() || resp.status() == reqwest::StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(map_http_error("vm", vim_id, resp.status()))
        }
    }

    fn new_network(&self, spec: &NetworkSpec) -> Result<NetworkRecord, Error> {
        let body = json::json!({ "network": { "name": spec.name, "type": spec.net_type, "shared": spec.shared } });
        let resp = self.client.post(self.url("networks")).json(&body).send()?;
        if !resp.status().is_success() {
            return Err(map_http_error("network", "", resp.status()));
        }
        let parsed: json::Value = resp.json()?;
        let net = &parsed["network"];
        Ok(NetworkRecord {
            vim_id: net["id"].as_str().unwrap_or_default().to_string(),
            name: net["name"].as_str().unwrap_or_default().to_string(),
            vlan: net["vlan"].as_u64().map(|v| v as u16),
        })
    }

    fn get_network_list(&self, filter: &NetworkFilter) -> Result<Vec<NetworkRecord>, Error> {
        let mut req = self.client.get(self.url("networks"));
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
        Ok(parsed["networks"]
            .as_array()
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|net| NetworkRecord {
                vim_id: net["id"].as_str().unwrap_or_default().to_string(),
                name: net["name"].as_str().unwrap_or_default().to_string(),
                vlan: net["vlan"].as_u64().map(|v| v as u16),
            })
            .collect())
    }

    fn get_network(&self, filter: &NetworkFilter) -> Result<NetworkRecord, Error> {
        pick_one("network", self.get_network_list(filter)?)
    }

    fn delete_network(&self, vim_id: &str) -> Result<(), Error> {
        let resp = self.client.delete(self.url(&format!("networks/{vim_id}"))).send()?;
        if resp.status().is_success() || resp.status() == reqwest::StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(map_http_error("network", vim_id, resp.status()))
        }
    }

    fn refresh_vms_status(&self, vim_ids: &[String]) -> Result<Vec<VmStatus>, Error> {
        let resp = self
            .client
            .get(self.url("instances"))
            .query(&[("id", vim_ids.join(","))])
            .send()?;
        if !resp.status().is_success() {
            return Err(map_http_error("vm", "", resp.status()));
        }
        let parsed: json::Value = resp.json()?;
        Ok(parsed["instances"]
            .as_array()
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|i| VmStatus {
                vim_id: i["id"].as_str().unwrap_or_default().to_string(),
                status: match i["status"].as_str() {
                    Some("ACTIVE") => VimStatus::Active,
                    Some("ERROR") => VimStatus::Error,
                    _ => VimStatus::Build,
                },
                error_msg: i["error_msg"].as_str().map(String::from),
                interfaces: Vec::new(),
            })
            .collect())
    }

    fn refresh_nets_status(&self, vim_ids: &[String]) -> Result<Vec<NetStatus>, Error> {
        let resp = self
            .client
            .get(self.url("networks"))
            .query(&[("id", vim_ids.join(","))])
            .send()?;
        if !resp.status().is_success() {
            return Err(map_http_error("network", "", resp.status()));
        }
        let parsed: json::Value = resp.json()?;
        Ok(parsed["networks"]
            .as_array()
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|n| NetStatus {
                vim_id: n["id"].as_str().unwrap_or_default().to_string(),
                status: match n["status"].as_str() {
                    Some("ACTIVE") => VimStatus::Active,
                    Some("ERROR") => VimStatus::Error,
                    _ => VimStatus::Build,
                },
                error_msg: n["error_msg"].as_str().map(String::from),
                vlan: n["vlan"].as_u64().map(|v| v as u16),
            })
            .collect())
    }

    fn new_sfi(&self, spec: &SfiSpec) -> Result<String, Error> {
        self.post_sfc("sfis", "sfi", &spec.name)
    }

    fn delete_sfi(&self, vim_id: &str) -> Result<(), Error> {
        self.delete_sfc("sfis", vim_id)
    }

    fn new_sf(&self, spec: &SfSpec) -> Result<String, Error> {
        self.post_sfc("sfs", "sf", &spec.name)
    }

    fn delete_sf(&self, vim_id: &str) -> Result<(), Error> {
        self.delete_sfc("sfs", vim_id)
    }

    fn new_classification(&self, spec: &ClassificationSpec) -> Result<String, Error> {
        self.post_sfc("classifications", "classification", &spec.name)
    }

    fn delete_classification(&self, vim_id: &str) -> Result<(), Error> {
        self.delete_sfc("classifications", vim_id)
    }

    fn new_sfp(&self, spec: &SfpSpec) -> Result<String, Error> {
        self.post_sfc("sfps", "sfp", &spec.name)
    }

    fn delete_sfp(&self, vim_id: &str) -> Result<(), Error> {
        self.delete_sfc("sfps", vim_id)
    }
}

impl OpenVimDriver {
    fn post_sfc(&self, path: &str, wrapper: &str, name: &str) -> Result<String, Error> {
        let body = json::json!({ wrapper: { "name": name } });
        let resp = self.client.post(self.url(path)).json(&body).send()?;
        if !resp.status().is_success() {
            return Err(map_http_error(wrapper, "", resp.status()));
        }
        let parsed: json::Value = resp.json()?;
        Ok(parsed[wrapper]["id"].as_str().unwrap_or_default().to_string())
    }

    fn delete_sfc(&self, path: &str, vim_id: &str) -> Result<(), Error> {
        let resp = self.client.delete(self.url(&format!("{path}/{vim_id}"))).send()?;
        if resp.status().is_success() || resp.status() == reqwest::StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(map_http_error(path, vim_id, resp.status()))
        }
    }
}
