use std::time::Duration;

use reqwest::blocking::Client;

use crate::backend::{map_http_error, pick_one};
use crate::error::{Error, VimDriverError};
use crate::models::{
    ClassificationSpec, NetStatus, NetworkFilter, NetworkRecord, NetworkSpec, SfSpec, SfiSpec,
    SfpSpec, VimStatus, VmInstanceSpec, VmStatus,
};
use crate::VimEndpoint;

/// Drives an AWS account/region through its EC2/VPC query APIs.
///
/// `endpoint.user`/`endpoint.passwd` carry the access key id and secret access key.
/// SFC is not modelled by EC2/VPC; those methods return [`VimDriverError::Other`].
pub struct AwsDriver {
    endpoint: VimEndpoint,
    client: Client,
}

impl AwsDriver {
    /// Builds a driver bound to the given account/region.
    pub fn new(endpoint: VimEndpoint) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build the EC2 HTTP client");
        AwsDriver { endpoint, client }
    }

    fn unsupported(op: &str) -> Error {
        VimDriverError::Other(format!("{op} is not supported on AWS EC2/VPC")).into()
    }
}

impl crate::VimDriver for AwsDriver {
    fn new_vminstance(&self, spec: &VmInstanceSpec) -> Result<(String, json::Value), Error> {
        let resp = self
            .client
            .post(&self.endpoint.url)
            .basic_auth(&self.endpoint.user, Some(&self.endpoint.passwd))
            .query(&[
                ("Action", "RunInstances"),
                ("ImageId", spec.image_id.as_str()),
                ("InstanceType", spec.flavor_id.as_str()),
            ])
            .send()?;
        if !resp.status().is_success() {
            return Err(map_http_error("vm", "", resp.status()));
        }
        let parsed: json::Value = resp.json()?;
        Ok((
            parsed["instancesSet"][0]["instanceId"]
                .as_str()
                .unwrap_or_default()
                .to_string(),
            json::json!({}),
        ))
    }

    fn delete_vminstance(&self, vim_id: &str, _created_items: &json::Value) -> Result<(), Error> {
        let resp = self
            .client
            .post(&self.endpoint.url)
            .basic_auth(&self.endpoint.user, Some(&self.endpoint.passwd))
            .query(&[("Action", "TerminateInstances"), ("InstanceId.1", vim_id)])
            .send()?;
        if resp.status().is_success() || resp.status() == reqwest::StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(map_http_error("vm", vim_id, resp.status()))
        }
    }

    fn new_network(&self, spec: &NetworkSpec) -> Result<NetworkRecord, Error> {
        let cidr = spec
            .options
            .get("cidr_block")
            .cloned()
            .unwrap_or_else(|| "10.0.0.0/24".to_string());
        let resp = self
            .client
            .post(&self.endpoint.url)
            .basic_auth(&self.endpoint.user, Some(&self.endpoint.passwd))
            .query(&[("Action", "CreateSubnet"), ("CidrBlock", cidr.as_str())])
            .send()?;
        if !resp.status().is_success() {
            return Err(map_http_error("network", "", resp.status()));
        }
        let parsed: json::Value = resp.json()?;
        Ok(NetworkRecord {
            vim_id: parsed["subnet"]["subnetId"].as_str().unwrap_or_default().to_string(),
            name: spec.name.clone(),
            vlan: None,
        })
    }

    fn get_network_list(&self, filter: &NetworkFilter) -> Result<Vec<NetworkRecord>, Error> {
        let resp = self
            .client
            .post(&self.endpoint.url)
            .basic_auth(&self.endpoint.user, Some(&self.endpoint.passwd))
            .query(&[("Action", "DescribeSubnets")])
            .send()?;
        if !resp.status().is_success() {
            return Err(map_http_error("network", "", resp.status()));
        }
        let parsed: json::Value = resp.json()?;
        let mut records: Vec<NetworkRecord> = parsed["subnetSet"]
            .as_array()
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|s| NetworkRecord {
                vim_id: s["subnetId"].as_str().unwrap_or_default().to_string(),
                name: s["tagSet"]["Name"].as_str().unwrap_or_default().to_string(),
                vlan: None,
            })
            .collect();
        if let Some(vim_id) = &filter.vim_id {
            records.retain(|r| &r.vim_id == vim_id);
        }
        if let Some(name) = &filter.name {
            records.retain(|r| &r.name == name);
        }
        Ok(records)
    }

    fn get_network(&self, filter: &NetworkFilter) -> Result<NetworkRecord, Error> {
        pick_one("network", self.get_network_list(filter)?)
    }

    fn delete_network(&self, vim_id: &str) -> Result<(), Error> {
        let resp = self
            .client
            .post(&self.endpoint.url)
            .basic_auth(&self.endpoint.user, Some(&self.endpoint.passwd))
            .query(&[("Action", "DeleteSubnet"), ("SubnetId", vim_id)])
            .send()?;
        if resp.status().is_success() || resp.status() == reqwest::StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(map_http_error("network", vim_id, resp.status()))
        }
    }

    fn refresh_vms_status(&self, vim_ids: &[String]) -> Result<Vec<VmStatus>, Error> {
        let mut query: Vec<(String, String)> = vec![("Action".to_string(), "DescribeInstances".to_string())];
        for (i, id) in vim_ids.iter().enumerate() {
            query.push((format!("InstanceId.{}", i + 1), id.clone()));
        }
        let resp = self
            .client
            .post(&self.endpoint.url)
            .basic_auth(&self.endpoint.user, Some(&self.endpoint.passwd))
            .query(&query)
            .send()?;
        if !resp.status().is_success() {
            return Err(map_http_error("vm", "", resp.status()));
        }
        let parsed: json::Value = resp.json()?;
        Ok(parsed["reservationSet"]
            .as_array()
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .flat_map(|r| r["instancesSet"].as_array().cloned().unwrap_or_default())
            .map(|i| VmStatus {
                vim_id: i["instanceId"].as_str().unwrap_or_default().to_string(),
                status: match i["instanceState"]["name"].as_str() {
                    Some("running") => VimStatus::Active,
                    Some("terminated") | Some("shutting-down") => VimStatus::Error,
                    _ => VimStatus::Build,
                },
                error_msg: None,
                interfaces: Vec::new(),
            })
            .collect())
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
