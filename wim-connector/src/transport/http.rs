use std::time::Duration;

use reqwest::blocking::Client;

use crate::error::{Error, WimConnectorError};
use crate::models::{ConnectionPoint, ConnectivityServiceStatus, ConnectivityServiceType, WimStatus};
use crate::transport::DpbTransportImpl;

/// Plain REST transport, grounded on the simpler `wimconn_dpb.py` connector: every
/// function call is a `GET`/`POST` against
/// `http://<host>:<port>/network/<network>/<function>`.
pub struct HttpTransport {
    base_url: String,
    client: Client,
}

impl HttpTransport {
    /// Builds an HTTP transport against the given WIM endpoint and network name.
    pub fn new(host: &str, port: u16, network_name: &str) -> Self {
        let base_url = format!("http://{host}:{port}/network/{network_name}");
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .expect("failed to build the WIM HTTP client");
        HttpTransport { base_url, client }
    }

    fn url(&self, function: &str) -> String {
        format!("{}/{function}", self.base_url)
    }
}

impl DpbTransportImpl for HttpTransport {
    fn check_credentials(&self) -> Result<(), Error> {
        let resp = self.client.get(self.url("check-credentials")).send()?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(WimConnectorError::Other(format!(
                "credential check failed with status {}",
                resp.status()
            ))
            .into())
        }
    }

    fn new_service(&self, service_type: &ConnectivityServiceType) -> Result<String, Error> {
        let body = json::json!({ "service_type": service_type });
        let resp = self.client.post(self.url("new-service")).json(&body).send()?;
        let parsed: json::Value = resp.json()?;
        Ok(parsed["service-id"].as_str().unwrap_or_default().to_string())
    }

    fn define_service(&self, service_id: &str, endpoints: &[ConnectionPoint]) -> Result<(), Error> {
        let segments: Vec<json::Value> = endpoints
            .iter()
            .map(|ep| {
                json::json!({
                    "terminal-name": ep.terminal_name,
                    "label": ep.vlan,
                    "ingress-bw": ep.ingress_bw,
                    "egress-bw": ep.egress_bw,
                })
            })
            .collect();
        let body = json::json!({ "service-id": service_id, "segment": segments });
        self.client.post(self.url("define-service")).json(&body).send()?;
        Ok(())
    }

    fn activate_service(&self, service_id: &str) -> Result<(), Error> {
        let body = json::json!({ "service-id": service_id });
        self.client.post(self.url("activate-service")).json(&body).send()?;
        Ok(())
    }

    fn release_service(&self, service_id: &str) -> Result<(), Error> {
        let body = json::json!({ "service-id": service_id });
        let resp = self.client.post(self.url("release-service")).json(&body).send()?;
        if resp.status().is_success() || resp.status() == reqwest::StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(WimConnectorError::NotFound { service_id: service_id.to_string() }.into())
        }
    }

    fn await_service_status(
        &self,
        service_id: &str,
        acceptable: &[&str],
        timeout_millis: u64,
    ) -> Result<ConnectivityServiceStatus, Error> {
        let resp = self
            .client
            .get(self.url("service-status"))
            .query(&[("service-id", service_id)])
            .timeout(Duration::from_millis(timeout_millis))
            .send()?;
        let parsed: json::Value = resp.json()?;
        let status = match parsed["status"].as_str() {
            Some(s) if acceptable.contains(&s) || s == "ACTIVATED" => WimStatus::Active,
            Some("ACTIVATING") => WimStatus::Build,
            Some("FAILED") => WimStatus::Error,
            _ => WimStatus::Build,
        };
        Ok(ConnectivityServiceStatus {
            wim_status: status,
            error_msg: parsed["error_msg"].as_str().map(String::from),
        })
    }
}
