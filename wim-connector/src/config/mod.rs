use serde::{Deserialize, Serialize};

use crate::transport::{DpbTransport, HttpTransport, SshTransport};
use crate::transport::ssh::SshAuth;
use crate::DpbConnector;

/// The configuration enum for WIM connector transports.
///
/// ```toml
/// [wim]
/// type = "ssh" # or "http"
/// host = "dpb.site-a.example.org"
/// port = 830
/// network-name = "wan-overlay"
/// username = "osm"
/// pkey-file = "/etc/osm/dpb_key"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum WimConnectorConfig {
    /// Plain REST transport.
    Http(HttpTransportConfig),
    /// Framed JSON-over-SSH transport.
    Ssh(SshTransportConfig),
}

/// Configuration for [`HttpTransport`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpTransportConfig {
    /// The WIM management host.
    pub host: String,
    /// The WIM management port.
    pub port: u16,
    /// The overlay network name this connector manages.
    pub network_name: String,
}

/// Configuration for [`SshTransport`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshTransportConfig {
    /// The WIM management host.
    pub host: String,
    /// The SSH port (commonly not 22 for management-plane access).
    pub port: u16,
    /// The overlay network name this connector manages.
    pub network_name: String,
    /// The SSH username.
    pub username: String,
    /// Password authentication, mutually exclusive with `pkey_file`.
    #[serde(default)]
    pub password: Option<String>,
    /// Private key file authentication (RSA or ECDSA), mutually exclusive with `password`.
    #[serde(default)]
    pub pkey_file: Option<std::path::PathBuf>,
    /// Optional passphrase protecting `pkey_file`.
    #[serde(default)]
    pub pkey_passphrase: Option<String>,
}

impl SshTransportConfig {
    fn auth(&self) -> SshAuth {
        if let Some(password) = &self.password {
            SshAuth::Password(password.clone())
        } else if let Some(path) = &self.pkey_file {
            SshAuth::PrivateKeyFile {
                path: path.clone(),
                passphrase: self.pkey_passphrase.clone(),
            }
        } else {
            panic!("WIM SSH transport requires either `password` or `pkey-file` in configuration")
        }
    }
}

impl TryFrom<WimConnectorConfig> for DpbConnector {
    type Error = crate::error::Error;

    fn try_from(config: WimConnectorConfig) -> Result<DpbConnector, Self::Error> {
        let transport = match config {
            WimConnectorConfig::Http(config) => {
                DpbTransport::Http(HttpTransport::new(&config.host, config.port, &config.network_name))
            }
            WimConnectorConfig::Ssh(config) => {
                let auth = config.auth();
                DpbTransport::Ssh(SshTransport::connect(
                    &config.host,
                    config.port,
                    &config.username,
                    &auth,
                )?)
            }
        };
        Ok(DpbConnector::new(transport))
    }
}
