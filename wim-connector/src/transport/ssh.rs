use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use russh::client::{self, Handle};
use russh_keys::key::KeyPair;
use tokio::sync::Mutex;

use crate::error::{Error, WimConnectorError};
use crate::models::{ConnectionPoint, ConnectivityServiceStatus, ConnectivityServiceType, WimStatus};
use crate::transport::DpbTransportImpl;
use crate::wire::{self, Frame};

/// How the SSH transport authenticates to the WIM's management host.
///
/// Grounded on `__check_auth_data`/`__create_key` of the original SSH connector: either
/// a password or a private key (RSA or ECDSA) loaded from a file.
#[derive(Debug, Clone)]
pub enum SshAuth {
    /// Authenticate with a password.
    Password(String),
    /// Authenticate with a private key file (RSA or ECDSA, auto-detected).
    PrivateKeyFile {
        /// Path to the PEM-encoded private key.
        path: PathBuf,
        /// Optional passphrase protecting the key.
        passphrase: Option<String>,
    },
}

struct Handler;

impl client::Handler for Handler {
    type Error = russh::Error;

    fn check_server_key<'life0, 'async_trait>(
        self,
        _server_public_key: &'life0 russh_keys::key::PublicKey,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<(Self, bool), Self::Error>> + Send + 'async_trait>,
    >
    where
        'life0: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move { Ok((self, true)) })
    }
}

/// SSH transport implementing the framed JSON protocol of the original SSH connector.
///
/// A single SSH channel is kept open for the lifetime of the transport. Responses whose
/// `session` does not match the id currently being awaited are stashed in
/// `unclaimed_responses` instead of being treated as protocol errors, mirroring
/// `__unclaimed_responses` in the original implementation.
pub struct SshTransport {
    runtime: tokio::runtime::Runtime,
    handle: Mutex<Handle<Handler>>,
    next_session: AtomicU32,
    unclaimed_responses: Mutex<HashMap<u32, Frame>>,
}

impl SshTransport {
    /// Connects to the WIM management host and opens the single long-lived channel used
    /// for every subsequent request.
    pub fn connect(host: &str, port: u16, username: &str, auth: &SshAuth) -> Result<Self, Error> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;

        let handle = runtime.block_on(async {
            let config = Arc::new(client::Config::default());
            let mut handle = client::connect(config, (host, port), Handler).await?;

            match auth {
                SshAuth::Password(password) => {
                    handle.authenticate_password(username, password).await?;
                }
                SshAuth::PrivateKeyFile { path, passphrase } => {
                    let key = russh_keys::load_secret_key(path, passphrase.as_deref())?;
                    handle
                        .authenticate_publickey(username, Arc::new(key))
                        .await?;
                }
            }

            Ok::<_, Error>(handle)
        })?;

        Ok(SshTransport {
            runtime,
            handle: Mutex::new(handle),
            next_session: AtomicU32::new(1),
            unclaimed_responses: Mutex::new(HashMap::new()),
        })
    }

    fn request(&self, content: json::Value) -> Result<json::Value, Error> {
        let session = self.next_session.fetch_add(1, Ordering::SeqCst);
        let frame = Frame { session, content };

        self.runtime.block_on(async {
            if let Some(cached) = self.unclaimed_responses.lock().await.remove(&session) {
                return Ok(cached.content);
            }

            let handle = self.handle.lock().await;
            let mut channel = handle.channel_open_session().await?;
            channel.data(&wire::encode(&frame)?[..]).await?;

            loop {
                let Some(msg) = channel.wait().await else {
                    return Err(WimConnectorError::Other("SSH channel closed".to_string()).into());
                };
                let russh::ChannelMsg::Data { data } = msg else {
                    continue;
                };
                let Some(len) = wire::read_length_prefix(&data) else {
                    continue;
                };
                let body = &data[4..4 + len as usize];
                let response = wire::decode(body)?;
                if response.session == session {
                    return Ok(response.content);
                }
                self.unclaimed_responses
                    .lock()
                    .await
                    .insert(response.session, response);
            }
        })
    }
}

impl DpbTransportImpl for SshTransport {
    fn check_credentials(&self) -> Result<(), Error> {
        self.runtime.block_on(async {
            let handle = self.handle.lock().await;
            handle.channel_open_session().await.map(|_| ()).map_err(Error::from)
        })
    }

    fn new_service(&self, service_type: &ConnectivityServiceType) -> Result<String, Error> {
        let content = json::json!({ "type": "new-service", "service-type": service_type });
        let response = self.request(content)?;
        Ok(response["service-id"].as_str().unwrap_or_default().to_string())
    }

    fn define_service(&self, service_id: &str, endpoints: &[ConnectionPoint]) -> Result<(), Error> {
        let segment: Vec<json::Value> = endpoints
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
        let content = json::json!({
            "type": "define-service",
            "service-id": service_id,
            "segment": segment,
        });
        self.request(content)?;
        Ok(())
    }

    fn activate_service(&self, service_id: &str) -> Result<(), Error> {
        let content = json::json!({ "type": "activate-service", "service-id": service_id });
        self.request(content)?;
        Ok(())
    }

    fn release_service(&self, service_id: &str) -> Result<(), Error> {
        let content = json::json!({ "type": "release-service", "service-id": service_id });
        self.request(content)?;
        Ok(())
    }

    fn await_service_status(
        &self,
        service_id: &str,
        acceptable: &[&str],
        timeout_millis: u64,
    ) -> Result<ConnectivityServiceStatus, Error> {
        let content = json::json!({
            "type": "await-service-status",
            "service-id": service_id,
            "timeout-millis": timeout_millis,
            "acceptable": acceptable,
        });
        // The timeout is enforced server-side (the WIM waits up to `timeout-millis`
        // before answering); if the server never responds the channel read in
        // `request` eventually observes the channel closing.
        let response = self.request(content).map_err(|err| match err {
            Error::WimError(WimConnectorError::Other(_)) => WimConnectorError::StatusTimeout {
                service_id: service_id.to_string(),
                expected: acceptable.iter().map(|s| s.to_string()).collect(),
            }
            .into(),
            other => other,
        })?;

        let status = match response["status"].as_str() {
            Some("ACTIVATING") => WimStatus::Build,
            Some("ACTIVATED") | Some("ACTIVE") => WimStatus::Active,
            Some("FAILED") => WimStatus::Error,
            _ => WimStatus::Build,
        };
        Ok(ConnectivityServiceStatus {
            wim_status: status,
            error_msg: response["error_msg"].as_str().map(String::from),
        })
    }
}
