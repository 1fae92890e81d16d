use std::sync::Arc;

use serde::{Deserialize, Serialize};

use vim_driver::config::VimDriverConfig;
use vim_driver::VimConnector;
use wim_connector::config::WimConnectorConfig;
use wim_connector::DpbConnector;

use crate::db::Database;
use crate::sdn::SdnClient;

/// General worker identity options (`[general]` section).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// The datacenter-tenant-id this worker drains actions for.
    pub datacenter_tenant_id: String,
    /// A human-readable name for this worker, used in log output.
    pub name: String,
}

/// The database configuration struct (`[database]` section).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// The database connection URL.
    pub url: String,
    /// The maximum number of concurrent database connections.
    pub max_conns: Option<u32>,
}

/// Tuning constants for the refresh scheduler (`[refresh]` section, optional).
///
/// All fields default to the values named in the task engine's design: 5 second
/// cadence while BUILD-ing, 60 second cadence once ACTIVE, 10 items drained per pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Refresh cadence, in seconds, for items still in BUILD.
    pub build_interval_secs: u64,
    /// Refresh cadence, in seconds, for items already ACTIVE.
    pub active_interval_secs: u64,
    /// Maximum number of refresh probes drained from the queue per pass.
    pub max_per_pass: usize,
    /// Maximum number of CREATE tasks executed per pass.
    pub max_creates_per_pass: usize,
    /// Maximum dependency-wait retries before a task is marked `DependencyTimeout`.
    pub max_dependency_retries: u32,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        RefreshConfig {
            build_interval_secs: 5,
            active_interval_secs: 60,
            max_per_pass: 10,
            max_creates_per_pass: 10,
            max_dependency_retries: 3,
        }
    }
}

/// The SDN overlay controller configuration (`[sdn]` section, optional).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SdnConfig {
    /// The SDN controller's management URL.
    pub url: String,
    /// The authentication user.
    pub user: String,
    /// The authentication password.
    pub passwd: String,
    /// Whether a WIM account's external port should also be attached to
    /// `data`/`ptp` networks at CREATE time (falls back from
    /// `"__WIM:<wim_account_name>"` to `"__WIM"` if the named location
    /// is rejected by the overlay).
    #[serde(default)]
    pub wim_external_ports: bool,
}

/// The application configuration struct, as loaded from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// General worker identity options.
    pub general: GeneralConfig,
    /// The database configuration.
    pub database: DatabaseConfig,
    /// The VIM driver to instantiate and drive.
    pub vim: VimDriverConfig,
    /// The WIM connector to use for wide-area connectivity services, if any.
    #[serde(default)]
    pub wim: Option<WimConnectorConfig>,
    /// The SDN overlay controller to use for network/port mirroring, if any.
    #[serde(default)]
    pub sdn: Option<SdnConfig>,
    /// Refresh scheduler tuning overrides.
    #[serde(default)]
    pub refresh: RefreshConfig,
}

/// The application state, created from [`Config`].
pub struct State {
    /// This worker's identity options.
    pub general: GeneralConfig,
    /// The action store connection pool.
    pub db: Database,
    /// The VIM driver this worker operates, shared with the blocking tasks
    /// the executor and refresh scheduler spawn for each driver call.
    pub vim: Arc<VimConnector>,
    /// The WIM connector this worker operates, if configured.
    pub wim: Option<DpbConnector>,
    /// The SDN overlay client this worker operates, if configured.
    pub sdn: Option<Arc<SdnClient>>,
    /// Refresh scheduler tuning.
    pub refresh: RefreshConfig,
}

impl State {
    /// Builds the runtime state for a worker from its configuration.
    ///
    /// Building the WIM connector may fail (e.g. an SSH connection could not be
    /// established), so this is fallible unlike the teacher's infallible `From<Config>`.
    pub fn from_config(config: Config) -> Result<State, crate::error::Error> {
        let wim = config.wim.map(DpbConnector::try_from).transpose()?;
        let sdn = config.sdn.map(SdnClient::new).map(Arc::new);

        Ok(State {
            general: config.general,
            db: Database::new(&config.database),
            vim: Arc::new(config.vim.into()),
            wim,
            sdn,
            refresh: config.refresh,
        })
    }
}
