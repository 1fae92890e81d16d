use serde::{Deserialize, Serialize};

/// The lifecycle status a WIM reports for a connectivity service.
///
/// Grounded on `__STATUS_MAP` of the original SSH connector: `ACTIVATING` maps to
/// `Build`, `ACTIVATED` maps to `Active`, `FAILED` maps to `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WimStatus {
    /// The service is still being activated.
    Build,
    /// The service is active and forwarding traffic.
    Active,
    /// The WIM reported a failure for this service.
    Error,
}

/// One endpoint of a requested connectivity service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionPoint {
    /// The name of the physical/virtual terminal this endpoint binds to.
    pub terminal_name: String,
    /// The VLAN tag to use for this endpoint (carried as the segment's `label`).
    pub vlan: u16,
    /// Requested ingress bandwidth, in Mbps.
    #[serde(default = "default_bandwidth")]
    pub ingress_bw: f64,
    /// Requested egress bandwidth, in Mbps.
    #[serde(default = "default_bandwidth")]
    pub egress_bw: f64,
}

fn default_bandwidth() -> f64 {
    10.0
}

/// The type of connectivity service requested, mirroring the WAN service catalogue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ConnectivityServiceType {
    /// A point-to-point Ethernet Line service.
    ElineP2p,
    /// A multipoint Ethernet LAN service.
    ElanMultipoint,
}

/// The status as reported back by [`crate::WimDriver::get_connectivity_service_status`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectivityServiceStatus {
    /// The connectivity service's current status.
    pub wim_status: WimStatus,
    /// Additional error detail, populated when `wim_status == Error`.
    #[serde(default)]
    pub error_msg: Option<String>,
}
