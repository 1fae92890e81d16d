//! WIM (Wide-area Infrastructure Manager) connectivity-service driver.
//!
//! A worker that needs to provision a wide-area link talks to exactly one WIM account
//! through this interface. The reference implementation (DPB) supports two wire
//! transports behind the same [`WimDriver`] trait: plain HTTP REST calls, and framed
//! JSON messages carried over an SSH channel.

pub mod config;
pub mod error;
pub mod models;
pub mod transport;
pub mod wire;

use crate::error::Error;
use crate::models::{
    ConnectionPoint, ConnectivityServiceStatus, ConnectivityServiceType,
};
use crate::transport::{DpbTransport, DpbTransportImpl};

/// The server-side timeout applied to an `await-service-status` probe.
pub const STATUS_AWAIT_TIMEOUT_MILLIS: u64 = 10_000;

/// Opaque connection information returned alongside a service id at creation time and
/// required again to delete the service. Transport-specific; treated as opaque JSON by
/// callers.
pub type ConnectionInfo = json::Value;

/// The required trait that any WIM connector must implement.
pub trait WimDriver {
    /// Verifies that the connector's credentials are accepted by the WIM.
    fn check_credentials(&self) -> Result<(), Error>;
    /// Creates a new connectivity service between the given endpoints.
    ///
    /// Returns the WIM-side service id and opaque connection info that must be kept
    /// around to delete the service later.
    fn create_connectivity_service(
        &self,
        service_type: &ConnectivityServiceType,
        endpoints: &[ConnectionPoint],
    ) -> Result<(String, ConnectionInfo), Error>;
    /// Polls the current status of a connectivity service.
    fn get_connectivity_service_status(
        &self,
        service_id: &str,
    ) -> Result<ConnectivityServiceStatus, Error>;
    /// Deletes a connectivity service. `NotFound` is treated as success by the caller.
    fn delete_connectivity_service(
        &self,
        service_id: &str,
        conn_info: &ConnectionInfo,
    ) -> Result<(), Error>;
    /// Redefines the endpoints of an existing connectivity service.
    fn edit_connectivity_service(
        &self,
        service_id: &str,
        endpoints: &[ConnectionPoint],
    ) -> Result<(), Error>;
    /// Best-effort cleanup of every connectivity service this connector knows about.
    /// Used by administrative tooling, not by the task engine itself.
    fn clear_all_connectivity_services(&self) -> Result<(), Error>;
}

/// The DPB reference WIM connector, parameterized over its wire transport.
pub struct DpbConnector {
    transport: DpbTransport,
}

impl DpbConnector {
    /// Builds a connector over the given transport.
    pub fn new(transport: DpbTransport) -> Self {
        DpbConnector { transport }
    }
}

impl WimDriver for DpbConnector {
    fn check_credentials(&self) -> Result<(), Error> {
        self.transport.check_credentials()
    }

    fn create_connectivity_service(
        &self,
        service_type: &ConnectivityServiceType,
        endpoints: &[ConnectionPoint],
    ) -> Result<(String, ConnectionInfo), Error> {
        let service_id = self.transport.new_service(service_type)?;
        self.transport.define_service(&service_id, endpoints)?;
        self.transport.activate_service(&service_id)?;
        Ok((service_id, json::Value::Null))
    }

    fn get_connectivity_service_status(
        &self,
        service_id: &str,
    ) -> Result<ConnectivityServiceStatus, Error> {
        self.transport.await_service_status(
            service_id,
            &["ACTIVATED", "FAILED"],
            STATUS_AWAIT_TIMEOUT_MILLIS,
        )
    }

    fn delete_connectivity_service(
        &self,
        service_id: &str,
        _conn_info: &ConnectionInfo,
    ) -> Result<(), Error> {
        // Corrected from the original connector, which referenced an out-of-scope
        // `service_id` local here; the intended argument is `service_id` itself.
        self.transport.release_service(service_id)
    }

    fn edit_connectivity_service(
        &self,
        service_id: &str,
        endpoints: &[ConnectionPoint],
    ) -> Result<(), Error> {
        self.transport.define_service(service_id, endpoints)
    }

    /// Neither reference connector this one is built from implements bulk
    /// clearing (the dumb connector no-ops every method; the SSH connector
    /// never defines this one at all), so this stays a no-op too.
    fn clear_all_connectivity_services(&self) -> Result<(), Error> {
        Ok(())
    }
}
