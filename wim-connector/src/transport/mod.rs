//! The two wire transports a [`crate::DpbConnector`] can use, behind one interface.

pub mod http;
pub mod ssh;

pub use http::HttpTransport;
pub use ssh::SshTransport;

use crate::error::Error;
use crate::models::{ConnectionPoint, ConnectivityServiceStatus, ConnectivityServiceType};

/// The operations a DPB wire transport must support; both [`HttpTransport`] and
/// [`SshTransport`] implement this so [`crate::DpbConnector`] can stay transport-agnostic.
pub trait DpbTransportImpl {
    /// Checks that the transport's credentials are valid (connects and disconnects).
    fn check_credentials(&self) -> Result<(), Error>;
    /// Creates a new connectivity service and returns its service id.
    fn new_service(&self, service_type: &ConnectivityServiceType) -> Result<String, Error>;
    /// Defines the segments of a previously created service.
    fn define_service(&self, service_id: &str, endpoints: &[ConnectionPoint]) -> Result<(), Error>;
    /// Activates a defined service.
    fn activate_service(&self, service_id: &str) -> Result<(), Error>;
    /// Releases (deletes) a service.
    fn release_service(&self, service_id: &str) -> Result<(), Error>;
    /// Awaits the service reaching one of `acceptable` statuses, or times out.
    fn await_service_status(
        &self,
        service_id: &str,
        acceptable: &[&str],
        timeout_millis: u64,
    ) -> Result<ConnectivityServiceStatus, Error>;
}

/// The transport a [`crate::DpbConnector`] is configured to use.
pub enum DpbTransport {
    /// Plain HTTP REST calls.
    Http(HttpTransport),
    /// Framed JSON messages over an SSH channel.
    Ssh(SshTransport),
}

impl DpbTransportImpl for DpbTransport {
    fn check_credentials(&self) -> Result<(), Error> {
        match self {
            DpbTransport::Http(t) => t.check_credentials(),
            DpbTransport::Ssh(t) => t.check_credentials(),
        }
    }

    fn new_service(&self, service_type: &ConnectivityServiceType) -> Result<String, Error> {
        match self {
            DpbTransport::Http(t) => t.new_service(service_type),
            DpbTransport::Ssh(t) => t.new_service(service_type),
        }
    }

    fn define_service(&self, service_id: &str, endpoints: &[ConnectionPoint]) -> Result<(), Error> {
        match self {
            DpbTransport::Http(t) => t.define_service(service_id, endpoints),
            DpbTransport::Ssh(t) => t.define_service(service_id, endpoints),
        }
    }

    fn activate_service(&self, service_id: &str) -> Result<(), Error> {
        match self {
            DpbTransport::Http(t) => t.activate_service(service_id),
            DpbTransport::Ssh(t) => t.activate_service(service_id),
        }
    }

    fn release_service(&self, service_id: &str) -> Result<(), Error> {
        match self {
            DpbTransport::Http(t) => t.release_service(service_id),
            DpbTransport::Ssh(t) => t.release_service(service_id),
        }
    }

    fn await_service_status(
        &self,
        service_id: &str,
        acceptable: &[&str],
        timeout_millis: u64,
    ) -> Result<ConnectivityServiceStatus, Error> {
        match self {
            DpbTransport::Http(t) => t.await_service_status(service_id, acceptable, timeout_millis),
            DpbTransport::Ssh(t) => t.await_service_status(service_id, acceptable, timeout_millis),
        }
    }
}
