use thiserror::Error;

/// The error type produced by a [`crate::WimDriver`] implementation.
#[derive(Error, Debug)]
pub enum Error {
    /// An IO error (connection refused, broken pipe, etc...).
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),
    /// JSON (de)serialization error (malformed WIM message, etc...).
    #[error("JSON error: {0}")]
    JSONError(#[from] json::Error),
    /// HTTP transport error talking to the WIM's REST API.
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
    /// SSH transport error (authentication failure, channel closed, etc...).
    #[error("SSH error: {0}")]
    SshError(#[from] russh::Error),
    /// SSH key loading error.
    #[error("SSH key error: {0}")]
    SshKeyError(#[from] russh_keys::Error),
    /// WIM-specific error (service not found, status timeout, etc...).
    #[error("{0}")]
    WimError(#[from] WimConnectorError),
}

/// The distinguished error kinds a WIM connector call can fail with.
#[derive(Error, Debug)]
pub enum WimConnectorError {
    /// The requested connectivity service does not exist on the WIM side.
    #[error("connectivity service not found: {service_id}")]
    NotFound {
        /// The service id that was looked up.
        service_id: String,
    },
    /// The server did not reach an acceptable status within the allotted time.
    #[error("timed out waiting for connectivity service '{service_id}' to reach {expected:?}")]
    StatusTimeout {
        /// The service id being awaited.
        service_id: String,
        /// The statuses that would have been acceptable.
        expected: Vec<String>,
    },
    /// A response frame was received whose session id never matched an awaited request.
    #[error("unclaimed response for session {session}")]
    UnclaimedResponse {
        /// The session id found in the response envelope.
        session: u32,
    },
    /// Any other failure reported by the WIM.
    #[error("WIM connector error: {0}")]
    Other(String),
}
