use thiserror::Error;

/// The error type produced by a [`crate::VimDriver`] implementation.
#[derive(Error, Debug)]
pub enum Error {
    /// An IO error (connection refused, timed-out socket, etc...).
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),
    /// JSON (de)serialization error (malformed VIM response, etc...).
    #[error("JSON error: {0}")]
    JSONError(#[from] json::Error),
    /// HTTP transport error talking to the VIM's REST API.
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
    /// Driver-specific error (object not found, ambiguous match, etc...).
    #[error("{0}")]
    DriverError(#[from] VimDriverError),
}

/// The distinguished error kinds a VIM driver call can fail with.
///
/// [`VimDriverError::NotFound`] is singled out because DELETE operations treat it as
/// success (the object is already gone) and FIND operations treat it as a miss rather
/// than a hard failure.
#[derive(Error, Debug)]
pub enum VimDriverError {
    /// The requested object does not exist on the VIM side.
    #[error("object not found on VIM '{vim_id}': {item}")]
    NotFound {
        /// The kind of object that was looked up.
        item: String,
        /// The id (VIM-side or local) used to look it up.
        vim_id: String,
    },
    /// A FIND query matched more than one object.
    #[error("ambiguous match for {item}: {count} objects found")]
    Ambiguous {
        /// The kind of object that was looked up.
        item: String,
        /// The number of matches found.
        count: usize,
    },
    /// Any other failure reported by the VIM (rejected request, internal error, etc...).
    #[error("VIM driver error: {0}")]
    Other(String),
}
