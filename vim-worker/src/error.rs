use std::io;

use diesel::result::Error as SQLError;
use io::Error as IOError;
use json::Error as JSONError;
use thiserror::Error;
use toml::de::Error as TOMLError;

/// The maximum length, in bytes, of an error message written to storage.
pub const MAX_STORED_ERROR_LEN: usize = 1024;

/// The top-level error type for the worker process.
///
/// Distinct from [`TaskError`]: this covers failures in the ambient stack
/// (config loading, the database pool, process bootstrap), while `TaskError`
/// covers failures attributable to a single task's execution.
#[derive(Error, Debug)]
pub enum Error {
    /// An IO error (file not found, access forbidden, etc...).
    #[error("IO error: {0}")]
    IOError(#[from] IOError),
    /// JSON (de)serialization error (invalid JSON parsed, etc...).
    #[error("JSON error: {0}")]
    JSONError(#[from] JSONError),
    /// TOML (de)serialization error (invalid TOML parsed in the config file).
    #[error("TOML error: {0}")]
    TOMLError(#[from] TOMLError),
    /// YAML (de)serialization error (invalid YAML in a task's `extra` payload).
    #[error("YAML error: {0}")]
    YAMLError(#[from] serde_yaml::Error),
    /// SQL error (invalid queries, database disconnections, etc...).
    #[error("SQL error: {0}")]
    SQLError(#[from] SQLError),
    /// The configured VIM driver failed.
    #[error("VIM driver error: {0}")]
    VimDriverError(#[from] vim_driver::error::Error),
    /// The configured WIM connector failed.
    #[error("WIM connector error: {0}")]
    WimConnectorError(#[from] wim_connector::error::Error),
    /// A task-level error surfaced out of the executor or refresh scheduler.
    #[error("task error: {0}")]
    TaskError(#[from] TaskError),
    /// A stored row could not be decoded into its in-memory representation
    /// (unknown `item`/`action`/`status` discriminant, malformed timestamp).
    #[error("malformed task row: {0}")]
    MalformedRow(String),
}

/// Errors attributable to the execution of a single task, named after the
/// failure domains the worker must distinguish when deciding how to react
/// (retry, supersede, persist and move on, or propagate).
#[derive(Error, Debug)]
pub enum TaskError {
    /// The driver reports the referenced VIM-side object does not exist.
    /// DELETE treats this as success; FIND treats it as a miss.
    #[error("not found: {item} '{vim_id}' on VIM")]
    NotFound {
        /// The kind of item that was looked up (`"vms"`, `"nets"`, ...).
        item: String,
        /// The VIM-side identifier that was looked up, if known.
        vim_id: String,
    },
    /// A FIND filter matched more than one VIM-side object.
    #[error("ambiguous match: {count} candidates found for {item}")]
    Ambiguous {
        /// The kind of item that was looked up.
        item: String,
        /// The number of matching candidates found.
        count: usize,
    },
    /// A task could not run because a dependency it `depends_on` failed.
    #[error("dependency task failed")]
    DependencyFailed,
    /// A task exhausted its dependency-wait retries without its dependency completing.
    #[error("timed out waiting for a dependency task to complete")]
    DependencyTimeout,
    /// The underlying VIM driver returned an error not covered by a more
    /// specific variant above.
    #[error("VIM driver error: {0}")]
    DriverError(#[from] vim_driver::error::Error),
    /// The underlying WIM connector returned an error.
    #[error("WIM connector error: {0}")]
    WimError(#[from] wim_connector::error::Error),
    /// The SDN overlay client returned an error.
    #[error("SDN overlay error: {0}")]
    OverlayError(String),
    /// Persisting a task's result to the action store failed. Logged and the
    /// worker loop continues; never propagated out of the worker.
    #[error("store error: {0}")]
    StoreError(#[from] SQLError),
}

/// Truncates an error message to at most [`MAX_STORED_ERROR_LEN`] bytes by
/// eliding the middle, keeping equal-sized prefix and suffix slices. Leaves
/// short messages untouched.
///
/// Used before writing any task's `error_msg` column, so that a verbose
/// driver exception never overflows the column and both the cause (start)
/// and the final failure (end) of a long traceback-style message survive.
pub fn truncate_error_message(message: &str) -> String {
    if message.len() <= MAX_STORED_ERROR_LEN {
        return message.to_string();
    }

    const SEP: &str = " ... ";
    let half = (MAX_STORED_ERROR_LEN - SEP.len()) / 2;

    let head_end = floor_char_boundary(message, half);
    let tail_start = ceil_char_boundary(message, message.len() - half);

    format!("{}{}{}", &message[..head_end], SEP, &message[tail_start..])
}

fn floor_char_boundary(s: &str, index: usize) -> usize {
    let mut i = index.min(s.len());
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn ceil_char_boundary(s: &str, index: usize) -> usize {
    let mut i = index.min(s.len());
    while i < s.len() && !s.is_char_boundary(i) {
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_messages_are_untouched() {
        let msg = "connection refused";
        assert_eq!(truncate_error_message(msg), msg);
    }

    #[test]
    fn long_messages_are_elided_in_the_middle() {
        let msg = "a".repeat(2000);
        let truncated = truncate_error_message(&msg);
        assert!(truncated.len() <= MAX_STORED_ERROR_LEN);
        assert!(truncated.contains(" ... "));
        assert!(truncated.starts_with('a'));
        assert!(truncated.ends_with('a'));
    }

    #[test]
    fn boundary_length_is_untouched() {
        let msg = "a".repeat(MAX_STORED_ERROR_LEN);
        assert_eq!(truncate_error_message(&msg), msg);
    }
}
