//! One module per supported VIM family, each implementing [`crate::VimDriver`].

pub mod aws;
pub mod opennebula;
pub mod openstack;
pub mod openvim;
pub mod vmware;

use crate::error::{Error, VimDriverError};
use crate::models::NetworkRecord;

/// Picks the single matching record out of a FIND result set, per spec semantics:
/// zero matches is `NotFound`, more than one is `Ambiguous`.
pub(crate) fn pick_one(
    item: &str,
    mut matches: Vec<NetworkRecord>,
) -> Result<NetworkRecord, Error> {
    match matches.len() {
        0 => Err(VimDriverError::NotFound {
            item: item.to_string(),
            vim_id: String::new(),
        }
        .into()),
        1 => Ok(matches.remove(0)),
        count => Err(VimDriverError::Ambiguous {
            item: item.to_string(),
            count,
        }
        .into()),
    }
}

/// Maps a non-2xx HTTP status from a VIM REST API into the right [`VimDriverError`]
/// variant, distinguishing 404 (treated as `NotFound`) from other failures.
pub(crate) fn map_http_error(item: &str, vim_id: &str, status: reqwest::StatusCode) -> Error {
    if status == reqwest::StatusCode::NOT_FOUND {
        VimDriverError::NotFound {
            item: item.to_string(),
            vim_id: vim_id.to_string(),
        }
        .into()
    } else {
        VimDriverError::Other(format!("{item} request failed with status {status}")).into()
    }
}
