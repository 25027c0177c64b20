//! Search for the recipients of a share.
//!
//! A [`Search`] fans a query out to the [`SearchPlugin`]s registered for each requested
//! [`ShareType`]. Every plugin writes its candidates into a shared [`SearchResult`], that is
//! then reconciled to remove redundant recipients before being returned to the caller.
//!
//! [`Search`]: search::Search
//! [`SearchPlugin`]: plugin::SearchPlugin
//! [`SearchResult`]: result::SearchResult

use thiserror::Error;

pub mod backend;
pub mod cloud_id;
pub mod config;
pub mod plugin;
pub mod result;
pub mod search;
pub mod share_type;

#[cfg(test)]
mod test_utils;

pub use config::{ConfigLoadError, SharingConfig};
pub use result::{Candidate, SearchResult, SearchResultType};
pub use search::{Search, SearchOutcome};
pub use share_type::ShareType;

#[derive(Error, Debug)]
pub enum Error {
    #[error("provided share type is invalid: {0}")]
    InvalidShareType(String),
    #[error("invalid search result type")]
    InvalidResultType(#[from] result::InvalidResultTypeError),
    #[error("failed to load configuration")]
    ConfigLoad(#[from] ConfigLoadError),
}
