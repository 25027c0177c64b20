//! Search plugins, one for each kind of recipient.
//!
//! A plugin queries its own backend and writes the candidates it finds into the shared
//! [`SearchResult`]. Plugins never fail: an unavailable backend simply contributes nothing.

mod circle;
mod group;
mod lookup;
mod mail;
mod remote;
mod remote_group;
mod user;

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    backend::{
        CircleDirectory, ContactsProvider, FederationProviders, GroupDirectory, HttpClient,
        KnownUserService, MemoryDirectory, ReqwestHttpClient, UserDirectory, UserStatusProvider,
    },
    cloud_id::CloudIdResolver,
    result::SearchResult,
};

pub use circle::CirclePlugin;
pub use group::GroupPlugin;
pub use lookup::{LookupError, LookupPlugin};
pub use mail::{MailPlugin, is_valid_email};
pub use remote::RemotePlugin;
pub use remote_group::RemoteGroupPlugin;
pub use user::UserPlugin;

/// The user performing the search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSession {
    uid: String,
}

impl UserSession {
    pub fn new(uid: &str) -> Self {
        Self {
            uid: uid.to_string(),
        }
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }
}

#[async_trait]
pub trait SearchPlugin: Send + Sync {
    /// Searches the backend of the plugin for `query` and adds the candidates to `result`.
    ///
    /// `limit` and `offset` paginate over the backend. Returns true if a following page may
    /// hold more results.
    async fn search(
        &self,
        session: &UserSession,
        query: &str,
        limit: usize,
        offset: usize,
        result: &mut SearchResult,
    ) -> bool;
}

/// Services the default plugins are built from
#[derive(Clone)]
pub struct Services {
    pub users: Arc<dyn UserDirectory>,
    pub groups: Arc<dyn GroupDirectory>,
    pub contacts: Arc<dyn ContactsProvider>,
    pub known_users: Arc<dyn KnownUserService>,
    pub statuses: Arc<dyn UserStatusProvider>,
    pub federation: Arc<dyn FederationProviders>,
    /// Circles are an optional feature, the plugin is only registered if this is set
    pub circles: Option<Arc<dyn CircleDirectory>>,
    pub http: Arc<dyn HttpClient>,
    pub cloud_ids: CloudIdResolver,
}

impl Services {
    /// Uses a single [`MemoryDirectory`] for all the directories, and reqwest for http
    pub fn from_directory(directory: Arc<MemoryDirectory>, local_server: &str) -> Self {
        Self {
            users: directory.clone(),
            groups: directory.clone(),
            contacts: directory.clone(),
            known_users: directory.clone(),
            statuses: directory.clone(),
            federation: directory.clone(),
            circles: Some(directory),
            http: Arc::new(ReqwestHttpClient::new()),
            cloud_ids: CloudIdResolver::new(local_server),
        }
    }

    pub fn with_http_client(self, http: Arc<dyn HttpClient>) -> Self {
        Self { http, ..self }
    }
}

/// Returns true if `uid` is a member of at least one of `groups`
fn shares_group(directory: &dyn GroupDirectory, groups: &[String], uid: &str) -> bool {
    groups.iter().any(|gid| directory.is_in_group(uid, gid))
}
