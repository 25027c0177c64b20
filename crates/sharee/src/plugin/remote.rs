use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::{
    backend::{
        Contact, ContactField, ContactSearchOptions, ContactsProvider, TypedAddress, User,
        UserDirectory,
    },
    cloud_id::{CloudId, CloudIdResolver},
    config::SharingConfig,
    result::{Candidate, SearchResult, SearchResultType},
    share_type::ShareType,
};

use super::{SearchPlugin, Services, UserSession, user::user_candidate};

/// Searches the address books for federated cloud ids, and accepts any cloud id typed in
/// full
pub struct RemotePlugin {
    config: Arc<SharingConfig>,
    contacts: Arc<dyn ContactsProvider>,
    users: Arc<dyn UserDirectory>,
    cloud_ids: CloudIdResolver,
}

impl RemotePlugin {
    pub fn new(config: Arc<SharingConfig>, services: &Services) -> Self {
        Self {
            config,
            contacts: services.contacts.clone(),
            users: services.users.clone(),
            cloud_ids: services.cloud_ids.clone(),
        }
    }

    /// Returns the local user designated by this cloud id, if any
    fn local_user(&self, cloud_id: &CloudId) -> Option<User> {
        if !self.cloud_ids.is_local(cloud_id.remote()) {
            return None;
        }

        self.users.get(cloud_id.user())
    }

    /// Suggests a local user instead of a federated share with this server
    fn redirect_local_user(
        &self,
        user: &User,
        current_uid: &str,
        is_exact: bool,
        user_wide: &mut Vec<Candidate>,
        result: &mut SearchResult,
    ) {
        if user.uid == current_uid || result.has_result(&SearchResultType::USERS, &user.uid) {
            return;
        }

        debug!("Cloud id of local user {}", user.uid);
        let candidate = user_candidate(user, None);
        if is_exact {
            result.add_result_set(&SearchResultType::USERS, Vec::new(), vec![candidate]);
            result.mark_exact_id_match(&SearchResultType::USERS);
        } else if !user_wide.iter().any(|c| c.share_with() == user.uid) {
            user_wide.push(candidate);
        }
    }
}

#[async_trait]
impl SearchPlugin for RemotePlugin {
    async fn search(
        &self,
        session: &UserSession,
        query: &str,
        limit: usize,
        offset: usize,
        result: &mut SearchResult,
    ) -> bool {
        let current_uid = session.uid();
        let contacts = self.contacts.search(
            query,
            &[ContactField::Cloud, ContactField::FullName],
            ContactSearchOptions {
                limit,
                offset,
                enumeration: true,
                full_match: true,
            },
        );
        // The provider already paginated the contacts, all of their cloud ids are kept
        let has_more = contacts.len() >= limit;

        let lower_query = query.to_lowercase();
        let mut user_wide = Vec::new();
        let mut exact = Vec::new();
        let mut wide = Vec::new();

        for contact in contacts.iter().filter(|c| !c.is_local_system_book) {
            for address in &contact.cloud_ids {
                let Ok(cloud_id) = self.cloud_ids.resolve_cloud_id(address.value()) else {
                    debug!("Skipping invalid cloud id {}", address.value());
                    continue;
                };
                let exact_id = address.value().to_lowercase() == lower_query;

                if let Some(user) = self.local_user(&cloud_id) {
                    self.redirect_local_user(&user, current_uid, exact_id, &mut user_wide, result);
                    continue;
                }

                let candidate = remote_candidate(contact, address, &cloud_id);
                let exact_name = contact
                    .full_name
                    .as_deref()
                    .is_some_and(|name| name.to_lowercase() == lower_query);

                if exact_id || exact_name {
                    if exact_id {
                        result.mark_exact_id_match(&SearchResultType::REMOTES);
                    }
                    exact.push(candidate);
                } else {
                    wide.push(candidate);
                }
            }
        }

        if !self.config.enumeration.enabled {
            wide.clear();
            user_wide.clear();
        }

        // A cloud id typed in full is always a valid recipient
        if offset == 0
            && !result.has_exact_id_match(&SearchResultType::REMOTES)
            && self.cloud_ids.is_valid_cloud_id(query)
        {
            if let Ok(cloud_id) = self.cloud_ids.resolve_cloud_id(query) {
                match self.local_user(&cloud_id) {
                    Some(user) => {
                        if user.uid != current_uid {
                            self.redirect_local_user(
                                &user,
                                current_uid,
                                true,
                                &mut user_wide,
                                result,
                            );
                            result.mark_exact_id_match(&SearchResultType::USERS);
                        }
                    }
                    None => exact.push(
                        Candidate::new(
                            &format!("{} ({})", cloud_id.user(), cloud_id.remote()),
                            ShareType::Remote,
                            query,
                        )
                        .with_uuid(cloud_id.user())
                        .with_name(cloud_id.user())
                        .with_server(cloud_id.remote()),
                    ),
                }
            }
        }

        if !user_wide.is_empty() {
            result.add_result_set(&SearchResultType::USERS, user_wide, Vec::new());
        }
        result.add_result_set(&SearchResultType::REMOTES, wide, exact);

        has_more
    }
}

fn remote_candidate(contact: &Contact, address: &TypedAddress, cloud_id: &CloudId) -> Candidate {
    let label = match &contact.full_name {
        Some(full_name) => format!("{full_name} ({})", address.value()),
        None => address.value().to_string(),
    };

    let mut candidate = Candidate::new(&label, ShareType::Remote, address.value())
        .with_name(contact.full_name.as_deref().unwrap_or(&label))
        .with_address_type(address.kind())
        .with_server(cloud_id.remote());
    if let Some(uid) = &contact.uid {
        candidate = candidate.with_uuid(uid);
    }

    candidate
}
