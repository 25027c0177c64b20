use std::{collections::HashSet, sync::Arc};

use async_trait::async_trait;
use tracing::debug;

use crate::{
    backend::{GroupDirectory, KnownUserService, User, UserDirectory, UserStatusProvider},
    config::SharingConfig,
    result::{Candidate, SearchResult, SearchResultType, UserStatus},
    share_type::ShareType,
};

use super::{SearchPlugin, Services, UserSession, shares_group};

/// Searches the local users
pub struct UserPlugin {
    config: Arc<SharingConfig>,
    users: Arc<dyn UserDirectory>,
    groups: Arc<dyn GroupDirectory>,
    known_users: Arc<dyn KnownUserService>,
    statuses: Arc<dyn UserStatusProvider>,
}

/// Users found in the backend, without duplicates
#[derive(Default)]
struct UserList {
    users: Vec<User>,
    uids: HashSet<String>,
}

impl UserList {
    fn insert(&mut self, user: User) {
        if user.enabled && self.uids.insert(user.uid.clone()) {
            self.users.push(user);
        }
    }

    fn extend<I: IntoIterator<Item = User>>(&mut self, users: I) {
        for user in users {
            self.insert(user)
        }
    }
}

impl UserPlugin {
    pub fn new(config: Arc<SharingConfig>, services: &Services) -> Self {
        Self {
            config,
            users: services.users.clone(),
            groups: services.groups.clone(),
            known_users: services.known_users.clone(),
            statuses: services.statuses.clone(),
        }
    }

    /// Loads the users matching the query, following the enumeration restrictions.
    ///
    /// Returns the users and whether one of the backend pages was full
    fn find_users(
        &self,
        current_uid: &str,
        current_groups: &[String],
        group_only: bool,
        query: &str,
        limit: usize,
        offset: usize,
    ) -> (Vec<User>, bool) {
        let enumeration = &self.config.enumeration;
        let mut found = UserList::default();
        let mut has_more = false;

        if group_only || enumeration.restrict_to_group {
            for gid in current_groups {
                let members = self
                    .groups
                    .display_names_in_group(gid, query, limit, offset);
                has_more |= members.len() >= limit;

                found.extend(members.iter().filter_map(|(uid, _)| self.users.get(uid)));
            }

            if !group_only && enumeration.restrict_to_phone {
                let known = self.users.search_known_users_by_display_name(
                    current_uid,
                    query,
                    limit,
                    offset,
                );
                has_more |= known.len() >= limit;
                found.extend(known);

                found
                    .users
                    .sort_by_key(|user| user.display_name.to_lowercase());
            }
        } else {
            let users = if enumeration.restrict_to_phone {
                self.users
                    .search_known_users_by_display_name(current_uid, query, limit, offset)
            } else {
                self.users.search_display_name(query, limit, offset)
            };
            has_more |= users.len() >= limit;
            found.extend(users);
        }

        let mut users = found.users;
        users.retain(|user| user.uid != current_uid);

        (users, has_more)
    }

    fn is_full_match(&self, user: &User, lower_query: &str) -> bool {
        let enumeration = &self.config.enumeration;

        if !enumeration.full_match || lower_query.is_empty() {
            return false;
        }

        (enumeration.full_match_user_id && user.uid.to_lowercase() == lower_query)
            || user.display_name.to_lowercase() == lower_query
            || (enumeration.full_match_ignore_second_display_name
                && strip_second_display_name(&user.display_name).to_lowercase() == lower_query)
            || (enumeration.full_match_email
                && user
                    .system_email
                    .as_deref()
                    .is_some_and(|email| email.to_lowercase() == lower_query))
    }

    /// Checks if a user that does not fully match the query can be listed
    fn can_enumerate(&self, current_uid: &str, current_groups: &[String], user: &User) -> bool {
        let enumeration = &self.config.enumeration;

        if !enumeration.enabled {
            return false;
        }

        enumeration.is_unrestricted()
            || (enumeration.restrict_to_phone
                && self.known_users.is_known_to_user(current_uid, &user.uid))
            || (enumeration.restrict_to_group
                && shares_group(self.groups.as_ref(), current_groups, &user.uid))
    }
}

#[async_trait]
impl SearchPlugin for UserPlugin {
    async fn search(
        &self,
        session: &UserSession,
        query: &str,
        limit: usize,
        offset: usize,
        result: &mut SearchResult,
    ) -> bool {
        let enumeration = &self.config.enumeration;
        let current_uid = session.uid();
        let current_groups = self.groups.user_group_ids(current_uid);
        let group_only = self.config.share_with_group_only(&current_groups);

        let (users, has_more) =
            self.find_users(current_uid, &current_groups, group_only, query, limit, offset);

        let uids: Vec<String> = users.iter().map(|user| user.uid.clone()).collect();
        let mut statuses = self.statuses.user_statuses(&uids);

        let lower_query = query.to_lowercase();
        let mut exact = Vec::new();
        let mut wide = Vec::new();
        let mut found_by_id = false;

        for user in users {
            let status = statuses.remove(&user.uid);

            if self.is_full_match(&user, &lower_query) {
                found_by_id |=
                    enumeration.full_match_user_id && user.uid.to_lowercase() == lower_query;
                exact.push(user_candidate(&user, status));
            } else if self.can_enumerate(current_uid, &current_groups, &user) {
                wide.push(user_candidate(&user, status));
            }
        }

        // On page one, look for a direct hit on the user id
        if enumeration.full_match
            && enumeration.full_match_user_id
            && offset == 0
            && !found_by_id
            && !query.is_empty()
        {
            let direct_hit = self.users.get(query).filter(|user| {
                user.enabled
                    && user.uid != current_uid
                    && !exact.iter().any(|c: &Candidate| c.share_with() == user.uid)
                    && (!group_only
                        || shares_group(self.groups.as_ref(), &current_groups, &user.uid))
            });

            if let Some(user) = direct_hit {
                debug!("Found user {} by id", user.uid);
                wide.retain(|c| c.share_with() != user.uid);
                let status = self
                    .statuses
                    .user_statuses(std::slice::from_ref(&user.uid))
                    .remove(&user.uid);
                exact.push(user_candidate(&user, status));
            }
        }

        debug!(
            "User search for {query:?}: {} exact and {} wide matches",
            exact.len(),
            wide.len()
        );

        let has_exact = !exact.is_empty();
        result.add_result_set(&SearchResultType::USERS, wide, exact);
        if has_exact {
            result.mark_exact_id_match(&SearchResultType::USERS);
        }

        has_more
    }
}

pub(super) fn user_candidate(user: &User, status: Option<UserStatus>) -> Candidate {
    let unique = user
        .system_email
        .as_deref()
        .filter(|email| !email.is_empty())
        .unwrap_or(&user.uid);

    Candidate::new(&user.display_name, ShareType::User, &user.uid)
        .with_icon("icon-user")
        .with_status(status)
        .with_unique_display_name(unique)
}

/// Removes a trailing parenthesized part from a display name, eg: `Alice (Sales)` -> `Alice`
fn strip_second_display_name(display_name: &str) -> &str {
    if !display_name.ends_with(')') {
        return display_name;
    }

    match display_name.find(" (") {
        Some(pos) => display_name[..pos].trim(),
        None => display_name,
    }
}
