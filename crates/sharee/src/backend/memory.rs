//! Directory held in memory, that implements all the backend traits.
//!
//! It can be deserialized from a fixture file, which is what the CLI does.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;

use crate::result::UserStatus;

use super::{
    Circle, CircleDirectory, Contact, ContactField, ContactSearchOptions, ContactsProvider,
    FederationProviders, Group, GroupDirectory, KnownUserService, User, UserDirectory,
    UserStatusProvider,
};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct GroupEntry {
    #[serde(flatten)]
    group: Group,
    #[serde(default)]
    members: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MemoryDirectory {
    users: Vec<User>,
    groups: Vec<GroupEntry>,
    contacts: Vec<Contact>,
    /// For each user, the list of users they know
    known_users: HashMap<String, HashSet<String>>,
    statuses: HashMap<String, UserStatus>,
    circles: Vec<Circle>,
    /// For each federation provider, the share types it supports
    federation_share_types: HashMap<String, Vec<String>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user: User) -> Self {
        self.users.push(user);
        self
    }

    pub fn with_group(mut self, group: Group, members: &[&str]) -> Self {
        self.groups.push(GroupEntry {
            group,
            members: members.iter().map(|uid| uid.to_string()).collect(),
        });
        self
    }

    pub fn with_contact(mut self, contact: Contact) -> Self {
        self.contacts.push(contact);
        self
    }

    pub fn with_known_user(mut self, current_uid: &str, known_uid: &str) -> Self {
        self.known_users
            .entry(current_uid.to_string())
            .or_default()
            .insert(known_uid.to_string());
        self
    }

    pub fn with_status(mut self, uid: &str, status: UserStatus) -> Self {
        self.statuses.insert(uid.to_string(), status);
        self
    }

    pub fn with_circle(mut self, circle: Circle) -> Self {
        self.circles.push(circle);
        self
    }

    pub fn with_federation_provider(mut self, provider: &str, share_types: &[&str]) -> Self {
        self.federation_share_types.insert(
            provider.to_string(),
            share_types.iter().map(|t| t.to_string()).collect(),
        );
        self
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    fn user_matches(user: &User, query: &str) -> bool {
        contains_ignore_case(&user.uid, query)
            || contains_ignore_case(&user.display_name, query)
            || user
                .system_email
                .as_deref()
                .is_some_and(|email| contains_ignore_case(email, query))
    }

    fn contact_matches(
        contact: &Contact,
        query: &str,
        field: ContactField,
        options: &ContactSearchOptions,
    ) -> bool {
        let values: Vec<&str> = match field {
            ContactField::Email => contact.emails.iter().map(|email| email.value()).collect(),
            ContactField::Cloud => contact.cloud_ids.iter().map(|cloud| cloud.value()).collect(),
            ContactField::FullName => contact.full_name.iter().map(|name| name.as_str()).collect(),
        };

        values.into_iter().any(|value| {
            (options.enumeration && contains_ignore_case(value, query))
                || (options.full_match && value.eq_ignore_ascii_case(query))
        })
    }
}

impl UserDirectory for MemoryDirectory {
    fn get(&self, uid: &str) -> Option<User> {
        self.users.iter().find(|user| user.uid == uid).cloned()
    }

    fn search_display_name(&self, query: &str, limit: usize, offset: usize) -> Vec<User> {
        self.users
            .iter()
            .filter(|user| Self::user_matches(user, query))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect()
    }

    fn search_known_users_by_display_name(
        &self,
        current_uid: &str,
        query: &str,
        limit: usize,
        offset: usize,
    ) -> Vec<User> {
        let Some(known) = self.known_users.get(current_uid) else {
            return Vec::new();
        };

        self.users
            .iter()
            .filter(|user| known.contains(&user.uid) && Self::user_matches(user, query))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect()
    }
}

impl GroupDirectory for MemoryDirectory {
    fn search(&self, query: &str, limit: usize, offset: usize) -> Vec<Group> {
        self.groups
            .iter()
            .map(|entry| &entry.group)
            .filter(|group| {
                contains_ignore_case(&group.gid, query)
                    || contains_ignore_case(&group.display_name, query)
            })
            .skip(offset)
            .take(limit)
            .cloned()
            .collect()
    }

    fn get(&self, gid: &str) -> Option<Group> {
        self.groups
            .iter()
            .find(|entry| entry.group.gid == gid)
            .map(|entry| entry.group.clone())
    }

    fn user_group_ids(&self, uid: &str) -> Vec<String> {
        self.groups
            .iter()
            .filter(|entry| entry.members.iter().any(|member| member == uid))
            .map(|entry| entry.group.gid.clone())
            .collect()
    }

    fn display_names_in_group(
        &self,
        gid: &str,
        query: &str,
        limit: usize,
        offset: usize,
    ) -> Vec<(String, String)> {
        let Some(entry) = self.groups.iter().find(|entry| entry.group.gid == gid) else {
            return Vec::new();
        };

        self.users
            .iter()
            .filter(|user| entry.members.contains(&user.uid) && Self::user_matches(user, query))
            .skip(offset)
            .take(limit)
            .map(|user| (user.uid.clone(), user.display_name.clone()))
            .collect()
    }

    fn is_in_group(&self, uid: &str, gid: &str) -> bool {
        self.groups
            .iter()
            .any(|entry| entry.group.gid == gid && entry.members.iter().any(|m| m == uid))
    }
}

impl ContactsProvider for MemoryDirectory {
    fn search(
        &self,
        query: &str,
        fields: &[ContactField],
        options: ContactSearchOptions,
    ) -> Vec<Contact> {
        self.contacts
            .iter()
            .filter(|contact| {
                fields
                    .iter()
                    .any(|field| Self::contact_matches(contact, query, *field, &options))
            })
            .skip(options.offset)
            .take(options.limit)
            .cloned()
            .collect()
    }
}

impl KnownUserService for MemoryDirectory {
    fn is_known_to_user(&self, current_uid: &str, candidate_uid: &str) -> bool {
        self.known_users
            .get(current_uid)
            .is_some_and(|known| known.contains(candidate_uid))
    }
}

impl UserStatusProvider for MemoryDirectory {
    fn user_statuses(&self, uids: &[String]) -> HashMap<String, UserStatus> {
        uids.iter()
            .filter_map(|uid| {
                self.statuses
                    .get(uid)
                    .map(|status| (uid.clone(), status.clone()))
            })
            .collect()
    }
}

impl FederationProviders for MemoryDirectory {
    fn supported_share_types(&self, provider: &str) -> Option<Vec<String>> {
        self.federation_share_types.get(provider).cloned()
    }
}

impl CircleDirectory for MemoryDirectory {
    fn search(&self, query: &str, limit: usize, offset: usize) -> Vec<Circle> {
        self.circles
            .iter()
            .filter(|circle| contains_ignore_case(&circle.name, query))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect()
    }
}

fn contains_ignore_case(value: &str, query: &str) -> bool {
    value.to_lowercase().contains(&query.to_lowercase())
}
