//! Services queried by the search plugins.
//!
//! The directories holding users, groups, contacts and circles are owned by other components.
//! They are only accessed through the traits defined here, so they can be backed by a database,
//! an LDAP server or the in-memory [`MemoryDirectory`].

pub mod http;
pub mod memory;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::result::UserStatus;

pub use http::{HttpClient, HttpError, HttpResponse, ReqwestHttpClient, RequestOptions};
pub use memory::MemoryDirectory;

/// A user of the local server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub uid: String,
    pub display_name: String,
    #[serde(default)]
    pub system_email: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl User {
    pub fn new(uid: &str, display_name: &str) -> Self {
        Self {
            uid: uid.to_string(),
            display_name: display_name.to_string(),
            system_email: None,
            enabled: true,
        }
    }

    pub fn with_email(self, email: &str) -> Self {
        Self {
            system_email: Some(email.to_string()),
            ..self
        }
    }

    pub fn disabled(self) -> Self {
        Self {
            enabled: false,
            ..self
        }
    }
}

/// A group of the local server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub gid: String,
    pub display_name: String,
    #[serde(default)]
    pub hide_from_collaboration: bool,
}

impl Group {
    pub fn new(gid: &str, display_name: &str) -> Self {
        Self {
            gid: gid.to_string(),
            display_name: display_name.to_string(),
            hide_from_collaboration: false,
        }
    }

    pub fn hidden(self) -> Self {
        Self {
            hide_from_collaboration: true,
            ..self
        }
    }
}

/// An email address or cloud id from a contact card, with its optional type (HOME, WORK,...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypedAddress {
    Plain(String),
    Typed {
        value: String,
        #[serde(rename = "type")]
        kind: String,
    },
}

impl TypedAddress {
    pub fn value(&self) -> &str {
        match self {
            Self::Plain(value) | Self::Typed { value, .. } => value,
        }
    }

    pub fn kind(&self) -> Option<&str> {
        match self {
            Self::Plain(_) => None,
            Self::Typed { kind, .. } => Some(kind),
        }
    }
}

impl From<&str> for TypedAddress {
    fn from(value: &str) -> Self {
        Self::Plain(value.to_string())
    }
}

/// A card from the address books
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// Unique id of the card. For the system address book, this is the uid of the user.
    #[serde(default)]
    pub uid: Option<String>,
    /// Formatted name
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub emails: Vec<TypedAddress>,
    #[serde(default)]
    pub cloud_ids: Vec<TypedAddress>,
    /// The card describes a user of the local server
    #[serde(default)]
    pub is_local_system_book: bool,
}

/// Fields of a contact card a search can match on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContactField {
    Email,
    FullName,
    Cloud,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactSearchOptions {
    pub limit: usize,
    pub offset: usize,
    /// Allow partial matches on the searched fields
    pub enumeration: bool,
    /// Also return cards where a field is equal to the query
    pub full_match: bool,
}

/// A named group of people, managed by a circles provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Circle {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub owner: Option<String>,
}

pub trait UserDirectory: Send + Sync {
    fn get(&self, uid: &str) -> Option<User>;

    /// Searches users whose uid or display name contains `query`
    fn search_display_name(&self, query: &str, limit: usize, offset: usize) -> Vec<User>;

    /// Same as [`Self::search_display_name`] but restricted to the users `current_uid` knows,
    /// for example because they are in their phone contacts
    fn search_known_users_by_display_name(
        &self,
        current_uid: &str,
        query: &str,
        limit: usize,
        offset: usize,
    ) -> Vec<User>;
}

pub trait GroupDirectory: Send + Sync {
    fn search(&self, query: &str, limit: usize, offset: usize) -> Vec<Group>;

    fn get(&self, gid: &str) -> Option<Group>;

    fn user_group_ids(&self, uid: &str) -> Vec<String>;

    /// Returns the `(uid, display name)` of the members of `gid` matching `query`
    fn display_names_in_group(
        &self,
        gid: &str,
        query: &str,
        limit: usize,
        offset: usize,
    ) -> Vec<(String, String)>;

    fn is_in_group(&self, uid: &str, gid: &str) -> bool;
}

pub trait ContactsProvider: Send + Sync {
    fn search(
        &self,
        query: &str,
        fields: &[ContactField],
        options: ContactSearchOptions,
    ) -> Vec<Contact>;
}

pub trait KnownUserService: Send + Sync {
    fn is_known_to_user(&self, current_uid: &str, candidate_uid: &str) -> bool;
}

pub trait UserStatusProvider: Send + Sync {
    fn user_statuses(&self, uids: &[String]) -> HashMap<String, UserStatus>;
}

pub trait FederationProviders: Send + Sync {
    /// Share types supported by a cloud federation provider, or None if it is not installed
    fn supported_share_types(&self, provider: &str) -> Option<Vec<String>>;
}

pub trait CircleDirectory: Send + Sync {
    fn search(&self, query: &str, limit: usize, offset: usize) -> Vec<Circle>;
}

fn default_true() -> bool {
    true
}
