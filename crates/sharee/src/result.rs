//! Accumulation of the candidates found by the search plugins

use std::{
    borrow::Cow,
    collections::{BTreeMap, HashMap, HashSet},
    fmt::Display,
};

use serde::{Deserialize, Serialize, Serializer, ser::SerializeMap};
use thiserror::Error;
use tracing::warn;

use crate::share_type::ShareType;

/// Label used by the serialized results to hold the exact matches
const RESERVED_EXACT_LABEL: &str = "exact";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidResultTypeError {
    #[error("type must not be empty")]
    Empty,
    #[error("type {0} is a reserved word")]
    Reserved(String),
}

/// Identifies the bucket of a [`SearchResult`] a plugin writes into.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SearchResultType(Cow<'static, str>);

impl SearchResultType {
    pub const USERS: Self = Self(Cow::Borrowed("users"));
    pub const GROUPS: Self = Self(Cow::Borrowed("groups"));
    pub const EMAILS: Self = Self(Cow::Borrowed("emails"));
    pub const REMOTES: Self = Self(Cow::Borrowed("remotes"));
    pub const REMOTE_GROUPS: Self = Self(Cow::Borrowed("remote_groups"));
    pub const CIRCLES: Self = Self(Cow::Borrowed("circles"));
    pub const LOOKUP: Self = Self(Cow::Borrowed("lookup"));

    /// Creates a new result type from a label, that is trimmed. The label must not be empty and
    /// must not collide with the key used for exact matches.
    pub fn new(label: &str) -> Result<Self, InvalidResultTypeError> {
        let label = label.trim();

        if label.is_empty() {
            return Err(InvalidResultTypeError::Empty);
        }

        if label == RESERVED_EXACT_LABEL {
            return Err(InvalidResultTypeError::Reserved(label.to_string()));
        }

        Ok(Self(Cow::Owned(label.to_string())))
    }

    pub fn label(&self) -> &str {
        &self.0
    }
}

impl Display for SearchResultType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Presence information attached to user candidates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStatus {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    /// Unix timestamp after which the message should be cleared
    #[serde(default)]
    pub clear_at: Option<i64>,
}

/// Who the resource would be shared with if the candidate is selected
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareTarget {
    pub share_type: ShareType,
    pub share_with: String,
    /// Remote server for federated shares
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    /// Set for the results of the lookup server
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_scale: Option<bool>,
}

/// A single suggested recipient
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub label: String,
    pub value: ShareTarget,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<UserStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share_with_display_name_unique: Option<String>,
    /// Type of the address in the contact card (HOME, WORK,...)
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub address_type: Option<String>,
    /// Raw record returned by the lookup server
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

impl Candidate {
    pub fn new(label: &str, share_type: ShareType, share_with: &str) -> Self {
        Self {
            label: label.to_string(),
            value: ShareTarget {
                share_type,
                share_with: share_with.to_string(),
                server: None,
                global_scale: None,
            },
            uuid: None,
            name: None,
            subline: None,
            icon: None,
            status: None,
            share_with_display_name_unique: None,
            address_type: None,
            extra: None,
        }
    }

    pub fn share_type(&self) -> ShareType {
        self.value.share_type
    }

    pub fn share_with(&self) -> &str {
        &self.value.share_with
    }

    pub fn server(&self) -> Option<&str> {
        self.value.server.as_deref()
    }

    pub fn with_server(mut self, server: &str) -> Self {
        self.value.server = Some(server.to_string());
        self
    }

    pub fn with_uuid(mut self, uuid: &str) -> Self {
        self.uuid = Some(uuid.to_string());
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_icon(mut self, icon: &str) -> Self {
        self.icon = Some(icon.to_string());
        self
    }

    /// Attaches a user status. The status message, if any, is used as subline.
    pub fn with_status(mut self, status: Option<UserStatus>) -> Self {
        if let Some(status) = status {
            self.subline = status.message.clone();
            self.status = Some(status);
        }
        self
    }

    pub fn with_unique_display_name(mut self, unique: &str) -> Self {
        self.share_with_display_name_unique = Some(unique.to_string());
        self
    }

    pub fn with_address_type(mut self, address_type: Option<&str>) -> Self {
        self.address_type = address_type.map(|t| t.to_string());
        self
    }

    pub fn with_lookup_record(mut self, global_scale: bool, record: serde_json::Value) -> Self {
        self.value.global_scale = Some(global_scale);
        self.extra = Some(record);
        self
    }
}

/// Candidates found for a [`SearchResultType`], split between exact and wide (fuzzy) matches
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultBucket {
    pub exact: Vec<Candidate>,
    pub wide: Vec<Candidate>,
}

impl ResultBucket {
    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.wide.is_empty()
    }

    /// Iterates over exact matches first, then wide ones
    pub fn iter(&self) -> impl Iterator<Item = &Candidate> {
        self.exact.iter().chain(self.wide.iter())
    }

    pub fn contains(&self, share_with: &str) -> bool {
        self.iter()
            .any(|candidate| candidate.share_with() == share_with)
    }
}

/// Serializes the buckets as `{label: {"exact": [..], label: [..]}}`: the wide matches are
/// listed under the label of their type.
pub(crate) fn serialize_buckets<S: Serializer>(
    buckets: &BTreeMap<String, ResultBucket>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(buckets.len()))?;
    for (label, bucket) in buckets {
        map.serialize_entry(label, &LabelledBucket { label, bucket })?;
    }
    map.end()
}

struct LabelledBucket<'a> {
    label: &'a str,
    bucket: &'a ResultBucket,
}

impl Serialize for LabelledBucket<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry(RESERVED_EXACT_LABEL, &self.bucket.exact)?;
        map.serialize_entry(self.label, &self.bucket.wide)?;
        map.end()
    }
}

/// Sink shared by all the plugins during a single search.
///
/// Plugins append their candidates per [`SearchResultType`], and flag the types for which they
/// found a match on the identifier of the recipient rather than on some fuzzy text.
#[derive(Debug, Default)]
pub struct SearchResult {
    buckets: HashMap<SearchResultType, ResultBucket>,
    exact_id_matches: HashSet<SearchResultType>,
}

impl SearchResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends candidates to the bucket of `result_type`, creating it if needed.
    ///
    /// Candidates without a recipient are dropped.
    pub fn add_result_set(
        &mut self,
        result_type: &SearchResultType,
        wide: Vec<Candidate>,
        exact: Vec<Candidate>,
    ) {
        let bucket = self.buckets.entry(result_type.clone()).or_default();

        let is_valid = |candidate: &Candidate| {
            if candidate.share_with().is_empty() {
                warn!("Dropping {result_type} candidate {} without recipient", candidate.label);
                false
            } else {
                true
            }
        };

        bucket.wide.extend(wide.into_iter().filter(is_valid));
        bucket.exact.extend(exact.into_iter().filter(is_valid));
    }

    pub fn mark_exact_id_match(&mut self, result_type: &SearchResultType) {
        self.exact_id_matches.insert(result_type.clone());
    }

    pub fn has_exact_id_match(&self, result_type: &SearchResultType) -> bool {
        self.exact_id_matches.contains(result_type)
    }

    /// Returns true if a candidate of this type already targets `share_with`
    pub fn has_result(&self, result_type: &SearchResultType, share_with: &str) -> bool {
        self.buckets
            .get(result_type)
            .is_some_and(|bucket| bucket.contains(share_with))
    }

    /// Removes all the candidates of this type targeting `share_with`.
    ///
    /// Returns true if at least one candidate has been removed.
    pub fn remove_collaborator_result(
        &mut self,
        result_type: &SearchResultType,
        share_with: &str,
    ) -> bool {
        let Some(bucket) = self.buckets.get_mut(result_type) else {
            return false;
        };

        let len_before = bucket.exact.len() + bucket.wide.len();
        bucket
            .exact
            .retain(|candidate| candidate.share_with() != share_with);
        bucket
            .wide
            .retain(|candidate| candidate.share_with() != share_with);

        len_before != bucket.exact.len() + bucket.wide.len()
    }

    /// Empties the bucket of this type. The bucket itself is kept in the results.
    pub fn unset_result(&mut self, result_type: &SearchResultType) {
        if let Some(bucket) = self.buckets.get_mut(result_type) {
            bucket.exact.clear();
            bucket.wide.clear();
        }
    }

    pub fn bucket(&self, result_type: &SearchResultType) -> Option<&ResultBucket> {
        self.buckets.get(result_type)
    }

    /// Returns a snapshot of all the buckets, indexed by type label
    pub fn as_map(&self) -> BTreeMap<String, ResultBucket> {
        self.buckets
            .iter()
            .map(|(result_type, bucket)| (result_type.label().to_string(), bucket.clone()))
            .collect()
    }
}
