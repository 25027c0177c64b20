//! Kinds of recipients a resource can be shared with

use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::Error;

/// The kind of a share recipient.
///
/// Serialized as the numeric code used by the sharing API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ShareType {
    User,
    Group,
    Email,
    Remote,
    Circle,
    RemoteGroup,
}

impl ShareType {
    pub const ALL: [ShareType; 6] = [
        Self::User,
        Self::Group,
        Self::Email,
        Self::Remote,
        Self::Circle,
        Self::RemoteGroup,
    ];

    pub fn code(self) -> u8 {
        match self {
            Self::User => 0,
            Self::Group => 1,
            Self::Email => 4,
            Self::Remote => 6,
            Self::Circle => 7,
            Self::RemoteGroup => 9,
        }
    }

    /// Name used when registering a plugin for this type
    pub fn registration_name(self) -> &'static str {
        match self {
            Self::User => "SHARE_TYPE_USER",
            Self::Group => "SHARE_TYPE_GROUP",
            Self::Email => "SHARE_TYPE_EMAIL",
            Self::Remote => "SHARE_TYPE_REMOTE",
            Self::Circle => "SHARE_TYPE_CIRCLE",
            Self::RemoteGroup => "SHARE_TYPE_REMOTE_GROUP",
        }
    }
}

impl From<ShareType> for u8 {
    fn from(value: ShareType) -> Self {
        value.code()
    }
}

impl TryFrom<u8> for ShareType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|share_type| share_type.code() == value)
            .ok_or_else(|| Error::InvalidShareType(value.to_string()))
    }
}

impl FromStr for ShareType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|share_type| share_type.registration_name() == s)
            .ok_or_else(|| Error::InvalidShareType(s.to_string()))
    }
}

impl Display for ShareType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.registration_name())
    }
}
