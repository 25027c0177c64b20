//! Administrative settings that drive the behavior of the search plugins

use std::{
    env, fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::RequestOptions;

pub const CONFIG_FILE_NAME: &str = "config.toml";

const APP_NAME: &str = "sharee";

pub const DEFAULT_LOOKUP_SERVER: &str = "https://lookup.nextcloud.com";

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("Failed to read TOML file")]
    IoError(#[from] io::Error),
    #[error("Failed to parse TOML file")]
    InvalidConfig(#[from] toml::de::Error),
}

/// How users can discover other users and groups while typing in the share dialog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnumerationConfig {
    /// Allow partial matches to be returned
    pub enabled: bool,
    /// Only enumerate users and groups the searcher shares a group with
    pub restrict_to_group: bool,
    /// Only enumerate users the searcher knows through their phone contacts
    pub restrict_to_phone: bool,
    /// Return full matches even when enumeration is disabled or restricted
    pub full_match: bool,
    pub full_match_user_id: bool,
    pub full_match_email: bool,
    /// Also consider a display name like `Alice (Marketing)` to fully match `Alice`
    pub full_match_ignore_second_display_name: bool,
}

impl Default for EnumerationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            restrict_to_group: false,
            restrict_to_phone: false,
            full_match: true,
            full_match_user_id: true,
            full_match_email: true,
            full_match_ignore_second_display_name: false,
        }
    }
}

impl EnumerationConfig {
    /// Enumeration is allowed without group or phone restriction
    pub fn is_unrestricted(&self) -> bool {
        self.enabled && !(self.restrict_to_group || self.restrict_to_phone)
    }
}

/// Access to the global lookup server, that lists users of other federated servers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    pub enabled: bool,
    /// In a global scale setup, the lookup server is always queried
    pub global_scale: bool,
    pub has_internet_connection: bool,
    pub server_url: String,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            global_scale: false,
            has_internet_connection: true,
            server_url: DEFAULT_LOOKUP_SERVER.to_string(),
            timeout_secs: 10,
            connect_timeout_secs: 3,
        }
    }
}

impl LookupConfig {
    pub fn is_active(&self) -> bool {
        self.global_scale || (self.enabled && self.has_internet_connection)
    }

    pub fn request_options(&self) -> RequestOptions {
        RequestOptions {
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Sharing settings of the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SharingConfig {
    pub allow_group_sharing: bool,
    /// Users can only share with members of their own groups
    pub only_share_with_group_members: bool,
    /// Members of these groups are not restricted by `only_share_with_group_members`
    pub group_members_only_exclude_groups: Vec<String>,
    pub circles_enabled: bool,
    pub enumeration: EnumerationConfig,
    pub lookup: LookupConfig,
}

impl Default for SharingConfig {
    fn default() -> Self {
        Self {
            allow_group_sharing: true,
            only_share_with_group_members: false,
            group_members_only_exclude_groups: Vec::new(),
            circles_enabled: false,
            enumeration: EnumerationConfig::default(),
            lookup: LookupConfig::default(),
        }
    }
}

impl SharingConfig {
    /// Returns true if a user in `user_groups` can only share with members of these groups
    pub fn share_with_group_only(&self, user_groups: &[String]) -> bool {
        self.only_share_with_group_members
            && !user_groups
                .iter()
                .any(|gid| self.group_members_only_exclude_groups.contains(gid))
    }
}

/// Default location of the config file: `$XDG_CONFIG_HOME/sharee/config.toml`, or
/// `$HOME/.config/sharee/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    let config_home = env::var("XDG_CONFIG_HOME")
        .ok()
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .or_else(|| {
            let home = env::var("HOME").ok().map(PathBuf::from)?;
            Some(home.join(".config"))
        })?;

    Some(config_home.join(APP_NAME).join(CONFIG_FILE_NAME))
}

pub fn load_config<P: AsRef<Path>>(config_path: P) -> Result<SharingConfig, ConfigLoadError> {
    let content = fs::read_to_string(config_path)?;
    let config = toml::from_str(&content)?;
    Ok(config)
}
