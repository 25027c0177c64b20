//! Parsing of federated cloud ids, of the form `user@remote.server/path`

use std::fmt::Display;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid federated cloud id: {0}")]
pub struct InvalidCloudIdError(pub String);

/// A federated cloud id, split into its user and remote server parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudId {
    id: String,
    user: String,
    remote: String,
}

impl CloudId {
    /// The full id, without share link fragments
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    /// The remote server, as provided in the id (it may include a protocol)
    pub fn remote(&self) -> &str {
        &self.remote
    }
}

impl Display for CloudId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// Resolves cloud ids and compares them with the local server
#[derive(Debug, Clone)]
pub struct CloudIdResolver {
    local_server: String,
}

impl CloudIdResolver {
    /// Creates a resolver for a server reachable at `local_server` (eg: `https://cloud.tld/`)
    pub fn new(local_server: &str) -> Self {
        Self {
            local_server: normalize_remote(local_server),
        }
    }

    /// Host (and path) of the local server, without protocol
    pub fn local_server(&self) -> &str {
        &self.local_server
    }

    /// Quick check that an address could be a cloud id, without fully parsing it
    pub fn is_valid_cloud_id(&self, cloud_id: &str) -> bool {
        cloud_id.contains('@')
    }

    /// Splits a cloud id into user and remote.
    ///
    /// The user part may contain `@`, so the split happens on the last `@` found before the
    /// first `/` or `:`, which cannot appear in a user name.
    pub fn resolve_cloud_id(&self, cloud_id: &str) -> Result<CloudId, InvalidCloudIdError> {
        if !self.is_valid_cloud_id(cloud_id) {
            return Err(InvalidCloudIdError(cloud_id.to_string()));
        }

        let id = strip_share_link_fragments(cloud_id);

        let invalid_pos = id.find(['/', ':']).unwrap_or(id.len());

        let (user, remote) = id[..invalid_pos]
            .rfind('@')
            .map(|at_pos| (&id[..at_pos], &id[at_pos + 1..]))
            .ok_or_else(|| InvalidCloudIdError(cloud_id.to_string()))?;

        if user.is_empty() || remote.is_empty() {
            return Err(InvalidCloudIdError(cloud_id.to_string()));
        }

        Ok(CloudId {
            id: id.to_string(),
            user: user.to_string(),
            remote: remote.to_string(),
        })
    }

    /// Cloud id of a user of this server
    pub fn local_cloud_id(&self, uid: &str) -> String {
        format!("{uid}@{}", self.local_server)
    }

    /// Returns true if the remote designates this server
    pub fn is_local(&self, remote: &str) -> bool {
        normalize_remote(remote).eq_ignore_ascii_case(&self.local_server)
    }
}

/// Removes the path to a share link or to the index, and any trailing slash
fn strip_share_link_fragments(remote: &str) -> String {
    let remote = remote.replace('\\', "/");

    let remote = match remote.find("/index.php") {
        Some(pos) => &remote[..pos],
        None => remote.as_str(),
    };

    remote.trim_end_matches('/').to_string()
}

fn strip_protocol(remote: &str) -> &str {
    remote
        .strip_prefix("https://")
        .or_else(|| remote.strip_prefix("http://"))
        .unwrap_or(remote)
}

fn normalize_remote(remote: &str) -> String {
    strip_protocol(&strip_share_link_fragments(remote.trim())).to_string()
}
