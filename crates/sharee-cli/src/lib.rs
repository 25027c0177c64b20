use std::{fs, path::Path};

use anyhow::Context;
use comfy_table::Table;

use sharee::{
    SearchOutcome, ShareType, SharingConfig,
    backend::MemoryDirectory,
    config::{default_config_path, load_config},
};

/// Loads the config from `path`, or from the default location if it exists. Falls back to
/// the default settings otherwise.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<SharingConfig> {
    if let Some(path) = path {
        return load_config(path)
            .with_context(|| format!("Failed to load config from {}", path.display()));
    }

    match default_config_path() {
        Some(path) if path.exists() => load_config(&path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        _ => Ok(SharingConfig::default()),
    }
}

/// Loads the users, groups and contacts to search from a TOML fixture
pub fn load_directory(path: &Path) -> anyhow::Result<MemoryDirectory> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read directory {}", path.display()))?;

    toml::from_str(&content)
        .with_context(|| format!("Invalid directory file {}", path.display()))
}

/// Parses the share types given on the command line, eg: `users` or `remote-groups`
pub fn parse_share_type(arg: &str) -> Result<ShareType, String> {
    match arg {
        "users" | "user" => Ok(ShareType::User),
        "groups" | "group" => Ok(ShareType::Group),
        "emails" | "email" => Ok(ShareType::Email),
        "remotes" | "remote" => Ok(ShareType::Remote),
        "remote-groups" | "remote-group" => Ok(ShareType::RemoteGroup),
        "circles" | "circle" => Ok(ShareType::Circle),
        _ => arg.parse().map_err(|err: sharee::Error| err.to_string()),
    }
}

pub fn results_table(outcome: &SearchOutcome) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Type", "Match", "Label", "Share with", "Server"]);

    for (label, bucket) in &outcome.results {
        let exact = bucket.exact.iter().map(|candidate| ("exact", candidate));
        let wide = bucket.wide.iter().map(|candidate| ("wide", candidate));

        for (kind, candidate) in exact.chain(wide) {
            table.add_row(vec![
                label.clone(),
                kind.to_string(),
                candidate.label.clone(),
                candidate.share_with().to_string(),
                candidate.server().unwrap_or("").to_string(),
            ]);
        }
    }

    table
}
