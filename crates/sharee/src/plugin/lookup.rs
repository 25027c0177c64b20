use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    backend::{HttpClient, HttpError},
    cloud_id::CloudIdResolver,
    config::SharingConfig,
    result::{Candidate, SearchResult, SearchResultType},
    share_type::ShareType,
};

use super::{SearchPlugin, Services, UserSession};

#[derive(Error, Debug)]
pub enum LookupError {
    #[error("lookup server request failed")]
    Http(#[from] HttpError),
    #[error("invalid answer from the lookup server")]
    InvalidResponse(#[from] serde_json::Error),
}

/// The name of a record is either a plain string or a verified property
#[derive(Deserialize)]
#[serde(untagged)]
enum LookupName {
    Plain(String),
    Property { value: String },
}

impl LookupName {
    fn value(&self) -> &str {
        match self {
            Self::Plain(value) | Self::Property { value } => value,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupRecord {
    federation_id: String,
    #[serde(default)]
    name: Option<LookupName>,
}

/// Queries the global lookup server for users of other federated servers
pub struct LookupPlugin {
    config: Arc<SharingConfig>,
    http: Arc<dyn HttpClient>,
    cloud_ids: CloudIdResolver,
}

impl LookupPlugin {
    pub fn new(config: Arc<SharingConfig>, services: &Services) -> Self {
        Self {
            config,
            http: services.http.clone(),
            cloud_ids: services.cloud_ids.clone(),
        }
    }

    async fn fetch(&self, query: &str) -> Result<Vec<serde_json::Value>, LookupError> {
        let server_url = self.config.lookup.server_url.trim_end_matches('/');
        let url = format!("{server_url}/users?search={}", urlencoding::encode(query));

        let response = self
            .http
            .get(&url, self.config.lookup.request_options())
            .await?;

        Ok(serde_json::from_str(&response.body)?)
    }

    fn to_candidate(&self, raw: serde_json::Value) -> Option<Candidate> {
        let record: LookupRecord = match serde_json::from_value(raw.clone()) {
            Ok(record) => record,
            Err(err) => {
                warn!("Skipping invalid lookup record: {err}");
                return None;
            }
        };

        let cloud_id = match self.cloud_ids.resolve_cloud_id(&record.federation_id) {
            Ok(cloud_id) => cloud_id,
            Err(err) => {
                warn!("Skipping lookup record: {err}");
                return None;
            }
        };

        if self.cloud_ids.is_local(cloud_id.remote()) {
            debug!("Skipping local user {}", record.federation_id);
            return None;
        }

        let label = match &record.name {
            Some(name) if !name.value().is_empty() => {
                format!("{} ({})", name.value(), record.federation_id)
            }
            _ => record.federation_id.clone(),
        };

        Some(
            Candidate::new(&label, ShareType::Remote, &record.federation_id)
                .with_server(cloud_id.remote())
                .with_lookup_record(self.config.lookup.global_scale, raw),
        )
    }
}

#[async_trait]
impl SearchPlugin for LookupPlugin {
    async fn search(
        &self,
        _session: &UserSession,
        query: &str,
        _limit: usize,
        _offset: usize,
        result: &mut SearchResult,
    ) -> bool {
        let lookup = &self.config.lookup;
        if !lookup.is_active() || lookup.server_url.is_empty() {
            debug!("Lookup server is disabled");
            return false;
        }

        let records = match self.fetch(query).await {
            Ok(records) => records,
            Err(err) => {
                warn!("Lookup for {query:?} failed: {err}");
                Vec::new()
            }
        };

        let wide = records
            .into_iter()
            .filter_map(|raw| self.to_candidate(raw))
            .collect();

        result.add_result_set(&SearchResultType::LOOKUP, wide, Vec::new());

        false
    }
}
