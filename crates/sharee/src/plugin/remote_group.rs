use async_trait::async_trait;
use tracing::debug;

use crate::{
    cloud_id::CloudIdResolver,
    result::{Candidate, SearchResult, SearchResultType},
    share_type::ShareType,
};

use super::{SearchPlugin, Services, UserSession};

/// Federation provider used for file shares
const FILE_PROVIDER: &str = "file";

/// Accepts the cloud id of a group on another server, if federated group shares are
/// supported
pub struct RemoteGroupPlugin {
    enabled: bool,
    cloud_ids: CloudIdResolver,
}

impl RemoteGroupPlugin {
    pub fn new(services: &Services) -> Self {
        let enabled = services
            .federation
            .supported_share_types(FILE_PROVIDER)
            .is_some_and(|share_types| share_types.iter().any(|t| t == "group"));

        Self {
            enabled,
            cloud_ids: services.cloud_ids.clone(),
        }
    }
}

#[async_trait]
impl SearchPlugin for RemoteGroupPlugin {
    async fn search(
        &self,
        _session: &UserSession,
        query: &str,
        _limit: usize,
        offset: usize,
        result: &mut SearchResult,
    ) -> bool {
        let mut exact = Vec::new();

        if self.enabled && offset == 0 && self.cloud_ids.is_valid_cloud_id(query) {
            match self.cloud_ids.resolve_cloud_id(query) {
                Ok(cloud_id) => exact.push(
                    Candidate::new(
                        &format!("{} ({})", cloud_id.user(), cloud_id.remote()),
                        ShareType::RemoteGroup,
                        query,
                    )
                    .with_name(cloud_id.user())
                    .with_server(cloud_id.remote()),
                ),
                Err(err) => debug!("{err}"),
            }
        }

        result.add_result_set(&SearchResultType::REMOTE_GROUPS, Vec::new(), exact);

        false
    }
}
