use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::{
    backend::{Group, GroupDirectory},
    config::SharingConfig,
    result::{Candidate, SearchResult, SearchResultType},
    share_type::ShareType,
};

use super::{SearchPlugin, Services, UserSession};

/// Searches the local groups
pub struct GroupPlugin {
    config: Arc<SharingConfig>,
    groups: Arc<dyn GroupDirectory>,
}

impl GroupPlugin {
    pub fn new(config: Arc<SharingConfig>, services: &Services) -> Self {
        Self {
            config,
            groups: services.groups.clone(),
        }
    }
}

#[async_trait]
impl SearchPlugin for GroupPlugin {
    async fn search(
        &self,
        session: &UserSession,
        query: &str,
        limit: usize,
        offset: usize,
        result: &mut SearchResult,
    ) -> bool {
        if !self.config.allow_group_sharing {
            debug!("Group sharing is disabled");
            return false;
        }

        let enumeration = &self.config.enumeration;
        let groups = self.groups.search(query, limit, offset);
        let has_more = groups.len() >= limit;

        let current_groups = self.groups.user_group_ids(session.uid());
        let group_only = self.config.share_with_group_only(&current_groups);
        let wide_needs_membership = group_only || enumeration.restrict_to_group;

        let lower_query = query.to_lowercase();
        let mut exact = Vec::new();
        let mut wide = Vec::new();

        for group in groups.iter().filter(|group| !group.hide_from_collaboration) {
            let is_member = current_groups.contains(&group.gid);

            if group.gid.to_lowercase() == lower_query
                || group.display_name.to_lowercase() == lower_query
            {
                if !group_only || is_member {
                    exact.push(group_candidate(group));
                }
            } else if enumeration.enabled && (!wide_needs_membership || is_member) {
                wide.push(group_candidate(group));
            }
        }

        // On page one, look for a direct hit on the group id
        if offset == 0 && exact.is_empty() && !query.is_empty() {
            let direct_hit = self.groups.get(query).filter(|group| {
                !group.hide_from_collaboration
                    && (!group_only || current_groups.contains(&group.gid))
            });

            if let Some(group) = direct_hit {
                debug!("Found group {} by id", group.gid);
                wide.retain(|c| c.share_with() != group.gid);
                exact.push(group_candidate(&group));
            }
        }

        let has_exact = !exact.is_empty();
        result.add_result_set(&SearchResultType::GROUPS, wide, exact);
        if has_exact {
            result.mark_exact_id_match(&SearchResultType::GROUPS);
        }

        has_more
    }
}

fn group_candidate(group: &Group) -> Candidate {
    Candidate::new(&group.display_name, ShareType::Group, &group.gid)
}
