use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    backend::{Circle, CircleDirectory},
    result::{Candidate, SearchResult, SearchResultType},
    share_type::ShareType,
};

use super::{SearchPlugin, UserSession};

/// Searches the circles (teams) the searcher can share with
pub struct CirclePlugin {
    circles: Arc<dyn CircleDirectory>,
}

impl CirclePlugin {
    pub fn new(circles: Arc<dyn CircleDirectory>) -> Self {
        Self { circles }
    }
}

#[async_trait]
impl SearchPlugin for CirclePlugin {
    async fn search(
        &self,
        _session: &UserSession,
        query: &str,
        limit: usize,
        offset: usize,
        result: &mut SearchResult,
    ) -> bool {
        let circles = self.circles.search(query, limit, offset);
        let has_more = circles.len() >= limit;

        let lower_query = query.to_lowercase();
        let (exact, wide): (Vec<_>, Vec<_>) = circles
            .into_iter()
            .partition(|circle| circle.name.to_lowercase() == lower_query);

        let to_candidate = |circle: Circle| {
            let mut candidate = Candidate::new(&circle.name, ShareType::Circle, &circle.id);
            candidate.subline = circle.owner;
            candidate
        };

        result.add_result_set(
            &SearchResultType::CIRCLES,
            wide.into_iter().map(to_candidate).collect(),
            exact.into_iter().map(to_candidate).collect(),
        );

        has_more
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use crate::{
        backend::{Circle, MemoryDirectory},
        result::{SearchResult, SearchResultType},
        test_utils::{exact_shares, wide_shares},
    };

    use super::{CirclePlugin, SearchPlugin, UserSession};

    fn circle(id: &str, name: &str) -> Circle {
        Circle {
            id: id.to_string(),
            name: name.to_string(),
            owner: Some("Alice".to_string()),
        }
    }

    #[tokio::test]
    async fn test_search() {
        let directory = MemoryDirectory::new()
            .with_circle(circle("c1", "Book Club"))
            .with_circle(circle("c2", "Book Club Alumni"))
            .with_circle(circle("c3", "Chess"));
        let plugin = CirclePlugin::new(Arc::new(directory));
        let circles = SearchResultType::CIRCLES;

        let mut result = SearchResult::new();
        let has_more = plugin
            .search(&UserSession::new("admin"), "book club", 10, 0, &mut result)
            .await;

        assert!(!has_more);
        assert_eq!(exact_shares(&result, &circles), vec!["c1"]);
        assert_eq!(wide_shares(&result, &circles), vec!["c2"]);
        let candidate = &result.bucket(&circles).unwrap().exact[0];
        assert_eq!(candidate.label, "Book Club");
        assert_eq!(candidate.subline.as_deref(), Some("Alice"));

        let mut result = SearchResult::new();
        let has_more = plugin
            .search(&UserSession::new("admin"), "book", 1, 0, &mut result)
            .await;
        assert!(has_more);
        assert_eq!(wide_shares(&result, &circles), vec!["c1"]);
    }
}
