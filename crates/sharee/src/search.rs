//! Dispatch of a query to the plugins, and reconciliation of their results

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Arc,
};

use serde::Serialize;
use tracing::{debug, instrument};

use crate::{
    Error,
    config::SharingConfig,
    plugin::{
        CirclePlugin, GroupPlugin, LookupPlugin, MailPlugin, RemoteGroupPlugin, RemotePlugin,
        SearchPlugin, Services, UserPlugin, UserSession,
    },
    result::{ResultBucket, SearchResult, SearchResultType, serialize_buckets},
    share_type::ShareType,
};

/// Results of a search, indexed by result type label
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchOutcome {
    #[serde(serialize_with = "serialize_buckets")]
    pub results: BTreeMap<String, ResultBucket>,
    /// At least one plugin may have more results on the next page
    pub has_more_results: bool,
}

/// Registry of the search plugins, per share type
#[derive(Default)]
pub struct Search {
    plugins: HashMap<ShareType, Vec<Arc<dyn SearchPlugin>>>,
    lookup: Option<Arc<dyn SearchPlugin>>,
}

impl Search {
    /// Creates a search without any plugin
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a search with the plugins for all the share types supported by `services`,
    /// and the lookup server plugin
    pub fn with_default_plugins(services: &Services, config: Arc<SharingConfig>) -> Self {
        let mut search = Self::new();

        search.register_plugin(
            ShareType::User,
            Arc::new(UserPlugin::new(config.clone(), services)),
        );
        search.register_plugin(
            ShareType::Group,
            Arc::new(GroupPlugin::new(config.clone(), services)),
        );
        search.register_plugin(
            ShareType::Email,
            Arc::new(MailPlugin::new(config.clone(), services)),
        );
        search.register_plugin(
            ShareType::Remote,
            Arc::new(RemotePlugin::new(config.clone(), services)),
        );
        search.register_plugin(
            ShareType::RemoteGroup,
            Arc::new(RemoteGroupPlugin::new(services)),
        );

        if let Some(circles) = services.circles.as_ref().filter(|_| config.circles_enabled) {
            search.register_plugin(
                ShareType::Circle,
                Arc::new(CirclePlugin::new(circles.clone())),
            );
        }

        search.set_lookup_plugin(Arc::new(LookupPlugin::new(config, services)));

        search
    }

    /// Adds a plugin for this share type. Plugins of a type run in registration order.
    pub fn register_plugin(&mut self, share_type: ShareType, plugin: Arc<dyn SearchPlugin>) {
        self.plugins.entry(share_type).or_default().push(plugin);
    }

    /// Adds a plugin for the share type registered under this name, like
    /// `SHARE_TYPE_USER`
    pub fn register_plugin_named(
        &mut self,
        share_type: &str,
        plugin: Arc<dyn SearchPlugin>,
    ) -> Result<(), Error> {
        let share_type = share_type.parse()?;
        self.register_plugin(share_type, plugin);
        Ok(())
    }

    pub fn set_lookup_plugin(&mut self, plugin: Arc<dyn SearchPlugin>) {
        self.lookup = Some(plugin);
    }

    /// Searches recipients of the requested types matching `query`.
    ///
    /// The lookup server is only queried when `lookup` is set. Types without any plugin are
    /// ignored.
    #[instrument(skip(self, session), fields(uid = session.uid()))]
    pub async fn search(
        &self,
        session: &UserSession,
        query: &str,
        share_types: &[ShareType],
        lookup: bool,
        limit: usize,
        offset: usize,
    ) -> SearchOutcome {
        let query = query.trim();
        let mut result = SearchResult::new();
        let mut has_more_results = false;
        let mut searched = HashSet::new();

        for share_type in share_types {
            if !searched.insert(*share_type) {
                continue;
            }

            let Some(plugins) = self.plugins.get(share_type) else {
                debug!("No plugin for {share_type}");
                continue;
            };

            for plugin in plugins {
                let has_more = plugin
                    .search(session, query, limit, offset, &mut result)
                    .await;
                has_more_results |= has_more;
            }
        }

        if lookup {
            if let Some(plugin) = &self.lookup {
                let has_more = plugin
                    .search(session, query, limit, offset, &mut result)
                    .await;
                has_more_results |= has_more;
            }
        }

        reconcile(query, &mut result);

        SearchOutcome {
            results: result.as_map(),
            has_more_results,
        }
    }
}

/// Removes the candidates that designate the same recipient as a better match
fn reconcile(query: &str, result: &mut SearchResult) {
    let remotes = SearchResultType::REMOTES;
    let emails = SearchResultType::EMAILS;
    let users = SearchResultType::USERS;

    let exact_remote = result.has_exact_id_match(&remotes);
    let exact_email = result.has_exact_id_match(&emails);

    if exact_remote && !exact_email {
        debug!("Exact federated match, dropping emails");
        result.unset_result(&emails);
    } else if exact_email && !exact_remote {
        debug!("Exact email match, dropping federated results");
        result.unset_result(&remotes);
    }

    // An address that is also a federated recipient is only listed once
    let duplicates = match (result.bucket(&remotes), result.bucket(&emails)) {
        (Some(remote_bucket), Some(email_bucket)) => {
            duplicate_addresses(remote_bucket, email_bucket)
        }
        _ => Vec::new(),
    };
    for address in duplicates {
        result.remove_collaborator_result(&emails, &address);
    }

    if query.contains('@') && result.has_exact_id_match(&users) {
        debug!("Query is the address of a local user");
        result.unset_result(&remotes);
        result.unset_result(&emails);
    }
}

/// Addresses of the email candidates that designate a federated candidate, by address or by
/// contact card
fn duplicate_addresses(remotes: &ResultBucket, emails: &ResultBucket) -> Vec<String> {
    let remote_ids: HashSet<String> = remotes
        .iter()
        .map(|c| c.share_with().to_lowercase())
        .collect();
    let remote_uuids: HashSet<&str> = remotes.iter().filter_map(|c| c.uuid.as_deref()).collect();

    emails
        .iter()
        .filter(|c| {
            remote_ids.contains(&c.share_with().to_lowercase())
                || c.uuid
                    .as_deref()
                    .is_some_and(|uuid| remote_uuids.contains(uuid))
        })
        .map(|c| c.share_with().to_string())
        .collect()
}

#[cfg(test)]
mod test {
    use std::sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;

    use crate::{
        Error,
        result::{Candidate, SearchResult, SearchResultType},
        share_type::ShareType,
    };

    use super::{Search, SearchPlugin, UserSession};

    /// Adds the same candidates on each search, and records the queries
    #[derive(Default)]
    struct FixedPlugin {
        result_type: Option<SearchResultType>,
        exact: Vec<Candidate>,
        wide: Vec<Candidate>,
        mark: bool,
        has_more: bool,
        queries: Mutex<Vec<String>>,
        calls: AtomicUsize,
    }

    impl FixedPlugin {
        fn new(result_type: SearchResultType) -> Self {
            Self {
                result_type: Some(result_type),
                ..Default::default()
            }
        }

        fn exact(self, candidate: Candidate, mark: bool) -> Self {
            let mut exact = self.exact;
            exact.push(candidate);
            Self { exact, mark, ..self }
        }

        fn wide(self, candidate: Candidate) -> Self {
            let mut wide = self.wide;
            wide.push(candidate);
            Self { wide, ..self }
        }

        fn with_more(self) -> Self {
            Self {
                has_more: true,
                ..self
            }
        }
    }

    #[async_trait]
    impl SearchPlugin for FixedPlugin {
        async fn search(
            &self,
            _session: &UserSession,
            query: &str,
            _limit: usize,
            _offset: usize,
            result: &mut SearchResult,
        ) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.queries.lock().unwrap().push(query.to_string());

            if let Some(result_type) = &self.result_type {
                result.add_result_set(result_type, self.wide.clone(), self.exact.clone());
                if self.mark {
                    result.mark_exact_id_match(result_type);
                }
            }
            self.has_more
        }
    }

    fn email(address: &str) -> Candidate {
        Candidate::new(address, ShareType::Email, address)
    }

    fn remote(cloud_id: &str) -> Candidate {
        Candidate::new(cloud_id, ShareType::Remote, cloud_id)
    }

    fn user(uid: &str) -> Candidate {
        Candidate::new(uid, ShareType::User, uid)
    }

    fn share_withs(candidates: &[Candidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.share_with()).collect()
    }

    async fn run(search: &Search, query: &str, share_types: &[ShareType]) -> super::SearchOutcome {
        search
            .search(&UserSession::new("admin"), query, share_types, false, 10, 0)
            .await
    }

    #[tokio::test]
    async fn test_dispatch() {
        let users = Arc::new(FixedPlugin::new(SearchResultType::USERS).with_more());
        let groups = Arc::new(FixedPlugin::new(SearchResultType::GROUPS));
        let lookup = Arc::new(FixedPlugin::new(SearchResultType::LOOKUP));

        let mut search = Search::new();
        search.register_plugin(ShareType::User, users.clone());
        search.register_plugin(ShareType::Group, groups.clone());
        search.set_lookup_plugin(lookup.clone());

        let outcome = run(&search, "  alice ", &[ShareType::Group, ShareType::Circle]).await;
        assert!(!outcome.has_more_results);
        assert_eq!(users.calls.load(Ordering::SeqCst), 0);
        assert_eq!(*groups.queries.lock().unwrap(), vec!["alice".to_string()]);
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 0);
        assert_eq!(outcome.results.keys().collect::<Vec<_>>(), vec!["groups"]);

        let outcome = search
            .search(
                &UserSession::new("admin"),
                "alice",
                &[ShareType::User, ShareType::User],
                true,
                10,
                0,
            )
            .await;
        assert!(outcome.has_more_results);
        assert_eq!(users.calls.load(Ordering::SeqCst), 1);
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_every_plugin_runs() {
        let first = Arc::new(FixedPlugin::new(SearchResultType::USERS).with_more());
        let second = Arc::new(FixedPlugin::new(SearchResultType::USERS).wide(user("bob")));

        let mut search = Search::new();
        search.register_plugin(ShareType::User, first.clone());
        search.register_plugin(ShareType::User, second.clone());

        let outcome = run(&search, "b", &[ShareType::User]).await;
        assert!(outcome.has_more_results);
        assert_eq!(second.calls.load(Ordering::SeqCst), 1);
        assert_eq!(share_withs(&outcome.results["users"].wide), vec!["bob"]);
    }

    #[test]
    fn test_register_named() {
        let mut search = Search::new();
        let plugin = Arc::new(FixedPlugin::default());

        assert!(
            search
                .register_plugin_named("SHARE_TYPE_REMOTE_GROUP", plugin.clone())
                .is_ok()
        );
        assert!(matches!(
            search.register_plugin_named("SHARE_TYPE_ROOM", plugin),
            Err(Error::InvalidShareType(_))
        ));
    }

    #[tokio::test]
    async fn test_exact_remote_wins() {
        let mut search = Search::new();
        search.register_plugin(
            ShareType::Remote,
            Arc::new(
                FixedPlugin::new(SearchResultType::REMOTES)
                    .exact(remote("bob@remote.org"), true),
            ),
        );
        search.register_plugin(
            ShareType::Email,
            Arc::new(
                FixedPlugin::new(SearchResultType::EMAILS)
                    .exact(email("bob@remote.org"), false),
            ),
        );

        let share_types = [ShareType::Remote, ShareType::Email];
        let outcome = run(&search, "bob@remote.org", &share_types).await;
        assert_eq!(
            share_withs(&outcome.results["remotes"].exact),
            vec!["bob@remote.org"]
        );
        assert!(outcome.results["emails"].is_empty());
    }

    #[tokio::test]
    async fn test_exact_email_wins() {
        let mut search = Search::new();
        search.register_plugin(
            ShareType::Remote,
            Arc::new(
                FixedPlugin::new(SearchResultType::REMOTES)
                    .exact(remote("bob@test.com"), false),
            ),
        );
        search.register_plugin(
            ShareType::Email,
            Arc::new(FixedPlugin::new(SearchResultType::EMAILS).exact(email("bob@test.com"), true)),
        );

        let share_types = [ShareType::Remote, ShareType::Email];
        let outcome = run(&search, "bob@test.com", &share_types).await;
        assert!(outcome.results["remotes"].is_empty());
        assert_eq!(
            share_withs(&outcome.results["emails"].exact),
            vec!["bob@test.com"]
        );
    }

    #[tokio::test]
    async fn test_both_exact_keeps_remote() {
        let mut search = Search::new();
        search.register_plugin(
            ShareType::Remote,
            Arc::new(
                FixedPlugin::new(SearchResultType::REMOTES).exact(remote("bob@test.com"), true),
            ),
        );
        search.register_plugin(
            ShareType::Email,
            Arc::new(FixedPlugin::new(SearchResultType::EMAILS).exact(email("BOB@test.com"), true)),
        );

        let share_types = [ShareType::Email, ShareType::Remote];
        let outcome = run(&search, "bob@test.com", &share_types).await;
        assert_eq!(
            share_withs(&outcome.results["remotes"].exact),
            vec!["bob@test.com"]
        );
        assert!(outcome.results["emails"].is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_addresses_dropped() {
        let mut search = Search::new();
        search.register_plugin(
            ShareType::Remote,
            Arc::new(
                FixedPlugin::new(SearchResultType::REMOTES)
                    .wide(remote("Carol@remote.org"))
                    .wide(remote("dave@remote.org").with_uuid("contact-dave")),
            ),
        );
        search.register_plugin(
            ShareType::Email,
            Arc::new(
                FixedPlugin::new(SearchResultType::EMAILS)
                    .wide(email("carol@remote.org"))
                    .wide(email("dave@mail.org").with_uuid("contact-dave"))
                    .wide(email("erin@mail.org")),
            ),
        );

        let outcome = run(&search, "r", &[ShareType::Remote, ShareType::Email]).await;
        assert_eq!(outcome.results["remotes"].wide.len(), 2);
        assert_eq!(
            share_withs(&outcome.results["emails"].wide),
            vec!["erin@mail.org"]
        );
    }

    #[tokio::test]
    async fn test_local_user_address() {
        let mut search = Search::new();
        search.register_plugin(
            ShareType::User,
            Arc::new(FixedPlugin::new(SearchResultType::USERS).exact(user("alice"), true)),
        );
        search.register_plugin(
            ShareType::Remote,
            Arc::new(FixedPlugin::new(SearchResultType::REMOTES).wide(remote("alice@remote.org"))),
        );
        search.register_plugin(
            ShareType::Email,
            Arc::new(FixedPlugin::new(SearchResultType::EMAILS).wide(email("alice@mail.org"))),
        );
        let share_types = [ShareType::User, ShareType::Remote, ShareType::Email];

        let outcome = run(&search, "alice@example.org", &share_types).await;
        assert_eq!(share_withs(&outcome.results["users"].exact), vec!["alice"]);
        assert!(outcome.results["remotes"].is_empty());
        assert!(outcome.results["emails"].is_empty());

        // Without an @, the query can not be an address
        let outcome = run(&search, "alice", &share_types).await;
        assert_eq!(outcome.results["remotes"].wide.len(), 1);
        assert_eq!(outcome.results["emails"].wide.len(), 1);
    }

    #[tokio::test]
    async fn test_outcome_serialization() {
        let mut search = Search::new();
        search.register_plugin(
            ShareType::Email,
            Arc::new(FixedPlugin::new(SearchResultType::EMAILS).exact(email("bob@test.com"), true)),
        );

        let outcome = run(&search, "bob@test.com", &[ShareType::Email]).await;
        let json = serde_json::to_value(&outcome).unwrap();

        assert_eq!(json["has_more_results"], false);
        // Wide matches are listed under the type label
        assert_eq!(json["results"]["emails"]["emails"], serde_json::json!([]));
        assert!(json["results"]["emails"].get("wide").is_none());
        assert_eq!(
            json["results"]["emails"]["exact"][0]["value"]["shareWith"],
            "bob@test.com"
        );
    }
}
