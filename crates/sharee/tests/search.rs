use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path, query_param},
};

use sharee::{
    Search, SearchOutcome, ShareType, SharingConfig,
    backend::{
        Contact, Group, HttpClient, HttpError, HttpResponse, MemoryDirectory, RequestOptions, User,
    },
    plugin::{Services, UserSession},
};

const LOCAL_SERVER: &str = "https://cloud.local";

const ALL_TYPES: [ShareType; 5] = [
    ShareType::User,
    ShareType::Group,
    ShareType::Email,
    ShareType::Remote,
    ShareType::RemoteGroup,
];

struct UnreachableHttpClient;

#[async_trait]
impl HttpClient for UnreachableHttpClient {
    async fn get(&self, url: &str, _options: RequestOptions) -> Result<HttpResponse, HttpError> {
        Err(HttpError::Request {
            url: url.to_string(),
            source: "network is unreachable".into(),
        })
    }
}

fn directory() -> MemoryDirectory {
    MemoryDirectory::new()
        .with_user(User::new("admin", "Administrator"))
        .with_user(User::new("alicia", "Alicia").with_email("alicia@cloud.local"))
        .with_user(User::new("bobby", "Bobby"))
        .with_group(Group::new("devteam", "devteam"), &["admin", "bobby"])
        .with_contact(Contact {
            uid: Some("alicia".to_string()),
            full_name: Some("Alicia".to_string()),
            emails: vec!["alicia@cloud.local".into()],
            cloud_ids: vec!["alicia@cloud.local".into()],
            is_local_system_book: true,
        })
        .with_contact(Contact {
            uid: Some("contact-carol".to_string()),
            full_name: Some("Carol".to_string()),
            emails: vec!["carol@mail.org".into()],
            cloud_ids: vec!["carol@remote.org".into()],
            ..Default::default()
        })
}

fn search(config: SharingConfig, http: Arc<dyn HttpClient>) -> Search {
    let services =
        Services::from_directory(Arc::new(directory()), LOCAL_SERVER).with_http_client(http);
    Search::with_default_plugins(&services, Arc::new(config))
}

async fn run(search: &Search, query: &str, share_types: &[ShareType]) -> SearchOutcome {
    search
        .search(&UserSession::new("admin"), query, share_types, false, 10, 0)
        .await
}

fn exact(outcome: &SearchOutcome, label: &str) -> Vec<String> {
    outcome.results.get(label).map_or_else(Vec::new, |bucket| {
        bucket
            .exact
            .iter()
            .map(|c| c.share_with().to_string())
            .collect()
    })
}

fn wide(outcome: &SearchOutcome, label: &str) -> Vec<String> {
    outcome.results.get(label).map_or_else(Vec::new, |bucket| {
        bucket
            .wide
            .iter()
            .map(|c| c.share_with().to_string())
            .collect()
    })
}

fn default_search() -> Search {
    search(SharingConfig::default(), Arc::new(UnreachableHttpClient))
}

#[tokio::test]
async fn test_unknown_cloud_id() {
    let outcome = run(&default_search(), "alice@example.org", &ALL_TYPES).await;

    assert_eq!(exact(&outcome, "remotes"), vec!["alice@example.org"]);
    let candidate = &outcome.results["remotes"].exact[0];
    assert_eq!(candidate.server(), Some("example.org"));

    assert!(exact(&outcome, "emails").is_empty());
    assert!(exact(&outcome, "users").is_empty());
}

#[tokio::test]
async fn test_unknown_email() {
    let outcome = run(&default_search(), "bob@test.com", &[ShareType::Email]).await;

    assert_eq!(exact(&outcome, "emails"), vec!["bob@test.com"]);
    assert!(!outcome.has_more_results);

    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["results"]["emails"]["exact"][0]["value"]["shareType"], 4);
}

#[tokio::test]
async fn test_group_name() {
    let outcome = run(&default_search(), "devteam", &ALL_TYPES).await;

    assert_eq!(exact(&outcome, "groups"), vec!["devteam"]);
    for label in ["users", "emails", "remotes"] {
        assert!(outcome.results[label].is_empty(), "{label} is not empty");
    }
}

#[tokio::test]
async fn test_local_user_email() {
    let outcome = run(&default_search(), "alicia@cloud.local", &ALL_TYPES).await;

    assert_eq!(exact(&outcome, "users"), vec!["alicia"]);
    assert!(exact(&outcome, "remotes").is_empty());
    assert!(exact(&outcome, "emails").is_empty());
    assert!(wide(&outcome, "emails").is_empty());
}

#[tokio::test]
async fn test_contact_listed_once() {
    let outcome = run(&default_search(), "carol", &ALL_TYPES).await;

    // The contact has both an address and a cloud id, only the federated share is offered
    assert_eq!(exact(&outcome, "remotes"), vec!["carol@remote.org"]);
    assert!(outcome.results["emails"].is_empty());
}

#[tokio::test]
async fn test_enumeration_gating() {
    let outcome = run(&default_search(), "ali", &ALL_TYPES).await;
    assert_eq!(wide(&outcome, "users"), vec!["alicia"]);

    let mut config = SharingConfig::default();
    config.enumeration.enabled = false;
    let search = search(config, Arc::new(UnreachableHttpClient));

    let outcome = run(&search, "ali", &ALL_TYPES).await;
    assert!(outcome.results.values().all(|bucket| bucket.is_empty()));

    // Full matches are still returned
    let outcome = run(&search, "alicia", &ALL_TYPES).await;
    assert_eq!(exact(&outcome, "users"), vec!["alicia"]);
}

#[tokio::test]
async fn test_pagination() {
    let search = default_search();
    let session = UserSession::new("admin");

    let first = search
        .search(&session, "b", &[ShareType::User], false, 1, 0)
        .await;
    assert!(first.has_more_results);
    assert_eq!(wide(&first, "users"), vec!["bobby"]);

    let last = search
        .search(&session, "b", &[ShareType::User], false, 10, 0)
        .await;
    assert!(!last.has_more_results);
}

#[tokio::test]
async fn test_lookup_unavailable() {
    let mut config = SharingConfig::default();
    config.lookup.enabled = true;
    let search = search(config, Arc::new(UnreachableHttpClient));

    let outcome = search
        .search(&UserSession::new("admin"), "devteam", &ALL_TYPES, true, 10, 0)
        .await;

    assert_eq!(exact(&outcome, "groups"), vec!["devteam"]);
    assert!(outcome.results["lookup"].is_empty());
}

#[tokio::test]
async fn test_lookup_server() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param("search", "dana"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"federationId": "dana@faraway.org", "name": {"value": "Dana"}},
            {"federationId": "alicia@cloud.local", "name": "Alicia"},
        ])))
        .mount(&server)
        .await;

    let mut config = SharingConfig::default();
    config.lookup.enabled = true;
    config.lookup.server_url = server.uri();
    let services = Services::from_directory(Arc::new(directory()), LOCAL_SERVER);
    let search = Search::with_default_plugins(&services, Arc::new(config));

    let session = UserSession::new("admin");
    let outcome = search
        .search(&session, "dana", &[ShareType::Remote], true, 10, 0)
        .await;
    assert_eq!(wide(&outcome, "lookup"), vec!["dana@faraway.org"]);
    assert_eq!(outcome.results["lookup"].wide[0].label, "Dana (dana@faraway.org)");

    // Not requested
    let outcome = search
        .search(&session, "dana", &[ShareType::Remote], false, 10, 0)
        .await;
    assert!(!outcome.results.contains_key("lookup"));
}
