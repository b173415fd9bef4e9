//! End-to-end detection tests against a mock GitHub API.

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use langwatch::config::{Monitor, WatchPath};
use langwatch::detector::Detector;
use langwatch::github::GitHubClient;
use langwatch::state::WatchState;

fn monitor(paths: Vec<WatchPath>) -> Monitor {
    Monitor {
        name: "app".to_string(),
        repo: "acme/app".to_string(),
        branch: "main".to_string(),
        paths,
        glob_patterns: vec![],
        enabled: true,
    }
}

fn commits_body(sha: &str) -> serde_json::Value {
    json!([{
        "sha": sha,
        "commit": {
            "message": "Update translations\n\nLonger body.",
            "author": { "name": "Jane Doe", "email": "jane@example.com", "date": "2026-01-10T12:00:00Z" },
            "committer": { "name": "GitHub", "email": "noreply@github.com", "date": "2026-01-10T12:05:00Z" }
        }
    }])
}

async fn mount_commits(server: &MockServer, file_path: &str, sha: &str) {
    Mock::given(method("GET"))
        .and(path("/repos/acme/app/commits"))
        .and(query_param("sha", "main"))
        .and(query_param("path", file_path))
        .respond_with(ResponseTemplate::new(200).set_body_json(commits_body(sha)))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_first_check_records_baseline_without_events() {
    let server = MockServer::start().await;
    mount_commits(&server, "lang/en.json", "c1c1c1c1").await;

    let client = GitHubClient::with_base_url(server.uri(), None).unwrap();
    let monitors = vec![monitor(vec![WatchPath::File("lang/en.json".to_string())])];
    let mut state = WatchState::default();

    let outcome = Detector::new(&client).run(&monitors, &mut state).await;

    assert_eq!(outcome.baselined, 1);
    assert!(outcome.events.is_empty());
    assert!(outcome.failures.is_empty());
    assert_eq!(
        state.last_sha("acme/app:main:lang/en.json"),
        Some("c1c1c1c1")
    );
}

#[tokio::test]
async fn test_changed_sha_emits_one_event_and_updates_state() {
    let server = MockServer::start().await;
    mount_commits(&server, "lang/en.json", "c1c1c1c1").await;

    let client = GitHubClient::with_base_url(server.uri(), None).unwrap();
    let monitors = vec![monitor(vec![WatchPath::File("lang/en.json".to_string())])];
    let mut state = WatchState::default();

    // Run 1: baseline.
    let outcome = Detector::new(&client).run(&monitors, &mut state).await;
    assert!(outcome.events.is_empty());

    // Upstream commit c2 modifies the file.
    server.reset().await;
    mount_commits(&server, "lang/en.json", "c2c2c2c2").await;

    // Run 2: exactly one event.
    let outcome = Detector::new(&client).run(&monitors, &mut state).await;
    assert_eq!(outcome.events.len(), 1);

    let event = &outcome.events[0];
    assert_eq!(event.monitor, "app");
    assert_eq!(event.path, "lang/en.json");
    assert_eq!(event.old_sha, "c1c1c1c1");
    assert_eq!(event.new_sha, "c2c2c2c2");
    assert_eq!(event.author, "Jane Doe");
    assert_eq!(event.message, "Update translations");

    assert_eq!(
        state.last_sha("acme/app:main:lang/en.json"),
        Some("c2c2c2c2")
    );

    // Run 3: idempotent, nothing new.
    let outcome = Detector::new(&client).run(&monitors, &mut state).await;
    assert!(outcome.events.is_empty());
    assert_eq!(outcome.unchanged, 1);
}

#[tokio::test]
async fn test_disabled_monitor_makes_no_calls() {
    // No mocks mounted: any request would be recorded as a path failure.
    let server = MockServer::start().await;
    let client = GitHubClient::with_base_url(server.uri(), None).unwrap();

    let mut disabled = monitor(vec![WatchPath::File("lang/en.json".to_string())]);
    disabled.enabled = false;

    let mut state = WatchState::default();
    let outcome = Detector::new(&client).run(&[disabled], &mut state).await;

    assert_eq!(outcome.checked, 0);
    assert!(outcome.failures.is_empty());
    assert!(state.is_empty());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_per_path_failure_does_not_abort_others() {
    let server = MockServer::start().await;
    mount_commits(&server, "lang/en.json", "c1c1c1c1").await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/app/commits"))
        .and(query_param("path", "lang/broken.json"))
        .respond_with(ResponseTemplate::new(500).set_body_string("server error"))
        .mount(&server)
        .await;

    let client = GitHubClient::with_base_url(server.uri(), None).unwrap();
    let monitors = vec![monitor(vec![
        WatchPath::File("lang/broken.json".to_string()),
        WatchPath::File("lang/en.json".to_string()),
    ])];
    let mut state = WatchState::default();

    let outcome = Detector::new(&client).run(&monitors, &mut state).await;

    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].path, "lang/broken.json");
    assert_eq!(outcome.baselined, 1);
    assert!(state.last_sha("acme/app:main:lang/broken.json").is_none());
    assert_eq!(
        state.last_sha("acme/app:main:lang/en.json"),
        Some("c1c1c1c1")
    );
}

#[tokio::test]
async fn test_folder_path_queries_stripped_prefix() {
    let server = MockServer::start().await;
    // The folder is configured as "lang/" but queried as "lang".
    mount_commits(&server, "lang", "c1c1c1c1").await;

    let client = GitHubClient::with_base_url(server.uri(), None).unwrap();
    let monitors = vec![monitor(vec![WatchPath::parse("lang/")])];
    let mut state = WatchState::default();

    let outcome = Detector::new(&client).run(&monitors, &mut state).await;

    assert_eq!(outcome.baselined, 1);
    assert_eq!(state.last_sha("acme/app:main:lang"), Some("c1c1c1c1"));
}

#[tokio::test]
async fn test_duplicate_keys_checked_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/app/commits"))
        .and(query_param("path", "lang/en.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(commits_body("c1c1c1c1")))
        .expect(1)
        .mount(&server)
        .await;

    let client = GitHubClient::with_base_url(server.uri(), None).unwrap();
    // The same path listed by two monitors over the same repo and branch.
    let monitors = vec![
        monitor(vec![WatchPath::File("lang/en.json".to_string())]),
        monitor(vec![WatchPath::File("lang/en.json".to_string())]),
    ];
    let mut state = WatchState::default();

    let outcome = Detector::new(&client).run(&monitors, &mut state).await;

    assert_eq!(outcome.checked, 1);
    server.verify().await;
}

#[tokio::test]
async fn test_glob_patterns_expand_against_tree() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/app/git/trees/main"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sha": "t1",
            "tree": [
                { "path": "lang/en.json", "type": "blob" },
                { "path": "lang/de.json", "type": "blob" },
                { "path": "lang", "type": "tree" },
                { "path": "README.md", "type": "blob" }
            ],
            "truncated": false
        })))
        .mount(&server)
        .await;
    mount_commits(&server, "lang/en.json", "c1c1c1c1").await;
    mount_commits(&server, "lang/de.json", "c2c2c2c2").await;

    let client = GitHubClient::with_base_url(server.uri(), None).unwrap();
    let mut globbed = monitor(vec![]);
    globbed.glob_patterns = vec!["lang/*.json".to_string()];

    let mut state = WatchState::default();
    let outcome = Detector::new(&client).run(&[globbed], &mut state).await;

    assert_eq!(outcome.baselined, 2);
    assert!(outcome.failures.is_empty());
    assert!(state.last_sha("acme/app:main:lang/en.json").is_some());
    assert!(state.last_sha("acme/app:main:lang/de.json").is_some());
    assert!(state.last_sha("acme/app:main:README.md").is_none());
}

#[tokio::test]
async fn test_tree_failure_is_per_monitor_not_fatal() {
    let server = MockServer::start().await;
    // Tree endpoint fails; the plain path still gets checked.
    Mock::given(method("GET"))
        .and(path("/repos/acme/app/git/trees/main"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;
    mount_commits(&server, "lang/en.json", "c1c1c1c1").await;

    let client = GitHubClient::with_base_url(server.uri(), None).unwrap();
    let mut m = monitor(vec![WatchPath::File("lang/en.json".to_string())]);
    m.glob_patterns = vec!["lang/*.yml".to_string()];

    let mut state = WatchState::default();
    let outcome = Detector::new(&client).run(&[m], &mut state).await;

    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.baselined, 1);
}

#[tokio::test]
async fn test_not_found_reported_as_path_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/app/commits"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
        .mount(&server)
        .await;

    let client = GitHubClient::with_base_url(server.uri(), None).unwrap();
    let monitors = vec![monitor(vec![WatchPath::File("gone.json".to_string())])];
    let mut state = WatchState::default();

    let outcome = Detector::new(&client).run(&monitors, &mut state).await;

    assert_eq!(outcome.failures.len(), 1);
    assert!(outcome.failures[0].error.contains("not found"));
    assert!(state.is_empty());
}
