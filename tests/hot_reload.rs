//! Registry updates while serving.

mod common;

use axum::http::StatusCode;
use std::sync::Arc;
use std::time::Duration;

use common::{app, eventually, send, RouteTree};
use treeroute::lifecycle::startup::start_watcher;
use treeroute::registry::SourceEvent;
use treeroute::{FileLoader, Shutdown};

#[tokio::test]
async fn test_change_replaces_behaviour_in_place() {
    let tree = RouteTree::new();
    let file = tree.write("hello.txt", "one");
    tree.write("other.txt", "other");
    let (registry, router) = app(&tree.config(), FileLoader::new());
    let keys_before = registry.keys();

    assert_eq!(send(&router, "GET", "/hello", None).await.body, "one");

    tree.write("hello.txt", "two");
    registry.apply(&SourceEvent::Changed(file)).unwrap();

    assert_eq!(send(&router, "GET", "/hello", None).await.body, "two");
    assert_eq!(registry.keys(), keys_before);
}

#[tokio::test]
async fn test_add_then_remove() {
    let tree = RouteTree::new();
    let (registry, router) = app(&tree.config(), FileLoader::new());
    assert_eq!(send(&router, "GET", "/late", None).await.status, StatusCode::NOT_FOUND);

    let file = tree.write("late.txt", "here");
    registry.apply(&SourceEvent::Added(file.clone())).unwrap();
    assert_eq!(send(&router, "GET", "/late", None).await.body, "here");

    tree.remove("late.txt");
    registry.apply(&SourceEvent::Removed(file)).unwrap();
    assert_eq!(send(&router, "GET", "/late", None).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_broken_reload_keeps_serving_previous_version() {
    let tree = RouteTree::new();
    let file = tree.write("data.json", r#"{ "get": { "reply": "v1" } }"#);
    let (registry, router) = app(&tree.config(), FileLoader::new());

    tree.write("data.json", "{ not json");
    assert!(registry.apply(&SourceEvent::Changed(file)).is_err());

    let res = send(&router, "GET", "/data", None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body, "v1");
}

#[tokio::test]
async fn test_watcher_picks_up_new_and_changed_files() {
    let tree = RouteTree::new();
    tree.write("stable.txt", "stable");
    let config = tree.config();
    let (registry, router) = app(&config, FileLoader::new());

    let shutdown = Shutdown::new();
    let _watcher = start_watcher(Arc::clone(&registry), &config, shutdown.subscribe())
        .unwrap()
        .expect("watching is enabled");
    tokio::time::sleep(Duration::from_millis(100)).await;

    tree.write("fresh.txt", "v1");
    let added = eventually(Duration::from_secs(5), || {
        let router = router.clone();
        async move { send(&router, "GET", "/fresh", None).await.body == "v1" }
    })
    .await;
    assert!(added, "new file was not served");

    tree.write("fresh.txt", "v2");
    let changed = eventually(Duration::from_secs(5), || {
        let router = router.clone();
        async move { send(&router, "GET", "/fresh", None).await.body == "v2" }
    })
    .await;
    assert!(changed, "changed file was not reloaded");

    assert_eq!(
        registry.keys().iter().filter(|k| k.as_str() == "fresh.txt").count(),
        1
    );
    shutdown.trigger();
}

#[tokio::test]
async fn test_watcher_registers_directory_moved_into_tree() {
    let tree = RouteTree::new();
    tree.write("stable.txt", "stable");
    let config = tree.config();
    let (registry, router) = app(&config, FileLoader::new());

    let shutdown = Shutdown::new();
    let _watcher = start_watcher(Arc::clone(&registry), &config, shutdown.subscribe())
        .unwrap()
        .expect("watching is enabled");
    tokio::time::sleep(Duration::from_millis(100)).await;

    let staging = tempfile::tempdir_in(tree.root().parent().unwrap()).unwrap();
    let users = staging.path().join("users");
    std::fs::create_dir_all(users.join("#id")).unwrap();
    std::fs::write(users.join("list.txt"), "everyone").unwrap();
    std::fs::write(users.join("#id/posts.txt"), "posts").unwrap();
    std::fs::rename(&users, tree.path("users")).unwrap();

    let registered = eventually(Duration::from_secs(5), || {
        let router = router.clone();
        async move {
            send(&router, "GET", "/users/list", None).await.body == "everyone"
                && send(&router, "GET", "/users/7/posts", None).await.body == "posts"
        }
    })
    .await;
    assert!(registered, "moved-in directory was not registered: {:?}", registry.keys());

    std::fs::remove_dir_all(tree.path("users")).unwrap();
    let removed = eventually(Duration::from_secs(5), || {
        let router = router.clone();
        async move { send(&router, "GET", "/users/list", None).await.status == StatusCode::NOT_FOUND }
    })
    .await;
    assert!(removed, "removed directory is still served");
    shutdown.trigger();
}
