mod support;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use yatube::application::pagination::PageNumber;
use yatube::cache::{CacheError, DisabledPageCache, PageCache};

use support::{TestApp, body_to_string, card_count};

#[tokio::test]
async fn index_is_served_from_cache_until_cleared() {
    let app = TestApp::new();
    let author = app.store.insert_user("auth");
    let doomed = app.store.insert_post(&author, "Cached post", None);

    let first = body_to_string(app.get("/", None).await).await;
    assert!(first.contains("Cached post"));

    app.posts.delete(doomed.id).await.expect("delete post");
    assert!(app.store.posts().is_empty());

    let second = body_to_string(app.get("/", None).await).await;
    assert_eq!(first, second);

    app.feed.clear_cache().await;

    let third = body_to_string(app.get("/", None).await).await;
    assert_ne!(first, third);
    assert!(!third.contains("Cached post"));
}

#[tokio::test]
async fn clearing_one_page_leaves_others_cached() {
    let app = TestApp::new();
    let author = app.store.insert_user("auth");
    for index in 0..11 {
        app.store.insert_post(&author, &format!("Post {index}"), None);
    }

    let first_page = body_to_string(app.get("/", None).await).await;
    let second_page = body_to_string(app.get("/?page=2", None).await).await;
    assert_eq!(card_count(&second_page), 1);

    app.store.insert_post(&author, "Fresh post", None);
    app.feed.clear_index_page(PageNumber::new(1)).await;

    let refreshed_first = body_to_string(app.get("/", None).await).await;
    assert_ne!(first_page, refreshed_first);
    assert!(refreshed_first.contains("Fresh post"));

    let cached_second = body_to_string(app.get("/?page=2", None).await).await;
    assert_eq!(second_page, cached_second);
}

#[tokio::test]
async fn other_listings_are_never_cached() {
    let app = TestApp::new();
    let author = app.store.insert_user("auth");
    let post = app.store.insert_post(&author, "Profile post", None);

    let before = body_to_string(app.get("/profile/auth/", None).await).await;
    assert!(before.contains("Profile post"));

    app.store.remove_post(post.id);
    let after = body_to_string(app.get("/profile/auth/", None).await).await;
    assert!(!after.contains("Profile post"));
}

struct BrokenCache;

#[async_trait]
impl PageCache for BrokenCache {
    async fn get(&self, _key: &str) -> Result<Option<Bytes>, CacheError> {
        Err(CacheError::Unavailable("backend down".to_string()))
    }

    async fn set(&self, _key: &str, _blob: Bytes, _ttl: Duration) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("backend down".to_string()))
    }

    async fn clear(&self, _key: &str) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("backend down".to_string()))
    }

    async fn clear_all(&self) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("backend down".to_string()))
    }
}

#[tokio::test]
async fn cache_failures_fall_back_to_fresh_listing() {
    let app = TestApp::with_cache(Arc::new(BrokenCache));
    let author = app.store.insert_user("auth");
    let post = app.store.insert_post(&author, "Uncached post", None);

    let response = app.get("/", None).await;
    assert_eq!(response.status(), axum::http::StatusCode::OK);
    assert!(body_to_string(response).await.contains("Uncached post"));

    app.store.remove_post(post.id);
    let fresh = body_to_string(app.get("/", None).await).await;
    assert!(!fresh.contains("Uncached post"));

    app.feed.clear_cache().await;
}

#[tokio::test]
async fn disabled_cache_always_renders_fresh() {
    let app = TestApp::with_cache(Arc::new(DisabledPageCache));
    let author = app.store.insert_user("auth");
    let post = app.store.insert_post(&author, "Short lived", None);

    assert!(body_to_string(app.get("/", None).await).await.contains("Short lived"));
    app.store.remove_post(post.id);
    assert!(!body_to_string(app.get("/", None).await).await.contains("Short lived"));
}
