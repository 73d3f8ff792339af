mod support;

use support::{TestApp, body_to_string, card_count, location};

#[tokio::test]
async fn follow_and_unfollow_toggle_one_edge() {
    let app = TestApp::new();
    let author = app.store.insert_user("author");
    let reader = app.sign_up("reader").await;
    assert!(app.store.follows().is_empty());

    let follow = app.get("/profile/author/follow/", Some(&reader.cookie)).await;
    assert_eq!(location(&follow).as_deref(), Some("/profile/author/"));
    let follows = app.store.follows();
    assert_eq!(follows.len(), 1);
    assert_eq!(follows[0].user_id, reader.user.id);
    assert_eq!(follows[0].author_id, author.id);

    app.get("/profile/author/follow/", Some(&reader.cookie)).await;
    assert_eq!(app.store.follows().len(), 1);

    let unfollow = app.get("/profile/author/unfollow/", Some(&reader.cookie)).await;
    assert_eq!(location(&unfollow).as_deref(), Some("/profile/author/"));
    assert!(app.store.follows().is_empty());

    app.get("/profile/author/unfollow/", Some(&reader.cookie)).await;
    assert!(app.store.follows().is_empty());
}

#[tokio::test]
async fn users_cannot_follow_themselves() {
    let app = TestApp::new();
    let account = app.sign_up("narcissus").await;

    let response = app
        .get("/profile/narcissus/follow/", Some(&account.cookie))
        .await;
    assert_eq!(location(&response).as_deref(), Some("/profile/narcissus/"));
    assert!(app.store.follows().is_empty());
}

#[tokio::test]
async fn guests_cannot_follow() {
    let app = TestApp::new();
    app.store.insert_user("author");

    let response = app.get("/profile/author/follow/", None).await;
    assert_eq!(
        location(&response).as_deref(),
        Some("/auth/login/?next=/profile/author/follow/")
    );
    assert!(app.store.follows().is_empty());
}

#[tokio::test]
async fn following_unknown_author_is_not_found() {
    let app = TestApp::new();
    let reader = app.sign_up("reader").await;

    let response = app.get("/profile/ghost/follow/", Some(&reader.cookie)).await;
    assert_eq!(response.status(), axum::http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn follow_feed_shows_only_followed_authors() {
    let app = TestApp::new();
    let author = app.store.insert_user("author");
    let stranger = app.store.insert_user("stranger");
    let follower = app.sign_up("follower").await;
    let bystander = app.sign_up("bystander").await;

    app.get("/profile/author/follow/", Some(&follower.cookie)).await;
    app.store.insert_post(&author, "Followed news", None);
    app.store.insert_post(&stranger, "Unrelated news", None);

    let feed = body_to_string(app.get("/follow/", Some(&follower.cookie)).await).await;
    assert_eq!(card_count(&feed), 1);
    assert!(feed.contains("Followed news"));
    assert!(!feed.contains("Unrelated news"));

    let other = body_to_string(app.get("/follow/", Some(&bystander.cookie)).await).await;
    assert_eq!(card_count(&other), 0);
    assert!(!other.contains("Followed news"));
}

#[tokio::test]
async fn profile_offers_follow_or_unfollow() {
    let app = TestApp::new();
    app.store.insert_user("author");
    let reader = app.sign_up("reader").await;

    let before = body_to_string(app.get("/profile/author/", Some(&reader.cookie)).await).await;
    assert!(before.contains("/profile/author/follow/"));

    app.get("/profile/author/follow/", Some(&reader.cookie)).await;

    let after = body_to_string(app.get("/profile/author/", Some(&reader.cookie)).await).await;
    assert!(after.contains("/profile/author/unfollow/"));

    let guest = body_to_string(app.get("/profile/author/", None).await).await;
    assert!(!guest.contains("/profile/author/follow/"));
}
