mod support;

use axum::http::StatusCode;

use support::{TestApp, body_to_string, location, template_name};

#[tokio::test]
async fn public_pages_answer_guests_with_their_templates() {
    let app = TestApp::new();
    let author = app.store.insert_user("auth");
    let group = app.store.insert_group("Test group", "test-slug");
    let post = app.store.insert_post(&author, "Test text", Some(&group));

    let cases = [
        ("/".to_string(), "posts/index.html"),
        (format!("/group/{}/", group.slug), "posts/group_list.html"),
        (format!("/profile/{}/", author.username), "posts/profile.html"),
        (format!("/posts/{}/", post.id), "posts/post_detail.html"),
        ("/auth/signup/".to_string(), "users/signup.html"),
        ("/auth/login/".to_string(), "users/login.html"),
    ];

    for (path, template) in cases {
        let response = app.get(&path, None).await;
        assert_eq!(response.status(), StatusCode::OK, "{path}");
        assert_eq!(template_name(&response), Some(template), "{path}");
    }
}

#[tokio::test]
async fn private_pages_answer_signed_in_author() {
    let app = TestApp::new();
    let account = app.sign_up("auth").await;
    let post = app.store.insert_post(&account.user, "Test text", None);

    let cases = [
        ("/create/".to_string(), "posts/create_post.html"),
        (format!("/posts/{}/edit/", post.id), "posts/create_post.html"),
        ("/follow/".to_string(), "posts/follow.html"),
    ];

    for (path, template) in cases {
        let response = app.get(&path, Some(&account.cookie)).await;
        assert_eq!(response.status(), StatusCode::OK, "{path}");
        assert_eq!(template_name(&response), Some(template), "{path}");
    }
}

#[tokio::test]
async fn private_pages_send_guests_to_login() {
    let app = TestApp::new();
    let author = app.store.insert_user("auth");
    let post = app.store.insert_post(&author, "Test text", None);

    let paths = [
        "/create/".to_string(),
        format!("/posts/{}/edit/", post.id),
        "/follow/".to_string(),
        "/profile/auth/follow/".to_string(),
        "/profile/auth/unfollow/".to_string(),
    ];

    for path in paths {
        let response = app.get(&path, None).await;
        assert!(response.status().is_redirection(), "{path}");
        assert_eq!(
            location(&response),
            Some(format!("/auth/login/?next={path}")),
            "{path}"
        );
    }
}

#[tokio::test]
async fn unknown_pages_render_not_found_template() {
    let app = TestApp::new();

    for path in [
        "/unexisting_page/",
        "/group/missing/",
        "/profile/nobody/",
        "/posts/not-a-uuid/",
        "/posts/00000000-0000-0000-0000-000000000000/",
    ] {
        let response = app.get(path, None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{path}");
        assert_eq!(template_name(&response), Some("core/404.html"), "{path}");
    }
}

#[tokio::test]
async fn media_is_served_and_traversal_rejected() {
    let app = TestApp::new();
    let posts_dir = app.media.path().join("posts");
    std::fs::create_dir_all(&posts_dir).expect("posts dir");
    std::fs::write(posts_dir.join("small.gif"), support::SMALL_GIF).expect("write media");

    let response = app.get("/media/posts/small.gif", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("content-type")
            .and_then(|value| value.to_str().ok()),
        Some("image/gif")
    );

    let missing = app.get("/media/posts/missing.gif", None).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    assert_eq!(template_name(&missing), Some("core/404.html"));

    let traversal = app.get("/media/posts/%2E%2E/%2E%2E/etc/passwd", None).await;
    assert_eq!(traversal.status(), StatusCode::NOT_FOUND);
    assert_eq!(template_name(&traversal), Some("core/404.html"));
}

#[tokio::test]
async fn health_endpoint_reports_database() {
    let app = TestApp::new();
    let response = app.get("/_health/db", None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn signed_in_navigation_shows_username() {
    let app = TestApp::new();
    let account = app.sign_up("leo").await;

    let body = body_to_string(app.get("/", Some(&account.cookie)).await).await;
    assert!(body.contains("/profile/leo/"));
    assert!(body.contains("Log out"));

    let guest = body_to_string(app.get("/", None).await).await;
    assert!(guest.contains("Log in"));
}
