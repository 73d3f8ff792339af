mod auth;
mod follows;
mod middleware;
mod posts;
mod public;
mod session;

pub use session::{CurrentViewer, SESSION_COOKIE};

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware as axum_middleware,
    response::{IntoResponse, Redirect, Response},
    routing::get,
};

use crate::application::{
    accounts::AccountService,
    error::{ErrorReport, HttpError},
    feed::FeedService,
    follows::FollowService,
    guard::{Access, Viewer},
    posts::PostService,
    repos::{HealthRepo, RepoError},
};
use crate::infra::uploads::UploadStorage;
use crate::presentation::views::{LayoutChrome, render_not_found_response};

use self::middleware::{log_responses, set_request_context};

#[derive(Clone)]
pub struct HttpState {
    pub feed: Arc<FeedService>,
    pub posts: Arc<PostService>,
    pub follows: Arc<FollowService>,
    pub accounts: Arc<AccountService>,
    pub upload_storage: Arc<UploadStorage>,
    pub health: Arc<dyn HealthRepo>,
    pub upload_body_limit: usize,
    pub secure_cookies: bool,
}

pub fn build_router(state: HttpState) -> Router {
    let pages = Router::new()
        .route("/", get(public::index))
        .route("/group/{slug}/", get(public::group_list))
        .route("/profile/{username}/", get(public::profile))
        .route("/posts/{id}/", get(public::post_detail))
        .route("/follow/", get(public::follow_index))
        .route(
            "/create/",
            get(posts::create_form).post(posts::create_submit),
        )
        .route(
            "/posts/{id}/edit/",
            get(posts::edit_form).post(posts::edit_submit),
        )
        .route("/posts/{id}/comment/", axum::routing::post(posts::add_comment))
        .route("/profile/{username}/follow/", get(follows::follow))
        .route("/profile/{username}/unfollow/", get(follows::unfollow))
        .route(
            "/auth/signup/",
            get(auth::signup_form).post(auth::signup_submit),
        )
        .route(
            "/auth/login/",
            get(auth::login_form).post(auth::login_submit),
        )
        .route("/auth/logout/", get(auth::logout))
        .route("/media/{*path}", get(public::serve_media))
        .route("/_health/db", get(public::db_health))
        .fallback(public::not_found);

    pages
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            session::resolve_session,
        ))
        .layer(DefaultBodyLimit::max(state.upload_body_limit))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

fn db_health_response(result: Result<(), RepoError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

/// Turn a guard decision into the viewer or the redirect response.
/// Denials are not errors and are not logged as such.
fn admit(access: Access) -> Result<Viewer, Response> {
    match access {
        Access::Allow(viewer) => Ok(viewer),
        Access::DenyRedirect(path) => Err(Redirect::to(&path).into_response()),
    }
}

/// Render 404s through the not-found template and everything else
/// through [`HttpError`].
fn error_response(error: HttpError, chrome: LayoutChrome) -> Response {
    if error.status() == StatusCode::NOT_FOUND {
        let mut response = render_not_found_response(chrome);
        error.report().clone().attach(&mut response);
        response
    } else {
        error.into_response()
    }
}
