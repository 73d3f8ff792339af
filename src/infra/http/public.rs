use std::io::ErrorKind;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{
        HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde::Deserialize;
use tracing::error;
use uuid::Uuid;

use crate::{
    application::{
        error::HttpError,
        guard::{self, Resource},
        pagination::PageNumber,
    },
    infra::uploads::UploadStorageError,
    presentation::views::{
        FollowTemplate, GroupListTemplate, IndexTemplate, LayoutChrome, LayoutContext,
        PostDetailTemplate, ProfileTemplate, render_not_found_response, render_template_response,
    },
};

use super::{CurrentViewer, HttpState, admit, db_health_response, error_response};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct PageQuery {
    page: Option<String>,
}

impl PageQuery {
    fn number(&self) -> PageNumber {
        PageNumber::parse(self.page.as_deref())
    }
}

pub(super) async fn index(
    State(state): State<HttpState>,
    viewer: CurrentViewer,
    Query(query): Query<PageQuery>,
) -> Response {
    let chrome = LayoutChrome::for_viewer(viewer.get());

    match state.feed.index_page(query.number()).await {
        Ok(content) => {
            let view = LayoutContext::new(chrome, "Latest updates on the site", content);
            render_template_response(IndexTemplate { view }, StatusCode::OK)
        }
        Err(err) => error_response(err.into(), chrome),
    }
}

pub(super) async fn group_list(
    State(state): State<HttpState>,
    viewer: CurrentViewer,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    let chrome = LayoutChrome::for_viewer(viewer.get());

    match state.feed.group_page(&slug, query.number()).await {
        Ok(content) => {
            let title = format!("Posts of the group {}", content.title);
            let view = LayoutContext::new(chrome, title, content);
            render_template_response(GroupListTemplate { view }, StatusCode::OK)
        }
        Err(err) => error_response(err.into(), chrome),
    }
}

pub(super) async fn profile(
    State(state): State<HttpState>,
    viewer: CurrentViewer,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    let chrome = LayoutChrome::for_viewer(viewer.get());

    match state
        .feed
        .profile_page(&username, viewer.get(), query.number())
        .await
    {
        Ok(content) => {
            let title = format!("Profile of {}", content.full_name);
            let view = LayoutContext::new(chrome, title, content);
            render_template_response(ProfileTemplate { view }, StatusCode::OK)
        }
        Err(err) => error_response(err.into(), chrome),
    }
}

pub(super) async fn post_detail(
    State(state): State<HttpState>,
    viewer: CurrentViewer,
    Path(id): Path<String>,
) -> Response {
    let chrome = LayoutChrome::for_viewer(viewer.get());
    let Ok(id) = Uuid::parse_str(&id) else {
        return render_not_found_response(chrome);
    };

    match state.feed.post_detail(id, viewer.get()).await {
        Ok(content) => {
            let title = format!("Post {}", content.title);
            let view = LayoutContext::new(chrome, title, content);
            render_template_response(PostDetailTemplate { view }, StatusCode::OK)
        }
        Err(err) => error_response(err.into(), chrome),
    }
}

pub(super) async fn follow_index(
    State(state): State<HttpState>,
    viewer: CurrentViewer,
    Query(query): Query<PageQuery>,
) -> Result<Response, Response> {
    let viewer = admit(guard::guard(
        viewer.get(),
        Resource::Authenticated { path: "/follow/" },
    ))?;
    let chrome = LayoutChrome::for_viewer(Some(&viewer));

    match state.feed.follow_page(&viewer, query.number()).await {
        Ok(content) => {
            let view = LayoutContext::new(chrome, "Posts of authors you follow", content);
            Ok(render_template_response(
                FollowTemplate { view },
                StatusCode::OK,
            ))
        }
        Err(err) => Err(error_response(err.into(), chrome)),
    }
}

pub(super) async fn serve_media(
    State(state): State<HttpState>,
    viewer: CurrentViewer,
    Path(path): Path<String>,
) -> Response {
    const SOURCE: &str = "infra::http::public::serve_media";

    match state.upload_storage.read(&path).await {
        Ok(bytes) => build_media_response(&path, bytes),
        Err(UploadStorageError::InvalidPath) => {
            media_not_found(SOURCE, LayoutChrome::for_viewer(viewer.get()))
        }
        Err(UploadStorageError::Io(err)) if err.kind() == ErrorKind::NotFound => {
            media_not_found(SOURCE, LayoutChrome::for_viewer(viewer.get()))
        }
        Err(err) => {
            error!(
                target: "yatube::http::media",
                path = %path,
                error = %err,
                "failed to read stored media"
            );
            HttpError::new(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read media file",
                err.to_string(),
            )
            .into_response()
        }
    }
}

fn media_not_found(source: &'static str, chrome: LayoutChrome) -> Response {
    let error = HttpError::new(
        source,
        StatusCode::NOT_FOUND,
        "Media not found",
        "The requested media file is not available",
    );
    error_response(error, chrome)
}

fn build_media_response(path: &str, bytes: Bytes) -> Response {
    let length = bytes.len();
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&length.to_string()) {
        headers.insert(CONTENT_LENGTH, value);
    }
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("public, max-age=86400"));

    response
}

pub(super) async fn db_health(State(state): State<HttpState>) -> Response {
    db_health_response(state.health.ping().await)
}

pub(super) async fn not_found(viewer: CurrentViewer) -> Response {
    render_not_found_response(LayoutChrome::for_viewer(viewer.get()))
}
