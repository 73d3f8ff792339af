//! Authorization gates evaluated before any mutating handler logic runs.

use uuid::Uuid;

pub const LOGIN_PATH: &str = "/auth/login/";

/// The authenticated user behind a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer {
    pub id: Uuid,
    pub username: String,
}

/// What a request is trying to reach.
#[derive(Debug, Clone, Copy)]
pub enum Resource<'a> {
    /// Any signed-in user may proceed. `path` is the path being requested.
    Authenticated { path: &'a str },
    /// Only the author of the post may proceed.
    OwnedPost {
        path: &'a str,
        post_id: Uuid,
        author_id: Uuid,
    },
}

impl Resource<'_> {
    fn path(&self) -> &str {
        match self {
            Resource::Authenticated { path } | Resource::OwnedPost { path, .. } => path,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Allow(Viewer),
    DenyRedirect(String),
}

pub fn guard(session: Option<&Viewer>, resource: Resource<'_>) -> Access {
    let Some(viewer) = session else {
        return Access::DenyRedirect(login_redirect(resource.path()));
    };

    match resource {
        Resource::Authenticated { .. } => Access::Allow(viewer.clone()),
        Resource::OwnedPost {
            post_id, author_id, ..
        } if author_id != viewer.id => Access::DenyRedirect(post_detail_path(post_id)),
        Resource::OwnedPost { .. } => Access::Allow(viewer.clone()),
    }
}

/// `/auth/login/?next=<path>` with the path query-encoded, slashes kept.
pub fn login_redirect(next: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(next.as_bytes()).collect();
    format!("{LOGIN_PATH}?next={}", encoded.replace("%2F", "/"))
}

/// Accept a `next` target only when it stays on this site.
pub fn safe_next(next: Option<&str>) -> Option<&str> {
    next.filter(|candidate| {
        candidate.starts_with('/') && !candidate.starts_with("//") && !candidate.contains('\\')
    })
}

pub fn post_detail_path(post_id: Uuid) -> String {
    format!("/posts/{post_id}/")
}

pub fn profile_path(username: &str) -> String {
    format!("/profile/{username}/")
}
