//! Cookie sessions: resolve the `yatube_session` cookie into a [`Viewer`].

use std::convert::Infallible;

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{Request, request::Parts},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::{
    CookieJar,
    cookie::{Cookie, SameSite},
};
use tracing::debug;

use crate::application::{accounts::IssuedSession, guard::Viewer};

use super::HttpState;

pub const SESSION_COOKIE: &str = "yatube_session";

/// Attach the signed-in [`Viewer`] to the request when the cookie checks out.
/// Unknown or expired sessions are treated as guests.
pub async fn resolve_session(
    State(state): State<HttpState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let jar = CookieJar::from_headers(request.headers());

    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        match state.accounts.authenticate(cookie.value()).await {
            Ok(viewer) => {
                request.extensions_mut().insert(viewer);
            }
            Err(err) => {
                debug!(target: "yatube::http::session", error = %err, "ignoring session cookie");
            }
        }
    }

    next.run(request).await
}

/// The viewer resolved by [`resolve_session`], if any.
#[derive(Debug, Clone)]
pub struct CurrentViewer(pub Option<Viewer>);

impl CurrentViewer {
    pub fn get(&self) -> Option<&Viewer> {
        self.0.as_ref()
    }
}

impl<S> FromRequestParts<S> for CurrentViewer
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<Viewer>().cloned()))
    }
}

pub fn session_cookie(session: &IssuedSession, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session.token.clone()))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .expires(session.expires_at)
        .build()
}

pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, "")).path("/").build()
}
