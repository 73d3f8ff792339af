use axum::{
    Form,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;

use crate::{
    application::{
        accounts::{AccountError, INVALID_LOGIN_MESSAGE, SignupCommand},
        guard::safe_next,
    },
    presentation::views::{
        LayoutChrome, LayoutContext, LoggedOutTemplate, LoginTemplate, LoginView, SignupTemplate,
        SignupView, render_template_response,
    },
};

use super::{
    CurrentViewer, HttpState, error_response,
    session::{SESSION_COOKIE, removal_cookie, session_cookie},
};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct SignupForm {
    username: String,
    first_name: String,
    last_name: String,
    password1: String,
    password2: String,
}

pub(super) async fn signup_form(viewer: CurrentViewer) -> Response {
    render_signup(LayoutChrome::for_viewer(viewer.get()), SignupView::default())
}

pub(super) async fn signup_submit(
    State(state): State<HttpState>,
    jar: CookieJar,
    Form(form): Form<SignupForm>,
) -> Response {
    let command = SignupCommand {
        username: form.username.clone(),
        first_name: form.first_name.clone(),
        last_name: form.last_name.clone(),
        password: form.password1,
        password_confirm: form.password2,
    };

    match state.accounts.signup(command).await {
        Ok((_, session)) => {
            let jar = jar.add(session_cookie(&session, state.secure_cookies));
            (jar, Redirect::to("/")).into_response()
        }
        Err(AccountError::Invalid(errors)) => render_signup(
            LayoutChrome::default(),
            SignupView {
                username: form.username,
                first_name: form.first_name,
                last_name: form.last_name,
                errors,
            },
        ),
        Err(err) => error_response(err.into(), LayoutChrome::default()),
    }
}

fn render_signup(chrome: LayoutChrome, content: SignupView) -> Response {
    let view = LayoutContext::new(chrome, "Sign up", content);
    render_template_response(SignupTemplate { view }, StatusCode::OK)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct NextQuery {
    next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct LoginForm {
    username: String,
    password: String,
    next: Option<String>,
}

pub(super) async fn login_form(viewer: CurrentViewer, Query(query): Query<NextQuery>) -> Response {
    let content = LoginView {
        next: safe_next(query.next.as_deref()).map(str::to_string),
        ..LoginView::default()
    };
    render_login(LayoutChrome::for_viewer(viewer.get()), content)
}

pub(super) async fn login_submit(
    State(state): State<HttpState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    let next = safe_next(form.next.as_deref()).map(str::to_string);

    match state.accounts.login(&form.username, &form.password).await {
        Ok((_, session)) => {
            let jar = jar.add(session_cookie(&session, state.secure_cookies));
            let target = next.as_deref().unwrap_or("/");
            (jar, Redirect::to(target)).into_response()
        }
        Err(AccountError::InvalidCredentials) => render_login(
            LayoutChrome::default(),
            LoginView {
                username: form.username,
                next,
                error: Some(INVALID_LOGIN_MESSAGE.to_string()),
            },
        ),
        Err(err) => error_response(err.into(), LayoutChrome::default()),
    }
}

fn render_login(chrome: LayoutChrome, content: LoginView) -> Response {
    let view = LayoutContext::new(chrome, "Log in", content);
    render_template_response(LoginTemplate { view }, StatusCode::OK)
}

pub(super) async fn logout(State(state): State<HttpState>, jar: CookieJar) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE)
        && let Err(err) = state.accounts.logout(cookie.value()).await
    {
        return error_response(err.into(), LayoutChrome::default());
    }

    let jar = jar.remove(removal_cookie());
    let view = LayoutContext::new(LayoutChrome::default(), "Logged out", ());
    (
        jar,
        render_template_response(LoggedOutTemplate { view }, StatusCode::OK),
    )
        .into_response()
}
