use axum::{
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};

use crate::{
    application::guard::{self, Resource, profile_path},
    presentation::views::LayoutChrome,
};

use super::{CurrentViewer, HttpState, admit, error_response};

pub(super) async fn follow(
    State(state): State<HttpState>,
    viewer: CurrentViewer,
    Path(username): Path<String>,
) -> Result<Response, Response> {
    let path = format!("{}follow/", profile_path(&username));
    let viewer = admit(guard::guard(
        viewer.get(),
        Resource::Authenticated { path: &path },
    ))?;

    match state.follows.follow(&viewer, &username).await {
        Ok(_) => Ok(Redirect::to(&profile_path(&username)).into_response()),
        Err(err) => Err(error_response(
            err.into(),
            LayoutChrome::for_viewer(Some(&viewer)),
        )),
    }
}

pub(super) async fn unfollow(
    State(state): State<HttpState>,
    viewer: CurrentViewer,
    Path(username): Path<String>,
) -> Result<Response, Response> {
    let path = format!("{}unfollow/", profile_path(&username));
    let viewer = admit(guard::guard(
        viewer.get(),
        Resource::Authenticated { path: &path },
    ))?;

    match state.follows.unfollow(&viewer, &username).await {
        Ok(_) => Ok(Redirect::to(&profile_path(&username)).into_response()),
        Err(err) => Err(error_response(
            err.into(),
            LayoutChrome::for_viewer(Some(&viewer)),
        )),
    }
}
