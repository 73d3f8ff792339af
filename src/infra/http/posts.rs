use axum::{
    Form,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::{Multipart, multipart::MultipartError};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    application::{
        error::HttpError,
        forms::{FormErrors, PostFormInput, UploadedImage},
        guard::{self, Resource, Viewer, post_detail_path, profile_path},
        posts::PostError,
    },
    domain::entities::PostEntry,
    presentation::views::{
        CreatePostTemplate, LayoutChrome, LayoutContext, PostFormView,
        render_not_found_response, render_template_response,
    },
};

use super::{CurrentViewer, HttpState, admit, error_response};

const CREATE_PATH: &str = "/create/";

pub(super) async fn create_form(
    State(state): State<HttpState>,
    viewer: CurrentViewer,
) -> Result<Response, Response> {
    let viewer = admit(guard::guard(
        viewer.get(),
        Resource::Authenticated { path: CREATE_PATH },
    ))?;
    let chrome = LayoutChrome::for_viewer(Some(&viewer));

    let groups = state
        .posts
        .group_choices()
        .await
        .map_err(|err| error_response(err.into(), chrome.clone()))?;

    let form = PostFormView::new(false, CREATE_PATH).with_groups(&groups, None);
    Ok(render_form(chrome, form))
}

pub(super) async fn create_submit(
    State(state): State<HttpState>,
    viewer: CurrentViewer,
    multipart: Multipart,
) -> Result<Response, Response> {
    let viewer = admit(guard::guard(
        viewer.get(),
        Resource::Authenticated { path: CREATE_PATH },
    ))?;
    let chrome = LayoutChrome::for_viewer(Some(&viewer));

    let input = read_post_form(multipart)
        .await
        .map_err(IntoResponse::into_response)?;

    match state.posts.create(&viewer, input.clone()).await {
        Ok(_) => Ok(Redirect::to(&profile_path(&viewer.username)).into_response()),
        Err(PostError::Invalid(errors)) => {
            let form = PostFormView::new(false, CREATE_PATH);
            rerender_form(&state, chrome, form, &input, &errors).await
        }
        Err(err) => Err(error_response(err.into(), chrome)),
    }
}

pub(super) async fn edit_form(
    State(state): State<HttpState>,
    viewer: CurrentViewer,
    Path(id): Path<String>,
) -> Result<Response, Response> {
    let (viewer, entry) = authorize_edit(&state, &viewer, &id).await?;
    let chrome = LayoutChrome::for_viewer(Some(&viewer));

    let groups = state
        .posts
        .group_choices()
        .await
        .map_err(|err| error_response(err.into(), chrome.clone()))?;

    let mut form = PostFormView::new(true, edit_path(entry.post.id))
        .with_groups(&groups, entry.post.group_id.map(|id| id.to_string()).as_deref());
    form.text = entry.post.text;
    form.current_image = entry.post.image;
    Ok(render_form(chrome, form))
}

pub(super) async fn edit_submit(
    State(state): State<HttpState>,
    viewer: CurrentViewer,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Response, Response> {
    let (viewer, entry) = authorize_edit(&state, &viewer, &id).await?;
    let chrome = LayoutChrome::for_viewer(Some(&viewer));
    let post_id = entry.post.id;

    let input = read_post_form(multipart)
        .await
        .map_err(IntoResponse::into_response)?;

    match state.posts.update(&viewer, post_id, input.clone()).await {
        Ok(_) => Ok(Redirect::to(&post_detail_path(post_id)).into_response()),
        Err(PostError::Invalid(errors)) => {
            let mut form = PostFormView::new(true, edit_path(post_id));
            form.current_image = entry.post.image;
            rerender_form(&state, chrome, form, &input, &errors).await
        }
        Err(PostError::Forbidden) => Ok(Redirect::to(&post_detail_path(post_id)).into_response()),
        Err(err) => Err(error_response(err.into(), chrome)),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct CommentForm {
    text: String,
}

pub(super) async fn add_comment(
    State(state): State<HttpState>,
    viewer: CurrentViewer,
    Path(id): Path<String>,
    Form(form): Form<CommentForm>,
) -> Result<Response, Response> {
    let chrome = LayoutChrome::for_viewer(viewer.get());
    let Ok(post_id) = Uuid::parse_str(&id) else {
        return Err(render_not_found_response(chrome));
    };
    let path = format!("/posts/{post_id}/comment/");
    let viewer = admit(guard::guard(
        viewer.get(),
        Resource::Authenticated { path: &path },
    ))?;

    match state.posts.add_comment(&viewer, post_id, &form.text).await {
        Ok(_) | Err(PostError::Invalid(_)) => {
            Ok(Redirect::to(&post_detail_path(post_id)).into_response())
        }
        Err(err) => Err(error_response(err.into(), chrome)),
    }
}

/// Load the post and check that the viewer wrote it. Guests go to the login
/// page, other users to the post.
async fn authorize_edit(
    state: &HttpState,
    viewer: &CurrentViewer,
    raw_id: &str,
) -> Result<(Viewer, PostEntry), Response> {
    let chrome = LayoutChrome::for_viewer(viewer.get());
    let Ok(post_id) = Uuid::parse_str(raw_id) else {
        return Err(render_not_found_response(chrome));
    };

    let entry = state
        .posts
        .find(post_id)
        .await
        .map_err(|err| error_response(err.into(), chrome))?;

    let path = edit_path(post_id);
    let viewer = admit(guard::guard(
        viewer.get(),
        Resource::OwnedPost {
            path: &path,
            post_id,
            author_id: entry.author.id,
        },
    ))?;
    Ok((viewer, entry))
}

async fn rerender_form(
    state: &HttpState,
    chrome: LayoutChrome,
    form: PostFormView,
    input: &PostFormInput,
    errors: &FormErrors,
) -> Result<Response, Response> {
    let groups = state
        .posts
        .group_choices()
        .await
        .map_err(|err| error_response(err.into(), chrome.clone()))?;

    let mut form = form
        .with_groups(&groups, input.group.as_deref())
        .with_errors(errors);
    form.text = input.text.clone();
    Ok(render_form(chrome, form))
}

fn render_form(chrome: LayoutChrome, form: PostFormView) -> Response {
    let title = if form.is_edit { "Edit post" } else { "New post" };
    let view = LayoutContext::new(chrome, title, form);
    render_template_response(CreatePostTemplate { view }, StatusCode::OK)
}

fn edit_path(post_id: Uuid) -> String {
    format!("/posts/{post_id}/edit/")
}

async fn read_post_form(mut multipart: Multipart) -> Result<PostFormInput, HttpError> {
    const SOURCE: &str = "infra::http::posts::read_post_form";

    let invalid = |err: MultipartError| {
        HttpError::from_error(SOURCE, err.status(), "Invalid form data", &err)
    };

    let mut input = PostFormInput::default();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => return Err(invalid(err)),
        };

        match field.name() {
            Some("text") => input.text = field.text().await.map_err(invalid)?,
            Some("group") => input.group = Some(field.text().await.map_err(invalid)?),
            Some("image") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(invalid)?;
                input.image = Some(UploadedImage {
                    filename,
                    content_type,
                    bytes,
                });
            }
            _ => continue,
        }
    }
    Ok(input)
}
