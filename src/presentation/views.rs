use crate::application::error::{ErrorReport, HttpError};
use crate::application::forms::{FieldMeta, FormErrors, GROUP_FIELD, IMAGE_FIELD, TEXT_FIELD};
use crate::application::guard::Viewer;
use crate::application::pagination::Page;
use crate::domain::entities::GroupRecord;
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

/// A page template with the path it is loaded from.
pub trait NamedTemplate: Template {
    const NAME: &'static str;
}

/// Response extension naming the template a page was rendered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderedTemplate(pub &'static str);

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    render_string(template).map(Html).map_err(Into::into)
}

pub fn render_string<T: Template>(template: T) -> Result<String, TemplateRenderError> {
    template.render().map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
    })
}

pub fn render_template_response<T: NamedTemplate>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => {
            let mut response = (status, html).into_response();
            response
                .extensions_mut()
                .insert(RenderedTemplate(T::NAME));
            response
        }
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response(chrome: LayoutChrome) -> Response {
    let view = LayoutContext::new(chrome, "Page not found", ErrorPageView::not_found());
    let mut response = render_template_response(NotFoundTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

#[derive(Clone, Default)]
pub struct LayoutChrome {
    pub viewer: Option<String>,
}

impl LayoutChrome {
    pub fn for_viewer(viewer: Option<&Viewer>) -> Self {
        Self {
            viewer: viewer.map(|viewer| viewer.username.clone()),
        }
    }
}

#[derive(Clone)]
pub struct LayoutContext<T> {
    pub viewer: Option<String>,
    pub title: String,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: LayoutChrome, title: impl Into<String>, content: T) -> Self {
        Self {
            viewer: chrome.viewer,
            title: title.into(),
            content,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.viewer.is_some()
    }
}

#[derive(Clone)]
pub struct GroupLink {
    pub title: String,
    pub slug: String,
}

#[derive(Clone)]
pub struct PostCard {
    pub id: String,
    pub text: String,
    pub author_username: String,
    pub author_name: String,
    pub group: Option<GroupLink>,
    pub image_url: Option<String>,
    pub published: String,
    pub iso_date: String,
}

#[derive(Clone, Copy)]
pub struct PageLink {
    pub number: u32,
    pub current: bool,
}

#[derive(Clone)]
pub struct PaginatorView {
    pub number: u32,
    pub num_pages: u32,
    pub previous: Option<u32>,
    pub next: Option<u32>,
    pub pages: Vec<PageLink>,
}

impl PaginatorView {
    pub fn from_page<T>(page: &Page<T>) -> Self {
        Self {
            number: page.number,
            num_pages: page.num_pages,
            previous: page.has_previous().then(|| page.previous_page_number()),
            next: page.has_next().then(|| page.next_page_number()),
            pages: page
                .page_range()
                .into_iter()
                .map(|number| PageLink {
                    number,
                    current: number == page.number,
                })
                .collect(),
        }
    }

    pub fn is_paginated(&self) -> bool {
        self.num_pages > 1
    }
}

/// The cacheable part of a feed page: the cards and the paginator.
#[derive(Template)]
#[template(path = "includes/listing.html")]
pub struct ListingTemplate {
    pub cards: Vec<PostCard>,
    pub paginator: PaginatorView,
    pub show_group_links: bool,
}

pub struct IndexView {
    pub listing_html: String,
}

#[derive(Template)]
#[template(path = "posts/index.html")]
pub struct IndexTemplate {
    pub view: LayoutContext<IndexView>,
}

pub struct GroupView {
    pub title: String,
    pub slug: String,
    pub description: String,
    pub listing_html: String,
}

#[derive(Template)]
#[template(path = "posts/group_list.html")]
pub struct GroupListTemplate {
    pub view: LayoutContext<GroupView>,
}

pub struct ProfileView {
    pub username: String,
    pub full_name: String,
    pub post_count: u64,
    pub following: bool,
    /// False for guests and for the author looking at their own profile.
    pub can_follow: bool,
    pub listing_html: String,
}

#[derive(Template)]
#[template(path = "posts/profile.html")]
pub struct ProfileTemplate {
    pub view: LayoutContext<ProfileView>,
}

pub struct FollowView {
    pub listing_html: String,
}

#[derive(Template)]
#[template(path = "posts/follow.html")]
pub struct FollowTemplate {
    pub view: LayoutContext<FollowView>,
}

#[derive(Clone)]
pub struct CommentView {
    pub author_username: String,
    pub author_name: String,
    pub text: String,
    pub published: String,
}

pub struct PostDetailView {
    pub post: PostCard,
    pub title: String,
    pub author_post_count: u64,
    pub comments: Vec<CommentView>,
    pub can_comment: bool,
    pub can_edit: bool,
    pub comment_field: FieldMeta,
}

#[derive(Template)]
#[template(path = "posts/post_detail.html")]
pub struct PostDetailTemplate {
    pub view: LayoutContext<PostDetailView>,
}

#[derive(Clone)]
pub struct GroupOption {
    pub id: String,
    pub title: String,
    pub selected: bool,
}

/// Create and edit share one form; `is_edit` switches headings and action.
pub struct PostFormView {
    pub is_edit: bool,
    pub action: String,
    pub text: String,
    pub groups: Vec<GroupOption>,
    pub current_image: Option<String>,
    pub text_field: FieldMeta,
    pub group_field: FieldMeta,
    pub image_field: FieldMeta,
    pub text_errors: Vec<String>,
    pub group_errors: Vec<String>,
    pub image_errors: Vec<String>,
}

impl PostFormView {
    pub fn new(is_edit: bool, action: impl Into<String>) -> Self {
        Self {
            is_edit,
            action: action.into(),
            text: String::new(),
            groups: Vec::new(),
            current_image: None,
            text_field: TEXT_FIELD,
            group_field: GROUP_FIELD,
            image_field: IMAGE_FIELD,
            text_errors: Vec::new(),
            group_errors: Vec::new(),
            image_errors: Vec::new(),
        }
    }

    /// Offer every group, marking the one whose id matches `selected`.
    pub fn with_groups(mut self, groups: &[GroupRecord], selected: Option<&str>) -> Self {
        let selected = selected.map(str::trim);
        self.groups = groups
            .iter()
            .map(|group| {
                let id = group.id.to_string();
                GroupOption {
                    selected: selected == Some(id.as_str()),
                    id,
                    title: group.title.clone(),
                }
            })
            .collect();
        self
    }

    pub fn with_errors(mut self, errors: &FormErrors) -> Self {
        self.text_errors = errors.get(TEXT_FIELD.name).to_vec();
        self.group_errors = errors.get(GROUP_FIELD.name).to_vec();
        self.image_errors = errors.get(IMAGE_FIELD.name).to_vec();
        self
    }
}

#[derive(Template)]
#[template(path = "posts/create_post.html")]
pub struct CreatePostTemplate {
    pub view: LayoutContext<PostFormView>,
}

#[derive(Default)]
pub struct SignupView {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "users/signup.html")]
pub struct SignupTemplate {
    pub view: LayoutContext<SignupView>,
}

#[derive(Default)]
pub struct LoginView {
    pub username: String,
    pub next: Option<String>,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "users/login.html")]
pub struct LoginTemplate {
    pub view: LayoutContext<LoginView>,
}

#[derive(Template)]
#[template(path = "users/logged_out.html")]
pub struct LoggedOutTemplate {
    pub view: LayoutContext<()>,
}

pub struct ErrorPageView {
    pub message: String,
}

impl ErrorPageView {
    pub fn not_found() -> Self {
        Self {
            message: "The page you requested does not exist.".to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "core/404.html")]
pub struct NotFoundTemplate {
    pub view: LayoutContext<ErrorPageView>,
}

macro_rules! named_templates {
    ($($ty:ty => $name:literal),+ $(,)?) => {
        $(impl NamedTemplate for $ty {
            const NAME: &'static str = $name;
        })+
    };
}

named_templates! {
    IndexTemplate => "posts/index.html",
    GroupListTemplate => "posts/group_list.html",
    ProfileTemplate => "posts/profile.html",
    FollowTemplate => "posts/follow.html",
    PostDetailTemplate => "posts/post_detail.html",
    CreatePostTemplate => "posts/create_post.html",
    SignupTemplate => "users/signup.html",
    LoginTemplate => "users/login.html",
    LoggedOutTemplate => "users/logged_out.html",
    NotFoundTemplate => "core/404.html",
}
