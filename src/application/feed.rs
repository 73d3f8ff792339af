//! Read side of the blog: listings, profiles and post detail.
//!
//! The home feed listing goes through the injected [`PageCache`]. A cached
//! rendering is served as-is until its time-to-live runs out or somebody
//! clears it, so writes are not visible on `/` for up to the configured TTL.
//! Cache failures never fail the request; the listing is rendered fresh.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use thiserror::Error;
use time::{OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::application::forms::COMMENT_FIELD;
use crate::application::guard::Viewer;
use crate::application::pagination::{Page, PageNumber, Paginator};
use crate::application::repos::{
    CommentsRepo, FollowsRepo, GroupsRepo, PostFilter, PostsRepo, RepoError, UsersRepo,
};
use crate::cache::{PageCache, index_page_key};
use crate::domain::entities::{CommentEntry, PostEntry};
use crate::domain::posts;
use crate::presentation::views::{
    CommentView, FollowView, GroupLink, GroupView, IndexView, ListingTemplate, PaginatorView,
    PostCard, PostDetailView, ProfileView, TemplateRenderError, render_string,
};

const SOURCE: &str = "yatube::application::feed";
const DETAIL_TITLE_CHARS: usize = 30;
const PUBLISHED_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[day] [month repr:long] [year] [hour]:[minute]");

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("unknown group")]
    UnknownGroup,
    #[error("unknown author")]
    UnknownAuthor,
    #[error("unknown post")]
    UnknownPost,
    #[error(transparent)]
    Render(#[from] TemplateRenderError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct FeedService {
    posts: Arc<dyn PostsRepo>,
    groups: Arc<dyn GroupsRepo>,
    users: Arc<dyn UsersRepo>,
    follows: Arc<dyn FollowsRepo>,
    comments: Arc<dyn CommentsRepo>,
    cache: Arc<dyn PageCache>,
    index_ttl: Duration,
}

impl FeedService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        groups: Arc<dyn GroupsRepo>,
        users: Arc<dyn UsersRepo>,
        follows: Arc<dyn FollowsRepo>,
        comments: Arc<dyn CommentsRepo>,
        cache: Arc<dyn PageCache>,
        index_ttl: Duration,
    ) -> Self {
        Self {
            posts,
            groups,
            users,
            follows,
            comments,
            cache,
            index_ttl,
        }
    }

    /// One page of every post, newest first, served from the page cache
    /// when a fresh rendering exists.
    pub async fn index_page(&self, requested: PageNumber) -> Result<IndexView, FeedError> {
        let key = index_page_key(requested.get());

        match self.cache.get(&key).await {
            Ok(Some(blob)) => {
                debug!(target: SOURCE, key = %key, "home feed served from cache");
                if let Ok(listing_html) = String::from_utf8(blob.to_vec()) {
                    return Ok(IndexView { listing_html });
                }
                warn!(target: SOURCE, key = %key, "cached home feed is not valid UTF-8");
            }
            Ok(None) => debug!(target: SOURCE, key = %key, "home feed cache miss"),
            Err(err) => {
                warn!(target: SOURCE, key = %key, error = %err, "page cache read failed; rendering fresh");
            }
        }

        let listing_html = self.render_listing(PostFilter::All, requested, true).await?;

        if let Err(err) = self
            .cache
            .set(&key, Bytes::from(listing_html.clone()), self.index_ttl)
            .await
        {
            warn!(target: SOURCE, key = %key, error = %err, "page cache write failed");
        }

        Ok(IndexView { listing_html })
    }

    pub async fn group_page(
        &self,
        slug: &str,
        requested: PageNumber,
    ) -> Result<GroupView, FeedError> {
        let group = self
            .groups
            .find_group_by_slug(slug)
            .await?
            .ok_or(FeedError::UnknownGroup)?;

        let listing_html = self
            .render_listing(PostFilter::Group(group.id), requested, false)
            .await?;

        Ok(GroupView {
            title: group.title,
            slug: group.slug,
            description: group.description,
            listing_html,
        })
    }

    pub async fn profile_page(
        &self,
        username: &str,
        viewer: Option<&Viewer>,
        requested: PageNumber,
    ) -> Result<ProfileView, FeedError> {
        let author = self
            .users
            .find_user_by_username(username)
            .await?
            .ok_or(FeedError::UnknownAuthor)?;

        let filter = PostFilter::Author(author.id);
        let post_count = self.posts.count_posts(filter).await?;

        let following = match viewer {
            Some(viewer) if viewer.id != author.id => self
                .follows
                .find_follow(viewer.id, author.id)
                .await?
                .is_some(),
            _ => false,
        };
        let can_follow = viewer.is_some_and(|viewer| viewer.id != author.id);

        let listing_html = self.render_listing(filter, requested, true).await?;

        Ok(ProfileView {
            full_name: author.display_name(),
            username: author.username,
            post_count,
            following,
            can_follow,
            listing_html,
        })
    }

    /// Posts by authors the viewer follows.
    pub async fn follow_page(
        &self,
        viewer: &Viewer,
        requested: PageNumber,
    ) -> Result<FollowView, FeedError> {
        let listing_html = self
            .render_listing(PostFilter::FollowedBy(viewer.id), requested, true)
            .await?;
        Ok(FollowView { listing_html })
    }

    pub async fn post_detail(
        &self,
        id: Uuid,
        viewer: Option<&Viewer>,
    ) -> Result<PostDetailView, FeedError> {
        let entry = self
            .posts
            .find_post(id)
            .await?
            .ok_or(FeedError::UnknownPost)?;

        let author_post_count = self
            .posts
            .count_posts(PostFilter::Author(entry.author.id))
            .await?;
        let comments = self
            .comments
            .list_comments(id)
            .await?
            .into_iter()
            .map(comment_view)
            .collect();

        let can_edit = viewer.is_some_and(|viewer| viewer.id == entry.author.id);
        let title = posts::excerpt(&entry.post.text, DETAIL_TITLE_CHARS);

        Ok(PostDetailView {
            post: post_card(entry),
            title,
            author_post_count,
            comments,
            can_comment: viewer.is_some(),
            can_edit,
            comment_field: COMMENT_FIELD,
        })
    }

    /// Fetch one page of a listing without rendering it.
    pub async fn page(
        &self,
        filter: PostFilter,
        requested: PageNumber,
    ) -> Result<Page<PostEntry>, FeedError> {
        let total = self.posts.count_posts(filter).await?;
        let paginator = Paginator::new(total);
        let number = paginator.resolve(requested);
        let items = self
            .posts
            .list_posts(filter, paginator.window(number))
            .await?;
        Ok(paginator.page(number, items))
    }

    /// Drop the cached rendering of one home feed page.
    pub async fn clear_index_page(&self, page: PageNumber) {
        let key = index_page_key(page.get());
        if let Err(err) = self.cache.clear(&key).await {
            warn!(target: SOURCE, key = %key, error = %err, "page cache clear failed");
        }
    }

    /// Drop every cached page.
    pub async fn clear_cache(&self) {
        if let Err(err) = self.cache.clear_all().await {
            warn!(target: SOURCE, error = %err, "page cache clear failed");
        }
    }

    async fn render_listing(
        &self,
        filter: PostFilter,
        requested: PageNumber,
        show_group_links: bool,
    ) -> Result<String, FeedError> {
        let page = self.page(filter, requested).await?;
        let paginator = PaginatorView::from_page(&page);
        let cards = page.items.into_iter().map(post_card).collect();

        let html = render_string(ListingTemplate {
            cards,
            paginator,
            show_group_links,
        })?;
        Ok(html)
    }
}

pub(crate) fn post_card(entry: PostEntry) -> PostCard {
    let PostEntry {
        post,
        author,
        group,
    } = entry;

    PostCard {
        id: post.id.to_string(),
        text: post.text,
        author_username: author.username,
        author_name: author.full_name,
        group: group.map(|group| GroupLink {
            title: group.title,
            slug: group.slug,
        }),
        image_url: post.image.map(|path| format!("/media/{path}")),
        published: format_published(post.created_at),
        iso_date: iso_date(post.created_at),
    }
}

fn comment_view(entry: CommentEntry) -> CommentView {
    CommentView {
        author_username: entry.author.username,
        author_name: entry.author.full_name,
        text: entry.comment.text,
        published: format_published(entry.comment.created_at),
    }
}

fn format_published(at: OffsetDateTime) -> String {
    at.format(PUBLISHED_FORMAT)
        .unwrap_or_else(|_| at.date().to_string())
}

fn iso_date(at: OffsetDateTime) -> String {
    at.date().to_string()
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::domain::entities::{AuthorSummary, GroupSummary, PostRecord};

    #[test]
    fn post_card_links_image_and_group() {
        let author_id = Uuid::new_v4();
        let group_id = Uuid::new_v4();
        let entry = PostEntry {
            post: PostRecord {
                id: Uuid::new_v4(),
                author_id,
                text: "Test post".to_string(),
                group_id: Some(group_id),
                image: Some("posts/small.gif".to_string()),
                created_at: datetime!(2024-03-05 14:07 UTC),
            },
            author: AuthorSummary {
                id: author_id,
                username: "auth".to_string(),
                full_name: "auth".to_string(),
            },
            group: Some(GroupSummary {
                id: group_id,
                title: "Test group".to_string(),
                slug: "test-slug".to_string(),
            }),
        };

        let card = post_card(entry);
        assert_eq!(card.image_url.as_deref(), Some("/media/posts/small.gif"));
        assert_eq!(card.group.map(|group| group.slug).as_deref(), Some("test-slug"));
        assert_eq!(card.published, "05 March 2024 14:07");
        assert_eq!(card.iso_date, "2024-03-05");
    }
}
