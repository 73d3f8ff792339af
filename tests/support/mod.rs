//! In-memory repositories and request helpers shared by the HTTP tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{
        Request, Response,
        header::{CONTENT_TYPE, COOKIE, LOCATION},
    },
};
use tempfile::TempDir;
use time::{Duration as TimeDuration, OffsetDateTime, macros::datetime};
use tower::ServiceExt;
use uuid::Uuid;

use yatube::{
    application::{
        accounts::{AccountService, SignupCommand},
        feed::FeedService,
        follows::FollowService,
        pagination::PageWindow,
        posts::PostService,
        repos::{
            CommentsRepo, CreateCommentParams, CreateGroupParams, CreatePostParams,
            CreateSessionParams, CreateUserParams, FollowsRepo, GroupsRepo, HealthRepo,
            PostFilter, PostsRepo, PostsWriteRepo, RepoError, SessionsRepo, UpdatePostParams,
            UsersRepo,
        },
    },
    cache::{CacheConfig, MemoryPageCache, PageCache},
    domain::entities::{
        AuthorSummary, CommentEntry, CommentRecord, FollowRecord, GroupRecord, GroupSummary,
        PostEntry, PostRecord, SessionRecord, UserRecord,
    },
    infra::{
        http::{HttpState, SESSION_COOKIE, build_router},
        uploads::UploadStorage,
    },
    presentation::views::RenderedTemplate,
};

pub const SMALL_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x02, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00,
    0xFF, 0xFF, 0xFF, 0x21, 0xF9, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2C, 0x00, 0x00, 0x00, 0x00,
    0x02, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x0C, 0x0A, 0x00, 0x3B,
];

pub const TEST_PASSWORD: &str = "correct-horse-battery";

const BOUNDARY: &str = "yatube-test-boundary";
const EPOCH: OffsetDateTime = datetime!(2024-01-01 00:00 UTC);

#[derive(Default)]
struct Tables {
    users: Vec<UserRecord>,
    groups: Vec<GroupRecord>,
    posts: Vec<PostRecord>,
    comments: Vec<CommentRecord>,
    follows: Vec<FollowRecord>,
    sessions: Vec<SessionRecord>,
    ticks: i64,
}

impl Tables {
    /// Strictly increasing creation timestamps.
    fn next_timestamp(&mut self) -> OffsetDateTime {
        self.ticks += 1;
        EPOCH + TimeDuration::seconds(self.ticks)
    }

    fn author_summary(&self, id: Uuid) -> Option<AuthorSummary> {
        self.users.iter().find(|user| user.id == id).map(|user| AuthorSummary {
            id: user.id,
            username: user.username.clone(),
            full_name: user.display_name(),
        })
    }

    fn entry(&self, post: &PostRecord) -> Option<PostEntry> {
        let author = self.author_summary(post.author_id)?;
        let group = post.group_id.and_then(|group_id| {
            self.groups
                .iter()
                .find(|group| group.id == group_id)
                .map(|group| GroupSummary {
                    id: group.id,
                    title: group.title.clone(),
                    slug: group.slug.clone(),
                })
        });
        Some(PostEntry {
            post: post.clone(),
            author,
            group,
        })
    }

    fn matches(&self, post: &PostRecord, filter: PostFilter) -> bool {
        match filter {
            PostFilter::All => true,
            PostFilter::Group(group_id) => post.group_id == Some(group_id),
            PostFilter::Author(author_id) => post.author_id == author_id,
            PostFilter::FollowedBy(user_id) => self
                .follows
                .iter()
                .any(|follow| follow.user_id == user_id && follow.author_id == post.author_id),
        }
    }
}

/// Every repository trait backed by vectors behind one mutex.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert_user(&self, username: &str) -> UserRecord {
        let mut tables = self.tables();
        let user = UserRecord {
            id: Uuid::new_v4(),
            username: username.to_string(),
            first_name: String::new(),
            last_name: String::new(),
            password_hash: String::new(),
            created_at: tables.next_timestamp(),
        };
        tables.users.push(user.clone());
        user
    }

    pub fn insert_group(&self, title: &str, slug: &str) -> GroupRecord {
        let group = GroupRecord {
            id: Uuid::new_v4(),
            title: title.to_string(),
            slug: slug.to_string(),
            description: "Test description".to_string(),
        };
        self.tables().groups.push(group.clone());
        group
    }

    pub fn insert_post(
        &self,
        author: &UserRecord,
        text: &str,
        group: Option<&GroupRecord>,
    ) -> PostRecord {
        let mut tables = self.tables();
        let post = PostRecord {
            id: Uuid::new_v4(),
            author_id: author.id,
            text: text.to_string(),
            group_id: group.map(|group| group.id),
            image: None,
            created_at: tables.next_timestamp(),
        };
        tables.posts.push(post.clone());
        post
    }

    pub fn posts(&self) -> Vec<PostRecord> {
        self.tables().posts.clone()
    }

    pub fn post(&self, id: Uuid) -> Option<PostRecord> {
        self.tables().posts.iter().find(|post| post.id == id).cloned()
    }

    pub fn comments(&self) -> Vec<CommentRecord> {
        self.tables().comments.clone()
    }

    pub fn follows(&self) -> Vec<FollowRecord> {
        self.tables().follows.clone()
    }

    pub fn remove_post(&self, id: Uuid) {
        self.tables().posts.retain(|post| post.id != id);
    }
}

#[async_trait]
impl PostsRepo for MemoryStore {
    async fn list_posts(
        &self,
        filter: PostFilter,
        window: PageWindow,
    ) -> Result<Vec<PostEntry>, RepoError> {
        let tables = self.tables();
        let mut posts: Vec<&PostRecord> = tables
            .posts
            .iter()
            .filter(|post| tables.matches(post, filter))
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(posts
            .into_iter()
            .skip(window.offset as usize)
            .take(window.limit as usize)
            .filter_map(|post| tables.entry(post))
            .collect())
    }

    async fn count_posts(&self, filter: PostFilter) -> Result<u64, RepoError> {
        let tables = self.tables();
        Ok(tables
            .posts
            .iter()
            .filter(|post| tables.matches(post, filter))
            .count() as u64)
    }

    async fn find_post(&self, id: Uuid) -> Result<Option<PostEntry>, RepoError> {
        let tables = self.tables();
        Ok(tables
            .posts
            .iter()
            .find(|post| post.id == id)
            .and_then(|post| tables.entry(post)))
    }
}

#[async_trait]
impl PostsWriteRepo for MemoryStore {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let mut tables = self.tables();
        let post = PostRecord {
            id: Uuid::new_v4(),
            author_id: params.author_id,
            text: params.text,
            group_id: params.group_id,
            image: params.image,
            created_at: tables.next_timestamp(),
        };
        tables.posts.push(post.clone());
        Ok(post)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let mut tables = self.tables();
        let post = tables
            .posts
            .iter_mut()
            .find(|post| post.id == params.id)
            .ok_or(RepoError::NotFound)?;
        post.text = params.text;
        post.group_id = params.group_id;
        if params.image.is_some() {
            post.image = params.image;
        }
        Ok(post.clone())
    }

    async fn delete_post(&self, id: Uuid) -> Result<(), RepoError> {
        let mut tables = self.tables();
        let before = tables.posts.len();
        tables.posts.retain(|post| post.id != id);
        if tables.posts.len() == before {
            return Err(RepoError::NotFound);
        }
        tables.comments.retain(|comment| comment.post_id != id);
        Ok(())
    }
}

#[async_trait]
impl GroupsRepo for MemoryStore {
    async fn list_groups(&self) -> Result<Vec<GroupRecord>, RepoError> {
        let mut groups = self.tables().groups.clone();
        groups.sort_by_key(|group| group.title.to_lowercase());
        Ok(groups)
    }

    async fn find_group(&self, id: Uuid) -> Result<Option<GroupRecord>, RepoError> {
        Ok(self.tables().groups.iter().find(|group| group.id == id).cloned())
    }

    async fn find_group_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError> {
        Ok(self
            .tables()
            .groups
            .iter()
            .find(|group| group.slug == slug)
            .cloned())
    }

    async fn create_group(&self, params: CreateGroupParams) -> Result<GroupRecord, RepoError> {
        let mut tables = self.tables();
        if tables.groups.iter().any(|group| group.slug == params.slug) {
            return Err(RepoError::Duplicate {
                constraint: "groups_slug_key".to_string(),
            });
        }
        let group = GroupRecord {
            id: Uuid::new_v4(),
            title: params.title,
            slug: params.slug,
            description: params.description,
        };
        tables.groups.push(group.clone());
        Ok(group)
    }
}

#[async_trait]
impl CommentsRepo for MemoryStore {
    async fn list_comments(&self, post_id: Uuid) -> Result<Vec<CommentEntry>, RepoError> {
        let tables = self.tables();
        let mut comments: Vec<&CommentRecord> = tables
            .comments
            .iter()
            .filter(|comment| comment.post_id == post_id)
            .collect();
        comments.sort_by_key(|comment| comment.created_at);

        Ok(comments
            .into_iter()
            .filter_map(|comment| {
                tables
                    .author_summary(comment.author_id)
                    .map(|author| CommentEntry {
                        comment: comment.clone(),
                        author,
                    })
            })
            .collect())
    }

    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let mut tables = self.tables();
        let comment = CommentRecord {
            id: Uuid::new_v4(),
            post_id: params.post_id,
            author_id: params.author_id,
            text: params.text,
            created_at: tables.next_timestamp(),
        };
        tables.comments.push(comment.clone());
        Ok(comment)
    }
}

#[async_trait]
impl FollowsRepo for MemoryStore {
    async fn find_follow(
        &self,
        user_id: Uuid,
        author_id: Uuid,
    ) -> Result<Option<FollowRecord>, RepoError> {
        Ok(self
            .tables()
            .follows
            .iter()
            .find(|follow| follow.user_id == user_id && follow.author_id == author_id)
            .cloned())
    }

    async fn create_follow(
        &self,
        user_id: Uuid,
        author_id: Uuid,
    ) -> Result<FollowRecord, RepoError> {
        let mut tables = self.tables();
        if let Some(existing) = tables
            .follows
            .iter()
            .find(|follow| follow.user_id == user_id && follow.author_id == author_id)
        {
            return Ok(existing.clone());
        }
        let follow = FollowRecord {
            id: Uuid::new_v4(),
            user_id,
            author_id,
        };
        tables.follows.push(follow.clone());
        Ok(follow)
    }

    async fn delete_follow(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, RepoError> {
        let mut tables = self.tables();
        let before = tables.follows.len();
        tables
            .follows
            .retain(|follow| !(follow.user_id == user_id && follow.author_id == author_id));
        Ok(tables.follows.len() != before)
    }
}

#[async_trait]
impl UsersRepo for MemoryStore {
    async fn find_user(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError> {
        Ok(self.tables().users.iter().find(|user| user.id == id).cloned())
    }

    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserRecord>, RepoError> {
        Ok(self
            .tables()
            .users
            .iter()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let mut tables = self.tables();
        if tables.users.iter().any(|user| user.username == params.username) {
            return Err(RepoError::Duplicate {
                constraint: "users_username_key".to_string(),
            });
        }
        let user = UserRecord {
            id: Uuid::new_v4(),
            username: params.username,
            first_name: params.first_name,
            last_name: params.last_name,
            password_hash: params.password_hash,
            created_at: tables.next_timestamp(),
        };
        tables.users.push(user.clone());
        Ok(user)
    }
}

#[async_trait]
impl SessionsRepo for MemoryStore {
    async fn create_session(
        &self,
        params: CreateSessionParams,
    ) -> Result<SessionRecord, RepoError> {
        let session = SessionRecord {
            id: Uuid::new_v4(),
            user_id: params.user_id,
            prefix: params.prefix,
            hashed_secret: params.hashed_secret,
            created_at: OffsetDateTime::now_utc(),
            expires_at: params.expires_at,
        };
        self.tables().sessions.push(session.clone());
        Ok(session)
    }

    async fn find_session_by_prefix(
        &self,
        prefix: &str,
    ) -> Result<Option<SessionRecord>, RepoError> {
        Ok(self
            .tables()
            .sessions
            .iter()
            .find(|session| session.prefix == prefix)
            .cloned())
    }

    async fn delete_session(&self, id: Uuid) -> Result<(), RepoError> {
        self.tables().sessions.retain(|session| session.id != id);
        Ok(())
    }

    async fn delete_expired_sessions(&self, now: OffsetDateTime) -> Result<u64, RepoError> {
        let mut tables = self.tables();
        let before = tables.sessions.len();
        tables.sessions.retain(|session| session.expires_at > now);
        Ok((before - tables.sessions.len()) as u64)
    }
}

#[async_trait]
impl HealthRepo for MemoryStore {
    async fn ping(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

/// A signed-in test user and the cookie that carries their session.
pub struct Account {
    pub user: UserRecord,
    pub cookie: String,
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub feed: Arc<FeedService>,
    pub posts: Arc<PostService>,
    pub accounts: Arc<AccountService>,
    pub media: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_cache(Arc::new(MemoryPageCache::new(&CacheConfig::default())))
    }

    pub fn with_cache(cache: Arc<dyn PageCache>) -> Self {
        let store = Arc::new(MemoryStore::default());
        let media = tempfile::tempdir().expect("media dir");
        let storage =
            Arc::new(UploadStorage::new(media.path().to_path_buf()).expect("upload storage"));

        let feed = Arc::new(FeedService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            cache,
            CacheConfig::default().index_ttl,
        ));
        let posts = Arc::new(PostService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            storage.clone(),
        ));
        let follows = Arc::new(FollowService::new(store.clone(), store.clone()));
        let accounts = Arc::new(AccountService::new(
            store.clone(),
            store.clone(),
            std::time::Duration::from_secs(3600),
        ));

        let router = build_router(HttpState {
            feed: feed.clone(),
            posts: posts.clone(),
            follows,
            accounts: accounts.clone(),
            upload_storage: storage,
            health: store.clone(),
            upload_body_limit: 10 * 1024 * 1024,
            secure_cookies: false,
        });

        Self {
            router,
            store,
            feed,
            posts,
            accounts,
            media,
        }
    }

    /// Register through the account service and return the session cookie.
    pub async fn sign_up(&self, username: &str) -> Account {
        let (user, session) = self
            .accounts
            .signup(SignupCommand {
                username: username.to_string(),
                first_name: String::new(),
                last_name: String::new(),
                password: TEST_PASSWORD.to_string(),
                password_confirm: TEST_PASSWORD.to_string(),
            })
            .await
            .expect("signup");
        Account {
            user,
            cookie: format!("{SESSION_COOKIE}={}", session.token),
        }
    }

    pub async fn get(&self, path: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().method("GET").uri(path);
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).expect("request"))
            .await
    }

    pub async fn post_form(&self, path: &str, cookie: Option<&str>, body: &str) -> Response<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(path)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body.to_string())).expect("request"))
            .await
    }

    pub async fn post_multipart(
        &self,
        path: &str,
        cookie: Option<&str>,
        fields: &[(&str, &str)],
        image: Option<(&str, &[u8])>,
    ) -> Response<Body> {
        let mut builder = Request::builder().method("POST").uri(path).header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        let body = multipart_body(fields, image);
        self.send(builder.body(Body::from(body)).expect("request"))
            .await
    }

    async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }
}

fn multipart_body(fields: &[(&str, &str)], image: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((filename, bytes)) = image {
        let content_type = mime_guess::from_path(filename).first_or_octet_stream();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub async fn body_to_string(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

pub fn location<B>(response: &Response<B>) -> Option<String> {
    response
        .headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

pub fn template_name<B>(response: &Response<B>) -> Option<&'static str> {
    response
        .extensions()
        .get::<RenderedTemplate>()
        .map(|rendered| rendered.0)
}

/// Number of post cards in a rendered listing.
pub fn card_count(html: &str) -> usize {
    html.matches("<article class=\"post\"").count()
}
