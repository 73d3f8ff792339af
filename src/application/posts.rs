//! Write side of posts and comments.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::forms::{
    self, FormErrors, PostFormInput, UploadedImage, ValidPostForm,
};
use crate::application::guard::Viewer;
use crate::application::repos::{
    CommentsRepo, CreateCommentParams, CreatePostParams, GroupsRepo, PostsRepo, PostsWriteRepo,
    RepoError, UpdatePostParams,
};
use crate::domain::entities::{CommentRecord, GroupRecord, PostEntry, PostRecord};
use crate::infra::uploads::{UploadStorage, UploadStorageError};

const SOURCE: &str = "yatube::application::posts";

#[derive(Debug, Error)]
pub enum PostError {
    #[error("post not found")]
    NotFound,
    #[error("only the author may change a post")]
    Forbidden,
    #[error("form is invalid")]
    Invalid(FormErrors),
    #[error("failed to store image")]
    Upload(#[source] UploadStorageError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct PostService {
    reader: Arc<dyn PostsRepo>,
    writer: Arc<dyn PostsWriteRepo>,
    groups: Arc<dyn GroupsRepo>,
    comments: Arc<dyn CommentsRepo>,
    storage: Arc<UploadStorage>,
}

impl PostService {
    pub fn new(
        reader: Arc<dyn PostsRepo>,
        writer: Arc<dyn PostsWriteRepo>,
        groups: Arc<dyn GroupsRepo>,
        comments: Arc<dyn CommentsRepo>,
        storage: Arc<UploadStorage>,
    ) -> Self {
        Self {
            reader,
            writer,
            groups,
            comments,
            storage,
        }
    }

    /// Groups offered by the post form.
    pub async fn group_choices(&self) -> Result<Vec<GroupRecord>, PostError> {
        Ok(self.groups.list_groups().await?)
    }

    pub async fn find(&self, id: Uuid) -> Result<PostEntry, PostError> {
        self.reader.find_post(id).await?.ok_or(PostError::NotFound)
    }

    pub async fn create(
        &self,
        author: &Viewer,
        input: PostFormInput,
    ) -> Result<PostRecord, PostError> {
        let form = self.validate(&input).await?;
        let image = self.store_image(form.image.as_ref()).await?;

        let params = CreatePostParams {
            author_id: author.id,
            text: form.text,
            group_id: form.group_id,
            image: image.clone(),
        };
        let post = match self.writer.create_post(params).await {
            Ok(post) => post,
            Err(err) => {
                self.discard_image(image.as_deref()).await;
                return Err(err.into());
            }
        };

        info!(
            target: SOURCE,
            post_id = %post.id,
            author = %author.username,
            has_image = post.image.is_some(),
            "post created"
        );
        Ok(post)
    }

    /// Update text and group, and the image when a new one is supplied.
    /// Callers are expected to have passed the ownership guard already.
    pub async fn update(
        &self,
        editor: &Viewer,
        id: Uuid,
        input: PostFormInput,
    ) -> Result<PostRecord, PostError> {
        let existing = self.find(id).await?;
        if existing.post.author_id != editor.id {
            return Err(PostError::Forbidden);
        }

        let form = self.validate(&input).await?;
        let image = self.store_image(form.image.as_ref()).await?;

        let params = UpdatePostParams {
            id,
            text: form.text,
            group_id: form.group_id,
            image: image.clone(),
        };
        let post = match self.writer.update_post(params).await {
            Ok(post) => post,
            Err(RepoError::NotFound) => {
                self.discard_image(image.as_deref()).await;
                return Err(PostError::NotFound);
            }
            Err(err) => {
                self.discard_image(image.as_deref()).await;
                return Err(err.into());
            }
        };

        if image.is_some() && existing.post.image != post.image {
            self.discard_image(existing.post.image.as_deref()).await;
        }

        info!(target: SOURCE, post_id = %post.id, "post updated");
        Ok(post)
    }

    pub async fn add_comment(
        &self,
        author: &Viewer,
        post_id: Uuid,
        text: &str,
    ) -> Result<CommentRecord, PostError> {
        let text = forms::validate_comment(text).map_err(PostError::Invalid)?;
        if self.reader.find_post(post_id).await?.is_none() {
            return Err(PostError::NotFound);
        }

        let comment = self
            .comments
            .create_comment(CreateCommentParams {
                post_id,
                author_id: author.id,
                text,
            })
            .await?;

        info!(target: SOURCE, post_id = %post_id, comment_id = %comment.id, "comment added");
        Ok(comment)
    }

    /// Hard delete. Not exposed over HTTP.
    pub async fn delete(&self, id: Uuid) -> Result<(), PostError> {
        let existing = self.find(id).await?;
        self.writer.delete_post(id).await?;
        self.discard_image(existing.post.image.as_deref()).await;
        info!(target: SOURCE, post_id = %id, "post deleted");
        Ok(())
    }

    async fn validate(&self, input: &PostFormInput) -> Result<ValidPostForm, PostError> {
        let groups = self.groups.list_groups().await?;
        forms::validate_post_form(input, &groups).map_err(PostError::Invalid)
    }

    async fn store_image(&self, image: Option<&UploadedImage>) -> Result<Option<String>, PostError> {
        let Some(image) = image else {
            return Ok(None);
        };
        let stored = self
            .storage
            .store_post_image(&image.filename, image.bytes.clone())
            .await
            .map_err(PostError::Upload)?;
        Ok(Some(stored.stored_path))
    }

    async fn discard_image(&self, stored_path: Option<&str>) {
        let Some(path) = stored_path else {
            return;
        };
        if let Err(err) = self.storage.delete(path).await {
            warn!(target: SOURCE, path, error = %err, "failed to remove stored image");
        }
    }
}
