use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::application::guard::Viewer;
use crate::application::repos::{FollowsRepo, RepoError, UsersRepo};
use crate::domain::entities::UserRecord;

const SOURCE: &str = "yatube::application::follows";

#[derive(Debug, Error)]
pub enum FollowError {
    #[error("unknown author")]
    UnknownAuthor,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Outcome of a follow or unfollow request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowChange {
    Created,
    Removed,
    Unchanged,
}

#[derive(Clone)]
pub struct FollowService {
    follows: Arc<dyn FollowsRepo>,
    users: Arc<dyn UsersRepo>,
}

impl FollowService {
    pub fn new(follows: Arc<dyn FollowsRepo>, users: Arc<dyn UsersRepo>) -> Self {
        Self { follows, users }
    }

    /// Idempotent. Following yourself is a no-op.
    pub async fn follow(&self, viewer: &Viewer, username: &str) -> Result<FollowChange, FollowError> {
        let author = self.author(username).await?;
        if author.id == viewer.id {
            return Ok(FollowChange::Unchanged);
        }
        if self.follows.find_follow(viewer.id, author.id).await?.is_some() {
            return Ok(FollowChange::Unchanged);
        }

        self.follows.create_follow(viewer.id, author.id).await?;
        info!(target: SOURCE, user = %viewer.username, author = %author.username, "follow created");
        Ok(FollowChange::Created)
    }

    /// Idempotent.
    pub async fn unfollow(
        &self,
        viewer: &Viewer,
        username: &str,
    ) -> Result<FollowChange, FollowError> {
        let author = self.author(username).await?;
        if self.follows.delete_follow(viewer.id, author.id).await? {
            info!(target: SOURCE, user = %viewer.username, author = %author.username, "follow removed");
            Ok(FollowChange::Removed)
        } else {
            Ok(FollowChange::Unchanged)
        }
    }

    async fn author(&self, username: &str) -> Result<UserRecord, FollowError> {
        self.users
            .find_user_by_username(username)
            .await?
            .ok_or(FollowError::UnknownAuthor)
    }
}
