//! Subscriptions between users and the authors they follow.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::{
    application::repos::{FollowsRepo, RepoError, UsersRepo},
    cache::PageCache,
    domain::entities::{FollowEdge, UserId, UserRecord},
};

#[derive(Debug, Error)]
pub enum FollowError {
    #[error("author `{0}` not found")]
    UnknownAuthor(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// What a subscribe request did to the follow graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeOutcome {
    Created,
    AlreadyFollowing,
    /// Following yourself is silently ignored.
    SelfFollow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsubscribeOutcome {
    Removed,
    NotFollowing,
}

#[derive(Clone)]
pub struct FollowService {
    users: Arc<dyn UsersRepo>,
    follows: Arc<dyn FollowsRepo>,
    cache: Arc<dyn PageCache>,
}

impl FollowService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        follows: Arc<dyn FollowsRepo>,
        cache: Arc<dyn PageCache>,
    ) -> Self {
        Self {
            users,
            follows,
            cache,
        }
    }

    /// Make `follower` follow the author named `author_username`.
    ///
    /// Idempotent. The page cache is cleared on every resolved request.
    #[instrument(skip(self, follower), fields(follower = %follower.username))]
    pub async fn subscribe(
        &self,
        follower: &UserRecord,
        author_username: &str,
    ) -> Result<SubscribeOutcome, FollowError> {
        let author = self.resolve_author(author_username).await?;
        let outcome = self.subscribe_ids(follower.id, author.id).await?;
        self.cache.clear();
        info!(author = %author.username, ?outcome, "subscribe handled");
        Ok(outcome)
    }

    /// Remove the follow edge from `follower` to `author_username`, if any.
    #[instrument(skip(self, follower), fields(follower = %follower.username))]
    pub async fn unsubscribe(
        &self,
        follower: &UserRecord,
        author_username: &str,
    ) -> Result<UnsubscribeOutcome, FollowError> {
        let author = self.resolve_author(author_username).await?;
        let edge = FollowEdge {
            user_id: follower.id,
            author_id: author.id,
        };
        let outcome = if self.follows.delete(edge).await? {
            UnsubscribeOutcome::Removed
        } else {
            UnsubscribeOutcome::NotFollowing
        };
        self.cache.clear();
        info!(author = %author.username, ?outcome, "unsubscribe handled");
        Ok(outcome)
    }

    pub async fn is_following(&self, user_id: UserId, author_id: UserId) -> Result<bool, RepoError> {
        if user_id == author_id {
            return Ok(false);
        }
        self.follows
            .exists(FollowEdge {
                user_id,
                author_id,
            })
            .await
    }

    /// Whether a profile page should present the viewer as a follower.
    ///
    /// Anonymous viewers and owners looking at their own profile never follow.
    pub async fn following_flag(
        &self,
        viewer: Option<&UserRecord>,
        owner: &UserRecord,
    ) -> Result<bool, RepoError> {
        match viewer {
            Some(viewer) if viewer.id != owner.id => self.is_following(viewer.id, owner.id).await,
            _ => Ok(false),
        }
    }

    async fn subscribe_ids(
        &self,
        user_id: UserId,
        author_id: UserId,
    ) -> Result<SubscribeOutcome, RepoError> {
        if user_id == author_id {
            debug!(user_id, "ignoring self-follow");
            return Ok(SubscribeOutcome::SelfFollow);
        }

        let edge = FollowEdge {
            user_id,
            author_id,
        };
        if self.follows.exists(edge).await? {
            return Ok(SubscribeOutcome::AlreadyFollowing);
        }
        if self.follows.insert(edge).await? {
            Ok(SubscribeOutcome::Created)
        } else {
            Ok(SubscribeOutcome::AlreadyFollowing)
        }
    }

    async fn resolve_author(&self, username: &str) -> Result<UserRecord, FollowError> {
        self.users
            .find_by_username(username)
            .await?
            .ok_or_else(|| FollowError::UnknownAuthor(username.to_string()))
    }
}
