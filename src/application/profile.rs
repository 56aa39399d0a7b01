use std::sync::Arc;

use thiserror::Error;

use crate::{
    application::{
        feed::{FeedError, FeedService},
        follow::FollowService,
        pagination::{Page, PageNumber},
        repos::{RepoError, UsersRepo},
    },
    domain::entities::{PostRecord, UserRecord},
};

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("user `{0}` not found")]
    UnknownUser(String),
    #[error(transparent)]
    Feed(#[from] FeedError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// An author's page as seen by a particular viewer.
#[derive(Debug, Clone)]
pub struct ProfileContext {
    pub author: UserRecord,
    pub posts: Page<PostRecord>,
    pub following: bool,
    pub is_owner: bool,
}

impl ProfileContext {
    pub fn posts_count(&self) -> u64 {
        self.posts.total_count
    }
}

#[derive(Clone)]
pub struct ProfileService {
    users: Arc<dyn UsersRepo>,
    feed: FeedService,
    follows: FollowService,
}

impl ProfileService {
    pub fn new(users: Arc<dyn UsersRepo>, feed: FeedService, follows: FollowService) -> Self {
        Self {
            users,
            feed,
            follows,
        }
    }

    pub async fn profile(
        &self,
        username: &str,
        viewer: Option<&UserRecord>,
        page: PageNumber,
    ) -> Result<ProfileContext, ProfileError> {
        let author = self
            .users
            .find_by_username(username)
            .await?
            .ok_or_else(|| ProfileError::UnknownUser(username.to_string()))?;
        let posts = self.feed.author_posts(author.id, page).await?;
        let following = self.follows.following_flag(viewer, &author).await?;
        let is_owner = viewer.is_some_and(|viewer| viewer.id == author.id);
        Ok(ProfileContext {
            author,
            posts,
            following,
            is_owner,
        })
    }
}
