//! Paginated post listings: the index, group pages, author pages and the
//! personal feed of followed authors.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, instrument};

use crate::{
    application::{
        pagination::{Page, PageNumber, Paginator},
        repos::{FollowsRepo, GroupsRepo, PostFilter, PostQuery, PostsRepo, RepoError},
    },
    domain::entities::{GroupRecord, PostRecord, UserId},
};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("group `{0}` not found")]
    UnknownGroup(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct FeedService {
    posts: Arc<dyn PostsRepo>,
    groups: Arc<dyn GroupsRepo>,
    follows: Arc<dyn FollowsRepo>,
    page_size: u32,
}

impl FeedService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        groups: Arc<dyn GroupsRepo>,
        follows: Arc<dyn FollowsRepo>,
        page_size: u32,
    ) -> Self {
        Self {
            posts,
            groups,
            follows,
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// All posts, newest first.
    #[instrument(skip(self))]
    pub async fn index(&self, page: PageNumber) -> Result<Page<PostRecord>, FeedError> {
        Ok(self.paginate(PostFilter::All, page).await?)
    }

    #[instrument(skip(self))]
    pub async fn group_posts(
        &self,
        slug: &str,
        page: PageNumber,
    ) -> Result<(GroupRecord, Page<PostRecord>), FeedError> {
        let group = self
            .groups
            .find_by_slug(slug)
            .await?
            .ok_or_else(|| FeedError::UnknownGroup(slug.to_string()))?;
        let posts = self.paginate(PostFilter::Group(group.id), page).await?;
        Ok((group, posts))
    }

    #[instrument(skip(self))]
    pub async fn author_posts(
        &self,
        author_id: UserId,
        page: PageNumber,
    ) -> Result<Page<PostRecord>, FeedError> {
        Ok(self.paginate(PostFilter::Author(author_id), page).await?)
    }

    /// Posts by every author `viewer` follows, newest first.
    ///
    /// Someone who follows nobody gets a single empty page.
    #[instrument(skip(self))]
    pub async fn get_feed(
        &self,
        viewer: UserId,
        page: PageNumber,
    ) -> Result<Page<PostRecord>, FeedError> {
        let authors = self.follows.list_author_ids(viewer).await?;
        if authors.is_empty() {
            debug!(viewer, "viewer follows nobody");
            return Ok(Page::empty());
        }
        Ok(self.paginate(PostFilter::Authors(authors), page).await?)
    }

    async fn paginate(
        &self,
        filter: PostFilter,
        page: PageNumber,
    ) -> Result<Page<PostRecord>, RepoError> {
        let total = self.posts.count_posts(&filter).await?;
        let paginator = Paginator::new(total, self.page_size);
        let window = paginator.window(paginator.resolve(page));

        if total == 0 {
            return Ok(Page::new(Vec::new(), window.number, &paginator));
        }

        let query = PostQuery {
            filter,
            limit: window.limit,
            offset: window.offset,
        };
        let items = self.posts.list_posts(&query).await?;
        debug!(
            total,
            page = window.number,
            returned = items.len(),
            "listing page loaded"
        );
        Ok(Page::new(items, window.number, &paginator))
    }
}
