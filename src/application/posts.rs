//! Post lifecycle: authoring, editing, deletion and comments.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, instrument};

use crate::{
    application::repos::{
        CommentsRepo, CreateCommentParams, CreatePostParams, GroupsRepo, PostFilter, PostsRepo,
        PostsWriteRepo, RepoError, UpdatePostParams,
    },
    cache::PageCache,
    domain::{
        entities::{CommentRecord, GroupId, GroupRecord, PostId, PostRecord, UserRecord},
        error::DomainError,
        posts::{CommentText, PostText, normalize_image_ref},
    },
};

#[derive(Debug, Error)]
pub enum PostError {
    #[error("post {0} not found")]
    NotFound(PostId),
    #[error("user `{username}` may not modify post {post_id}")]
    Forbidden { post_id: PostId, username: String },
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Raw post form input before validation.
#[derive(Debug, Clone, Default)]
pub struct PostDraft {
    pub text: String,
    pub group_id: Option<GroupId>,
    pub image: Option<String>,
}

/// Everything the post detail page shows.
#[derive(Debug, Clone)]
pub struct PostDetail {
    pub post: PostRecord,
    pub author_posts_count: u64,
    pub comments: Vec<CommentRecord>,
}

#[derive(Clone)]
pub struct PostService {
    reader: Arc<dyn PostsRepo>,
    writer: Arc<dyn PostsWriteRepo>,
    groups: Arc<dyn GroupsRepo>,
    comments: Arc<dyn CommentsRepo>,
    cache: Arc<dyn PageCache>,
}

impl PostService {
    pub fn new(
        reader: Arc<dyn PostsRepo>,
        writer: Arc<dyn PostsWriteRepo>,
        groups: Arc<dyn GroupsRepo>,
        comments: Arc<dyn CommentsRepo>,
        cache: Arc<dyn PageCache>,
    ) -> Self {
        Self {
            reader,
            writer,
            groups,
            comments,
            cache,
        }
    }

    pub async fn groups(&self) -> Result<Vec<GroupRecord>, RepoError> {
        self.groups.list_all().await
    }

    pub async fn detail(&self, post_id: PostId) -> Result<PostDetail, PostError> {
        let post = self.load(post_id).await?;
        let author_posts_count = self
            .reader
            .count_posts(&PostFilter::Author(post.author_id))
            .await?;
        let comments = self.comments.list_for_post(post_id).await?;
        Ok(PostDetail {
            post,
            author_posts_count,
            comments,
        })
    }

    /// Publish a new post. The index cache is cleared so it shows up at once.
    #[instrument(skip(self, author, draft), fields(author = %author.username))]
    pub async fn create_post(
        &self,
        author: &UserRecord,
        draft: PostDraft,
    ) -> Result<PostRecord, PostError> {
        let (text, group_id, image) = self.validate(draft).await?;
        let post = self
            .writer
            .create_post(CreatePostParams {
                author_id: author.id,
                text: text.into_inner(),
                group_id,
                image,
            })
            .await?;
        self.cache.clear();
        info!(post_id = post.id, "post created");
        Ok(post)
    }

    /// Load a post for its edit form, rejecting anyone but the author.
    pub async fn editable(
        &self,
        editor: &UserRecord,
        post_id: PostId,
    ) -> Result<PostRecord, PostError> {
        let post = self.load(post_id).await?;
        ensure_author(editor, &post)?;
        Ok(post)
    }

    /// Rewrite a post. Cached listings pick the change up when they expire.
    #[instrument(skip(self, editor, draft), fields(editor = %editor.username))]
    pub async fn edit_post(
        &self,
        editor: &UserRecord,
        post_id: PostId,
        draft: PostDraft,
    ) -> Result<PostRecord, PostError> {
        let post = self.load(post_id).await?;
        ensure_author(editor, &post)?;
        let (text, group_id, image) = self.validate(draft).await?;
        let updated = self
            .writer
            .update_post(UpdatePostParams {
                id: post_id,
                text: text.into_inner(),
                group_id,
                image,
            })
            .await?;
        info!(post_id, "post edited");
        Ok(updated)
    }

    /// Delete a post. Cached listings keep showing it until they expire or
    /// the cache is cleared.
    #[instrument(skip(self, actor), fields(actor = %actor.username))]
    pub async fn delete_post(
        &self,
        actor: &UserRecord,
        post_id: PostId,
    ) -> Result<PostRecord, PostError> {
        let post = self.load(post_id).await?;
        ensure_author(actor, &post)?;
        self.writer.delete_post(post_id).await?;
        info!(post_id, "post deleted");
        Ok(post)
    }

    #[instrument(skip(self, author, text), fields(author = %author.username))]
    pub async fn add_comment(
        &self,
        author: &UserRecord,
        post_id: PostId,
        text: &str,
    ) -> Result<CommentRecord, PostError> {
        let post = self.load(post_id).await?;
        let text = CommentText::parse(text)?;
        let comment = self
            .comments
            .create_comment(CreateCommentParams {
                post_id: post.id,
                author_id: author.id,
                text: text.into_inner(),
            })
            .await?;
        info!(post_id, comment_id = comment.id, "comment added");
        Ok(comment)
    }

    async fn load(&self, post_id: PostId) -> Result<PostRecord, PostError> {
        self.reader
            .find_by_id(post_id)
            .await?
            .ok_or(PostError::NotFound(post_id))
    }

    async fn validate(
        &self,
        draft: PostDraft,
    ) -> Result<(PostText, Option<GroupId>, Option<String>), PostError> {
        let text = PostText::parse(&draft.text)?;
        let image = normalize_image_ref(draft.image.as_deref())?;
        if let Some(group_id) = draft.group_id
            && self.groups.find_by_id(group_id).await?.is_none()
        {
            return Err(DomainError::validation("selected group does not exist").into());
        }
        Ok((text, draft.group_id, image))
    }
}

fn ensure_author(user: &UserRecord, post: &PostRecord) -> Result<(), PostError> {
    if post.author_id == user.id {
        Ok(())
    } else {
        Err(PostError::Forbidden {
            post_id: post.id,
            username: user.username.clone(),
        })
    }
}
