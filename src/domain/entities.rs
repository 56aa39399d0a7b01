//! Domain entities mirrored from persistent storage.

use serde::Serialize;
use time::OffsetDateTime;

pub type UserId = i64;
pub type GroupId = i64;
pub type PostId = i64;
pub type CommentId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRecord {
    pub id: UserId,
    pub username: String,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupRecord {
    pub id: GroupId,
    pub title: String,
    pub slug: String,
    pub description: String,
}

/// Group summary embedded in post listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupRef {
    pub id: GroupId,
    pub slug: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostRecord {
    pub id: PostId,
    pub text: String,
    pub created_at: OffsetDateTime,
    pub author_id: UserId,
    pub author_username: String,
    pub group: Option<GroupRef>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentRecord {
    pub id: CommentId,
    pub post_id: PostId,
    pub author_id: UserId,
    pub author_username: String,
    pub text: String,
    pub created_at: OffsetDateTime,
}

/// Directed subscription edge: `user_id` follows `author_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FollowEdge {
    pub user_id: UserId,
    pub author_id: UserId,
}
