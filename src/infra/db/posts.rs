use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;

use crate::{
    application::repos::{
        CreatePostParams, PostFilter, PostQuery, PostsRepo, PostsWriteRepo, RepoError,
        UpdatePostParams,
    },
    domain::entities::{GroupRef, PostId, PostRecord},
};

use super::{PostgresRepositories, map_sqlx_error};

const POST_SELECT: &str = "SELECT p.id, p.text, p.created_at, p.author_id, \
    u.username AS author_username, p.image, \
    g.id AS group_id, g.slug AS group_slug, g.title AS group_title \
    FROM posts p \
    INNER JOIN users u ON u.id = p.author_id \
    LEFT JOIN post_groups g ON g.id = p.group_id";

#[derive(sqlx::FromRow)]
struct PostRow {
    id: i64,
    text: String,
    created_at: OffsetDateTime,
    author_id: i64,
    author_username: String,
    image: Option<String>,
    group_id: Option<i64>,
    group_slug: Option<String>,
    group_title: Option<String>,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        let group = match (row.group_id, row.group_slug, row.group_title) {
            (Some(id), Some(slug), Some(title)) => Some(GroupRef { id, slug, title }),
            _ => None,
        };
        Self {
            id: row.id,
            text: row.text,
            created_at: row.created_at,
            author_id: row.author_id,
            author_username: row.author_username,
            group,
            image: row.image,
        }
    }
}

impl PostgresRepositories {
    fn apply_post_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &PostFilter) {
        match filter {
            PostFilter::All => {}
            PostFilter::Group(group_id) => {
                qb.push(" AND p.group_id = ");
                qb.push_bind(*group_id);
            }
            PostFilter::Author(author_id) => {
                qb.push(" AND p.author_id = ");
                qb.push_bind(*author_id);
            }
            PostFilter::Authors(author_ids) => {
                let ids: Vec<i64> = author_ids.iter().copied().collect();
                qb.push(" AND p.author_id = ANY(");
                qb.push_bind(ids);
                qb.push(")");
            }
        }
    }

    async fn fetch_post(&self, id: PostId) -> Result<Option<PostRecord>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new(POST_SELECT);
        qb.push(" WHERE p.id = ");
        qb.push_bind(id);

        let row = qb
            .build_query_as::<PostRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(PostRecord::from))
    }
}

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn list_posts(&self, query: &PostQuery) -> Result<Vec<PostRecord>, RepoError> {
        let offset = i64::try_from(query.offset)
            .map_err(|_| RepoError::InvalidInput {
                message: "offset exceeds supported range".to_string(),
            })?;

        let mut qb = QueryBuilder::<Postgres>::new(POST_SELECT);
        qb.push(" WHERE 1 = 1");
        Self::apply_post_filter(&mut qb, &query.filter);
        qb.push(" ORDER BY p.created_at DESC, p.id DESC LIMIT ");
        qb.push_bind(i64::from(query.limit));
        qb.push(" OFFSET ");
        qb.push_bind(offset);

        let rows = qb
            .build_query_as::<PostRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PostRecord::from).collect())
    }

    async fn count_posts(&self, filter: &PostFilter) -> Result<u64, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM posts p WHERE 1 = 1");
        Self::apply_post_filter(&mut qb, filter);

        let count: i64 = qb
            .build_query_scalar::<i64>()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Self::convert_count(count)
    }

    async fn find_by_id(&self, id: PostId) -> Result<Option<PostRecord>, RepoError> {
        self.fetch_post(id).await
    }
}

#[async_trait]
impl PostsWriteRepo for PostgresRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO posts (text, author_id, group_id, image)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(&params.text)
        .bind(params.author_id)
        .bind(params.group_id)
        .bind(&params.image)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        self.fetch_post(id).await?.ok_or(RepoError::NotFound)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let result = sqlx::query(
            r#"
            UPDATE posts
            SET text = $2, group_id = $3, image = $4
            WHERE id = $1
            "#,
        )
        .bind(params.id)
        .bind(&params.text)
        .bind(params.group_id)
        .bind(&params.image)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }

        self.fetch_post(params.id).await?.ok_or(RepoError::NotFound)
    }

    async fn delete_post(&self, id: PostId) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
