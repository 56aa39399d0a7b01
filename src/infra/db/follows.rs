use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::{
    application::repos::{FollowsRepo, RepoError},
    domain::entities::{FollowEdge, UserId},
};

use super::{PostgresRepositories, map_sqlx_error};

#[async_trait]
impl FollowsRepo for PostgresRepositories {
    async fn exists(&self, edge: FollowEdge) -> Result<bool, RepoError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM follows WHERE user_id = $1 AND author_id = $2)",
        )
        .bind(edge.user_id)
        .bind(edge.author_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn insert(&self, edge: FollowEdge) -> Result<bool, RepoError> {
        let result = sqlx::query(
            r#"
            INSERT INTO follows (user_id, author_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, author_id) DO NOTHING
            "#,
        )
        .bind(edge.user_id)
        .bind(edge.author_id)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete(&self, edge: FollowEdge) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM follows WHERE user_id = $1 AND author_id = $2")
            .bind(edge.user_id)
            .bind(edge.author_id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_author_ids(&self, user_id: UserId) -> Result<BTreeSet<UserId>, RepoError> {
        let ids = sqlx::query_scalar::<_, i64>("SELECT author_id FROM follows WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(ids.into_iter().collect())
    }
}
