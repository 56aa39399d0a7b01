//! Registration of users and groups, driven from the command line.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::{
    application::repos::{
        CreateGroupParams, GroupsRepo, GroupsWriteRepo, RepoError, UsersRepo, UsersWriteRepo,
    },
    domain::{
        entities::{GroupRecord, UserRecord},
        slug::{SlugAsyncError, generate_unique_slug_async},
    },
};

const MAX_USERNAME_LEN: usize = 150;
const MAX_GROUP_TITLE_LEN: usize = 200;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("invalid username: {0}")]
    InvalidUsername(String),
    #[error("invalid group title: {0}")]
    InvalidTitle(String),
    #[error("username `{0}` is already taken")]
    UsernameTaken(String),
    #[error(transparent)]
    Slug(#[from] SlugAsyncError<RepoError>),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct DirectoryService {
    users: Arc<dyn UsersRepo>,
    users_writer: Arc<dyn UsersWriteRepo>,
    groups: Arc<dyn GroupsRepo>,
    groups_writer: Arc<dyn GroupsWriteRepo>,
}

impl DirectoryService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        users_writer: Arc<dyn UsersWriteRepo>,
        groups: Arc<dyn GroupsRepo>,
        groups_writer: Arc<dyn GroupsWriteRepo>,
    ) -> Self {
        Self {
            users,
            users_writer,
            groups,
            groups_writer,
        }
    }

    pub async fn register_user(&self, username: &str) -> Result<UserRecord, DirectoryError> {
        let username = validate_username(username)?;
        if self.users.find_by_username(username).await?.is_some() {
            return Err(DirectoryError::UsernameTaken(username.to_string()));
        }
        let user = self.users_writer.create_user(username).await?;
        info!(user_id = user.id, username = %user.username, "user registered");
        Ok(user)
    }

    /// Create a group whose slug is derived from its title.
    pub async fn create_group(
        &self,
        title: &str,
        description: &str,
    ) -> Result<GroupRecord, DirectoryError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(DirectoryError::InvalidTitle("title must not be empty".into()));
        }
        if title.chars().count() > MAX_GROUP_TITLE_LEN {
            return Err(DirectoryError::InvalidTitle(format!(
                "title exceeds {MAX_GROUP_TITLE_LEN} characters"
            )));
        }

        let groups = self.groups.clone();
        let slug = generate_unique_slug_async(title, |candidate| {
            let groups = groups.clone();
            let candidate = candidate.to_string();
            async move {
                let existing = groups.find_by_slug(&candidate).await?;
                Ok::<bool, RepoError>(existing.is_none())
            }
        })
        .await?;

        let group = self
            .groups_writer
            .create_group(CreateGroupParams {
                title: title.to_string(),
                slug,
                description: description.trim().to_string(),
            })
            .await?;
        info!(group_id = group.id, slug = %group.slug, "group created");
        Ok(group)
    }
}

fn validate_username(raw: &str) -> Result<&str, DirectoryError> {
    let username = raw.trim();
    if username.is_empty() {
        return Err(DirectoryError::InvalidUsername("username must not be empty".into()));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(DirectoryError::InvalidUsername(format!(
            "username exceeds {MAX_USERNAME_LEN} characters"
        )));
    }
    if let Some(bad) = username
        .chars()
        .find(|ch| !(ch.is_alphanumeric() || matches!(ch, '_' | '.' | '@' | '+' | '-')))
    {
        return Err(DirectoryError::InvalidUsername(format!(
            "character `{bad}` is not allowed"
        )));
    }
    Ok(username)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usernames_allow_word_characters_and_punctuation() {
        assert_eq!(validate_username(" leo.tolstoy+1@ ").expect("valid"), "leo.tolstoy+1@");
        assert_eq!(validate_username("Лев_Толстой").expect("valid"), "Лев_Толстой");
    }

    #[test]
    fn usernames_reject_spaces_and_slashes() {
        assert!(validate_username("two words").is_err());
        assert!(validate_username("a/b").is_err());
        assert!(validate_username("   ").is_err());
    }
}
