//! Validated inputs for posts and comments.

use crate::domain::error::DomainError;

const MAX_IMAGE_REF_LEN: usize = 255;

/// Post body text; never empty after trimming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostText(String);

impl PostText {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("post text must not be empty"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Comment body text; never empty after trimming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentText(String);

impl CommentText {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("comment text must not be empty"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Normalise an optional image reference: blank values mean "no image".
pub fn normalize_image_ref(raw: Option<&str>) -> Result<Option<String>, DomainError> {
    let Some(value) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(None);
    };

    if value.len() > MAX_IMAGE_REF_LEN {
        return Err(DomainError::validation(format!(
            "image reference exceeds {MAX_IMAGE_REF_LEN} characters"
        )));
    }
    if value.contains("..") {
        return Err(DomainError::validation(
            "image reference must not traverse directories",
        ));
    }

    Ok(Some(value.to_string()))
}
