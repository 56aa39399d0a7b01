use serde::Deserialize;

use crate::{
    application::{pagination::PageNumber, posts::PostDraft},
    domain::entities::GroupId,
};

/// The `page` query parameter. Repeated values are tolerated; the last one wins.
#[derive(Debug, Default)]
pub(super) struct PageQuery {
    page: Option<String>,
}

impl PageQuery {
    pub(super) fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let page = pairs
            .into_iter()
            .rev()
            .find_map(|(name, value)| (name == "page").then_some(value));
        Self { page }
    }

    pub(super) fn page(&self) -> PageNumber {
        PageNumber::parse(self.page.as_deref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(super) struct PostForm {
    pub text: String,
    pub group: String,
    pub image: String,
}

impl PostForm {
    /// The select sends an empty string for "no group".
    pub(super) fn group_id(&self) -> Result<Option<GroupId>, &'static str> {
        let raw = self.group.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        raw.parse::<GroupId>()
            .map(Some)
            .map_err(|_| "Select a valid group.")
    }

    pub(super) fn into_draft(self, group_id: Option<GroupId>) -> PostDraft {
        PostDraft {
            text: self.text,
            group_id,
            image: Some(self.image).filter(|image| !image.trim().is_empty()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct CommentForm {
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn last_page_parameter_wins() {
        let query = PageQuery::from_pairs(pairs(&[("page", "1"), ("sort", "x"), ("page", "2")]));
        assert_eq!(query.page(), PageNumber::Exact(2));
    }

    #[test]
    fn missing_page_parameter_is_first() {
        let query = PageQuery::from_pairs(pairs(&[("sort", "x")]));
        assert_eq!(query.page(), PageNumber::First);
    }

    #[test]
    fn blank_group_means_none() {
        let form = PostForm {
            group: "  ".into(),
            ..Default::default()
        };
        assert_eq!(form.group_id(), Ok(None));
    }

    #[test]
    fn non_numeric_group_is_rejected() {
        let form = PostForm {
            group: "books".into(),
            ..Default::default()
        };
        assert!(form.group_id().is_err());
    }

    #[test]
    fn blank_image_is_dropped() {
        let form = PostForm {
            text: "hello".into(),
            image: " ".into(),
            ..Default::default()
        };
        let draft = form.into_draft(None);
        assert!(draft.image.is_none());
        assert_eq!(draft.text, "hello");
    }
}
