use crate::{
    application::{
        error::{ErrorReport, HttpError},
        pagination::Page,
        posts::PostDetail,
        profile::ProfileContext,
    },
    domain::entities::{CommentRecord, GroupRecord, PostRecord},
};
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::{
    OffsetDateTime,
    format_description::{BorrowedFormatItem, well_known::Rfc3339},
    macros::format_description,
};

const DISPLAY_DATE: &[BorrowedFormatItem<'static>] =
    format_description!("[day].[month].[year] [hour]:[minute]");

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response() -> Response {
    let view = LayoutContext::new(
        LayoutChrome::titled("Page not found"),
        ErrorPageView::not_found(),
    );
    let mut response = render_template_response(ErrorTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

pub fn format_display_date(value: OffsetDateTime) -> String {
    value.format(DISPLAY_DATE).unwrap_or_default()
}

fn format_iso_date(value: OffsetDateTime) -> String {
    value.format(&Rfc3339).unwrap_or_default()
}

#[derive(Clone)]
pub struct BrandView {
    pub title: String,
    pub href: String,
}

#[derive(Clone)]
pub struct NavigationLinkView {
    pub label: String,
    pub href: String,
}

/// Page chrome shared by every template.
///
/// Carries nothing viewer-specific so cached pages can be replayed to anyone.
#[derive(Clone)]
pub struct LayoutChrome {
    pub brand: BrandView,
    pub navigation: Vec<NavigationLinkView>,
    pub title: String,
}

impl LayoutChrome {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            brand: BrandView {
                title: "Yatube".to_string(),
                href: "/".to_string(),
            },
            navigation: vec![
                NavigationLinkView {
                    label: "Home".to_string(),
                    href: "/".to_string(),
                },
                NavigationLinkView {
                    label: "Following".to_string(),
                    href: "/follow/".to_string(),
                },
                NavigationLinkView {
                    label: "New post".to_string(),
                    href: "/create/".to_string(),
                },
            ],
            title: title.into(),
        }
    }
}

#[derive(Clone)]
pub struct LayoutContext<T> {
    pub brand: BrandView,
    pub navigation: Vec<NavigationLinkView>,
    pub title: String,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: LayoutChrome, content: T) -> Self {
        Self {
            brand: chrome.brand,
            navigation: chrome.navigation,
            title: chrome.title,
            content,
        }
    }
}

#[derive(Clone)]
pub struct GroupBadge {
    pub slug: String,
    pub title: String,
}

#[derive(Clone)]
pub struct PostCard {
    pub id: i64,
    pub text: String,
    pub author_username: String,
    pub published: String,
    pub iso_date: String,
    pub group: Option<GroupBadge>,
    pub image: Option<String>,
}

impl From<&PostRecord> for PostCard {
    fn from(post: &PostRecord) -> Self {
        Self {
            id: post.id,
            text: post.text.clone(),
            author_username: post.author_username.clone(),
            published: format_display_date(post.created_at),
            iso_date: format_iso_date(post.created_at),
            group: post.group.as_ref().map(|group| GroupBadge {
                slug: group.slug.clone(),
                title: group.title.clone(),
            }),
            image: post.image.clone(),
        }
    }
}

#[derive(Clone)]
pub struct PaginatorView {
    pub number: u64,
    pub num_pages: u64,
    pub previous_href: Option<String>,
    pub next_href: Option<String>,
    pub first_href: String,
    pub last_href: String,
}

impl PaginatorView {
    pub fn is_paginated(&self) -> bool {
        self.num_pages > 1
    }
}

fn page_href(number: u64) -> String {
    format!("?page={number}")
}

/// One rendered page of post cards plus its navigation.
pub struct ListingView {
    pub posts: Vec<PostCard>,
    pub paginator: PaginatorView,
    pub empty_message: String,
}

impl ListingView {
    pub fn from_page(page: &Page<PostRecord>, empty_message: impl Into<String>) -> Self {
        let paginator = PaginatorView {
            number: page.number,
            num_pages: page.num_pages,
            previous_href: page
                .has_previous()
                .then(|| page_href(page.previous_number())),
            next_href: page.has_next().then(|| page_href(page.next_number())),
            first_href: page_href(1),
            last_href: page_href(page.num_pages),
        };
        Self {
            posts: page.items.iter().map(PostCard::from).collect(),
            paginator,
            empty_message: empty_message.into(),
        }
    }

    pub fn has_results(&self) -> bool {
        !self.posts.is_empty()
    }
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub view: LayoutContext<ListingView>,
}

#[derive(Template)]
#[template(path = "follow.html")]
pub struct FollowTemplate {
    pub view: LayoutContext<ListingView>,
}

pub struct GroupPageView {
    pub title: String,
    pub description: String,
    pub listing: ListingView,
}

impl GroupPageView {
    pub fn new(group: &GroupRecord, page: &Page<PostRecord>) -> Self {
        Self {
            title: group.title.clone(),
            description: group.description.clone(),
            listing: ListingView::from_page(page, "This group has no posts yet."),
        }
    }
}

#[derive(Template)]
#[template(path = "group.html")]
pub struct GroupTemplate {
    pub view: LayoutContext<GroupPageView>,
}

pub struct ProfileView {
    pub username: String,
    pub posts_count: u64,
    pub following: bool,
    pub can_follow: bool,
    pub follow_action: String,
    pub unfollow_action: String,
    pub listing: ListingView,
}

impl ProfileView {
    pub fn new(context: &ProfileContext, authenticated: bool) -> Self {
        let username = context.author.username.clone();
        Self {
            follow_action: format!("/profile/{username}/follow/"),
            unfollow_action: format!("/profile/{username}/unfollow/"),
            posts_count: context.posts_count(),
            following: context.following,
            can_follow: authenticated && !context.is_owner,
            listing: ListingView::from_page(&context.posts, "No posts yet."),
            username,
        }
    }
}

#[derive(Template)]
#[template(path = "profile.html")]
pub struct ProfileTemplate {
    pub view: LayoutContext<ProfileView>,
}

pub struct CommentView {
    pub author_username: String,
    pub text: String,
    pub published: String,
}

impl From<&CommentRecord> for CommentView {
    fn from(comment: &CommentRecord) -> Self {
        Self {
            author_username: comment.author_username.clone(),
            text: comment.text.clone(),
            published: format_display_date(comment.created_at),
        }
    }
}

pub struct PostDetailView {
    pub post: PostCard,
    pub author_posts_count: u64,
    pub comments: Vec<CommentView>,
    pub can_edit: bool,
    pub can_comment: bool,
    pub comment_text: String,
    pub comment_error: Option<String>,
}

impl PostDetailView {
    pub fn new(detail: &PostDetail, viewer_id: Option<i64>) -> Self {
        Self {
            post: PostCard::from(&detail.post),
            author_posts_count: detail.author_posts_count,
            comments: detail.comments.iter().map(CommentView::from).collect(),
            can_edit: viewer_id == Some(detail.post.author_id),
            can_comment: viewer_id.is_some(),
            comment_text: String::new(),
            comment_error: None,
        }
    }

    pub fn with_comment_error(
        mut self,
        text: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        self.comment_text = text.into();
        self.comment_error = Some(error.into());
        self
    }
}

#[derive(Template)]
#[template(path = "post_detail.html")]
pub struct PostDetailTemplate {
    pub view: LayoutContext<PostDetailView>,
}

pub struct GroupOptionView {
    pub id: i64,
    pub title: String,
    pub selected: bool,
}

pub struct PostFormView {
    pub is_edit: bool,
    pub action: String,
    pub text: String,
    pub image: String,
    pub groups: Vec<GroupOptionView>,
    pub errors: Vec<String>,
}

impl PostFormView {
    pub fn new(
        action: impl Into<String>,
        groups: &[GroupRecord],
        selected_group: Option<i64>,
    ) -> Self {
        Self {
            is_edit: false,
            action: action.into(),
            text: String::new(),
            image: String::new(),
            groups: groups
                .iter()
                .map(|group| GroupOptionView {
                    id: group.id,
                    title: group.title.clone(),
                    selected: selected_group == Some(group.id),
                })
                .collect(),
            errors: Vec::new(),
        }
    }

    pub fn for_edit(post: &PostRecord, groups: &[GroupRecord]) -> Self {
        let mut view = Self::new(
            format!("/posts/{}/edit/", post.id),
            groups,
            post.group.as_ref().map(|group| group.id),
        );
        view.is_edit = true;
        view.text = post.text.clone();
        view.image = post.image.clone().unwrap_or_default();
        view
    }
}

#[derive(Template)]
#[template(path = "post_form.html")]
pub struct PostFormTemplate {
    pub view: LayoutContext<PostFormView>,
}

pub struct ErrorPageView {
    pub title: String,
    pub message: String,
}

impl ErrorPageView {
    pub fn not_found() -> Self {
        Self {
            title: "Page not found".to_string(),
            message: "The page you requested does not exist.".to_string(),
        }
    }

    pub fn forbidden() -> Self {
        Self {
            title: "Forbidden".to_string(),
            message: "You are not allowed to do that.".to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub view: LayoutContext<ErrorPageView>,
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::application::pagination::Paginator;

    fn record(id: i64) -> PostRecord {
        PostRecord {
            id,
            text: format!("text {id}"),
            created_at: datetime!(2024-03-05 14:07 UTC),
            author_id: 1,
            author_username: "leo".to_string(),
            group: None,
            image: None,
        }
    }

    #[test]
    fn display_date_is_day_first() {
        assert_eq!(
            format_display_date(datetime!(2024-03-05 14:07 UTC)),
            "05.03.2024 14:07"
        );
    }

    #[test]
    fn middle_page_links_both_ways() {
        let paginator = Paginator::new(25, 10);
        let page = Page::new(vec![record(1)], 2, &paginator);

        let listing = ListingView::from_page(&page, "empty");

        assert_eq!(listing.paginator.previous_href.as_deref(), Some("?page=1"));
        assert_eq!(listing.paginator.next_href.as_deref(), Some("?page=3"));
        assert_eq!(listing.paginator.last_href, "?page=3");
        assert!(listing.paginator.is_paginated());
    }

    #[test]
    fn empty_listing_renders_message() {
        let listing = ListingView::from_page(&Page::empty(), "Nothing here.");
        let html = IndexTemplate {
            view: LayoutContext::new(LayoutChrome::titled("Latest posts"), listing),
        }
        .render()
        .expect("render");

        assert!(html.contains("Nothing here."));
        assert!(!html.contains("?page=2"));
    }

    #[test]
    fn post_text_is_escaped() {
        let mut post = record(7);
        post.text = "<script>alert(1)</script>".to_string();
        let paginator = Paginator::new(1, 10);
        let page = Page::new(vec![post], 1, &paginator);

        let html = IndexTemplate {
            view: LayoutContext::new(
                LayoutChrome::titled("Latest posts"),
                ListingView::from_page(&page, ""),
            ),
        }
        .render()
        .expect("render");

        assert!(!html.contains("<script>alert"));
        assert!(html.contains("/posts/7/"));
    }
}
