use std::sync::Arc;

use axum::{
    Extension, Form, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};

use crate::{
    application::{
        error::{ErrorReport, HttpError},
        feed::{FeedError, FeedService},
        follow::{FollowError, FollowService},
        posts::{PostError, PostService},
        profile::{ProfileError, ProfileService},
        repos::HealthRepo,
    },
    cache::{PageCacheState, page_cache_layer},
    domain::{entities::PostId, error::DomainError},
    presentation::views::{
        FollowTemplate, GroupPageView, GroupTemplate, IndexTemplate, LayoutChrome, LayoutContext,
        ListingView, PostDetailTemplate, PostDetailView, PostFormTemplate, PostFormView,
        ProfileTemplate, ProfileView, render_not_found_response, render_template_response,
    },
};

use super::{
    auth::{AuthState, AuthenticatedUser, Viewer, require_user, resolve_viewer},
    db_health_response,
    forms::{CommentForm, PageQuery, PostForm},
    middleware::{log_responses, set_request_context},
    repo_error_to_http,
};

#[derive(Clone)]
pub struct HttpState {
    pub feed: Arc<FeedService>,
    pub follows: Arc<FollowService>,
    pub profiles: Arc<ProfileService>,
    pub posts: Arc<PostService>,
    pub health: Arc<dyn HealthRepo>,
    pub auth: AuthState,
    pub cache: Option<PageCacheState>,
}

pub fn build_router(state: HttpState) -> Router {
    // Only the index is page-cached; its markup carries nothing viewer-specific.
    let cached_routes = Router::new().route("/", get(index));
    let cached_routes = if let Some(cache_state) = state.cache.clone() {
        cached_routes.route_layer(middleware::from_fn_with_state(
            cache_state,
            page_cache_layer,
        ))
    } else {
        cached_routes
    };

    let member_routes = Router::new()
        .route("/follow/", get(follow_index))
        .route("/create/", get(post_create_form).post(post_create))
        .route("/posts/{post_id}/edit/", get(post_edit_form).post(post_edit))
        .route("/posts/{post_id}/delete/", post(post_delete))
        .route("/posts/{post_id}/comment/", post(add_comment))
        .route("/profile/{username}/follow/", post(profile_follow))
        .route("/profile/{username}/unfollow/", post(profile_unfollow))
        .route_layer(middleware::from_fn_with_state(
            state.auth.clone(),
            require_user,
        ));

    let public_routes = Router::new()
        .route("/group/{slug}/", get(group_posts))
        .route("/profile/{username}/", get(profile))
        .route("/posts/{post_id}/", get(post_detail))
        .route("/_health/db", get(public_health));

    cached_routes
        .merge(member_routes)
        .merge(public_routes)
        .fallback(fallback)
        .with_state(state.clone())
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn_with_state(state.auth, resolve_viewer))
        .layer(middleware::from_fn(set_request_context))
}

async fn index(
    State(state): State<HttpState>,
    Query(query): Query<Vec<(String, String)>>,
) -> Response {
    let page = PageQuery::from_pairs(query).page();
    match state.feed.index(page).await {
        Ok(page) => {
            let listing = ListingView::from_page(&page, "No posts yet.");
            let view = LayoutContext::new(LayoutChrome::titled("Latest posts"), listing);
            render_template_response(IndexTemplate { view }, StatusCode::OK)
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn follow_index(
    State(state): State<HttpState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    Query(query): Query<Vec<(String, String)>>,
) -> Response {
    let page = PageQuery::from_pairs(query).page();
    match state.feed.get_feed(user.id, page).await {
        Ok(page) => {
            let listing =
                ListingView::from_page(&page, "Authors you follow have not posted yet.");
            let view = LayoutContext::new(LayoutChrome::titled("Following"), listing);
            render_template_response(FollowTemplate { view }, StatusCode::OK)
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn group_posts(
    State(state): State<HttpState>,
    Path(slug): Path<String>,
    Query(query): Query<Vec<(String, String)>>,
) -> Response {
    let page = PageQuery::from_pairs(query).page();
    match state.feed.group_posts(&slug, page).await {
        Ok((group, page)) => {
            let content = GroupPageView::new(&group, &page);
            let view = LayoutContext::new(LayoutChrome::titled(group.title.clone()), content);
            render_template_response(GroupTemplate { view }, StatusCode::OK)
        }
        Err(FeedError::UnknownGroup(slug)) => not_found(format!("unknown group `{slug}`")),
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn profile(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    Path(username): Path<String>,
    Query(query): Query<Vec<(String, String)>>,
) -> Response {
    let page = PageQuery::from_pairs(query).page();
    match state.profiles.profile(&username, viewer.user(), page).await {
        Ok(context) => {
            let content = ProfileView::new(&context, viewer.user().is_some());
            let title = format!("Profile of {}", context.author.username);
            let view = LayoutContext::new(LayoutChrome::titled(title), content);
            render_template_response(ProfileTemplate { view }, StatusCode::OK)
        }
        Err(ProfileError::UnknownUser(username)) => not_found(format!("unknown user `{username}`")),
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn post_detail(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    Path(raw_id): Path<String>,
) -> Response {
    let Some(post_id) = parse_post_id(&raw_id) else {
        return not_found(format!("malformed post id `{raw_id}`"));
    };

    match state.posts.detail(post_id).await {
        Ok(detail) => {
            let content = PostDetailView::new(&detail, viewer.user().map(|user| user.id));
            let chrome = LayoutChrome::titled(post_title(&detail.post.text));
            let view = LayoutContext::new(chrome, content);
            render_template_response(PostDetailTemplate { view }, StatusCode::OK)
        }
        Err(err) => post_error_response(err, post_id),
    }
}

async fn post_create_form(State(state): State<HttpState>) -> Response {
    const SOURCE: &str = "infra::http::public::post_create_form";

    match state.posts.groups().await {
        Ok(groups) => {
            let content = PostFormView::new("/create/", &groups, None);
            let view = LayoutContext::new(LayoutChrome::titled("New post"), content);
            render_template_response(PostFormTemplate { view }, StatusCode::OK)
        }
        Err(err) => repo_error_to_http(SOURCE, err).into_response(),
    }
}

async fn post_create(
    State(state): State<HttpState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    Form(form): Form<PostForm>,
) -> Response {
    let group_id = match form.group_id() {
        Ok(group_id) => group_id,
        Err(message) => {
            return rerender_post_form(&state, "/create/".to_string(), false, &form, message)
                .await;
        }
    };

    match state
        .posts
        .create_post(&user, form.clone().into_draft(group_id))
        .await
    {
        Ok(_) => Redirect::to(&profile_href(&user.username)).into_response(),
        Err(PostError::Domain(err)) => {
            let message = validation_message(&err);
            rerender_post_form(&state, "/create/".to_string(), false, &form, &message).await
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn post_edit_form(
    State(state): State<HttpState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    Path(raw_id): Path<String>,
) -> Response {
    const SOURCE: &str = "infra::http::public::post_edit_form";

    let Some(post_id) = parse_post_id(&raw_id) else {
        return not_found(format!("malformed post id `{raw_id}`"));
    };

    let post = match state.posts.editable(&user, post_id).await {
        Ok(post) => post,
        Err(err) => return post_error_response(err, post_id),
    };

    match state.posts.groups().await {
        Ok(groups) => {
            let content = PostFormView::for_edit(&post, &groups);
            let view = LayoutContext::new(LayoutChrome::titled("Edit post"), content);
            render_template_response(PostFormTemplate { view }, StatusCode::OK)
        }
        Err(err) => repo_error_to_http(SOURCE, err).into_response(),
    }
}

async fn post_edit(
    State(state): State<HttpState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    Path(raw_id): Path<String>,
    Form(form): Form<PostForm>,
) -> Response {
    let Some(post_id) = parse_post_id(&raw_id) else {
        return not_found(format!("malformed post id `{raw_id}`"));
    };
    let action = format!("/posts/{post_id}/edit/");

    let group_id = match form.group_id() {
        Ok(group_id) => group_id,
        Err(message) => return rerender_post_form(&state, action, true, &form, message).await,
    };

    match state
        .posts
        .edit_post(&user, post_id, form.clone().into_draft(group_id))
        .await
    {
        Ok(post) => Redirect::to(&post_href(post.id)).into_response(),
        Err(PostError::Domain(err)) => {
            let message = validation_message(&err);
            rerender_post_form(&state, action, true, &form, &message).await
        }
        Err(err) => post_error_response(err, post_id),
    }
}

async fn post_delete(
    State(state): State<HttpState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    Path(raw_id): Path<String>,
) -> Response {
    let Some(post_id) = parse_post_id(&raw_id) else {
        return not_found(format!("malformed post id `{raw_id}`"));
    };

    match state.posts.delete_post(&user, post_id).await {
        Ok(post) => Redirect::to(&profile_href(&post.author_username)).into_response(),
        Err(err) => post_error_response(err, post_id),
    }
}

async fn add_comment(
    State(state): State<HttpState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    Path(raw_id): Path<String>,
    Form(form): Form<CommentForm>,
) -> Response {
    const SOURCE: &str = "infra::http::public::add_comment";

    let Some(post_id) = parse_post_id(&raw_id) else {
        return not_found(format!("malformed post id `{raw_id}`"));
    };

    let error = match state.posts.add_comment(&user, post_id, &form.text).await {
        Ok(_) => return Redirect::to(&post_href(post_id)).into_response(),
        Err(PostError::Domain(err)) => err,
        Err(err) => return post_error_response(err, post_id),
    };

    let detail = match state.posts.detail(post_id).await {
        Ok(detail) => detail,
        Err(err) => return post_error_response(err, post_id),
    };
    let content = PostDetailView::new(&detail, Some(user.id))
        .with_comment_error(form.text, validation_message(&error));
    let view = LayoutContext::new(LayoutChrome::titled(post_title(&detail.post.text)), content);
    let mut response = render_template_response(
        PostDetailTemplate { view },
        StatusCode::UNPROCESSABLE_ENTITY,
    );
    ErrorReport::from_error(SOURCE, StatusCode::UNPROCESSABLE_ENTITY, &error).attach(&mut response);
    response
}

async fn profile_follow(
    State(state): State<HttpState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    Path(username): Path<String>,
) -> Response {
    match state.follows.subscribe(&user, &username).await {
        Ok(_) => Redirect::to("/").into_response(),
        Err(err) => follow_error_response(err),
    }
}

async fn profile_unfollow(
    State(state): State<HttpState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    Path(username): Path<String>,
) -> Response {
    match state.follows.unsubscribe(&user, &username).await {
        Ok(_) => Redirect::to("/").into_response(),
        Err(err) => follow_error_response(err),
    }
}

async fn public_health(State(state): State<HttpState>) -> Response {
    db_health_response(state.health.ping().await)
}

async fn fallback() -> Response {
    render_not_found_response()
}

async fn rerender_post_form(
    state: &HttpState,
    action: String,
    is_edit: bool,
    form: &PostForm,
    message: &str,
) -> Response {
    const SOURCE: &str = "infra::http::public::post_form";

    let groups = match state.posts.groups().await {
        Ok(groups) => groups,
        Err(err) => return repo_error_to_http(SOURCE, err).into_response(),
    };

    let mut content = PostFormView::new(action, &groups, form.group_id().ok().flatten());
    content.is_edit = is_edit;
    content.text = form.text.clone();
    content.image = form.image.clone();
    content.errors = vec![message.to_string()];

    let title = if is_edit { "Edit post" } else { "New post" };
    let view = LayoutContext::new(LayoutChrome::titled(title), content);
    let mut response =
        render_template_response(PostFormTemplate { view }, StatusCode::UNPROCESSABLE_ENTITY);
    ErrorReport::from_message(SOURCE, StatusCode::UNPROCESSABLE_ENTITY, message)
        .attach(&mut response);
    response
}

fn post_error_response(err: PostError, post_id: PostId) -> Response {
    match err {
        PostError::NotFound(id) => not_found(format!("unknown post {id}")),
        // Non-authors are sent back to the post rather than shown an error.
        PostError::Forbidden { .. } => Redirect::to(&post_href(post_id)).into_response(),
        err => HttpError::from(err).into_response(),
    }
}

fn follow_error_response(err: FollowError) -> Response {
    match err {
        FollowError::UnknownAuthor(username) => not_found(format!("unknown author `{username}`")),
        err => HttpError::from(err).into_response(),
    }
}

fn not_found(detail: String) -> Response {
    let mut response = render_not_found_response();
    ErrorReport::from_message("infra::http::public::not_found", StatusCode::NOT_FOUND, detail)
        .attach(&mut response);
    response
}

fn validation_message(err: &DomainError) -> String {
    match err {
        DomainError::Validation { message } => message.clone(),
        other => other.to_string(),
    }
}

fn parse_post_id(raw: &str) -> Option<PostId> {
    raw.parse::<PostId>().ok().filter(|id| *id > 0)
}

fn post_href(post_id: PostId) -> String {
    format!("/posts/{post_id}/")
}

fn profile_href(username: &str) -> String {
    format!("/profile/{username}/")
}

fn post_title(text: &str) -> String {
    text.chars().take(30).collect()
}
