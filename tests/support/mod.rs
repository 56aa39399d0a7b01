#![allow(dead_code)]

use std::{
    collections::BTreeSet,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use time::{OffsetDateTime, macros::datetime};
use tower::ServiceExt;
use yatube::{
    application::{
        feed::FeedService,
        follow::FollowService,
        posts::PostService,
        profile::ProfileService,
        repos::{
            CommentsRepo, CreateCommentParams, CreateGroupParams, CreatePostParams, FollowsRepo,
            GroupsRepo, GroupsWriteRepo, HealthRepo, PostFilter, PostQuery, PostsRepo,
            PostsWriteRepo, RepoError, UpdatePostParams, UsersRepo, UsersWriteRepo,
        },
    },
    cache::{CacheConfig, ManualClock, PageCache, PageCacheState, TtlPageCache},
    config::AuthSettings,
    domain::entities::{
        CommentRecord, FollowEdge, GroupId, GroupRecord, GroupRef, PostId, PostRecord, UserId,
        UserRecord,
    },
    infra::http::{AuthState, HttpState, build_router},
};

pub const USER_HEADER: &str = "x-remote-user";
pub const LOGIN_URL: &str = "/auth/login/";

const EPOCH: OffsetDateTime = datetime!(2024-01-01 00:00 UTC);

#[derive(Debug, Clone)]
struct StoredPost {
    id: PostId,
    text: String,
    created_at: OffsetDateTime,
    author_id: UserId,
    group_id: Option<GroupId>,
    image: Option<String>,
}

#[derive(Default)]
struct Tables {
    next_id: i64,
    users: Vec<UserRecord>,
    groups: Vec<GroupRecord>,
    posts: Vec<StoredPost>,
    comments: Vec<CommentRecord>,
    follows: BTreeSet<(UserId, UserId)>,
}

impl Tables {
    /// Ids double as a clock: every insert happens one minute after the last.
    fn allocate(&mut self) -> (i64, OffsetDateTime) {
        self.next_id += 1;
        (
            self.next_id,
            EPOCH + time::Duration::minutes(self.next_id),
        )
    }

    fn hydrate(&self, post: &StoredPost) -> PostRecord {
        let author_username = self
            .users
            .iter()
            .find(|user| user.id == post.author_id)
            .map(|user| user.username.clone())
            .unwrap_or_default();
        let group = post.group_id.and_then(|group_id| {
            self.groups
                .iter()
                .find(|group| group.id == group_id)
                .map(|group| GroupRef {
                    id: group.id,
                    slug: group.slug.clone(),
                    title: group.title.clone(),
                })
        });
        PostRecord {
            id: post.id,
            text: post.text.clone(),
            created_at: post.created_at,
            author_id: post.author_id,
            author_username,
            group,
            image: post.image.clone(),
        }
    }

    fn matching(&self, filter: &PostFilter) -> Vec<&StoredPost> {
        let mut posts: Vec<&StoredPost> = self
            .posts
            .iter()
            .filter(|post| match filter {
                PostFilter::All => true,
                PostFilter::Group(group_id) => post.group_id == Some(*group_id),
                PostFilter::Author(author_id) => post.author_id == *author_id,
                PostFilter::Authors(authors) => authors.contains(&post.author_id),
            })
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        posts
    }
}

/// In-memory stand-in for every repository trait.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_user(&self, username: &str) -> UserRecord {
        let mut tables = self.tables();
        let (id, created_at) = tables.allocate();
        let user = UserRecord {
            id,
            username: username.to_string(),
            created_at,
        };
        tables.users.push(user.clone());
        user
    }

    pub fn add_group(&self, title: &str, slug: &str) -> GroupRecord {
        let mut tables = self.tables();
        let (id, _) = tables.allocate();
        let group = GroupRecord {
            id,
            title: title.to_string(),
            slug: slug.to_string(),
            description: format!("About {title}"),
        };
        tables.groups.push(group.clone());
        group
    }

    pub fn add_post(&self, author: &UserRecord, text: &str) -> PostRecord {
        self.add_post_in_group(author, text, None)
    }

    pub fn add_post_in_group(
        &self,
        author: &UserRecord,
        text: &str,
        group: Option<&GroupRecord>,
    ) -> PostRecord {
        let mut tables = self.tables();
        let (id, created_at) = tables.allocate();
        let stored = StoredPost {
            id,
            text: text.to_string(),
            created_at,
            author_id: author.id,
            group_id: group.map(|group| group.id),
            image: None,
        };
        tables.posts.push(stored.clone());
        tables.hydrate(&stored)
    }

    pub fn remove_post(&self, post_id: PostId) {
        let mut tables = self.tables();
        tables.posts.retain(|post| post.id != post_id);
        tables.comments.retain(|comment| comment.post_id != post_id);
    }

    pub fn post(&self, post_id: PostId) -> Option<PostRecord> {
        let tables = self.tables();
        tables
            .posts
            .iter()
            .find(|post| post.id == post_id)
            .map(|post| tables.hydrate(post))
    }

    pub fn post_count(&self) -> usize {
        self.tables().posts.len()
    }

    pub fn follow_edges(&self) -> Vec<(UserId, UserId)> {
        self.tables().follows.iter().copied().collect()
    }

    pub fn comments_for(&self, post_id: PostId) -> Vec<CommentRecord> {
        self.tables()
            .comments
            .iter()
            .filter(|comment| comment.post_id == post_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl UsersRepo for MemoryStore {
    async fn find_by_id(&self, id: UserId) -> Result<Option<UserRecord>, RepoError> {
        Ok(self.tables().users.iter().find(|user| user.id == id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, RepoError> {
        Ok(self
            .tables()
            .users
            .iter()
            .find(|user| user.username == username)
            .cloned())
    }
}

#[async_trait]
impl UsersWriteRepo for MemoryStore {
    async fn create_user(&self, username: &str) -> Result<UserRecord, RepoError> {
        if self.tables().users.iter().any(|user| user.username == username) {
            return Err(RepoError::Duplicate {
                constraint: "users_username_key".to_string(),
            });
        }
        Ok(self.add_user(username))
    }
}

#[async_trait]
impl GroupsRepo for MemoryStore {
    async fn list_all(&self) -> Result<Vec<GroupRecord>, RepoError> {
        let mut groups = self.tables().groups.clone();
        groups.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(groups)
    }

    async fn find_by_id(&self, id: GroupId) -> Result<Option<GroupRecord>, RepoError> {
        Ok(self.tables().groups.iter().find(|group| group.id == id).cloned())
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError> {
        Ok(self
            .tables()
            .groups
            .iter()
            .find(|group| group.slug == slug)
            .cloned())
    }
}

#[async_trait]
impl GroupsWriteRepo for MemoryStore {
    async fn create_group(&self, params: CreateGroupParams) -> Result<GroupRecord, RepoError> {
        let mut group = self.add_group(&params.title, &params.slug);
        group.description = params.description.clone();
        let mut tables = self.tables();
        if let Some(stored) = tables.groups.iter_mut().find(|stored| stored.id == group.id) {
            stored.description = params.description;
        }
        Ok(group)
    }
}

#[async_trait]
impl PostsRepo for MemoryStore {
    async fn list_posts(&self, query: &PostQuery) -> Result<Vec<PostRecord>, RepoError> {
        let tables = self.tables();
        Ok(tables
            .matching(&query.filter)
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .map(|post| tables.hydrate(post))
            .collect())
    }

    async fn count_posts(&self, filter: &PostFilter) -> Result<u64, RepoError> {
        Ok(self.tables().matching(filter).len() as u64)
    }

    async fn find_by_id(&self, id: PostId) -> Result<Option<PostRecord>, RepoError> {
        Ok(self.post(id))
    }
}

#[async_trait]
impl PostsWriteRepo for MemoryStore {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let mut tables = self.tables();
        let (id, created_at) = tables.allocate();
        let stored = StoredPost {
            id,
            text: params.text,
            created_at,
            author_id: params.author_id,
            group_id: params.group_id,
            image: params.image,
        };
        tables.posts.push(stored.clone());
        Ok(tables.hydrate(&stored))
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let mut tables = self.tables();
        let stored = tables
            .posts
            .iter_mut()
            .find(|post| post.id == params.id)
            .ok_or(RepoError::NotFound)?;
        stored.text = params.text;
        stored.group_id = params.group_id;
        stored.image = params.image;
        let stored = stored.clone();
        Ok(tables.hydrate(&stored))
    }

    async fn delete_post(&self, id: PostId) -> Result<(), RepoError> {
        self.remove_post(id);
        Ok(())
    }
}

#[async_trait]
impl CommentsRepo for MemoryStore {
    async fn list_for_post(&self, post_id: PostId) -> Result<Vec<CommentRecord>, RepoError> {
        Ok(self.comments_for(post_id))
    }

    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let mut tables = self.tables();
        let author_username = tables
            .users
            .iter()
            .find(|user| user.id == params.author_id)
            .map(|user| user.username.clone())
            .ok_or(RepoError::NotFound)?;
        let (id, created_at) = tables.allocate();
        let comment = CommentRecord {
            id,
            post_id: params.post_id,
            author_id: params.author_id,
            author_username,
            text: params.text,
            created_at,
        };
        tables.comments.push(comment.clone());
        Ok(comment)
    }
}

#[async_trait]
impl FollowsRepo for MemoryStore {
    async fn exists(&self, edge: FollowEdge) -> Result<bool, RepoError> {
        Ok(self
            .tables()
            .follows
            .contains(&(edge.user_id, edge.author_id)))
    }

    async fn insert(&self, edge: FollowEdge) -> Result<bool, RepoError> {
        if edge.user_id == edge.author_id {
            return Err(RepoError::Integrity {
                message: "follows_no_self_follow".to_string(),
            });
        }
        Ok(self.tables().follows.insert((edge.user_id, edge.author_id)))
    }

    async fn delete(&self, edge: FollowEdge) -> Result<bool, RepoError> {
        Ok(self
            .tables()
            .follows
            .remove(&(edge.user_id, edge.author_id)))
    }

    async fn list_author_ids(&self, user_id: UserId) -> Result<BTreeSet<UserId>, RepoError> {
        Ok(self
            .tables()
            .follows
            .iter()
            .filter(|(follower, _)| *follower == user_id)
            .map(|(_, author)| *author)
            .collect())
    }
}

#[async_trait]
impl HealthRepo for MemoryStore {
    async fn ping(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl Reply {
    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
    }
}

/// A fully wired router over a [`MemoryStore`], with a hand-driven cache clock.
pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub cache: Arc<TtlPageCache<Arc<ManualClock>>>,
    pub clock: Arc<ManualClock>,
    pub feed: FeedService,
    pub follows: FollowService,
    pub posts: PostService,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_page_size(10)
    }

    pub fn with_page_size(page_size: u32) -> Self {
        let store = Arc::new(MemoryStore::default());
        let clock = Arc::new(ManualClock::new());
        let cache_config = CacheConfig::default();
        let cache = Arc::new(TtlPageCache::with_clock(&cache_config, clock.clone()));
        let page_cache: Arc<dyn PageCache> = cache.clone();

        let feed = FeedService::new(store.clone(), store.clone(), store.clone(), page_size);
        let follows = FollowService::new(store.clone(), store.clone(), page_cache.clone());
        let profiles = ProfileService::new(store.clone(), feed.clone(), follows.clone());
        let posts = PostService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            page_cache.clone(),
        );

        let auth = AuthSettings {
            user_header: header::HeaderName::from_static(USER_HEADER),
            login_url: LOGIN_URL.to_string(),
        };
        let state = HttpState {
            feed: Arc::new(feed.clone()),
            follows: Arc::new(follows.clone()),
            profiles: Arc::new(profiles),
            posts: Arc::new(posts.clone()),
            health: store.clone(),
            auth: AuthState::new(store.clone(), &auth),
            cache: Some(PageCacheState {
                cache: page_cache,
                ttl: cache_config.index_ttl,
            }),
        };

        Self {
            router: build_router(state),
            store,
            cache,
            clock,
            feed,
            follows,
            posts,
        }
    }

    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }

    pub async fn get(&self, uri: &str, user: Option<&str>) -> Reply {
        self.send(Method::GET, uri, user, None).await
    }

    pub async fn post_form(&self, uri: &str, user: Option<&str>, form: &str) -> Reply {
        self.send(Method::POST, uri, user, Some(form)).await
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        user: Option<&str>,
        form: Option<&str>,
    ) -> Reply {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(USER_HEADER, user);
        }
        let body = match form {
            Some(form) => {
                builder = builder.header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
                Body::from(form.to_string())
            }
            None => Body::empty(),
        };
        let request = builder.body(body).expect("request should build");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router should respond");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body should be readable")
            .to_bytes();

        Reply {
            status,
            headers,
            body: String::from_utf8(bytes.to_vec()).expect("body should be utf-8"),
        }
    }
}
