//! Viewer identity supplied by the authenticating proxy.
//!
//! The proxy names the signed-in user in a trusted request header. Unknown or
//! malformed names are treated as anonymous.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, Request},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::{debug, warn};
use url::form_urlencoded;

use crate::{
    application::repos::UsersRepo,
    config::AuthSettings,
    domain::entities::UserRecord,
};

#[derive(Clone)]
pub struct AuthState {
    pub users: Arc<dyn UsersRepo>,
    pub user_header: HeaderName,
    pub login_url: String,
}

impl AuthState {
    pub fn new(users: Arc<dyn UsersRepo>, settings: &AuthSettings) -> Self {
        Self {
            users,
            user_header: settings.user_header.clone(),
            login_url: settings.login_url.clone(),
        }
    }

    /// Login location that returns to `next` once the user has signed in.
    pub fn login_redirect(&self, next: &str) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("next", next)
            .finish();
        format!("{}?{query}", self.login_url)
    }
}

/// Request extension: the resolved viewer, if any.
#[derive(Clone, Debug, Default)]
pub struct Viewer(pub Option<UserRecord>);

impl Viewer {
    pub fn user(&self) -> Option<&UserRecord> {
        self.0.as_ref()
    }
}

/// Request extension present only on routes behind [`require_user`].
#[derive(Clone, Debug)]
pub struct AuthenticatedUser(pub UserRecord);

pub async fn resolve_viewer(
    State(state): State<AuthState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let username = request
        .headers()
        .get(&state.user_header)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);

    let viewer = match username {
        Some(username) => match state.users.find_by_username(&username).await {
            Ok(Some(user)) => Some(user),
            Ok(None) => {
                debug!(username = %username, "header names an unknown user");
                None
            }
            Err(err) => {
                warn!(
                    target = "yatube::http::auth",
                    username = %username,
                    error = %err,
                    "viewer lookup failed; continuing as anonymous"
                );
                None
            }
        },
        None => None,
    };

    request.extensions_mut().insert(Viewer(viewer));
    next.run(request).await
}

pub async fn require_user(
    State(state): State<AuthState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let user = request
        .extensions()
        .get::<Viewer>()
        .and_then(|viewer| viewer.0.clone());

    match user {
        Some(user) => {
            request.extensions_mut().insert(AuthenticatedUser(user));
            next.run(request).await
        }
        None => {
            let next_path = request
                .uri()
                .path_and_query()
                .map(|value| value.as_str())
                .unwrap_or("/");
            debug!(path = %next_path, "anonymous request redirected to login");
            Redirect::to(&state.login_redirect(next_path)).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::application::repos::RepoError;

    struct NoUsers;

    #[async_trait]
    impl UsersRepo for NoUsers {
        async fn find_by_id(&self, _id: i64) -> Result<Option<UserRecord>, RepoError> {
            Ok(None)
        }

        async fn find_by_username(&self, _username: &str) -> Result<Option<UserRecord>, RepoError> {
            Ok(None)
        }
    }

    #[test]
    fn login_redirect_carries_the_return_path() {
        let state = AuthState {
            users: Arc::new(NoUsers),
            user_header: HeaderName::from_static("x-remote-user"),
            login_url: "/auth/login/".to_string(),
        };

        assert_eq!(
            state.login_redirect("/follow/?page=2"),
            "/auth/login/?next=%2Ffollow%2F%3Fpage%3D2"
        );
    }
}
