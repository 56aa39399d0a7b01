use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    application::{
        directory::DirectoryError, feed::FeedError, follow::FollowError, posts::PostError,
        profile::ProfileError, repos::RepoError,
    },
    domain::error::DomainError,
    infra::error::InfraError,
};

/// Diagnostic attached to error responses and logged by the response middleware.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: &'static str,
    report: ErrorReport,
}

impl HttpError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        let report = ErrorReport::from_message(source, status, detail);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        error: &dyn StdError,
    ) -> Self {
        let report = ErrorReport::from_error(source, status, error);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.public_message).into_response();
        self.report.attach(&mut response);
        response
    }
}

const SERVICE_ERROR_SOURCE: &str = "infra::http::service_error_to_http_error";

fn internal(error: &dyn StdError) -> HttpError {
    HttpError::from_error(
        SERVICE_ERROR_SOURCE,
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error",
        error,
    )
}

impl From<FeedError> for HttpError {
    fn from(error: FeedError) -> Self {
        match error {
            FeedError::UnknownGroup(slug) => HttpError::new(
                SERVICE_ERROR_SOURCE,
                StatusCode::NOT_FOUND,
                "Unknown group",
                format!("Group `{slug}` does not exist"),
            ),
            FeedError::Repo(err) => internal(&err),
        }
    }
}

impl From<FollowError> for HttpError {
    fn from(error: FollowError) -> Self {
        match error {
            FollowError::UnknownAuthor(username) => HttpError::new(
                SERVICE_ERROR_SOURCE,
                StatusCode::NOT_FOUND,
                "Unknown author",
                format!("User `{username}` does not exist"),
            ),
            FollowError::Repo(err) => internal(&err),
        }
    }
}

impl From<ProfileError> for HttpError {
    fn from(error: ProfileError) -> Self {
        match error {
            ProfileError::UnknownUser(username) => HttpError::new(
                SERVICE_ERROR_SOURCE,
                StatusCode::NOT_FOUND,
                "Unknown user",
                format!("User `{username}` does not exist"),
            ),
            ProfileError::Feed(err) => err.into(),
            ProfileError::Repo(err) => internal(&err),
        }
    }
}

impl From<PostError> for HttpError {
    fn from(error: PostError) -> Self {
        match error {
            PostError::NotFound(id) => HttpError::new(
                SERVICE_ERROR_SOURCE,
                StatusCode::NOT_FOUND,
                "Post not found",
                format!("Post {id} does not exist"),
            ),
            PostError::Forbidden { post_id, username } => HttpError::new(
                SERVICE_ERROR_SOURCE,
                StatusCode::FORBIDDEN,
                "Forbidden",
                format!("`{username}` is not the author of post {post_id}"),
            ),
            PostError::Domain(err) => HttpError::from_error(
                SERVICE_ERROR_SOURCE,
                StatusCode::UNPROCESSABLE_ENTITY,
                "Invalid input",
                &err,
            ),
            PostError::Repo(err) => internal(&err),
        }
    }
}

/// Errors surfaced by start-up and command-line paths.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("resource not found")]
    NotFound,
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Domain(DomainError::NotFound { .. })
            | AppError::Repo(RepoError::NotFound)
            | AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Domain(DomainError::Validation { .. }) | AppError::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Repo(RepoError::Duplicate { .. }) => StatusCode::CONFLICT,
            AppError::Repo(_) | AppError::Infra(InfraError::Database { .. }) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::Infra(_) | AppError::Domain(DomainError::Invariant { .. }) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn presentation_message(&self) -> &'static str {
        match self {
            AppError::Domain(DomainError::NotFound { .. })
            | AppError::Repo(RepoError::NotFound)
            | AppError::NotFound => "Resource not found",
            AppError::Domain(DomainError::Validation { .. }) | AppError::Validation(_) => {
                "Request could not be processed"
            }
            AppError::Repo(RepoError::Duplicate { .. }) => "Resource already exists",
            AppError::Repo(_) | AppError::Infra(InfraError::Database { .. }) => {
                "Service temporarily unavailable"
            }
            AppError::Infra(InfraError::Configuration { .. }) => "Service misconfigured",
            AppError::Infra(InfraError::Telemetry(_)) => "Logging subsystem could not start",
            AppError::Infra(InfraError::Io(_)) => "I/O failure during request",
            AppError::Domain(DomainError::Invariant { .. }) | AppError::Unexpected(_) => {
                "Unexpected error occurred"
            }
        }
    }
}

impl From<DirectoryError> for AppError {
    fn from(error: DirectoryError) -> Self {
        match error {
            DirectoryError::Repo(err) => AppError::Repo(err),
            other => AppError::validation(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.presentation_message();
        let report = ErrorReport::from_error("application::error::AppError", status, &self);
        let mut response = (status, message).into_response();
        report.attach(&mut response);
        response
    }
}
