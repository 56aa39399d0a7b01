use std::{future::IntoFuture, process, sync::Arc};

use tokio::{net::TcpListener, signal::ctrl_c, sync::Notify};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use yatube::{
    application::{
        directory::DirectoryService, error::AppError, feed::FeedService, follow::FollowService,
        posts::PostService, profile::ProfileService,
    },
    cache::{CacheConfig, NoopPageCache, PageCache, PageCacheState, TtlPageCache},
    config::{self, Settings},
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, AuthState, HttpState},
        telemetry,
    },
};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
        config::Command::Users(args) => match args.command {
            config::UsersCommand::Create(create) => run_create_user(settings, create).await,
        },
        config::Command::Groups(args) => match args.command {
            config::GroupsCommand::Create(create) => run_create_group(settings, create).await,
        },
    }
}

async fn run_serve(settings: Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let state = build_http_state(repositories, &settings);
    serve_http(&settings, state).await
}

async fn run_migrate(settings: Settings) -> Result<(), AppError> {
    // Migrations run as part of connecting.
    init_repositories(&settings).await?;
    info!(target = "yatube::migrate", "database schema is up to date");
    Ok(())
}

async fn run_create_user(
    settings: Settings,
    args: config::CreateUserArgs,
) -> Result<(), AppError> {
    let directory = build_directory(init_repositories(&settings).await?);
    let user = directory.register_user(&args.username).await?;
    info!(
        target = "yatube::users",
        user_id = user.id,
        username = %user.username,
        "user created"
    );
    Ok(())
}

async fn run_create_group(
    settings: Settings,
    args: config::CreateGroupArgs,
) -> Result<(), AppError> {
    let directory = build_directory(init_repositories(&settings).await?);
    let group = directory
        .create_group(&args.title, &args.description)
        .await?;
    info!(
        target = "yatube::groups",
        group_id = group.id,
        slug = %group.slug,
        "group created"
    );
    Ok(())
}

async fn init_repositories(settings: &Settings) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn build_directory(repositories: Arc<PostgresRepositories>) -> DirectoryService {
    DirectoryService::new(
        repositories.clone(),
        repositories.clone(),
        repositories.clone(),
        repositories,
    )
}

fn build_http_state(repositories: Arc<PostgresRepositories>, settings: &Settings) -> HttpState {
    let cache_config = CacheConfig::from(&settings.cache);
    let page_cache: Arc<dyn PageCache> = if cache_config.enabled {
        Arc::new(TtlPageCache::new(&cache_config))
    } else {
        Arc::new(NoopPageCache)
    };

    let feed = FeedService::new(
        repositories.clone(),
        repositories.clone(),
        repositories.clone(),
        settings.pagination.page_size.get(),
    );
    let follows = FollowService::new(
        repositories.clone(),
        repositories.clone(),
        page_cache.clone(),
    );
    let profiles = ProfileService::new(repositories.clone(), feed.clone(), follows.clone());
    let posts = PostService::new(
        repositories.clone(),
        repositories.clone(),
        repositories.clone(),
        repositories.clone(),
        page_cache.clone(),
    );

    let cache = cache_config.enabled.then(|| PageCacheState {
        cache: page_cache,
        ttl: cache_config.index_ttl,
    });

    HttpState {
        feed: Arc::new(feed),
        follows: Arc::new(follows),
        profiles: Arc::new(profiles),
        posts: Arc::new(posts),
        health: repositories.clone(),
        auth: AuthState::new(repositories, &settings.auth),
        cache,
    }
}

async fn serve_http(settings: &Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);
    let listener = TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(target = "yatube::serve", addr = %settings.server.addr, "listening");

    let signalled = Arc::new(Notify::new());
    let server = axum::serve(listener, router.into_make_service()).with_graceful_shutdown({
        let signalled = signalled.clone();
        async move {
            shutdown_signal().await;
            signalled.notify_one();
        }
    });

    let grace = settings.server.graceful_shutdown;
    tokio::select! {
        result = server.into_future() => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))
        }
        _ = async {
            signalled.notified().await;
            tokio::time::sleep(grace).await;
        } => {
            warn!(
                target = "yatube::serve",
                grace_seconds = grace.as_secs(),
                "graceful shutdown timed out; dropping open connections"
            );
            Ok(())
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = ctrl_c().await {
            error!(target = "yatube::serve", error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(target = "yatube::serve", error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!(target = "yatube::serve", "shutdown signal received; draining connections");
}
