use std::{process, sync::Arc};

use tokio::{signal, task::JoinHandle};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use values_api::{
    application::{error::AppError, repos::ValuesRepo, values::ValuesService},
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, HttpState},
        redis::{RedisConnector, RedisInsertPublisher, RedisValuesCache},
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
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;
    telemetry::install_panic_hook();

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::InitDb(_) => run_init_db(settings).await,
    }
}

/// Store clients shared by every request, released on shutdown.
struct Stores {
    repositories: Arc<PostgresRepositories>,
    cache: Arc<RedisValuesCache>,
    publisher: Arc<RedisInsertPublisher>,
    redis_connects: Vec<JoinHandle<()>>,
}

impl Stores {
    async fn release(self, settings: &config::Settings) {
        let Stores {
            repositories,
            cache,
            publisher,
            redis_connects,
        } = self;
        for handle in redis_connects {
            handle.abort();
        }
        drop(cache);
        drop(publisher);

        if tokio::time::timeout(settings.server.graceful_shutdown, repositories.close())
            .await
            .is_err()
        {
            warn!(
                target = "values_api::shutdown",
                "database pool did not close within the graceful shutdown window"
            );
        }
        info!(target = "values_api::shutdown", "store connections released");
    }
}

fn init_repositories(settings: &config::Settings) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresRepositories::connect_lazy(database_url, &settings.database)
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

async fn init_stores(settings: &config::Settings) -> Result<Stores, AppError> {
    let repositories = init_repositories(settings)?;

    // A missing table surfaces on the first query; startup continues.
    if let Err(err) = repositories.init().await {
        warn!(
            target = "values_api::startup",
            error = %err,
            "values table bootstrap failed, continuing"
        );
    }

    // Only an unparsable URL is fatal; an unreachable server is retried in the
    // background while requests are served.
    let connector = RedisConnector::new(&settings.redis)
        .map_err(|err| AppError::from(InfraError::cache(err.to_string())))?;
    let (cache_link, cache_connect) = connector.spawn_link("cache");
    let (publisher_link, publisher_connect) = connector.spawn_link("publisher");

    Ok(Stores {
        repositories,
        cache: Arc::new(RedisValuesCache::new(
            cache_link,
            settings.redis.hash_key.clone(),
        )),
        publisher: Arc::new(RedisInsertPublisher::new(publisher_link)),
        redis_connects: vec![cache_connect, publisher_connect],
    })
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let stores = init_stores(&settings).await?;

    let values = Arc::new(ValuesService::new(
        stores.repositories.clone(),
        stores.cache.clone(),
        stores.publisher.clone(),
        settings.values_policy(),
    ));
    let router = http::build_router(HttpState { values });

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "values_api::serve",
        addr = %settings.server.addr,
        "Listening"
    );

    let result = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")));

    stores.release(&settings).await;
    result
}

async fn run_init_db(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings)?;
    let result = repositories
        .init()
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())));
    repositories.close().await;
    result
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!(target = "values_api::shutdown", "shutdown signal received");
}
