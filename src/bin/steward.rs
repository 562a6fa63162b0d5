//! Runs the download steward with a console chat transport.
//!
//! Usage:
//!
//! ```text
//! steward [config-path]
//! ```
//!
//! The configuration path may also be given through `STEWARD_CONFIG`. Each
//! line read from stdin is one chat message:
//!
//! ```text
//! <requester-id> <conversation-id> <text>
//! ```
//!
//! A text of `@file <path>` sends the named file as a document attachment.
//! Replies are written to the log. The reconciliation loop and the file
//! organizer run until the process receives Ctrl-C.

use camino::{Utf8Path, Utf8PathBuf};
use mockable::DefaultClock;
use std::env;
use std::sync::Arc;
use steward::config::StewardConfig;
use steward::task::{
    adapters::{TracingNotifier, memory::InMemoryTaskRepository, qbittorrent::QbittorrentGateway},
    domain::{ConversationId, RequesterId},
    ports::{DownloadGateway, TaskRepository},
    services::{
        ChatIntake, FileOrganizer, HashResolver, InboundContent, InboundMessage,
        ReconciliationService, TaskEventHandler, TaskLifecycleService,
    },
};
use steward::telemetry;
use steward::worker::spawn_periodic;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

/// Boxed error type for the main result.
type BoxError = Box<dyn std::error::Error + Send + Sync>;

type ConsoleIntake<R> = ChatIntake<QbittorrentGateway, R, TracingNotifier, DefaultClock>;

const CONFIG_PATH_ENV: &str = "STEWARD_CONFIG";
const DOCUMENT_PREFIX: &str = "@file ";

/// Errors raised while parsing a console line.
#[derive(Debug, Error)]
enum ConsoleError {
    #[error("expected '<requester-id> <conversation-id> <text>'")]
    Malformed,
    #[error("invalid identifier '{0}'")]
    Identifier(String),
    #[error("failed to read {path}: {source}")]
    Document {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config_path = config_path()?;
    let config = StewardConfig::load(config_path.as_deref())?;
    telemetry::init_tracing(&config.log_filter)?;

    let gateway = Arc::new(QbittorrentGateway::new(config.gateway_settings())?);
    if let Err(err) = gateway.authenticate().await {
        tracing::warn!(error = %err, "initial download client login failed; will retry on demand");
    }

    #[cfg(feature = "postgres")]
    if let Some(database_url) = &config.store.database_url {
        let repository = Arc::new(postgres_repository(database_url)?);
        tracing::info!("tasks stored in PostgreSQL");
        return run(config, gateway, repository).await;
    }

    #[cfg(not(feature = "postgres"))]
    if config.store.database_url.is_some() {
        tracing::warn!("store.database_url ignored: built without the postgres feature");
    }

    tracing::info!("tasks stored in memory");
    run(config, gateway, Arc::new(InMemoryTaskRepository::new())).await
}

fn config_path() -> Result<Option<Utf8PathBuf>, BoxError> {
    let Some(raw) = env::args_os().nth(1).or_else(|| env::var_os(CONFIG_PATH_ENV)) else {
        return Ok(None);
    };
    let path = raw
        .into_string()
        .map_err(|_| "configuration path is not valid UTF-8")?;
    Ok(Some(Utf8PathBuf::from(path)))
}

#[cfg(feature = "postgres")]
fn postgres_repository(
    database_url: &str,
) -> Result<steward::task::adapters::postgres::PostgresTaskRepository, BoxError> {
    use diesel::r2d2::{ConnectionManager, Pool};
    use steward::task::adapters::postgres::{PostgresTaskRepository, TaskPgPool};

    let pool: TaskPgPool = Pool::builder().build(ConnectionManager::new(database_url))?;
    Ok(PostgresTaskRepository::new(pool))
}

async fn run<R>(
    config: StewardConfig,
    gateway: Arc<QbittorrentGateway>,
    repository: Arc<R>,
) -> Result<(), BoxError>
where
    R: TaskRepository + 'static,
{
    let lifecycle = TaskLifecycleService::new(
        Arc::clone(&repository),
        Arc::new(TracingNotifier),
        Arc::new(DefaultClock),
    )
    .with_placement_root(config.organizer.target_root.clone());
    let resolver = HashResolver::new(Arc::clone(&gateway), repository);
    let organizer = Arc::new(
        FileOrganizer::new(
            Arc::clone(&gateway),
            lifecycle.clone(),
            config.organizer.target_root.clone(),
        )
        .with_policy(config.large_file_policy()),
    );

    let mut reconciliation = ReconciliationService::new(Arc::clone(&gateway), lifecycle.clone());
    if let Some(expiry) = config.resolution_expiry() {
        reconciliation = reconciliation.with_resolution_expiry(expiry);
    }
    let reconciler = Arc::new(reconciliation);

    let events = TaskEventHandler::new(
        lifecycle,
        resolver,
        Arc::clone(&organizer),
        config.settle_delay(),
    );
    let intake = ChatIntake::new(gateway, events, config.intake_settings());

    let (stop, shutdown) = watch::channel(false);
    let jobs = [
        spawn_periodic(reconciler, config.reconciliation_period(), shutdown.clone()),
        spawn_periodic(organizer, config.organizer_period(), shutdown),
    ];
    let console = tokio::spawn(read_console(intake));

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    console.abort();
    stop.send(true)?;
    for job in jobs {
        job.await?;
    }
    Ok(())
}

async fn read_console<R>(intake: ConsoleIntake<R>)
where
    R: TaskRepository + 'static,
{
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => {}
            Ok(Some(line)) => match parse_line(&line).await {
                Ok(message) => {
                    let outcome = intake.handle(message).await;
                    tracing::debug!(?outcome, "console message handled");
                }
                Err(err) => tracing::warn!(error = %err, "console line ignored"),
            },
            Ok(None) => {
                tracing::info!("console input closed");
                break;
            }
            Err(err) => {
                tracing::error!(error = %err, "console read failed");
                break;
            }
        }
    }
}

async fn parse_line(line: &str) -> Result<InboundMessage, ConsoleError> {
    let mut parts = line.trim().splitn(3, ' ');
    let requester = parse_identifier(parts.next())?;
    let conversation = parse_identifier(parts.next())?;
    let text = parts.next().ok_or(ConsoleError::Malformed)?;

    let content = match text.strip_prefix(DOCUMENT_PREFIX) {
        Some(path) => read_document(Utf8Path::new(path.trim())).await?,
        None => InboundContent::Text(text.to_owned()),
    };
    Ok(InboundMessage {
        requester: RequesterId::new(requester),
        conversation: ConversationId::new(conversation),
        content,
    })
}

fn parse_identifier(part: Option<&str>) -> Result<i64, ConsoleError> {
    let raw = part.ok_or(ConsoleError::Malformed)?;
    raw.parse()
        .map_err(|_| ConsoleError::Identifier(raw.to_owned()))
}

async fn read_document(path: &Utf8Path) -> Result<InboundContent, ConsoleError> {
    let contents = tokio::fs::read(path)
        .await
        .map_err(|source| ConsoleError::Document {
            path: path.to_path_buf(),
            source,
        })?;
    let file_name = path.file_name().unwrap_or_else(|| path.as_str()).to_owned();
    Ok(InboundContent::Document {
        file_name,
        contents,
    })
}
