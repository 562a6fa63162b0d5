//! End-to-end download flow over the in-memory adapters.

use super::helpers::{CONVERSATION, REQUESTER, external_id, hash, magnet_text, utf8_dir};
use eyre::ensure;
use mockable::DefaultClock;
use rstest::{fixture, rstest};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use steward::task::{
    adapters::memory::{InMemoryDownloadGateway, InMemoryNotifier, InMemoryTaskRepository},
    domain::{EntryState, ExternalEntry, TaskStatus},
    services::{
        ChatIntake, FileOrganizer, HashResolver, InboundMessage, IntakeOutcome, IntakeSettings,
        LargeFilePolicy, ReconciliationService, TaskEventHandler, TaskLifecycleService, messages,
    },
};
use tempfile::TempDir;

type Lifecycle = TaskLifecycleService<InMemoryTaskRepository, InMemoryNotifier, DefaultClock>;
type Intake =
    ChatIntake<InMemoryDownloadGateway, InMemoryTaskRepository, InMemoryNotifier, DefaultClock>;
type Reconciler = ReconciliationService<
    InMemoryDownloadGateway,
    InMemoryTaskRepository,
    InMemoryNotifier,
    DefaultClock,
>;

struct Stack {
    gateway: Arc<InMemoryDownloadGateway>,
    notifier: Arc<InMemoryNotifier>,
    lifecycle: Lifecycle,
    intake: Intake,
    reconciler: Reconciler,
    download_dir: TempDir,
    library_dir: TempDir,
}

impl Stack {
    fn sent_texts(&self) -> Vec<String> {
        self.notifier
            .sent()
            .expect("notifier outbox")
            .into_iter()
            .map(|message| message.text)
            .collect()
    }
}

#[fixture]
fn stack() -> Stack {
    let download_dir = TempDir::new().expect("download directory");
    let library_dir = TempDir::new().expect("library directory");
    let library_root = utf8_dir(&library_dir);

    let repository = Arc::new(InMemoryTaskRepository::new());
    let gateway = Arc::new(InMemoryDownloadGateway::new());
    let notifier = Arc::new(InMemoryNotifier::new());
    let lifecycle = TaskLifecycleService::new(
        Arc::clone(&repository),
        Arc::clone(&notifier),
        Arc::new(DefaultClock),
    )
    .with_placement_root(library_root.as_str());

    let resolver = HashResolver::new(Arc::clone(&gateway), Arc::clone(&repository));
    let organizer = Arc::new(
        FileOrganizer::new(Arc::clone(&gateway), lifecycle.clone(), library_root)
            .with_policy(LargeFilePolicy::new(1)),
    );
    let events = TaskEventHandler::new(lifecycle.clone(), resolver, organizer, Duration::ZERO);
    let intake = ChatIntake::new(
        Arc::clone(&gateway),
        events,
        IntakeSettings {
            allowed_requesters: HashSet::from([REQUESTER]),
            ..IntakeSettings::default()
        },
    );
    let reconciler = ReconciliationService::new(Arc::clone(&gateway), lifecycle.clone());

    Stack {
        gateway,
        notifier,
        lifecycle,
        intake,
        reconciler,
        download_dir,
        library_dir,
    }
}

async fn submit(stack: &Stack, text: &str) -> eyre::Result<()> {
    let outcome = stack
        .intake
        .handle(InboundMessage::text(REQUESTER, CONVERSATION, text))
        .await;
    match outcome {
        IntakeOutcome::Submitted(Some(resolution)) => {
            resolution.await?;
            Ok(())
        }
        other => Err(eyre::eyre!("expected a submission, got {other:?}")),
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn magnet_request_is_tracked_to_a_copied_file(stack: Stack) -> eyre::Result<()> {
    let download_root = utf8_dir(&stack.download_dir);
    let library_root = utf8_dir(&stack.library_dir);
    std::fs::write(download_root.join("movie.mkv"), b"feature film")?;
    stack.gateway.upsert_entry(
        ExternalEntry::new(
            external_id('a'),
            "movie.mkv",
            EntryState::Downloading,
            chrono::Utc::now(),
        )
        .with_save_path(download_root.as_str()),
    )?;

    submit(&stack, &magnet_text('a')).await?;
    stack.reconciler.run_pass().await?;
    stack.gateway.set_state(&external_id('a'), EntryState::StalledUploading)?;
    let report = stack.reconciler.run_pass().await?;

    assert_eq!(report.completed, 1);
    let notice = stack
        .sent_texts()
        .into_iter()
        .find(|text| text.contains(messages::COMPLETION_MARKER))
        .ok_or_else(|| eyre::eyre!("completion notice should be sent"))?;
    ensure!(notice.contains("File: movie.mkv"));

    let forwarded = stack
        .intake
        .handle(InboundMessage::text(REQUESTER, CONVERSATION, notice))
        .await;

    ensure!(matches!(forwarded, IntakeOutcome::CompletionForwarded));
    ensure!(library_root.join("movie.mkv").is_file());
    let task = stack
        .lifecycle
        .find_by_external_id(&external_id('a'))
        .await?
        .ok_or_else(|| eyre::eyre!("task should be bound"))?;
    assert_eq!(task.status(), TaskStatus::Completed);
    ensure!(stack.sent_texts().contains(&"File copied: movie.mkv".to_owned()));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn two_requests_bind_to_distinct_entries(stack: Stack) -> eyre::Result<()> {
    let now = chrono::Utc::now();
    for seed in ['a', 'b'] {
        stack.gateway.upsert_entry(ExternalEntry::new(
            external_id(seed),
            format!("payload-{seed}"),
            EntryState::MetaDownloading,
            now,
        ))?;
    }

    submit(&stack, &magnet_text('b')).await?;
    submit(&stack, &magnet_text('a')).await?;

    let tasks = stack.lifecycle.list_tasks().await?;
    let bound: HashSet<String> = tasks
        .iter()
        .filter_map(|task| task.external_id().map(|id| id.as_str().to_owned()))
        .collect();
    assert_eq!(bound, HashSet::from([hash('a'), hash('b')]));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn client_side_error_fails_the_task_without_notice(stack: Stack) -> eyre::Result<()> {
    stack.gateway.upsert_entry(ExternalEntry::new(
        external_id('c'),
        "broken.iso",
        EntryState::Downloading,
        chrono::Utc::now(),
    ))?;
    submit(&stack, &magnet_text('c')).await?;
    stack.gateway.set_state(&external_id('c'), EntryState::MissingFiles)?;

    let report = stack.reconciler.run_pass().await?;

    assert_eq!(report.failed, 1);
    let task = stack
        .lifecycle
        .find_by_external_id(&external_id('c'))
        .await?
        .ok_or_else(|| eyre::eyre!("task should be bound"))?;
    assert_eq!(task.status(), TaskStatus::Failed);
    ensure!(
        !stack
            .sent_texts()
            .iter()
            .any(|text| text.contains(messages::COMPLETION_MARKER))
    );
    Ok(())
}
