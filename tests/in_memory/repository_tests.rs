//! Repository contract tests against the in-memory adapter.

use super::helpers::{SteppingClock, clock, external_id, magnet_task, repo};
use camino::Utf8Path;
use eyre::ensure;
use rstest::rstest;
use steward::task::{
    adapters::memory::InMemoryTaskRepository,
    domain::{FilePlacement, TaskId, TaskStatus},
    ports::{TaskRepository, TaskRepositoryError},
};

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn storing_the_same_task_twice_is_rejected(
    repo: InMemoryTaskRepository,
    clock: SteppingClock,
) -> eyre::Result<()> {
    let task = magnet_task('a', &clock);
    repo.store(&task).await?;

    let result = repo.store(&task).await;

    ensure!(matches!(result, Err(TaskRepositoryError::DuplicateTask(id)) if id == task.id()));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn external_identifier_has_a_single_owner(
    repo: InMemoryTaskRepository,
    clock: SteppingClock,
) -> eyre::Result<()> {
    let mut owner = magnet_task('a', &clock);
    owner.bind_external_id(external_id('a'), &clock)?;
    repo.store(&owner).await?;
    let mut intruder = magnet_task('b', &clock);
    repo.store(&intruder).await?;
    intruder.bind_external_id(external_id('a'), &clock)?;

    let result = repo.update_from(&intruder, TaskStatus::Pending).await;

    ensure!(matches!(result, Err(TaskRepositoryError::DuplicateExternalId(_))));
    let found = repo.find_by_external_id(&external_id('a')).await?;
    assert_eq!(found.map(|task| task.id()), Some(owner.id()));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn conditional_update_detects_a_moved_status(
    repo: InMemoryTaskRepository,
    clock: SteppingClock,
) -> eyre::Result<()> {
    let mut task = magnet_task('a', &clock);
    repo.store(&task).await?;
    task.fail("client lost the entry", &clock)?;
    repo.update_from(&task, TaskStatus::Pending).await?;

    let result = repo.update_from(&task, TaskStatus::Pending).await;

    ensure!(matches!(
        result,
        Err(TaskRepositoryError::StatusConflict {
            expected: TaskStatus::Pending,
            actual: TaskStatus::Failed,
            ..
        })
    ));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn updating_an_unknown_task_is_not_found(
    repo: InMemoryTaskRepository,
    clock: SteppingClock,
) -> eyre::Result<()> {
    let task = magnet_task('a', &clock);

    let result = repo.update_from(&task, TaskStatus::Pending).await;

    ensure!(matches!(result, Err(TaskRepositoryError::NotFound(id)) if id == task.id()));
    ensure!(repo.find_by_id(TaskId::new()).await?.is_none());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn find_all_orders_by_creation(
    repo: InMemoryTaskRepository,
    clock: SteppingClock,
) -> eyre::Result<()> {
    let first = magnet_task('a', &clock);
    let second = magnet_task('b', &clock);
    let third = magnet_task('c', &clock);
    for task in [&third, &first, &second] {
        repo.store(task).await?;
    }

    let ids: Vec<TaskId> = repo
        .find_all()
        .await?
        .iter()
        .map(|task| task.id())
        .collect();

    assert_eq!(ids, vec![first.id(), second.id(), third.id()]);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn file_name_lookup_uses_recorded_placement(
    repo: InMemoryTaskRepository,
    clock: SteppingClock,
) -> eyre::Result<()> {
    let mut placed = magnet_task('a', &clock);
    placed.record_placement(
        FilePlacement::for_payload(
            "movie.mkv",
            Utf8Path::new("/downloads"),
            Utf8Path::new("/library"),
        ),
        &clock,
    );
    repo.store(&placed).await?;
    repo.store(&magnet_task('b', &clock)).await?;

    let found = repo.find_by_file_name("movie.mkv").await?;
    let missing = repo.find_by_file_name("other.mkv").await?;

    assert_eq!(found.map(|task| task.id()), Some(placed.id()));
    ensure!(missing.is_none());
    Ok(())
}
