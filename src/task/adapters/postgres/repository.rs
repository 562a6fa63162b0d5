//! `PostgreSQL` repository implementation for task storage.

use super::{
    models::{NewTaskRow, TaskChangeset, TaskRow},
    schema::tasks,
};
use crate::task::{
    domain::{
        ConversationId, ExternalId, FilePlacement, PersistedTaskData, RequesterId, Task, TaskId,
        TaskOrigin, TaskStatus, TransferStats,
    },
    ports::{TaskRepository, TaskRepositoryError, TaskRepositoryResult},
};
use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorInformation, DatabaseErrorKind, Error as DieselError};

/// `PostgreSQL` connection pool type used by task adapters.
pub type TaskPgPool = Pool<ConnectionManager<PgConnection>>;

/// `PostgreSQL`-backed task repository.
#[derive(Debug, Clone)]
pub struct PostgresTaskRepository {
    pool: TaskPgPool,
}

impl PostgresTaskRepository {
    /// Creates a new repository from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: TaskPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> TaskRepositoryResult<T>
    where
        F: FnOnce(&mut PgConnection) -> TaskRepositoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(TaskRepositoryError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(TaskRepositoryError::persistence)?
    }
}

#[async_trait]
impl TaskRepository for PostgresTaskRepository {
    async fn store(&self, task: &Task) -> TaskRepositoryResult<()> {
        let task_id = task.id();
        let external_id = task.external_id().cloned();
        let new_row = to_new_row(task)?;

        self.run_blocking(move |connection| {
            diesel::insert_into(tasks::table)
                .values(&new_row)
                .execute(connection)
                .map_err(|err| map_write_error(err, task_id, external_id.as_ref()))?;
            Ok(())
        })
        .await
    }

    async fn update_from(&self, task: &Task, expected: TaskStatus) -> TaskRepositoryResult<()> {
        let task_id = task.id();
        let external_id = task.external_id().cloned();
        let changeset = to_changeset(task)?;
        let expected_status = expected.as_str();

        self.run_blocking(move |connection| {
            let updated_count = diesel::update(
                tasks::table
                    .filter(tasks::id.eq(task_id.into_inner()))
                    .filter(tasks::status.eq(expected_status)),
            )
            .set(&changeset)
            .execute(connection)
            .map_err(|err| map_write_error(err, task_id, external_id.as_ref()))?;

            if updated_count > 0 {
                return Ok(());
            }

            let stored_status = tasks::table
                .filter(tasks::id.eq(task_id.into_inner()))
                .select(tasks::status)
                .first::<String>(connection)
                .optional()
                .map_err(TaskRepositoryError::persistence)?;
            let Some(stored) = stored_status else {
                return Err(TaskRepositoryError::NotFound(task_id));
            };
            let actual =
                TaskStatus::try_from(stored.as_str()).map_err(TaskRepositoryError::persistence)?;
            Err(TaskRepositoryError::StatusConflict {
                task_id,
                expected,
                actual,
            })
        })
        .await
    }

    async fn find_by_id(&self, id: TaskId) -> TaskRepositoryResult<Option<Task>> {
        self.run_blocking(move |connection| {
            let row = tasks::table
                .filter(tasks::id.eq(id.into_inner()))
                .select(TaskRow::as_select())
                .first::<TaskRow>(connection)
                .optional()
                .map_err(TaskRepositoryError::persistence)?;
            row.map(row_to_task).transpose()
        })
        .await
    }

    async fn find_all(&self) -> TaskRepositoryResult<Vec<Task>> {
        self.run_blocking(move |connection| {
            let rows = tasks::table
                .order((tasks::created_at.asc(), tasks::id.asc()))
                .select(TaskRow::as_select())
                .load::<TaskRow>(connection)
                .map_err(TaskRepositoryError::persistence)?;
            rows.into_iter().map(row_to_task).collect()
        })
        .await
    }

    async fn find_by_external_id(
        &self,
        external_id: &ExternalId,
    ) -> TaskRepositoryResult<Option<Task>> {
        let lookup = external_id.as_str().to_owned();
        self.run_blocking(move |connection| {
            let row = tasks::table
                .filter(tasks::external_id.eq(&lookup))
                .select(TaskRow::as_select())
                .first::<TaskRow>(connection)
                .optional()
                .map_err(TaskRepositoryError::persistence)?;
            row.map(row_to_task).transpose()
        })
        .await
    }

    async fn find_by_file_name(&self, file_name: &str) -> TaskRepositoryResult<Option<Task>> {
        let lookup = file_name.to_owned();
        self.run_blocking(move |connection| {
            let row = tasks::table
                .filter(tasks::file_name.eq(&lookup))
                .order(tasks::created_at.asc())
                .select(TaskRow::as_select())
                .first::<TaskRow>(connection)
                .optional()
                .map_err(TaskRepositoryError::persistence)?;
            row.map(row_to_task).transpose()
        })
        .await
    }
}

fn map_write_error(
    err: DieselError,
    task_id: TaskId,
    external_id: Option<&ExternalId>,
) -> TaskRepositoryError {
    match (err, external_id) {
        (DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info), Some(owned))
            if is_external_id_unique_violation(info.as_ref()) =>
        {
            TaskRepositoryError::DuplicateExternalId(owned.clone())
        }
        (DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _), _) => {
            TaskRepositoryError::DuplicateTask(task_id)
        }
        (other, _) => TaskRepositoryError::persistence(other),
    }
}

fn is_external_id_unique_violation(info: &dyn DatabaseErrorInformation) -> bool {
    info.constraint_name()
        .is_some_and(|name| name == "idx_tasks_external_id_unique")
}

struct EncodedPayloads {
    stats: serde_json::Value,
    placement: Option<serde_json::Value>,
}

fn encode_payloads(task: &Task) -> TaskRepositoryResult<EncodedPayloads> {
    let stats = serde_json::to_value(task.stats()).map_err(TaskRepositoryError::persistence)?;
    let placement = task
        .placement()
        .map(serde_json::to_value)
        .transpose()
        .map_err(TaskRepositoryError::persistence)?;
    Ok(EncodedPayloads { stats, placement })
}

fn to_new_row(task: &Task) -> TaskRepositoryResult<NewTaskRow> {
    let origin = serde_json::to_value(task.origin()).map_err(TaskRepositoryError::persistence)?;
    let payloads = encode_payloads(task)?;

    Ok(NewTaskRow {
        id: task.id().into_inner(),
        external_id: task.external_id().map(|id| id.as_str().to_owned()),
        name: task.name().map(str::to_owned),
        origin,
        requester_id: task.requester().value(),
        conversation_id: task.conversation().value(),
        status: task.status().as_str().to_owned(),
        created_at: task.created_at(),
        updated_at: task.updated_at(),
        completed_at: task.completed_at(),
        error_detail: task.error_detail().map(str::to_owned),
        stats: payloads.stats,
        placement: payloads.placement,
        file_name: task.placement().map(|placement| placement.file_name.clone()),
    })
}

fn to_changeset(task: &Task) -> TaskRepositoryResult<TaskChangeset> {
    let payloads = encode_payloads(task)?;
    Ok(TaskChangeset {
        external_id: task.external_id().map(|id| id.as_str().to_owned()),
        name: task.name().map(str::to_owned),
        status: task.status().as_str().to_owned(),
        updated_at: task.updated_at(),
        completed_at: task.completed_at(),
        error_detail: task.error_detail().map(str::to_owned),
        stats: payloads.stats,
        placement: payloads.placement,
        file_name: task.placement().map(|placement| placement.file_name.clone()),
    })
}

fn row_to_task(row: TaskRow) -> TaskRepositoryResult<Task> {
    let TaskRow {
        id,
        external_id: persisted_external_id,
        name,
        origin: persisted_origin,
        requester_id,
        conversation_id,
        status: persisted_status,
        created_at,
        updated_at,
        completed_at,
        error_detail,
        stats: persisted_stats,
        placement: persisted_placement,
        ..
    } = row;

    let external_id = persisted_external_id
        .map(ExternalId::new)
        .transpose()
        .map_err(TaskRepositoryError::persistence)?;
    let origin = serde_json::from_value::<TaskOrigin>(persisted_origin)
        .map_err(TaskRepositoryError::persistence)?;
    let status =
        TaskStatus::try_from(persisted_status.as_str()).map_err(TaskRepositoryError::persistence)?;
    let stats = serde_json::from_value::<TransferStats>(persisted_stats)
        .map_err(TaskRepositoryError::persistence)?;
    let placement = persisted_placement
        .map(serde_json::from_value::<FilePlacement>)
        .transpose()
        .map_err(TaskRepositoryError::persistence)?;

    Ok(Task::from_persisted(PersistedTaskData {
        id: TaskId::from_uuid(id),
        external_id,
        name,
        origin,
        requester: RequesterId::new(requester_id),
        conversation: ConversationId::new(conversation_id),
        status,
        created_at,
        updated_at,
        completed_at,
        error_detail,
        stats,
        placement,
    }))
}

#[cfg(test)]
mod tests {
    use super::{TaskRow, row_to_task, to_new_row};
    use crate::task::{
        domain::{
            ConversationId, EntryState, ExternalEntry, ExternalId, FilePlacement, RequesterId,
            Task, TaskOrigin,
        },
        ports::TaskRepositoryError,
    };
    use camino::Utf8Path;
    use mockable::DefaultClock;
    use rstest::{fixture, rstest};

    #[fixture]
    fn completed_task() -> Task {
        let clock = DefaultClock;
        let mut task = Task::new(
            TaskOrigin::TorrentFile {
                file_name: Some("distro.torrent".to_owned()),
            },
            RequesterId::new(5),
            ConversationId::new(50),
            &clock,
        );
        let external_id = ExternalId::new("ab".repeat(20)).expect("valid external id");
        task.bind_external_id(external_id.clone(), &clock)
            .expect("fresh task binds");
        let observation = task.observe(
            &ExternalEntry::new(
                external_id,
                "distro.iso",
                EntryState::Uploading,
                chrono::Utc::now(),
            )
            .with_size(1024)
            .with_save_path("/downloads"),
            &clock,
        );
        assert!(observation.completed_now());
        task.record_placement(
            FilePlacement::for_payload(
                "distro.iso",
                Utf8Path::new("/downloads"),
                Utf8Path::new("/library"),
            ),
            &clock,
        );
        task
    }

    fn as_row(task: &Task) -> TaskRow {
        let row = to_new_row(task).expect("task encodes");
        TaskRow {
            id: row.id,
            external_id: row.external_id,
            name: row.name,
            origin: row.origin,
            requester_id: row.requester_id,
            conversation_id: row.conversation_id,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
            completed_at: row.completed_at,
            error_detail: row.error_detail,
            stats: row.stats,
            placement: row.placement,
            file_name: row.file_name,
        }
    }

    #[rstest]
    fn stored_row_restores_the_task(completed_task: Task) {
        let row = as_row(&completed_task);

        assert_eq!(row.status, "completed");
        assert_eq!(row.file_name.as_deref(), Some("distro.iso"));
        let restored = row_to_task(row).expect("row decodes");
        assert_eq!(restored, completed_task);
    }

    #[rstest]
    fn unknown_status_is_a_persistence_error(completed_task: Task) {
        let mut row = as_row(&completed_task);
        row.status = "archived".to_owned();

        let result = row_to_task(row);

        assert!(matches!(result, Err(TaskRepositoryError::Persistence(_))));
    }
}
