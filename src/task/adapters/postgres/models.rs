//! Diesel row models for task persistence.

use super::schema::tasks;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

/// Query result row for task records.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = tasks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TaskRow {
    /// Internal task identifier.
    pub id: uuid::Uuid,
    /// Download client entry identifier.
    pub external_id: Option<String>,
    /// Display name.
    pub name: Option<String>,
    /// Origin JSON payload.
    pub origin: Value,
    /// Requesting chat user.
    pub requester_id: i64,
    /// Conversation receiving notifications.
    pub conversation_id: i64,
    /// Lifecycle status.
    pub status: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Completion timestamp.
    pub completed_at: Option<DateTime<Utc>>,
    /// Failure detail.
    pub error_detail: Option<String>,
    /// Transfer statistics JSON payload.
    pub stats: Value,
    /// Placement JSON payload.
    pub placement: Option<Value>,
    /// Placement file name.
    pub file_name: Option<String>,
}

/// Insert model for task records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = tasks)]
pub struct NewTaskRow {
    /// Internal task identifier.
    pub id: uuid::Uuid,
    /// Download client entry identifier.
    pub external_id: Option<String>,
    /// Display name.
    pub name: Option<String>,
    /// Origin JSON payload.
    pub origin: Value,
    /// Requesting chat user.
    pub requester_id: i64,
    /// Conversation receiving notifications.
    pub conversation_id: i64,
    /// Lifecycle status.
    pub status: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Completion timestamp.
    pub completed_at: Option<DateTime<Utc>>,
    /// Failure detail.
    pub error_detail: Option<String>,
    /// Transfer statistics JSON payload.
    pub stats: Value,
    /// Placement JSON payload.
    pub placement: Option<Value>,
    /// Placement file name.
    pub file_name: Option<String>,
}

/// Changeset for the mutable columns of a task record.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = tasks)]
#[diesel(treat_none_as_null = true)]
pub struct TaskChangeset {
    /// Download client entry identifier.
    pub external_id: Option<String>,
    /// Display name.
    pub name: Option<String>,
    /// Lifecycle status.
    pub status: String,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Completion timestamp.
    pub completed_at: Option<DateTime<Utc>>,
    /// Failure detail.
    pub error_detail: Option<String>,
    /// Transfer statistics JSON payload.
    pub stats: Value,
    /// Placement JSON payload.
    pub placement: Option<Value>,
    /// Placement file name.
    pub file_name: Option<String>,
}
