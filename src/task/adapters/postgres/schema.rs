//! Diesel schema for task persistence.

diesel::table! {
    /// Download task records.
    tasks (id) {
        /// Internal task identifier.
        id -> Uuid,
        /// Download client entry identifier, once resolved.
        #[max_length = 255]
        external_id -> Nullable<Varchar>,
        /// Display name, once observed.
        name -> Nullable<Text>,
        /// Origin payload (magnet link or torrent file).
        origin -> Jsonb,
        /// Requesting chat user.
        requester_id -> Int8,
        /// Conversation receiving notifications.
        conversation_id -> Int8,
        /// Task lifecycle status.
        #[max_length = 50]
        status -> Varchar,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
        /// Completion timestamp.
        completed_at -> Nullable<Timestamptz>,
        /// Failure detail.
        error_detail -> Nullable<Text>,
        /// Observed transfer statistics.
        stats -> Jsonb,
        /// Recorded file placement.
        placement -> Nullable<Jsonb>,
        /// Placement file name, denormalised for lookups.
        file_name -> Nullable<Text>,
    }
}
