//! Plain-text chat messages rendered for requesters.
//!
//! The completion notice doubles as a machine-readable record: the
//! `File:` line is parsed back by [`completed_file_name`] when the notice is
//! forwarded to the bot.

use crate::task::domain::{ExternalEntry, Task};
use chrono::Duration;
use minijinja::{Environment, context};
use serde::Serialize;
use thiserror::Error;

/// Marker that identifies a completion notice.
pub const COMPLETION_MARKER: &str = "✅ Download complete";

const FILE_LINE_PREFIX: &str = "File:";
const UNKNOWN: &str = "unknown";
const UNRESOLVED_NAME: &str = "(waiting for the download client)";

const COMPLETION_TEMPLATE: &str = "\
✅ Download complete

File: {{ name }}
Size: {{ size }}
Elapsed: {{ elapsed }}
Average speed: {{ speed }}
Saved to: {{ save_path }}";

const TASK_LIST_TEMPLATE: &str = "\
{% if tasks %}Your downloads:
{% for task in tasks %}{{ loop.index }}. {{ task.name }}
   Status: {{ task.status }}
   Created: {{ task.created_at }}
{% endfor %}{% else %}No download tasks yet.{% endif %}";

const STATUS_TEMPLATE: &str = "\
{% if entries %}Active downloads:
{% for entry in entries %}{{ entry.name }}
   Progress: {{ (entry.progress * 100) | round(1) }}%
   State: {{ entry.state }}
{% endfor %}{% else %}No active downloads.{% endif %}";

/// Help text returned for `/start` and `/help`.
pub const HELP_TEXT: &str = "\
Send a magnet link or a .torrent file to start a download.
Commands:
/status - show live download progress
/list - show your download tasks
/help - show this message";

/// Reply for requesters outside the allow-list.
pub const UNAUTHORISED_TEXT: &str = "Sorry, you are not allowed to use this bot.";

/// Reply for messages the bot does not understand.
pub const USAGE_HINT_TEXT: &str = "Send a magnet link or a .torrent file, or use /help.";

/// Reply once a download request has been accepted.
pub const SUBMITTED_TEXT: &str = "Download added. You will be notified when it completes.";

/// Reply when the download client rejects a request.
pub const SUBMIT_FAILED_TEXT: &str = "The download could not be added. Please try again later.";

/// Reply when live progress cannot be fetched.
pub const STATUS_FAILED_TEXT: &str = "Download status is unavailable right now.";

/// Reply when stored tasks cannot be listed.
pub const LIST_FAILED_TEXT: &str = "Your tasks could not be listed right now.";

/// Reply sent when a task is given up on because no download appeared.
pub const UNRESOLVED_TEXT: &str =
    "No download matching your request appeared in the client; the task was marked as failed.";

/// Errors raised while rendering chat messages.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MessageError {
    /// A template failed to render.
    #[error("failed to render {template} message: {reason}")]
    Render {
        /// Template name.
        template: &'static str,
        /// Renderer message.
        reason: String,
    },
}

#[derive(Serialize)]
struct TaskLine {
    name: String,
    status: String,
    created_at: String,
}

#[derive(Serialize)]
struct EntryLine<'a> {
    name: &'a str,
    progress: f64,
    state: &'a str,
}

fn render(
    template_name: &'static str,
    source: &str,
    ctx: minijinja::Value,
) -> Result<String, MessageError> {
    let environment = Environment::new();
    environment
        .render_str(source, ctx)
        .map_err(|error| MessageError::Render {
            template: template_name,
            reason: error.to_string(),
        })
}

/// Renders the completion notice for a task that has just completed.
///
/// # Errors
///
/// Returns [`MessageError::Render`] when template rendering fails.
pub fn render_completion(task: &Task) -> Result<String, MessageError> {
    let stats = task.stats();
    let speed = stats
        .average_speed
        .map_or_else(|| UNKNOWN.to_owned(), |speed| format!("{}/s", format_size(speed)));
    render(
        "completion",
        COMPLETION_TEMPLATE,
        context! {
            name => task.name().unwrap_or(UNKNOWN),
            size => stats.size_bytes.map_or_else(|| UNKNOWN.to_owned(), format_size),
            elapsed => task
                .download_duration()
                .map_or_else(|| UNKNOWN.to_owned(), format_duration),
            speed => speed,
            save_path => stats.save_path.as_deref().unwrap_or(UNKNOWN),
        },
    )
}

/// Renders the stored task listing, oldest first.
///
/// # Errors
///
/// Returns [`MessageError::Render`] when template rendering fails.
pub fn render_task_list(tasks: &[Task]) -> Result<String, MessageError> {
    let lines: Vec<TaskLine> = tasks
        .iter()
        .map(|task| TaskLine {
            name: task.name().unwrap_or(UNRESOLVED_NAME).to_owned(),
            status: task.status().to_string(),
            created_at: task.created_at().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        })
        .collect();
    render("task list", TASK_LIST_TEMPLATE, context! { tasks => lines })
}

/// Renders live download progress for `/status`.
///
/// # Errors
///
/// Returns [`MessageError::Render`] when template rendering fails.
pub fn render_status(entries: &[ExternalEntry]) -> Result<String, MessageError> {
    let lines: Vec<EntryLine<'_>> = entries
        .iter()
        .map(|entry| EntryLine {
            name: &entry.name,
            progress: entry.progress,
            state: entry.state.as_str(),
        })
        .collect();
    render("status", STATUS_TEMPLATE, context! { entries => lines })
}

/// Extracts the file name from a completion notice.
///
/// Returns `None` when `text` is not a completion notice or carries no file
/// line.
#[must_use]
pub fn completed_file_name(text: &str) -> Option<&str> {
    if !text.contains(COMPLETION_MARKER) {
        return None;
    }
    text.lines()
        .find_map(|line| line.trim_start().strip_prefix(FILE_LINE_PREFIX))
        .map(str::trim)
        .filter(|name| !name.is_empty())
}

/// Formats a byte count with binary units and two decimals.
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const UNITS: [(&str, u64); 4] = [
        ("TiB", 1 << 40),
        ("GiB", 1 << 30),
        ("MiB", 1 << 20),
        ("KiB", 1 << 10),
    ];
    UNITS
        .iter()
        .find(|(_, unit)| bytes >= *unit)
        .map_or_else(
            || format!("{bytes} B"),
            |(label, unit)| {
                let hundredths = u128::from(bytes)
                    .saturating_mul(100)
                    .checked_div(u128::from(*unit))
                    .unwrap_or(0);
                let whole = hundredths.checked_div(100).unwrap_or(0);
                let fraction = hundredths.checked_rem(100).unwrap_or(0);
                format!("{whole}.{fraction:02} {label}")
            },
        )
}

/// Formats an elapsed duration as hours, minutes and seconds.
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let total = duration.num_seconds().max(0);
    let hours = total.checked_div(3600).unwrap_or(0);
    let minutes = total
        .checked_rem(3600)
        .and_then(|rest| rest.checked_div(60))
        .unwrap_or(0);
    let seconds = total.checked_rem(60).unwrap_or(0);
    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}
