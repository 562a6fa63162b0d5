//! Shared test helpers for in-memory integration tests.

use camino::Utf8PathBuf;
use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use mockable::Clock;
use rstest::fixture;
use std::sync::Mutex;
use steward::task::{
    adapters::memory::InMemoryTaskRepository,
    domain::{ConversationId, ExternalId, MagnetLink, RequesterId, Task, TaskOrigin},
};
use tempfile::TempDir;

/// Requester used by every scenario.
pub const REQUESTER: RequesterId = RequesterId::new(1001);

/// Conversation used by every scenario.
pub const CONVERSATION: ConversationId = ConversationId::new(2002);

/// Clock that advances one second on every reading.
#[derive(Debug)]
pub struct SteppingClock {
    next: Mutex<DateTime<Utc>>,
}

impl Default for SteppingClock {
    fn default() -> Self {
        let start = Utc
            .with_ymd_and_hms(2026, 10, 1, 8, 0, 0)
            .single()
            .unwrap_or(DateTime::UNIX_EPOCH);
        Self {
            next: Mutex::new(start),
        }
    }
}

impl Clock for SteppingClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        let mut next = self.next.lock().expect("clock lock");
        let now = *next;
        *next += Duration::seconds(1);
        now
    }
}

/// Provides a fresh in-memory repository for each test.
#[fixture]
pub fn repo() -> InMemoryTaskRepository {
    InMemoryTaskRepository::new()
}

/// Provides a stepping clock.
#[fixture]
pub fn clock() -> SteppingClock {
    SteppingClock::default()
}

/// Returns a 40-character identifier made of `seed`.
pub fn hash(seed: char) -> String {
    std::iter::repeat_n(seed, 40).collect()
}

/// Returns the external identifier made of `seed`.
pub fn external_id(seed: char) -> ExternalId {
    ExternalId::new(hash(seed)).expect("valid external id")
}

/// Returns a magnet link whose info hash is made of `seed`.
pub fn magnet_text(seed: char) -> String {
    format!("magnet:?xt=urn:btih:{}&dn=payload", hash(seed))
}

/// Creates a pending magnet task.
pub fn magnet_task(seed: char, clock: &SteppingClock) -> Task {
    let origin = TaskOrigin::Magnet {
        link: MagnetLink::new(magnet_text(seed)).expect("valid magnet link"),
    };
    Task::new(origin, REQUESTER, CONVERSATION, clock)
}

/// Returns the UTF-8 path of a temporary directory.
pub fn utf8_dir(dir: &TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("temporary path is UTF-8")
}
