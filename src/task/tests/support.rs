//! Shared fixtures for task unit tests.

use crate::task::{
    adapters::memory::{InMemoryDownloadGateway, InMemoryNotifier, InMemoryTaskRepository},
    domain::{
        ConversationId, EntryState, ExternalEntry, ExternalId, MagnetLink, RequesterId, TaskOrigin,
    },
    services::TaskLifecycleService,
};
use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use mockable::Clock;
use std::sync::{Arc, Mutex};

pub const REQUESTER: RequesterId = RequesterId::new(42);
pub const CONVERSATION: ConversationId = ConversationId::new(4242);

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn starting_at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().expect("clock lock");
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::starting_at(epoch())
    }
}

impl Clock for ManualClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock")
    }
}

pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 1, 12, 0, 0)
        .single()
        .expect("valid timestamp")
}

/// Returns a 40-character hexadecimal identifier derived from `seed`.
pub fn hash(seed: char) -> String {
    std::iter::repeat_n(seed, 40).collect()
}

pub fn external_id(seed: char) -> ExternalId {
    ExternalId::new(hash(seed)).expect("valid external id")
}

pub fn magnet_text(seed: char) -> String {
    format!("magnet:?xt=urn:btih:{}&dn=example", hash(seed))
}

pub fn magnet_origin(seed: char) -> TaskOrigin {
    TaskOrigin::Magnet {
        link: MagnetLink::new(magnet_text(seed)).expect("valid magnet link"),
    }
}

pub fn file_origin() -> TaskOrigin {
    TaskOrigin::TorrentFile {
        file_name: Some("ubuntu.torrent".to_owned()),
    }
}

pub fn entry(seed: char, state: EntryState, added_at: DateTime<Utc>) -> ExternalEntry {
    ExternalEntry::new(external_id(seed), format!("payload-{seed}"), state, added_at)
}

pub type TestLifecycle = TaskLifecycleService<InMemoryTaskRepository, InMemoryNotifier, ManualClock>;

/// In-memory wiring shared by service tests.
pub struct Harness {
    pub repository: Arc<InMemoryTaskRepository>,
    pub gateway: Arc<InMemoryDownloadGateway>,
    pub notifier: Arc<InMemoryNotifier>,
    pub clock: Arc<ManualClock>,
    pub lifecycle: TestLifecycle,
}

impl Harness {
    pub fn new() -> Self {
        let repository = Arc::new(InMemoryTaskRepository::new());
        let notifier = Arc::new(InMemoryNotifier::new());
        let clock = Arc::new(ManualClock::default());
        let lifecycle = TaskLifecycleService::new(
            Arc::clone(&repository),
            Arc::clone(&notifier),
            Arc::clone(&clock),
        );
        Self {
            repository,
            gateway: Arc::new(InMemoryDownloadGateway::new()),
            notifier,
            clock,
            lifecycle,
        }
    }

    pub fn with_placement_root(mut self, root: &str) -> Self {
        self.lifecycle = self.lifecycle.with_placement_root(root);
        self
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.notifier
            .sent()
            .expect("notifier outbox")
            .into_iter()
            .map(|message| message.text)
            .collect()
    }

    pub fn completion_notices(&self) -> usize {
        self.sent_texts()
            .iter()
            .filter(|text| text.contains(crate::task::services::messages::COMPLETION_MARKER))
            .count()
    }
}
