//! Mapping of download client states onto task statuses, and the forward-only
//! status ordering.

use crate::task::domain::{EntryState, TaskStatus};
use rstest::rstest;

const ALL_STATUSES: [TaskStatus; 5] = [
    TaskStatus::Pending,
    TaskStatus::Downloading,
    TaskStatus::Completed,
    TaskStatus::Organized,
    TaskStatus::Failed,
];

#[rstest]
#[case("downloading", Some(TaskStatus::Downloading))]
#[case("metaDL", Some(TaskStatus::Downloading))]
#[case("forcedDL", Some(TaskStatus::Downloading))]
#[case("queuedDL", Some(TaskStatus::Downloading))]
#[case("stalledDL", Some(TaskStatus::Downloading))]
#[case("stalled", Some(TaskStatus::Downloading))]
#[case("checkingDL", Some(TaskStatus::Downloading))]
#[case("allocating", Some(TaskStatus::Downloading))]
#[case("queued", Some(TaskStatus::Downloading))]
#[case("pausedDL", Some(TaskStatus::Downloading))]
#[case("stoppedDL", Some(TaskStatus::Downloading))]
#[case("uploading", Some(TaskStatus::Completed))]
#[case("pausedUP", Some(TaskStatus::Completed))]
#[case("stoppedUP", Some(TaskStatus::Completed))]
#[case("queuedUP", Some(TaskStatus::Completed))]
#[case("stalledUP", Some(TaskStatus::Completed))]
#[case("forcedUP", Some(TaskStatus::Completed))]
#[case("checkingUP", Some(TaskStatus::Completed))]
#[case("completed", Some(TaskStatus::Completed))]
#[case("error", Some(TaskStatus::Failed))]
#[case("missingFiles", Some(TaskStatus::Failed))]
#[case("moving", None)]
#[case("checkingResumeData", None)]
#[case("unknown", None)]
fn wire_state_maps_to_status(#[case] wire: &str, #[case] expected: Option<TaskStatus>) {
    let state = EntryState::from(wire);

    assert_eq!(state.observed_status(), expected);
}

#[rstest]
#[case("uploading", true)]
#[case("pausedUP", true)]
#[case("stoppedUP", true)]
#[case("stalledUP", false)]
#[case("downloading", false)]
fn seeding_states(#[case] wire: &str, #[case] expected: bool) {
    assert_eq!(EntryState::from(wire).is_seeding(), expected);
}

#[rstest]
fn unknown_wire_state_survives_round_trip() {
    let state = EntryState::from("moving");

    assert_eq!(state, EntryState::Other("moving".to_owned()));
    assert_eq!(state.as_str(), "moving");
}

#[rstest]
#[case(TaskStatus::Pending, TaskStatus::Downloading, true)]
#[case(TaskStatus::Pending, TaskStatus::Completed, true)]
#[case(TaskStatus::Pending, TaskStatus::Organized, true)]
#[case(TaskStatus::Pending, TaskStatus::Failed, true)]
#[case(TaskStatus::Downloading, TaskStatus::Pending, false)]
#[case(TaskStatus::Downloading, TaskStatus::Completed, true)]
#[case(TaskStatus::Downloading, TaskStatus::Failed, true)]
#[case(TaskStatus::Completed, TaskStatus::Downloading, false)]
#[case(TaskStatus::Completed, TaskStatus::Organized, true)]
#[case(TaskStatus::Completed, TaskStatus::Failed, false)]
fn forward_ordering(#[case] from: TaskStatus, #[case] to: TaskStatus, #[case] allowed: bool) {
    assert_eq!(from.can_advance_to(to), allowed);
}

#[rstest]
fn terminal_statuses_accept_nothing() {
    for terminal in [TaskStatus::Organized, TaskStatus::Failed] {
        assert!(terminal.is_terminal());
        for next in ALL_STATUSES {
            assert!(
                !terminal.can_advance_to(next),
                "{terminal} must not advance to {next}"
            );
        }
    }
}

#[rstest]
fn self_transitions_are_rejected() {
    for status in ALL_STATUSES {
        assert!(!status.can_advance_to(status), "{status} advanced to itself");
    }
}

#[rstest]
fn storage_names_parse_back() {
    for status in ALL_STATUSES {
        assert_eq!(TaskStatus::try_from(status.as_str()), Ok(status));
    }
    assert!(TaskStatus::try_from("archived").is_err());
}
