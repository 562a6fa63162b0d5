//! Then steps for download completion BDD scenarios.

use super::world::{CompletionWorld, run_async};
use rstest_bdd_macros::then;
use steward::task::domain::TaskStatus;

#[then(r#"the task status is "{status}""#)]
fn task_status_is(world: &CompletionWorld, status: String) -> Result<(), eyre::Report> {
    let expected = TaskStatus::try_from(status.as_str())
        .map_err(|err| eyre::eyre!("invalid expected status in scenario: {err}"))?;
    let task_id = world
        .task_id
        .ok_or_else(|| eyre::eyre!("missing accepted task in scenario world"))?;
    let task = run_async(world.lifecycle.find_by_id(task_id))?
        .ok_or_else(|| eyre::eyre!("task {task_id} is no longer stored"))?;

    if task.status() != expected {
        return Err(eyre::eyre!(
            "expected status {expected}, found {}",
            task.status()
        ));
    }
    Ok(())
}

#[then("{count:usize} completion notice has been sent")]
fn completion_notices_sent(world: &CompletionWorld, count: usize) -> Result<(), eyre::Report> {
    let sent = world.completion_notices()?;
    eyre::ensure!(sent == count, "expected {count} completion notices, found {sent}");
    Ok(())
}

#[then("the last pass counted {count:usize} missing entry")]
fn last_pass_counted_missing(world: &CompletionWorld, count: usize) -> Result<(), eyre::Report> {
    let report = world
        .last_report
        .as_ref()
        .ok_or_else(|| eyre::eyre!("no reconciliation pass has run"))?;
    eyre::ensure!(
        report.missing == count,
        "expected {count} missing entries, found {}",
        report.missing
    );
    Ok(())
}
