//! When steps for download completion BDD scenarios.

use super::world::{CompletionWorld, run_async};
use eyre::WrapErr;
use rstest_bdd_macros::when;
use steward::task::domain::EntryState;

#[when("{count:u32} reconciliation passes run")]
fn reconciliation_passes_run(world: &mut CompletionWorld, count: u32) -> Result<(), eyre::Report> {
    for _ in 0..count {
        let report = run_async(world.reconciler.run_pass()).wrap_err("run reconciliation pass")?;
        world.last_report = Some(report);
    }
    Ok(())
}

#[when(r#"the download client later reports the entry as "{state}""#)]
fn client_later_reports_state(
    world: &mut CompletionWorld,
    state: String,
) -> Result<(), eyre::Report> {
    let id = world.bound_id()?.clone();
    world.gateway.set_state(&id, EntryState::from(state))?;
    Ok(())
}
