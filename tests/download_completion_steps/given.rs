//! Given steps for download completion BDD scenarios.

use super::world::{CONVERSATION, CompletionWorld, REQUESTER, run_async};
use eyre::WrapErr;
use rstest_bdd_macros::given;
use steward::task::domain::{EntryState, ExternalEntry, ExternalId, MagnetLink, TaskOrigin};

#[given(r#"a magnet request for "{seed}" has been accepted"#)]
fn magnet_request_accepted(world: &mut CompletionWorld, seed: String) -> Result<(), eyre::Report> {
    let hash = seed.repeat(40);
    let external_id = ExternalId::new(hash.as_str())?;
    world.gateway.upsert_entry(ExternalEntry::new(
        external_id.clone(),
        format!("payload-{seed}"),
        EntryState::MetaDownloading,
        chrono::Utc::now(),
    ))?;

    let origin = TaskOrigin::Magnet {
        link: MagnetLink::new(format!("magnet:?xt=urn:btih:{hash}"))?,
    };
    let task = run_async(world.lifecycle.create_task(origin, REQUESTER, CONVERSATION))
        .wrap_err("create task for accepted request")?;
    run_async(
        world
            .lifecycle
            .apply_resolved_identifier(task.id(), external_id.clone()),
    )
    .wrap_err("bind accepted request to its entry")?;

    world.task_id = Some(task.id());
    world.external_id = Some(external_id);
    Ok(())
}

#[given(r#"the download client reports the entry as "{state}""#)]
fn client_reports_state(world: &mut CompletionWorld, state: String) -> Result<(), eyre::Report> {
    let id = world.bound_id()?.clone();
    let updated = world.gateway.set_state(&id, EntryState::from(state))?;
    eyre::ensure!(updated, "entry {id} is not known to the download client");
    Ok(())
}

#[given("the download client has forgotten the entry")]
fn client_forgot_entry(world: &mut CompletionWorld) -> Result<(), eyre::Report> {
    let id = world.bound_id()?.clone();
    world.gateway.remove_entry(&id)?;
    Ok(())
}
