use eyre::Result;

use super::App;
use crate::cli::SweepTarget;

/// Handle the sweep command - run one sweep against the persisted registry
pub async fn handle_sweep_command(app: &App, kind: SweepTarget) -> Result<Option<i32>> {
    let mut scheduler = app.scheduler().await?;

    match kind {
        SweepTarget::Installed => scheduler.installed_sweep().await?,
        SweepTarget::Full => scheduler.full_sweep().await?,
    }

    let registry = &scheduler.context().registry;
    let installed = registry.installed().await;
    let mut pending = 0;
    for repository in &installed {
        if repository.state().await.pending_update() {
            pending += 1;
        }
    }

    println!("✅ Sweep finished");
    println!("  Tracked repositories: {}", registry.len());
    println!("  Installed: {}", installed.len());
    println!("  Pending updates: {}", pending);

    if app.host.restart_requested() {
        println!("❗ Critical repositories were removed, a restart is required");
    }
    Ok(app.exit_code())
}
