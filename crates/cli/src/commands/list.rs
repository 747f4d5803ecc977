use custodian_core::{RemovalType, RepositoryRegistry};
use eyre::Result;

use super::App;

/// Handle the list command - show tracked repositories by display name
pub async fn handle_list_command(app: &App, installed_only: bool) -> Result<()> {
    let registry = RepositoryRegistry::restore(app.store.as_ref()).await?;

    if registry.is_empty() {
        println!("No repositories tracked yet. Run: custodian sweep full");
        return Ok(());
    }

    let mut shown = 0;
    for repository in registry.sorted_by_display_name().await {
        let state = repository.state().await;
        if installed_only && !state.installed {
            continue;
        }
        shown += 1;

        let name = state
            .display_name
            .clone()
            .unwrap_or_else(|| repository.short_name().to_string());
        print!("  📦 {} ({}, {})", name, repository.full_name(), repository.category());

        if state.installed {
            print!(
                " installed {}",
                state.installed_version.as_deref().unwrap_or("unknown")
            );
            if state.pending_update() {
                print!(
                    " ⬆️  {}",
                    state.available_version.as_deref().unwrap_or("unknown")
                );
            }
        }
        match state.removal.as_ref().map(|removal| removal.removal_type) {
            Some(RemovalType::Critical) => print!(" ❗ critical"),
            Some(RemovalType::Blacklist) => print!(" 🚫 blacklisted"),
            None => {}
        }
        println!();
    }

    println!("{} of {} repositories", shown, registry.len());
    Ok(())
}
