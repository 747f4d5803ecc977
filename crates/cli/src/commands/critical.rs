use custodian_core::CriticalRepositoryGuard;
use eyre::Result;

use super::App;
use crate::cli::CriticalCommands;

pub async fn handle_critical_command(app: &App, cmd: CriticalCommands) -> Result<()> {
    let guard = CriticalRepositoryGuard::new(
        app.services.clone(),
        app.config.scheduler_config().restart_delay,
    );

    match cmd {
        CriticalCommands::List => {
            let advisories = guard.stored_advisories().await?;
            if advisories.is_empty() {
                println!("No critical repositories");
                return Ok(());
            }
            for advisory in advisories {
                let marker = if advisory.acknowledged { "✅" } else { "❗" };
                println!("  {} {}: {}", marker, advisory.repository, advisory.reason);
                println!("     {}", advisory.link);
            }
        }
        CriticalCommands::Ack { repository } => {
            if guard.acknowledge(&repository).await? {
                println!("✅ Acknowledged {}", repository);
            } else {
                return Err(eyre::eyre!(
                    "No critical advisory stored for {}",
                    repository
                ));
            }
        }
    }
    Ok(())
}
