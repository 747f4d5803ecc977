use custodian_core::Category;
use eyre::Result;

use super::App;

/// Handle the register command - track a repository outside the default lists
pub async fn handle_register_command(
    app: &App,
    repository: &str,
    category: Category,
    force: bool,
) -> Result<()> {
    let mut scheduler = app.scheduler().await?;

    if scheduler
        .register_repository(repository, category, force)
        .await?
    {
        println!("✅ Now tracking {} ({})", repository, category);
    } else {
        println!("💡 {} is already tracked, use --force to replace it", repository);
    }
    Ok(())
}
