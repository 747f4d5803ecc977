use custodian_core::RemoteSource;
use eyre::Result;

use super::App;

/// Handle the rate-limit command - show the remaining API quota
pub async fn handle_rate_limit_command(app: &App) -> Result<()> {
    let budget = app.remote.rate_budget().await?;
    println!("📊 GitHub API quota:");
    println!("  Remaining calls: {}", budget.remaining);
    println!(
        "  Resets at: {}",
        budget.reset_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if budget.is_exhausted() {
        println!("💡 Quota exhausted, sweeps will fail until it resets");
    }
    Ok(())
}
