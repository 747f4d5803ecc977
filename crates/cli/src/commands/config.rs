use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

use eyre::Result;

use crate::cli::ConfigCommands;
use crate::config::Config;

pub async fn handle_config_command(cmd: ConfigCommands, path: &Path) -> Result<()> {
    match cmd {
        ConfigCommands::Set { key, value } => handle_set_config(path, &key, &value).await,
        ConfigCommands::Get { key } => {
            let config = Config::load(path).await?;
            println!("{}: {}", key, config.get_value(&key)?);
            Ok(())
        }
        ConfigCommands::Show => {
            let config = Config::load(path).await?;
            println!("{}", config.show_all());
            print_schedule(&config);
            println!("(from {})", path.display());
            Ok(())
        }
        ConfigCommands::Reset { force } => handle_reset_config(path, force).await,
    }
}

/// Apply one value and save, but only if the resulting file would load again
async fn handle_set_config(path: &Path, key: &str, value: &str) -> Result<()> {
    let mut config = Config::load(path).await?;

    if let Err(e) = config.set_value(key, value).and_then(|_| config.validate()) {
        println!("❌ {} was not changed: {}", key, e);
        return Err(e);
    }
    config.save(path).await?;
    println!("✅ Configuration updated: {} = {}", key, value);

    if key.starts_with("schedule.") {
        print_schedule(&config);
    }
    Ok(())
}

fn print_schedule(config: &Config) {
    let scheduler = config.scheduler_config();
    println!("Effective schedule:");
    println!(
        "  Installed sweep every {}",
        human_interval(scheduler.installed_interval)
    );
    println!("  Full sweep every {}", human_interval(scheduler.full_interval));
}

fn human_interval(interval: Duration) -> String {
    let minutes = interval.as_secs() / 60;
    match (minutes / 60, minutes % 60) {
        (0, minutes) => format!("{}m", minutes),
        (hours, 0) => format!("{}h", hours),
        (hours, minutes) => format!("{}h {}m", hours, minutes),
    }
}

async fn handle_reset_config(path: &Path, force: bool) -> Result<()> {
    if !force {
        print!("Reset the configuration at {} to defaults? (y/N): ", path.display());
        io::stdout().flush()?;
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            println!("❌ Cancelled");
            return Ok(());
        }
    }

    let config = Config::reset(path).await?;
    println!("✅ Configuration reset to defaults");
    print_schedule(&config);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_human_interval() {
        assert_eq!(human_interval(Duration::from_secs(30 * 60)), "30m");
        assert_eq!(human_interval(Duration::from_secs(120 * 60)), "2h");
        assert_eq!(human_interval(Duration::from_secs(800 * 60)), "13h 20m");
    }

    #[tokio::test]
    async fn test_rejected_value_leaves_file_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");

        handle_set_config(&path, "schedule.installed_interval_minutes", "45")
            .await
            .unwrap();
        assert!(
            handle_set_config(&path, "schedule.installed_interval_minutes", "18446744073709551615")
                .await
                .is_err()
        );

        let config = Config::load(&path).await.unwrap();
        assert_eq!(config.schedule.installed_interval_minutes, 45);
    }
}
