use custodian_core::Topic;
use eyre::Result;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use super::App;

/// Handle the run command - startup sweep, then recurring sweeps until stopped.
///
/// Returns the exit code to use when the run ended because of a restart request.
pub async fn handle_run_command(app: &App) -> Result<Option<i32>> {
    let scheduler = app.scheduler().await?;
    let handle = scheduler.handle();
    let mut stop = app.host.subscribe();
    let mut notifications = app.bus.subscribe();

    let running = tokio::spawn(scheduler.run());
    info!("custodian is running, press Ctrl-C to stop");

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                info!("Interrupted, shutting down");
                break;
            }
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    info!("Stopping for restart");
                    break;
                }
            }
            notification = notifications.recv() => match notification {
                Ok(notification) if notification.topic == Topic::Alert => {
                    println!(
                        "⚠️  {} {}",
                        notification.payload["title"].as_str().unwrap_or_default(),
                        notification.payload["message"].as_str().unwrap_or_default()
                    );
                }
                Ok(notification) => {
                    debug!("{}: {}", notification.topic, notification.payload);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Missed {} notifications", skipped);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    handle.shutdown().await;
    running.await??;

    let status = handle.status();
    debug!("Final status: {:?}", status);
    Ok(app.exit_code())
}
