use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use custodian_core::HostControl;
use tokio::sync::watch;
use tracing::{error, warn};

/// Host control for the `custodian` process.
///
/// The first restart request wins; the run loop is told to stop once the
/// requested delay has passed and the process then exits with the configured
/// restart exit code so a supervisor can start it again.
pub struct ProcessHost {
    requested: AtomicBool,
    stop: Arc<watch::Sender<bool>>,
}

impl ProcessHost {
    pub fn new() -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            requested: AtomicBool::new(false),
            stop: Arc::new(stop),
        }
    }

    pub fn restart_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Receiver that flips to `true` when the process should stop for a restart
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.stop.subscribe()
    }
}

impl Default for ProcessHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostControl for ProcessHost {
    fn request_restart(&self, delay: Duration) {
        if self.requested.swap(true, Ordering::SeqCst) {
            warn!("Restart already requested, ignoring");
            return;
        }

        error!("Restarting in {:?}", delay);
        let stop = Arc::clone(&self.stop);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    tokio::time::sleep(delay).await;
                    stop.send_replace(true);
                });
            }
            Err(_) => {
                stop.send_replace(true);
            }
        }
    }
}
