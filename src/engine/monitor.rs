// src/engine/monitor.rs

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::engine::status::StatusBoard;
use crate::engine::RunEvent;
use crate::exec::SystemProbe;

/// Interval of the transfer-presence probe used by the binary.
pub const MONITOR_INTERVAL: Duration = Duration::from_secs(2);

/// Periodically probe whether `process_name` runs anywhere on the system and
/// publish the answer as `is_checking_process`. Run state is never touched.
///
/// A failing probe counts as "not running". The loop ends when the returned
/// handle is aborted.
pub fn spawn_process_monitor<P>(
    probe: Arc<P>,
    board: StatusBoard,
    process_name: String,
    interval: Duration,
) -> JoinHandle<()>
where
    P: SystemProbe + ?Sized + 'static,
{
    tokio::spawn(async move {
        info!(process = %process_name, ?interval, "process monitor started");
        let mut ticker = tokio::time::interval(interval);

        loop {
            ticker.tick().await;
            let active = probe.is_process_running(&process_name).unwrap_or(false);
            if board.emit(RunEvent::ProcessActivity(active)) {
                debug!(process = %process_name, active, "transfer activity changed");
            }
        }
    })
}
