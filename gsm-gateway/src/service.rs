use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use eyre::{Result, WrapErr};
use tracing::{info, warn};

use crate::backend::sync::SyncClient;
use crate::config::Config;
use crate::modem;
use crate::ports;

/// Installs the interrupt handler. The returned flag flips to false the
/// moment the operator asks for termination; the handler does nothing else.
pub fn install_shutdown_handler() -> Result<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        handler_flag.store(false, Ordering::SeqCst);
    })
    .wrap_err("failed to install interrupt handler")?;
    Ok(running)
}

/// Drives rounds of enumerate -> collect-all -> sync, strictly sequentially
/// on this thread, until interrupted.
///
/// Every port-level and sync-level failure is contained here and followed by
/// the normal sleep; only the interrupt flag ends the loop. Returning is the
/// orderly exit path.
pub fn run(config: &Config, client: &SyncClient, running: &AtomicBool) -> Result<()> {
    info!(
        interval_secs = config.sync_interval.as_secs(),
        "starting sync rounds"
    );

    while running.load(Ordering::SeqCst) {
        run_round(config, client, running);
        sleep_interruptible(config.sync_interval, running);
    }

    info!("interrupt received, shutting down");
    Ok(())
}

fn run_round(config: &Config, client: &SyncClient, running: &AtomicBool) {
    let ports = ports::list_ports();
    if ports.is_empty() {
        info!("no serial ports found, waiting for next round");
        return;
    }
    info!(port_count = ports.len(), ports = ?ports, "interrogating serial ports");

    let mut modems = Vec::new();
    for port_name in &ports {
        if !running.load(Ordering::SeqCst) {
            return;
        }
        match modem::collect(port_name, config) {
            Ok(record) => {
                info!(
                    port = %port_name,
                    imei = ?record.imei,
                    operator = ?record.operator,
                    signal = ?record.signal_strength,
                    "modem read"
                );
                modems.push(record);
            }
            Err(err) => warn!(port = %port_name, error = %err, "skipping port"),
        }
    }

    if modems.is_empty() {
        warn!("no modem answered this round");
        return;
    }

    info!(modem_count = modems.len(), "syncing batch");
    if let Err(err) = client.sync(&modems) {
        warn!(error = %err, "sync failed, batch dropped");
    }
}

/// Sleeps in short slices so an interrupt lands mid-interval instead of
/// after it.
fn sleep_interruptible(total: Duration, running: &AtomicBool) {
    const SLICE: Duration = Duration::from_millis(250);

    let mut remaining = total;
    while !remaining.is_zero() && running.load(Ordering::SeqCst) {
        let step = remaining.min(SLICE);
        thread::sleep(step);
        remaining -= step;
    }
}
