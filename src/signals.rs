//! Shutdown signal handling for `smartflag run`.

use anyhow::{Context, Result};
use signal_hook::{
    consts::signal::{SIGHUP, SIGINT, SIGTERM},
    iterator::Signals,
};
use std::{
    sync::Arc,
    sync::atomic::{AtomicBool, Ordering},
    thread,
};

/// Signal handling state shared with the control loop.
pub struct SignalState {
    /// Set once SIGINT, SIGTERM or SIGHUP arrives.
    pub shutdown: Arc<AtomicBool>,
}

fn signal_name(signal: i32) -> &'static str {
    match signal {
        SIGINT => "SIGINT",
        SIGTERM => "SIGTERM",
        SIGHUP => "SIGHUP",
        _ => "signal",
    }
}

/// Spawn the signal thread. The returned flag goes true on the first
/// shutdown signal; the loop finishes its tick and stops the motor.
pub fn setup_signal_handler(debug_enabled: bool) -> Result<SignalState> {
    let shutdown = Arc::new(AtomicBool::new(false));

    let mut signals =
        Signals::new([SIGINT, SIGTERM, SIGHUP]).context("failed to register signal handlers")?;

    let shutdown_clone = shutdown.clone();
    thread::spawn(move || {
        for sig in signals.forever() {
            if debug_enabled {
                log_pipe!();
                log_debug!("Received {}", signal_name(sig));
            }
            if shutdown_clone.swap(true, Ordering::SeqCst) {
                log_warning!("Second {}, exiting immediately", signal_name(sig));
                std::process::exit(crate::common::constants::EXIT_FAILURE);
            }
            log_block_start!("Received {}, shutting down...", signal_name(sig));
        }
    });

    Ok(SignalState { shutdown })
}
